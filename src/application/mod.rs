// Application layer: wires the pipeline stages into one trace request.
// Stages run strictly forward (index -> instrument -> run -> build ->
// serialize); no stage reaches back upstream, and every resource is owned by
// the stage that needs it.

use std::io::Write;

use anyhow::{Context, Result};

use crate::domain::config::RunConfig;
use crate::domain::entry_point::{EntryPointKind, EntryPointResolver};
use crate::domain::event::RunStatus;
use crate::domain::source::SourceFile;
use crate::domain::store::{source_fingerprint, DiskIndexStore, IndexStore};
use crate::domain::symbol::SymbolIndex;
use crate::domain::tree::TraceTree;
use crate::ports::{Instrumenter, ProgramRunner, SourceIndexer, TraceExporter};

pub struct TraceUsecase<'a> {
    pub indexer: &'a dyn SourceIndexer,
    pub instrumenter: &'a dyn Instrumenter,
    pub runner: &'a dyn ProgramRunner,
    pub exporter: &'a dyn TraceExporter,
}

/// What one pipeline run produced, for caller-side reporting. The JSON
/// document itself goes to the writer passed into `run`.
#[derive(Debug)]
pub struct TraceSummary {
    pub status: RunStatus,
    pub nodes: usize,
    pub demoted: usize,
    pub events: usize,
    pub frames: usize,
    pub incomplete: usize,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl TraceUsecase<'_> {
    pub fn run(
        &self,
        files: &[SourceFile],
        root_rel: Option<&str>,
        config: &RunConfig,
        out: &mut dyn Write,
    ) -> Result<TraceSummary> {
        // 1. Parse + index (through the cache when configured; id assignment
        //    is deterministic, so a fingerprint hit is sound).
        let units = self.indexer.parse(files)?;
        let mut program = match &config.cache_dir {
            Some(dir) => {
                let store = DiskIndexStore::new(dir).context("Failed to open index cache")?;
                let fingerprint = source_fingerprint(files);
                match store.load(&fingerprint) {
                    Some(cached) => {
                        println!("[Index] Cache hit for fingerprint {}", fingerprint);
                        cached
                    }
                    None => {
                        let fresh = self.indexer.index(&units);
                        store.save(&fingerprint, &fresh);
                        fresh
                    }
                }
            }
            None => self.indexer.index(&units),
        };
        println!(
            "[Index] {} traceable nodes across {} files",
            program.index.len(),
            files.len()
        );

        // 2. Resolve the entry point against the symbol index.
        let symbols = SymbolIndex::build(&program.methods);
        let entry = EntryPointResolver::resolve(&symbols, &config.entry)?;
        if entry.kind == EntryPointKind::Named
            && !EntryPointResolver::detect_mains(&symbols).is_empty()
        {
            anyhow::bail!(
                "entry point `{}` conflicts with the program's own fn main",
                config.entry
            );
        }
        let root_rel = root_rel.unwrap_or(entry.file.as_str());
        if entry.kind == EntryPointKind::Named && entry.file != root_rel {
            anyhow::bail!(
                "entry point `{}` must be defined in the crate root file ({})",
                config.entry,
                root_rel
            );
        }

        // 3. Instrument; demotions are node-local and flagged in the index.
        let instrumented = self
            .instrumenter
            .instrument(&units, &program, &entry, root_rel)?;
        for issue in &instrumented.issues {
            program.index.mark_demoted(issue.id);
        }
        if !instrumented.issues.is_empty() {
            println!(
                "[Instrument] {} nodes demoted to untraceable",
                instrumented.issues.len()
            );
        }

        // 4. Build + execute, draining the trace channel.
        let capture = self.runner.run(&instrumented, config)?;
        println!(
            "[Run] {} events captured, outcome {:?}",
            capture.events.len(),
            capture.outcome.status
        );

        // 5. Reconstruct and serialize.
        let tree = TraceTree::from_events(
            &capture.events,
            &program.index,
            Some(&symbols),
            &capture.outcome,
        )?;
        self.exporter
            .export(&capture.outcome, &program.index, &tree, out)?;

        Ok(TraceSummary {
            status: capture.outcome.status,
            nodes: program.index.len(),
            demoted: program.index.demoted_count(),
            events: capture.events.len(),
            frames: tree.frame_count(),
            incomplete: tree.incomplete_count(),
            stdout: capture.stdout,
            stderr: capture.stderr,
        })
    }
}
