use std::io::Write;

use crate::domain::config::RunConfig;
use crate::domain::entry_point::EntryPoint;
use crate::domain::errors::TraceError;
use crate::domain::event::{ExecutionOutcome, RunCapture};
use crate::domain::index::{IdentifierIndex, ProgramIndex};
use crate::domain::source::{InstrumentedProgram, SourceFile, SourceUnit};
use crate::domain::tree::TraceTree;

pub mod json_exporter;

/// Parses sources and assigns stable ids to every traceable construct.
pub trait SourceIndexer {
    fn parse(&self, files: &[SourceFile]) -> Result<Vec<SourceUnit>, TraceError>;
    fn index(&self, units: &[SourceUnit]) -> ProgramIndex;
}

/// Splices emission probes into parsed units, mirroring the indexer's
/// id assignment.
pub trait Instrumenter {
    fn instrument(
        &self,
        units: &[SourceUnit],
        program: &ProgramIndex,
        entry: &EntryPoint,
        root_rel: &str,
    ) -> Result<InstrumentedProgram, TraceError>;
}

/// Compiles and executes the instrumented program, draining its trace
/// channel and classifying the exit.
pub trait ProgramRunner {
    fn run(
        &self,
        program: &InstrumentedProgram,
        config: &RunConfig,
    ) -> Result<RunCapture, TraceError>;
}

/// Serializes the reconstructed trace into the output document.
pub trait TraceExporter {
    fn export(
        &self,
        outcome: &ExecutionOutcome,
        index: &IdentifierIndex,
        tree: &TraceTree,
        out: &mut dyn Write,
    ) -> Result<(), TraceError>;
}
