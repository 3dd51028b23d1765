// Command-line entry point for RunVis.

use clap::Parser;
use runvis::application::TraceUsecase;
use runvis::domain::config::{RunConfig, DEFAULT_TIMEOUT_SECS};
use runvis::infrastructure::{
    concurrency, ProjectLoader, RustcRunner, SynInstrumenter, SynSourceIndexer,
};
use runvis::ports::json_exporter::JsonTraceExporter;
use serde::Deserialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input source file path (can specify multiple)
    #[arg(short, long)]
    input: Vec<String>,

    /// Input source folder
    #[arg(short = 'd', long)]
    folder: Option<String>,

    /// Cargo.toml of a binary crate to trace
    #[arg(long)]
    project: Option<String>,

    /// Output file for the trace document
    #[arg(short, long)]
    output: String,

    /// Entry function to trace (defaults to main)
    #[arg(long)]
    entry: Option<String>,

    /// Argument passed to the traced program (can specify multiple)
    #[arg(long = "arg")]
    args: Vec<String>,

    /// Working directory for the traced program
    #[arg(long)]
    cwd: Option<PathBuf>,

    /// Wall-clock budget for the traced program, in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Directory for the on-disk index cache
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Keep the scratch build directory for inspection
    #[arg(long)]
    keep_scratch: bool,
}

/// Optional per-project defaults, read from runvis.toml next to the inputs.
/// CLI flags always win.
#[derive(Debug, Default, Deserialize)]
struct TraceDefaults {
    entry: Option<String>,
    args: Option<Vec<String>>,
    timeout: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct DefaultsFile {
    trace: Option<TraceDefaults>,
}

fn load_defaults(dir: &Path) -> TraceDefaults {
    let path = dir.join("runvis.toml");
    let Ok(text) = fs::read_to_string(&path) else {
        return TraceDefaults::default();
    };
    match toml::from_str::<DefaultsFile>(&text) {
        Ok(file) => {
            println!("[RunVis] Using defaults from {}", path.display());
            file.trace.unwrap_or_default()
        }
        Err(err) => {
            eprintln!("[RunVis] Ignoring malformed {}: {}", path.display(), err);
            TraceDefaults::default()
        }
    }
}

fn defaults_dir(cli: &Cli) -> PathBuf {
    if let Some(manifest) = &cli.project {
        if let Some(parent) = Path::new(manifest).parent() {
            return parent.to_path_buf();
        }
    }
    if let Some(folder) = &cli.folder {
        return PathBuf::from(folder);
    }
    if let Some(first) = cli.input.first() {
        if let Some(parent) = Path::new(first).parent() {
            if !parent.as_os_str().is_empty() {
                return parent.to_path_buf();
            }
        }
    }
    PathBuf::from(".")
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Err(err) = concurrency::init_thread_pool() {
        eprintln!("[RunVis] Thread pool init skipped: {}", err);
    }

    let project = if let Some(manifest) = &cli.project {
        ProjectLoader::load_cargo_project(manifest)?
    } else if let Some(folder) = &cli.folder {
        ProjectLoader::load_folder(folder)?
    } else if !cli.input.is_empty() {
        ProjectLoader::load_files(&cli.input)?
    } else {
        anyhow::bail!(
            "Provide at least one --input <file>, --folder <dir> or --project <Cargo.toml>"
        );
    };

    let defaults = load_defaults(&defaults_dir(&cli));
    let config = RunConfig {
        entry: cli
            .entry
            .or(defaults.entry)
            .unwrap_or_else(|| "main".to_string()),
        args: if cli.args.is_empty() {
            defaults.args.unwrap_or_default()
        } else {
            cli.args.clone()
        },
        cwd: cli.cwd.clone(),
        timeout: Duration::from_secs(
            cli.timeout
                .or(defaults.timeout)
                .unwrap_or(DEFAULT_TIMEOUT_SECS),
        ),
        keep_scratch: cli.keep_scratch,
        cache_dir: cli.cache_dir.clone(),
    };

    let usecase = TraceUsecase {
        indexer: &SynSourceIndexer,
        instrumenter: &SynInstrumenter,
        runner: &RustcRunner,
        exporter: &JsonTraceExporter,
    };

    let mut out = fs::File::create(&cli.output)?;
    let summary = usecase.run(&project.files, project.root_rel.as_deref(), &config, &mut out)?;
    println!("[RunVis] Trace document written to {}", cli.output);

    println!(
        "[RunVis] Outcome {:?}: {} events, {} frames ({} incomplete), {} nodes indexed ({} demoted)",
        summary.status,
        summary.events,
        summary.frames,
        summary.incomplete,
        summary.nodes,
        summary.demoted
    );
    if !summary.stdout.is_empty() {
        println!("--- traced program stdout ---");
        std::io::stdout().write_all(&summary.stdout)?;
    }
    if !summary.stderr.is_empty() {
        eprintln!("--- traced program stderr ---");
        std::io::stderr().write_all(&summary.stderr)?;
    }

    Ok(())
}
