// Per-request configuration for one trace pipeline run.

use std::path::PathBuf;
use std::time::Duration;

/// Default wall-clock budget for the traced program.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Everything the pipeline needs to know about one run: the entry point
/// specification, program arguments, and resource limits. Assembled by the
/// caller (CLI flags over optional runvis.toml defaults).
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Entry function name; "main" runs the program as-is.
    pub entry: String,
    /// Arguments passed to the traced program.
    pub args: Vec<String>,
    /// Working directory for the traced program.
    pub cwd: Option<PathBuf>,
    /// Wall-clock budget; exceeding it kills the child and yields TimedOut.
    pub timeout: Duration,
    /// Retain the scratch build directory for inspection.
    pub keep_scratch: bool,
    /// Optional on-disk index cache location.
    pub cache_dir: Option<PathBuf>,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            entry: "main".to_string(),
            args: Vec::new(),
            cwd: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            keep_scratch: false,
            cache_dir: None,
        }
    }
}
