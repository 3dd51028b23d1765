// Infrastructure implementations for RunVis.

pub mod concurrency;
pub mod indexer;
pub mod instrumenter;
pub mod project_loader;
pub mod runner;
pub mod runtime;

pub use indexer::SynSourceIndexer;
pub use instrumenter::SynInstrumenter;
pub use project_loader::{LoadedProject, ProjectLoader};
pub use runner::RustcRunner;
