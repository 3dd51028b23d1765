/// Concurrency management for RunVis.
/// Configures the rayon pool used for the parallel parse pass.

use anyhow::Result;

/// Initialize the global rayon thread pool with controlled worker count.
/// Reserves ~50% of CPU capacity so the traced program and its drains are
/// never starved by parsing work.
pub fn init_thread_pool() -> Result<()> {
    let cores = num_cpus::get();
    // Reserve 50% capacity, minimum 1 worker
    let workers = std::cmp::max(1, cores / 2);

    rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .build_global()?;

    println!(
        "[RunVis] Initialized thread pool: {} workers (system has {} cores)",
        workers, cores
    );

    Ok(())
}
