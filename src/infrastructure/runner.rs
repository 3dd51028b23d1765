//! Instrumented Program Runner
//!
//! Composes a scratch copy of the instrumented crate, compiles it with
//! rustc, and executes it with the configured arguments and working
//! directory. The trace channel is a pipe installed on a dedicated
//! descriptor in the child, kept apart from the program's own stdout/stderr
//! so user output and trace events never interleave. Each stream gets its
//! own drain thread: a full pipe must never stall the traced program.
//!
//! The scratch crate is compiled with panic=abort. A panic therefore kills
//! the child at the fault point with SIGABRT instead of unwinding through
//! the probe guards, which is what leaves the open frames for the builder
//! to flag as incomplete.
//!
//! Compilation failure is fatal (BuildError). A non-zero exit, fault or
//! timeout is not: the drained event prefix is retained and classified in
//! the ExecutionOutcome so a partial trace can still be built.

use std::io::{BufRead, BufReader, Read};
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};
use std::os::unix::process::{CommandExt, ExitStatusExt};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crate::domain::config::RunConfig;
use crate::domain::errors::TraceError;
use crate::domain::event::{ExecutionOutcome, RunCapture, RunStatus, TraceEvent};
use crate::domain::source::InstrumentedProgram;
use crate::infrastructure::runtime::{TRACE_FD, TRACE_FD_ENV};
use crate::ports::ProgramRunner;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

pub struct RustcRunner;

impl ProgramRunner for RustcRunner {
    fn run(
        &self,
        program: &InstrumentedProgram,
        config: &RunConfig,
    ) -> Result<RunCapture, TraceError> {
        let scratch = tempfile::Builder::new().prefix("runvis-").tempdir()?;
        let capture = run_in_scratch(program, config, scratch.path());

        // Retained even after a failed build; that is when inspecting the
        // instrumented output matters most.
        if config.keep_scratch {
            let kept = scratch.keep();
            println!("[Runner] Scratch build retained at {}", kept.display());
        }
        capture
    }
}

fn run_in_scratch(
    program: &InstrumentedProgram,
    config: &RunConfig,
    scratch: &Path,
) -> Result<RunCapture, TraceError> {
    let root = write_scratch(program, scratch)?;
    let binary = build(&root, scratch)?;
    execute(&binary, config)
}

/// Write the instrumented sources under `<scratch>/src/`, returning the
/// crate root path.
fn write_scratch(program: &InstrumentedProgram, scratch: &Path) -> Result<PathBuf, TraceError> {
    let src_dir = scratch.join("src");
    for file in &program.files {
        let path = src_dir.join(&file.rel_path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, &file.code)?;
    }
    Ok(src_dir.join(&program.files[program.root].rel_path))
}

/// Compile the scratch crate. The probe runtime is std-only, so a plain
/// rustc invocation suffices; no dependency resolution is involved.
fn build(root: &Path, scratch: &Path) -> Result<PathBuf, TraceError> {
    let binary = scratch.join("traced");
    let output = Command::new("rustc")
        .arg("--edition")
        .arg("2021")
        .arg("--crate-name")
        .arg("runvis_traced")
        .arg("-C")
        .arg("panic=abort")
        .arg("-o")
        .arg(&binary)
        .arg(root)
        .output()?;

    if !output.status.success() {
        return Err(TraceError::Build {
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }
    Ok(binary)
}

fn execute(binary: &Path, config: &RunConfig) -> Result<RunCapture, TraceError> {
    // Private trace channel. O_CLOEXEC keeps the raw ends out of the child;
    // pre_exec's dup2 re-exposes exactly one writable descriptor.
    let mut fds = [0i32; 2];
    if unsafe { libc::pipe2(fds.as_mut_ptr(), libc::O_CLOEXEC) } != 0 {
        return Err(TraceError::Io(std::io::Error::last_os_error()));
    }
    let read_end = unsafe { OwnedFd::from_raw_fd(fds[0]) };
    let write_end = unsafe { OwnedFd::from_raw_fd(fds[1]) };
    let write_raw = write_end.as_raw_fd();

    let mut command = Command::new(binary);
    command
        .args(&config.args)
        .env(TRACE_FD_ENV, TRACE_FD.to_string())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if let Some(cwd) = &config.cwd {
        command.current_dir(cwd);
    }
    unsafe {
        command.pre_exec(move || {
            if libc::dup2(write_raw, TRACE_FD) < 0 {
                return Err(std::io::Error::last_os_error());
            }
            Ok(())
        });
    }

    let mut child = command.spawn()?;
    // The child now owns the only write end; dropping ours makes EOF track
    // the child's exit.
    drop(write_end);

    let trace_drain = thread::spawn(move || {
        let mut events = Vec::new();
        let reader = BufReader::new(std::fs::File::from(read_end));
        for line in reader.lines() {
            let Ok(line) = line else { break };
            if let Some(event) = TraceEvent::parse_line(&line) {
                events.push(event);
            } else if !line.trim().is_empty() {
                // A kill can truncate the final write; drop the fragment.
                eprintln!("[Runner] Discarding malformed trace line: {:?}", line);
            }
        }
        events
    });
    let stdout_drain = drain_stream(child.stdout.take());
    let stderr_drain = drain_stream(child.stderr.take());

    // Wall-clock budget: poll, then kill. The drained prefix is retained.
    let deadline = Instant::now() + config.timeout;
    let mut timed_out = false;
    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        if Instant::now() >= deadline {
            timed_out = true;
            let _ = child.kill();
            break child.wait()?;
        }
        thread::sleep(POLL_INTERVAL);
    };

    let events = trace_drain.join().unwrap_or_default();
    let stdout = stdout_drain.join().unwrap_or_default();
    let stderr = stderr_drain.join().unwrap_or_default();

    Ok(RunCapture {
        events,
        outcome: classify(status, timed_out),
        stdout,
        stderr,
    })
}

fn drain_stream<R: Read + Send + 'static>(stream: Option<R>) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buffer = Vec::new();
        if let Some(mut stream) = stream {
            let _ = stream.read_to_end(&mut buffer);
        }
        buffer
    })
}

fn classify(status: ExitStatus, timed_out: bool) -> ExecutionOutcome {
    if timed_out {
        return ExecutionOutcome::with_diagnostic(
            RunStatus::TimedOut,
            "wall-clock budget exceeded",
        );
    }
    match status.code() {
        Some(0) => ExecutionOutcome::completed(),
        Some(code) => ExecutionOutcome::with_diagnostic(
            RunStatus::NonZeroExit,
            format!("exit code {}", code),
        ),
        None => {
            let signal = status.signal().unwrap_or(0);
            ExecutionOutcome::with_diagnostic(
                RunStatus::UncaughtFault,
                format!("terminated by signal {}", signal),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::source::InstrumentedUnit;

    #[test]
    fn test_classify_exit_codes() {
        // Raw wait statuses: exited(0), exited(3), killed by SIGABRT.
        let ok = ExitStatus::from_raw(0);
        assert_eq!(classify(ok, false).status, RunStatus::Completed);

        let nonzero = ExitStatus::from_raw(3 << 8);
        let outcome = classify(nonzero, false);
        assert_eq!(outcome.status, RunStatus::NonZeroExit);
        assert!(outcome.diagnostic.unwrap().contains("3"));

        let aborted = ExitStatus::from_raw(libc::SIGABRT);
        let outcome = classify(aborted, false);
        assert_eq!(outcome.status, RunStatus::UncaughtFault);
        assert!(outcome.diagnostic.unwrap().contains("signal"));
    }

    #[test]
    fn test_classify_timeout_wins() {
        let killed = ExitStatus::from_raw(libc::SIGKILL);
        assert_eq!(classify(killed, true).status, RunStatus::TimedOut);
    }

    #[test]
    fn test_write_scratch_preserves_layout() {
        let dir = tempfile::tempdir().unwrap();
        let program = InstrumentedProgram {
            files: vec![
                InstrumentedUnit {
                    rel_path: "main.rs".to_string(),
                    code: "fn main() {}".to_string(),
                },
                InstrumentedUnit {
                    rel_path: "util/mod.rs".to_string(),
                    code: "pub fn noop() {}".to_string(),
                },
            ],
            root: 0,
            issues: Vec::new(),
        };

        let root = write_scratch(&program, dir.path()).unwrap();
        assert!(root.ends_with("src/main.rs"));
        assert!(dir.path().join("src/util/mod.rs").exists());
    }
}
