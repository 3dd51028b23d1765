//! Embedded Probe Runtime
//!
//! The `__rv` module appended to the instrumented crate root. Std-only, so
//! the scratch crate needs no dependencies. Events go to the file descriptor
//! the runner announces via RUNVIS_TRACE_FD; without it every probe is a
//! no-op, which is what makes the semantic-transparency comparison possible.
//!
//! Exit probes ride Drop guards, so a call or method activation records its
//! Exit on every scope exit (normal return, `?` propagation, break) without
//! touching the traced program's control flow. The scratch crate is compiled
//! with panic=abort, so a panic truncates the stream at the fault point
//! instead of unwinding through the guards.

/// Source text of the probe runtime module.
pub const PROBE_RUNTIME: &str = r#"
#[doc(hidden)]
#[allow(dead_code)]
pub mod __rv {
    use std::fs::File;
    use std::io::Write;
    use std::os::unix::io::FromRawFd;
    use std::sync::{Mutex, OnceLock};

    static CHANNEL: OnceLock<Option<Mutex<File>>> = OnceLock::new();

    fn channel() -> Option<&'static Mutex<File>> {
        CHANNEL
            .get_or_init(|| {
                std::env::var("RUNVIS_TRACE_FD")
                    .ok()
                    .and_then(|value| value.parse::<i32>().ok())
                    .map(|fd| Mutex::new(unsafe { File::from_raw_fd(fd) }))
            })
            .as_ref()
    }

    fn emit(tag: char, id: u64) {
        if let Some(chan) = channel() {
            if let Ok(mut out) = chan.lock() {
                let _ = writeln!(out, "{} {}", tag, id);
            }
        }
    }

    pub struct Guard(u64);

    impl Drop for Guard {
        fn drop(&mut self) {
            emit('X', self.0);
        }
    }

    pub fn enter(id: u64) -> Guard {
        emit('E', id);
        Guard(id)
    }

    pub fn call(id: u64) -> Guard {
        emit('E', id);
        Guard(id)
    }

    pub fn stmt(id: u64) {
        emit('E', id);
    }

    pub fn arm(id: u64) {
        emit('E', id);
    }

    pub fn iter(id: u64) {
        emit('I', id);
    }
}
"#;

/// Environment variable carrying the trace channel descriptor number.
pub const TRACE_FD_ENV: &str = "RUNVIS_TRACE_FD";

/// Descriptor number the runner installs the pipe's write end on.
pub const TRACE_FD: i32 = 3;
