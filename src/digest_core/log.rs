//! Diagnostics sink handed to the record and digest builders
//!
//! The builders never reach for a process-wide logger. They are given a
//! `DigestLog` at construction; production code passes `LogFacade`, which
//! forwards to the `log` crate under the `digests` target.

use std::fmt;
use std::sync::Arc;

pub const LOG_TARGET: &str = "digests";

pub trait DigestLog: Send + Sync {
    fn warning(&self, message: fmt::Arguments<'_>);

    fn debug(&self, message: fmt::Arguments<'_>);
}

/// Forwards diagnostics to the global `log` facade
#[derive(Debug, Clone, Copy, Default)]
pub struct LogFacade;

impl DigestLog for LogFacade {
    fn warning(&self, message: fmt::Arguments<'_>) {
        log::warn!(target: LOG_TARGET, "{}", message);
    }

    fn debug(&self, message: fmt::Arguments<'_>) {
        log::debug!(target: LOG_TARGET, "{}", message);
    }
}

pub fn default_log() -> Arc<dyn DigestLog> {
    Arc::new(LogFacade)
}

#[cfg(test)]
pub(crate) mod capture {
    use super::DigestLog;
    use std::fmt;
    use std::sync::Mutex;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum Level {
        Warning,
        Debug,
    }

    /// Collects every diagnostic so tests can assert on them
    #[derive(Default)]
    pub struct CaptureLog {
        lines: Mutex<Vec<(Level, String)>>,
    }

    impl CaptureLog {
        pub fn lines(&self) -> Vec<(Level, String)> {
            self.lines.lock().unwrap().clone()
        }

        pub fn count(&self, level: Level) -> usize {
            self.lines().iter().filter(|(l, _)| *l == level).count()
        }
    }

    impl DigestLog for CaptureLog {
        fn warning(&self, message: fmt::Arguments<'_>) {
            self.lines
                .lock()
                .unwrap()
                .push((Level::Warning, message.to_string()));
        }

        fn debug(&self, message: fmt::Arguments<'_>) {
            self.lines
                .lock()
                .unwrap()
                .push((Level::Debug, message.to_string()));
        }
    }
}
