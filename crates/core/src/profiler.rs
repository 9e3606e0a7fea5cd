//! Stage timing for the fit and realization pipeline
//!
//! A [`ProfilerScope`] is held for the duration of a pipeline stage and
//! reports the wall time through `tracing` when it goes out of scope.

use std::time::{Duration, Instant};
use tracing::debug;

/// Guard that logs the elapsed time of a named stage on drop
pub struct ProfilerScope {
    stage: &'static str,
    started: Instant,
}

impl ProfilerScope {
    /// Start timing `stage`
    pub fn new(stage: &'static str) -> Self {
        Self {
            stage,
            started: Instant::now(),
        }
    }

    /// Time since the scope was opened
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Stage label used in the log record
    pub fn stage(&self) -> &'static str {
        self.stage
    }
}

impl Drop for ProfilerScope {
    fn drop(&mut self) {
        debug!(
            stage = self.stage,
            elapsed_ms = self.elapsed().as_secs_f64() * 1e3,
            "stage finished"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_scope_reports_elapsed_time() {
        let scope = ProfilerScope::new("draw_noise");
        thread::sleep(Duration::from_millis(10));
        assert!(scope.elapsed() >= Duration::from_millis(10));
        assert_eq!(scope.stage(), "draw_noise");
    }
}
