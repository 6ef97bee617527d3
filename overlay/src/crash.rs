//! Crash reporting sink
//!
//! Fatal renderer errors are handed to a [`CrashReporter`] before they are
//! returned, so the host's crash service sees them even if it aborts right
//! after.

use std::error::Error;

use tracing::error;

use crate::error::RendererError;

/// Receives fatal errors before they reach the host
pub trait CrashReporter: Send + Sync {
    fn capture(&self, error: &RendererError);
}

impl<F> CrashReporter for F
where
    F: Fn(&RendererError) + Send + Sync,
{
    fn capture(&self, error: &RendererError) {
        self(error)
    }
}

/// Reports fatal errors to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogCrashReporter;

impl CrashReporter for LogCrashReporter {
    fn capture(&self, err: &RendererError) {
        error!(
            error = %err,
            source = ?err.source(),
            "fatal region selector error"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_closure_reporter() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let reporter = move |err: &RendererError| sink.lock().unwrap().push(err.to_string());

        reporter.capture(&RendererError::NoDisplays);
        LogCrashReporter.capture(&RendererError::NoDisplays);

        assert_eq!(
            seen.lock().unwrap().as_slice(),
            &["no displays to select from".to_string()]
        );
    }
}
