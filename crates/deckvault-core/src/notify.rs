//! User-facing notification boundary.
//!
//! The core never talks to a UI directly; hosts implement [`Notifier`] to
//! surface startup problems however their platform shows alerts.

/// How prominently a message should be shown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

pub trait Notifier: Send + Sync {
    fn show(&self, message: &str, severity: Severity);
}

/// Default notifier: writes the message to the log at the matching level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn show(&self, message: &str, severity: Severity) {
        match severity {
            Severity::Info => tracing::info!(target: "deckvault::notify", "{message}"),
            Severity::Warning => tracing::warn!(target: "deckvault::notify", "{message}"),
            Severity::Error => tracing::error!(target: "deckvault::notify", "{message}"),
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use super::{Notifier, Severity};

    /// Collects every message shown.
    #[derive(Default)]
    pub struct RecordingNotifier {
        messages: Mutex<Vec<(String, Severity)>>,
    }

    impl RecordingNotifier {
        pub fn messages(&self) -> Vec<(String, Severity)> {
            self.messages.lock().unwrap().clone()
        }
    }

    impl Notifier for RecordingNotifier {
        fn show(&self, message: &str, severity: Severity) {
            self.messages
                .lock()
                .unwrap()
                .push((message.to_string(), severity));
        }
    }
}
