//! Alert delivery for user-visible failures.
//!
//! The widget raises an alert for validation and conversion failures; how the
//! alert is shown (toast, modal, stderr) belongs to the host.

use std::sync::Arc;
use tracing::{info, warn};

/// Severity of an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertLevel {
    Info,
    Error,
}

/// Receives alerts raised by converter widgets.
pub trait Notifier: Send + Sync {
    fn alert(&self, message: &str, level: AlertLevel);
}

/// Logs alerts through `tracing`. The default notifier.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn alert(&self, message: &str, level: AlertLevel) {
        match level {
            AlertLevel::Info => info!(target: "pdf2docx_studio::alert", "{}", message),
            AlertLevel::Error => warn!(target: "pdf2docx_studio::alert", "{}", message),
        }
    }
}

/// Shared notifier handle.
pub type SharedNotifier = Arc<dyn Notifier>;
