//! Progress-callback trait for the upload phase of a conversion.
//!
//! Inject an [`Arc<dyn UploadProgressCallback>`] into
//! [`crate::upload::ConversionClient::submit`] to receive events while the
//! PDF body is streamed to the server. Percentages cover the upload only;
//! server-side processing time is invisible to the transport.
//!
//! # Example
//!
//! ```rust
//! use pdf2docx_studio::UploadProgressCallback;
//! use std::sync::atomic::{AtomicU8, Ordering};
//!
//! struct LastPercent(AtomicU8);
//!
//! impl UploadProgressCallback for LastPercent {
//!     fn on_upload_progress(&self, percent: u8, _bytes_sent: u64, _total_bytes: u64) {
//!         self.0.store(percent, Ordering::SeqCst);
//!     }
//! }
//! ```

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

/// Called by the upload client while the request body is being sent.
///
/// Implementations must be `Send + Sync`: the body stream is polled by the
/// HTTP stack, possibly on another runtime worker. All methods have default
/// no-op implementations so callers only override what they care about.
pub trait UploadProgressCallback: Send + Sync {
    /// Called once before the first byte is sent.
    fn on_upload_start(&self, total_bytes: u64) {
        let _ = total_bytes;
    }

    /// Called after each body chunk is handed to the transport.
    ///
    /// `percent` is non-decreasing within one upload and never exceeds 100.
    fn on_upload_progress(&self, percent: u8, bytes_sent: u64, total_bytes: u64) {
        let _ = (percent, bytes_sent, total_bytes);
    }

    /// Called once a response (of any status) has been received.
    fn on_upload_complete(&self, status: u16) {
        let _ = status;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl UploadProgressCallback for NoopProgressCallback {}

/// Convenience alias for the shared callback type.
pub type ProgressCallback = Arc<dyn UploadProgressCallback>;

/// Turns byte counts into monotone percentages and forwards them.
///
/// Chunks may be re-polled by the transport (e.g. on redirect replays), so the
/// tracker only ever reports a percentage higher than the last one it sent.
pub(crate) struct ProgressTracker {
    callback: ProgressCallback,
    total_bytes: u64,
    sent: AtomicU64,
    last_percent: AtomicU8,
}

impl ProgressTracker {
    pub(crate) fn new(callback: ProgressCallback, total_bytes: u64) -> Self {
        Self {
            callback,
            total_bytes,
            sent: AtomicU64::new(0),
            last_percent: AtomicU8::new(0),
        }
    }

    pub(crate) fn start(&self) {
        self.callback.on_upload_start(self.total_bytes);
    }

    /// Record `n` more bytes handed to the transport.
    pub(crate) fn advance(&self, n: u64) {
        let sent = (self.sent.fetch_add(n, Ordering::SeqCst) + n).min(self.total_bytes);
        let percent = percent_of(sent, self.total_bytes);
        let previous = self.last_percent.fetch_max(percent, Ordering::SeqCst);
        if percent > previous {
            self.callback
                .on_upload_progress(percent, sent, self.total_bytes);
        }
    }

    pub(crate) fn complete(&self, status: u16) {
        self.callback.on_upload_complete(status);
    }
}

/// Rounded percentage of `done` over `total`; an empty body counts as done.
pub(crate) fn percent_of(done: u64, total: u64) -> u8 {
    if total == 0 {
        return 100;
    }
    let pct = (done.min(total) * 100 + total / 2) / total;
    pct.min(100) as u8
}
