//! Error types for the pdf2docx-studio library.
//!
//! Two distinct error types reflect two distinct failure scopes:
//!
//! * [`ConvertError`] — a conversion attempt (or one of its preconditions)
//!   failed. Returned from [`crate::upload::ConversionClient::submit`] and
//!   [`crate::widget::ConverterWidget::convert`]; the widget has already
//!   folded it into its status and message by the time the caller sees it.
//!
//! * [`ViewerError`] — something went wrong inside a full-screen viewer
//!   session (decode, render, empty document). It is stored in the session's
//!   phase rather than tearing the session down, so the user can still
//!   navigate away or close the viewer.

use std::path::PathBuf;
use thiserror::Error;

/// Failures of the upload/conversion workflow.
#[derive(Debug, Error)]
pub enum ConvertError {
    // ── Precondition errors (no network I/O) ─────────────────────────────
    /// The selected file is not a PDF.
    #[error("Invalid file type for '{file_name}': expected application/pdf, got '{mime_type}'")]
    InvalidFileType { file_name: String, mime_type: String },

    /// Convert was invoked with no file armed.
    #[error("No file selected")]
    NoFileSelected,

    /// Convert was invoked while an upload or conversion is still running.
    #[error("A conversion is already in progress")]
    ConversionInProgress,

    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    // ── Transport / server errors ────────────────────────────────────────
    /// 2xx response whose body is not the expected success payload.
    #[error("Server returned HTTP {status} but the body is not a valid conversion result: {detail}")]
    MalformedResponse { status: u16, detail: String },

    /// Non-2xx response from the conversion API.
    #[error("Conversion server returned HTTP {status}: {message}")]
    ServerError { status: u16, message: String },

    /// No response was received (connection refused, DNS, TLS, reset…).
    #[error("Network error: {detail}")]
    NetworkError { detail: String },

    /// The request was cancelled before a response arrived.
    #[error("Request aborted")]
    Aborted,

    /// The attempt finished after the widget moved on; its result was dropped.
    #[error("Conversion result discarded: a newer selection superseded this attempt")]
    Superseded,

    // ── Output errors ────────────────────────────────────────────────────
    /// Fetching the converted document failed.
    #[error("Failed to download '{url}': {reason}")]
    DownloadFailed { url: String, reason: String },

    /// Could not create or write the downloaded document.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ConvertError {
    /// Text suitable for the widget status line and the alert toast.
    ///
    /// Server errors surface the server's own message verbatim; everything
    /// else uses the `Display` text.
    pub fn user_message(&self) -> String {
        match self {
            ConvertError::ServerError { message, .. } => message.clone(),
            ConvertError::MalformedResponse { detail, .. } => {
                format!("Response was successful but not a valid conversion result: {detail}")
            }
            ConvertError::Aborted => "Request aborted.".to_string(),
            other => other.to_string(),
        }
    }

    /// `true` for failures detected before any request was sent.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            ConvertError::InvalidFileType { .. }
                | ConvertError::NoFileSelected
                | ConvertError::ConversionInProgress
                | ConvertError::FileNotFound { .. }
                | ConvertError::PermissionDenied { .. }
        )
    }
}

/// A failure inside one full-screen viewer session.
///
/// Render failures are per page: other pages of the same document may still
/// display.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ViewerError {
    /// The PDF could not be parsed.
    #[error("Could not open document: {detail}")]
    Decode { detail: String },

    /// A page failed to rasterise.
    #[error("Page {page}: rendering failed: {detail}")]
    Render { page: usize, detail: String },

    /// The source has zero pages.
    #[error("No document to display")]
    NoDocument,

    /// The rendering library could not be loaded.
    #[error(
        "PDF rendering backend unavailable: {0}\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium or install pdfium system-wide."
    )]
    BackendUnavailable(String),

    /// Unexpected internal error (e.g. a render task panicked).
    #[error("Internal viewer error: {0}")]
    Internal(String),
}
