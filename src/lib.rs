//! # pdf2docx-studio
//!
//! Client side of a PDF → DOCX conversion service: upload a PDF to the
//! conversion API, track the attempt through a per-widget status machine,
//! publish the result to a shared preview slot, and page through either the
//! original PDF or the converted document in a full-screen viewer.
//!
//! ## Workflow
//!
//! ```text
//! file picked
//!  │
//!  ├─ 1. Widget    validate (application/pdf only), arm "convert"
//!  ├─ 2. Upload    multipart POST, progress 0 → 50 while the body streams
//!  ├─ 3. Convert   server answers; synthetic progress 51 → 100
//!  ├─ 4. Publish   result goes to the preview slot if the attempt still owns it
//!  └─ 5. View      original PDF via pdfium, or the server's preview pages
//! ```
//!
//! Two widgets exist, one per endpoint: digital (`/convert_digital`) for
//! PDFs with a text layer and image (`/convert_image_ocr`) for scans. They
//! share one preview slot; whichever started or selected last owns it.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf2docx_studio::{PdfUpload, PdfiumRenderer, Studio, StudioConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = StudioConfig::builder()
//!         .base_url("http://localhost:5000")
//!         .build()?;
//!     let studio = Studio::new(config, Arc::new(PdfiumRenderer::bind()?))?;
//!
//!     studio.digital().select_file(Some(PdfUpload::from_path("report.pdf")?))?;
//!     let result = studio.digital().convert().await?;
//!     println!("{} preview pages", result.preview_pages.len());
//!
//!     studio.open_converted_preview(1).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf2docx` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! pdf2docx-studio = { version = "0.3", default-features = false }
//! ```
//!
//! ## pdfium
//!
//! The viewer decodes PDFs with pdfium, loaded at runtime. Point
//! `PDFIUM_LIB_PATH` at the library (or its directory) if it is not on the
//! system library path.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod cancel;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod notify;
pub mod progress;
pub mod status;
pub mod studio;
pub mod upload;
pub mod viewer;
pub mod widget;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use cancel::CancellationToken;
pub use config::{ConversionMode, StudioConfig, StudioConfigBuilder};
pub use coordinator::{PreviewClaim, PreviewCoordinator, PreviewSnapshot};
pub use error::{ConvertError, ViewerError};
pub use notify::{AlertLevel, Notifier, SharedNotifier, TracingNotifier};
pub use progress::{NoopProgressCallback, ProgressCallback, UploadProgressCallback};
pub use status::{ConversionStatus, MessageKey, StatusMessage};
pub use studio::Studio;
pub use upload::{ConversionClient, ConversionResult, PdfUpload};
pub use viewer::{
    DocumentKind, FullScreenViewer, PageContent, PdfDocumentHandle, PdfRenderer, PdfiumRenderer,
    RenderedPage, ViewerPhase, ViewerSource,
};
pub use widget::{ConverterWidget, NoopWidgetListener, WidgetListener, WidgetSnapshot};
