//! pdfium-backed [`PdfRenderer`].
//!
//! A `PdfDocument` borrows both the bindings and the byte buffer, so it
//! cannot live inside a `'static` handle. The handle instead keeps the bytes
//! and re-opens the document for each render; parsing is cheap next to
//! rasterisation.
//!
//! ## Why cap pixels, not DPI?
//!
//! Page sizes vary wildly: an A0 poster at 150 DPI would be
//! 12,000 × 17,000 px. `max_pixels` caps the longest edge regardless of
//! physical size, keeping memory bounded.

use super::backend::{PdfDocumentHandle, PdfRenderer, RenderedPage};
use crate::error::ViewerError;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Environment variable naming the pdfium library (file or directory).
pub const PDFIUM_LIB_PATH_ENV: &str = "PDFIUM_LIB_PATH";

/// Renders PDFs through the pdfium shared library.
#[derive(Debug, Clone)]
pub struct PdfiumRenderer {
    library_path: Option<PathBuf>,
}

impl PdfiumRenderer {
    /// Bind pdfium from `PDFIUM_LIB_PATH`, or from the system library path.
    ///
    /// Fails with [`ViewerError::BackendUnavailable`] if the library cannot be
    /// loaded, so a missing pdfium shows up at startup and not on first open.
    pub fn bind() -> Result<Self, ViewerError> {
        Self::bind_at(std::env::var_os(PDFIUM_LIB_PATH_ENV).map(PathBuf::from))
    }

    /// Bind pdfium from an explicit library file or directory.
    pub fn bind_at(library_path: Option<PathBuf>) -> Result<Self, ViewerError> {
        bind_pdfium(library_path.as_deref())?;
        match library_path {
            Some(ref p) => info!("pdfium bound from {}", p.display()),
            None => info!("pdfium bound from system library"),
        }
        Ok(Self { library_path })
    }
}

impl PdfRenderer for PdfiumRenderer {
    fn load(
        &self,
        bytes: Arc<[u8]>,
        password: Option<&str>,
    ) -> Result<Arc<dyn PdfDocumentHandle>, ViewerError> {
        let pdfium = bind_pdfium(self.library_path.as_deref())?;
        let page_count = {
            let document = open_document(&pdfium, &bytes, password)?;
            document.pages().len() as usize
        };
        info!("PDF loaded: {} pages ({} bytes)", page_count, bytes.len());

        Ok(Arc::new(PdfiumDocument {
            library_path: self.library_path.clone(),
            bytes,
            password: password.map(str::to_string),
            page_count,
        }))
    }
}

struct PdfiumDocument {
    library_path: Option<PathBuf>,
    bytes: Arc<[u8]>,
    password: Option<String>,
    page_count: usize,
}

impl PdfDocumentHandle for PdfiumDocument {
    fn page_count(&self) -> usize {
        self.page_count
    }

    fn render_page(&self, page: usize, max_pixels: u32) -> Result<RenderedPage, ViewerError> {
        if page == 0 || page > self.page_count {
            return Err(ViewerError::Render {
                page,
                detail: format!("out of range (total={})", self.page_count),
            });
        }
        let render_err = |e: PdfiumError| ViewerError::Render {
            page,
            detail: format!("{e:?}"),
        };

        let pdfium = bind_pdfium(self.library_path.as_deref())?;
        let document = open_document(&pdfium, &self.bytes, self.password.as_deref())?;
        let index = PdfPageIndex::try_from(page - 1).map_err(|_| ViewerError::Render {
            page,
            detail: "page index exceeds pdfium limits".to_string(),
        })?;
        let pdf_page = document.pages().get(index).map_err(render_err)?;

        let config = PdfRenderConfig::new()
            .set_target_width(max_pixels as i32)
            .set_maximum_height(max_pixels as i32);
        let image = pdf_page
            .render_with_config(&config)
            .map_err(render_err)?
            .as_image();
        debug!("Rendered page {} → {}x{} px", page, image.width(), image.height());

        RenderedPage::from_image(page, &image)
    }
}

fn bind_pdfium(library_path: Option<&Path>) -> Result<Pdfium, ViewerError> {
    let bindings = match library_path {
        Some(p) if p.is_file() => Pdfium::bind_to_library(p),
        Some(dir) => Pdfium::bind_to_library(&Pdfium::pdfium_platform_library_name_at_path(dir)),
        None => Pdfium::bind_to_system_library(),
    }
    .map_err(|e| ViewerError::BackendUnavailable(format!("{e:?}")))?;
    Ok(Pdfium::new(bindings))
}

fn open_document<'a>(
    pdfium: &'a Pdfium,
    bytes: &'a [u8],
    password: Option<&'a str>,
) -> Result<PdfDocument<'a>, ViewerError> {
    pdfium
        .load_pdf_from_byte_slice(bytes, password)
        .map_err(|e| {
            let detail = format!("{e:?}");
            let detail = if detail.contains("Password") || detail.contains("password") {
                if password.is_some() {
                    "incorrect password".to_string()
                } else {
                    "document is password-protected".to_string()
                }
            } else {
                detail
            };
            ViewerError::Decode { detail }
        })
}
