//! The seam between the viewer and whatever decodes PDFs.
//!
//! Both traits are synchronous: implementations are expected to do CPU-heavy
//! work, and the viewer always calls them from `spawn_blocking`.

use crate::error::ViewerError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::DynamicImage;
use std::fmt;
use std::io::Cursor;
use std::sync::Arc;
use tracing::debug;

/// Decodes PDF bytes into a document handle.
pub trait PdfRenderer: Send + Sync {
    /// Parse `bytes`. Called once per viewer session.
    fn load(
        &self,
        bytes: Arc<[u8]>,
        password: Option<&str>,
    ) -> Result<Arc<dyn PdfDocumentHandle>, ViewerError>;
}

/// An opened document. Dropping the last handle releases it.
pub trait PdfDocumentHandle: Send + Sync {
    fn page_count(&self) -> usize;

    /// Rasterise `page` (1-based) with its longest edge at most `max_pixels`.
    fn render_page(&self, page: usize, max_pixels: u32) -> Result<RenderedPage, ViewerError>;
}

/// One rasterised page, PNG-encoded.
#[derive(Clone, PartialEq, Eq)]
pub struct RenderedPage {
    /// 1-based page number.
    pub page: usize,
    pub width: u32,
    pub height: u32,
    pub png: Vec<u8>,
}

impl RenderedPage {
    /// Encode `image` as PNG. Lossless keeps rendered text crisp.
    pub fn from_image(page: usize, image: &DynamicImage) -> Result<Self, ViewerError> {
        let mut png = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
            .map_err(|e| ViewerError::Render {
                page,
                detail: format!("PNG encoding failed: {e}"),
            })?;
        debug!(
            "Encoded page {} → {}x{} px, {} bytes",
            page,
            image.width(),
            image.height(),
            png.len()
        );
        Ok(Self {
            page,
            width: image.width(),
            height: image.height(),
            png,
        })
    }

    /// `data:image/png;base64,…`, for surfaces that take image URLs.
    pub fn to_data_uri(&self) -> String {
        format!("data:image/png;base64,{}", STANDARD.encode(&self.png))
    }
}

impl fmt::Debug for RenderedPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderedPage")
            .field("page", &self.page)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("png_len", &self.png.len())
            .finish()
    }
}
