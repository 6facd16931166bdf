//! Configuration for the conversion client, the converter widgets and the
//! full-screen viewer.
//!
//! Every knob lives in [`StudioConfig`], built via [`StudioConfigBuilder`].
//! One struct is shared by the client, both widgets and the viewer, so a
//! single `Arc<StudioConfig>` describes a whole page.

use crate::error::ConvertError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which converter (and which server endpoint) an upload targets.
///
/// The two widgets on the page are identified by their mode, so this type
/// doubles as the widget id in the preview coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversionMode {
    /// Text-based PDFs, converted structurally.
    Digital,
    /// Scanned or image-only PDFs, converted through OCR.
    Image,
}

impl ConversionMode {
    /// Short lowercase name used in logs and the CLI.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversionMode::Digital => "digital",
            ConversionMode::Image => "image",
        }
    }
}

impl fmt::Display for ConversionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration for the conversion workflow.
///
/// # Example
/// ```rust
/// use pdf2docx_studio::StudioConfig;
///
/// let config = StudioConfig::builder()
///     .base_url("https://convert.example.com")
///     .animation_delay_ms(0)
///     .build()
///     .unwrap();
/// assert_eq!(config.upload_progress_cap, 50);
/// ```
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct StudioConfig {
    /// Base URL of the conversion API. Default: `http://localhost:5000`.
    ///
    /// Relative download and preview references returned by the server are
    /// resolved against this URL.
    pub base_url: String,

    /// Path of the digital converter endpoint. Default: `/convert_digital`.
    pub digital_endpoint: String,

    /// Path of the OCR converter endpoint. Default: `/convert_image_ocr`.
    pub ocr_endpoint: String,

    /// Multipart form field carrying the PDF. Default: `pdf_file`.
    pub upload_field: String,

    /// Whole-request timeout in seconds. Default: 300.
    ///
    /// OCR conversion happens before the server replies, so this has to cover
    /// server-side processing as well as the upload. An elapsed timeout is
    /// reported as an aborted request.
    pub request_timeout_secs: u64,

    /// Size of each streamed body chunk in bytes. Default: 64 KiB.
    ///
    /// Progress is reported once per chunk, so smaller chunks give a smoother
    /// bar at the cost of more callbacks.
    pub upload_chunk_size: usize,

    /// Highest progress value the upload phase may report. Default: 50.
    ///
    /// The upper half of the bar is reserved for the converting phase.
    pub upload_progress_cap: u8,

    /// Increment of the synthetic converting-phase animation. Default: 7.
    pub animation_step: u8,

    /// Delay between animation steps in milliseconds. Default: 70.
    pub animation_delay_ms: u64,

    /// Longest edge of a rendered viewer page in pixels. Default: 2000.
    pub max_rendered_pixels: u32,

    /// Password for encrypted PDFs opened in the viewer.
    pub pdf_password: Option<String>,
}

impl Default for StudioConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            digital_endpoint: "/convert_digital".to_string(),
            ocr_endpoint: "/convert_image_ocr".to_string(),
            upload_field: "pdf_file".to_string(),
            request_timeout_secs: 300,
            upload_chunk_size: 64 * 1024,
            upload_progress_cap: 50,
            animation_step: 7,
            animation_delay_ms: 70,
            max_rendered_pixels: 2000,
            pdf_password: None,
        }
    }
}

impl fmt::Debug for StudioConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StudioConfig")
            .field("base_url", &self.base_url)
            .field("digital_endpoint", &self.digital_endpoint)
            .field("ocr_endpoint", &self.ocr_endpoint)
            .field("upload_field", &self.upload_field)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("upload_chunk_size", &self.upload_chunk_size)
            .field("upload_progress_cap", &self.upload_progress_cap)
            .field("animation_step", &self.animation_step)
            .field("animation_delay_ms", &self.animation_delay_ms)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("pdf_password", &self.pdf_password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl StudioConfig {
    /// Create a new builder for `StudioConfig`.
    pub fn builder() -> StudioConfigBuilder {
        StudioConfigBuilder {
            config: Self::default(),
        }
    }

    /// Endpoint path for the given conversion mode.
    pub fn endpoint(&self, mode: ConversionMode) -> &str {
        match mode {
            ConversionMode::Digital => &self.digital_endpoint,
            ConversionMode::Image => &self.ocr_endpoint,
        }
    }

    /// Full endpoint URL for the given conversion mode.
    pub fn endpoint_url(&self, mode: ConversionMode) -> String {
        join_url(&self.base_url, self.endpoint(mode))
    }
}

/// Join a base URL and a path with exactly one slash between them.
pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Builder for [`StudioConfig`].
#[derive(Debug)]
pub struct StudioConfigBuilder {
    config: StudioConfig,
}

impl StudioConfigBuilder {
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into();
        self
    }

    pub fn digital_endpoint(mut self, path: impl Into<String>) -> Self {
        self.config.digital_endpoint = path.into();
        self
    }

    pub fn ocr_endpoint(mut self, path: impl Into<String>) -> Self {
        self.config.ocr_endpoint = path.into();
        self
    }

    pub fn upload_field(mut self, name: impl Into<String>) -> Self {
        self.config.upload_field = name.into();
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs;
        self
    }

    pub fn upload_chunk_size(mut self, bytes: usize) -> Self {
        self.config.upload_chunk_size = bytes.max(1024);
        self
    }

    pub fn upload_progress_cap(mut self, cap: u8) -> Self {
        self.config.upload_progress_cap = cap.min(100);
        self
    }

    pub fn animation_step(mut self, step: u8) -> Self {
        self.config.animation_step = step;
        self
    }

    pub fn animation_delay_ms(mut self, ms: u64) -> Self {
        self.config.animation_delay_ms = ms;
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn pdf_password(mut self, pwd: impl Into<String>) -> Self {
        self.config.pdf_password = Some(pwd.into());
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<StudioConfig, ConvertError> {
        let c = &self.config;
        if !(c.base_url.starts_with("http://") || c.base_url.starts_with("https://")) {
            return Err(ConvertError::InvalidConfig(format!(
                "base URL must be http:// or https://, got '{}'",
                c.base_url
            )));
        }
        if c.upload_field.trim().is_empty() {
            return Err(ConvertError::InvalidConfig(
                "upload field name must not be empty".into(),
            ));
        }
        if c.animation_step == 0 {
            return Err(ConvertError::InvalidConfig(
                "animation step must be ≥ 1".into(),
            ));
        }
        if c.request_timeout_secs == 0 {
            return Err(ConvertError::InvalidConfig(
                "request timeout must be ≥ 1 second".into(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_conversion_api() {
        let c = StudioConfig::default();
        assert_eq!(c.endpoint_url(ConversionMode::Digital), "http://localhost:5000/convert_digital");
        assert_eq!(c.endpoint_url(ConversionMode::Image), "http://localhost:5000/convert_image_ocr");
        assert_eq!(c.upload_field, "pdf_file");
    }

    #[test]
    fn join_url_handles_slashes() {
        assert_eq!(join_url("http://a/", "/b"), "http://a/b");
        assert_eq!(join_url("http://a", "b"), "http://a/b");
    }

    #[test]
    fn builder_rejects_bad_base_url() {
        let err = StudioConfig::builder().base_url("ftp://x").build().unwrap_err();
        assert!(matches!(err, ConvertError::InvalidConfig(_)));
    }

    #[test]
    fn builder_rejects_zero_step() {
        assert!(StudioConfig::builder().animation_step(0).build().is_err());
    }

    #[test]
    fn builder_clamps_cap() {
        let c = StudioConfig::builder().upload_progress_cap(250).build().unwrap();
        assert_eq!(c.upload_progress_cap, 100);
    }

    #[test]
    fn debug_redacts_password() {
        let c = StudioConfig::builder().pdf_password("hunter2").build().unwrap();
        let dbg = format!("{c:?}");
        assert!(!dbg.contains("hunter2"));
    }

    #[test]
    fn mode_serialises_lowercase() {
        let json = serde_json::to_string(&ConversionMode::Image).unwrap();
        assert_eq!(json, "\"image\"");
    }
}
