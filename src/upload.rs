//! Upload/progress client: one multipart POST per conversion attempt.
//!
//! ## Why stream the body?
//!
//! reqwest sends a buffered multipart body in one go, leaving no hook for
//! upload progress. Wrapping the PDF in a chunked body stream lets the
//! [`ProgressTracker`] see each chunk as the transport pulls it, which is the
//! closest a client gets to the browser's `upload.onprogress` byte counts.
//!
//! ## Response contract
//!
//! ```text
//! 2xx  {"downloadUrl": "/files/out.docx", "previewImageUrls": ["/img/p1.png", …]}
//! 4xx  {"error": "…"} | {"message": "…"} | plain text | empty
//! 5xx  same as 4xx
//! ```
//!
//! Anything else on a 2xx is a [`ConvertError::MalformedResponse`], never a
//! success.

use crate::cancel::CancellationToken;
use crate::config::{join_url, ConversionMode, StudioConfig};
use crate::error::ConvertError;
use crate::progress::{ProgressCallback, ProgressTracker};
use futures::stream::{self, StreamExt};
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// MIME type every upload must carry.
pub const PDF_MIME: &str = "application/pdf";

/// File name used when a download reference has no usable last segment.
pub const FALLBACK_DOWNLOAD_NAME: &str = "converted_document.docx";

/// A file picked by the user, ready to be uploaded.
#[derive(Clone, PartialEq, Eq)]
pub struct PdfUpload {
    file_name: String,
    mime_type: String,
    bytes: Arc<[u8]>,
}

impl PdfUpload {
    /// Wrap an in-memory file as selected in a dropzone.
    pub fn new(
        file_name: impl Into<String>,
        mime_type: impl Into<String>,
        bytes: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            bytes: Arc::from(bytes.into()),
        }
    }

    /// Read a local file.
    ///
    /// The MIME type is `application/pdf` only when the name ends in `.pdf`
    /// and the content starts with the `%PDF` magic; anything else gets
    /// `application/octet-stream` and will fail [`validate`](Self::validate).
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConvertError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConvertError::FileNotFound {
                path: path.to_path_buf(),
            });
        }

        let mut bytes = Vec::new();
        match std::fs::File::open(path) {
            Ok(mut f) => f.read_to_end(&mut bytes).map_err(|e| {
                ConvertError::Internal(format!("Failed to read {}: {e}", path.display()))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                return Err(ConvertError::PermissionDenied {
                    path: path.to_path_buf(),
                });
            }
            Err(_) => {
                return Err(ConvertError::FileNotFound {
                    path: path.to_path_buf(),
                });
            }
        };

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document.pdf".to_string());
        let has_pdf_ext = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
        let mime_type = if has_pdf_ext && bytes.starts_with(b"%PDF") {
            PDF_MIME
        } else {
            "application/octet-stream"
        };

        debug!("Loaded {} ({} bytes, {})", path.display(), bytes.len(), mime_type);
        Ok(Self::new(file_name, mime_type, bytes))
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub(crate) fn shared_bytes(&self) -> Arc<[u8]> {
        Arc::clone(&self.bytes)
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Check the upload precondition: the MIME type must be `application/pdf`.
    pub fn validate(&self) -> Result<(), ConvertError> {
        if self.mime_type.eq_ignore_ascii_case(PDF_MIME) {
            Ok(())
        } else {
            Err(ConvertError::InvalidFileType {
                file_name: self.file_name.clone(),
                mime_type: self.mime_type.clone(),
            })
        }
    }
}

impl fmt::Debug for PdfUpload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PdfUpload")
            .field("file_name", &self.file_name)
            .field("mime_type", &self.mime_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// What the server hands back for a successful conversion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionResult {
    /// Path or URL of the converted document.
    pub download_reference: String,
    /// Rendered page images of the converted document, in page order.
    pub preview_pages: Vec<String>,
}

impl ConversionResult {
    /// Absolute URL of the converted document.
    pub fn download_url(&self, base_url: &str) -> String {
        resolve_reference(base_url, &self.download_reference)
    }

    /// Absolute URLs of the preview pages.
    pub fn preview_urls(&self, base_url: &str) -> Vec<String> {
        self.preview_pages
            .iter()
            .map(|p| resolve_reference(base_url, p))
            .collect()
    }

    /// File name to save the converted document under.
    pub fn download_file_name(&self, base_url: &str) -> String {
        reqwest::Url::parse(&self.download_url(base_url))
            .ok()
            .and_then(|url| {
                url.path_segments()
                    .and_then(|mut segments| segments.next_back().map(str::to_string))
            })
            .filter(|last| !last.is_empty() && last.contains('.'))
            .unwrap_or_else(|| FALLBACK_DOWNLOAD_NAME.to_string())
    }
}

/// Absolute references pass through; relative ones are joined to `base_url`.
pub fn resolve_reference(base_url: &str, reference: &str) -> String {
    if reference.starts_with("http://") || reference.starts_with("https://") {
        reference.to_string()
    } else {
        join_url(base_url, reference)
    }
}

/// Canonical success payload.
///
/// The legacy `docx_download_url` / `preview_image_urls` names are not
/// accepted.
#[derive(Debug, Deserialize)]
struct SuccessPayload {
    #[serde(rename = "downloadUrl")]
    download_url: String,
    #[serde(rename = "previewImageUrls", default)]
    preview_image_urls: Option<Vec<String>>,
}

/// HTTP client for the two conversion endpoints.
#[derive(Clone)]
pub struct ConversionClient {
    http: reqwest::Client,
    config: Arc<StudioConfig>,
}

impl ConversionClient {
    /// Build a client for the endpoints named in `config`.
    pub fn new(config: Arc<StudioConfig>) -> Result<Self, ConvertError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| ConvertError::Internal(format!("HTTP client: {e}")))?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &StudioConfig {
        &self.config
    }

    /// Upload `upload` to the endpoint for `mode` and wait for the result.
    ///
    /// Issues exactly one request. Never retries.
    pub async fn submit(
        &self,
        mode: ConversionMode,
        upload: &PdfUpload,
        progress: ProgressCallback,
    ) -> Result<ConversionResult, ConvertError> {
        self.submit_abortable(mode, upload, progress, &CancellationToken::new())
            .await
    }

    /// Like [`submit`](Self::submit), but gives up with
    /// [`ConvertError::Aborted`] as soon as `abort` is cancelled.
    pub async fn submit_abortable(
        &self,
        mode: ConversionMode,
        upload: &PdfUpload,
        progress: ProgressCallback,
        abort: &CancellationToken,
    ) -> Result<ConversionResult, ConvertError> {
        upload.validate()?;
        if abort.is_cancelled() {
            return Err(ConvertError::Aborted);
        }

        let url = self.config.endpoint_url(mode);
        let tracker = Arc::new(ProgressTracker::new(progress, upload.len() as u64));
        let form = self.build_form(upload, Arc::clone(&tracker))?;

        info!(
            "Uploading '{}' ({} bytes) to {} [{}]",
            upload.file_name(),
            upload.len(),
            url,
            mode
        );
        tracker.start();

        let response = tokio::select! {
            biased;
            _ = abort.cancelled() => {
                warn!("Upload of '{}' aborted by caller", upload.file_name());
                return Err(ConvertError::Aborted);
            }
            sent = self.http.post(&url).multipart(form).send() => {
                sent.map_err(classify_transport_error)?
            }
        };

        let status = response.status();
        tracker.complete(status.as_u16());
        debug!("Server answered HTTP {}", status);

        let body = tokio::select! {
            biased;
            _ = abort.cancelled() => return Err(ConvertError::Aborted),
            text = response.text() => text.map_err(classify_transport_error)?,
        };

        parse_response(status, &body)
    }

    /// Fetch the converted document and write it into `dest_dir`.
    ///
    /// Writes to a temp file in the same directory first and renames it into
    /// place, so a failed download never leaves a truncated document behind.
    pub async fn download(
        &self,
        result: &ConversionResult,
        dest_dir: impl AsRef<Path>,
    ) -> Result<PathBuf, ConvertError> {
        let url = result.download_url(&self.config.base_url);
        let dest_dir = dest_dir.as_ref();
        let path = dest_dir.join(result.download_file_name(&self.config.base_url));
        info!("Downloading converted document from {}", url);

        let response = self.http.get(&url).send().await.map_err(|e| {
            ConvertError::DownloadFailed {
                url: url.clone(),
                reason: error_chain(&e),
            }
        })?;
        if !response.status().is_success() {
            return Err(ConvertError::DownloadFailed {
                url,
                reason: format!("HTTP {}", response.status()),
            });
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ConvertError::DownloadFailed {
                url: url.clone(),
                reason: error_chain(&e),
            })?;

        tokio::fs::create_dir_all(dest_dir)
            .await
            .map_err(|e| ConvertError::OutputWriteFailed {
                path: path.clone(),
                source: e,
            })?;

        let write_err = |e: std::io::Error| ConvertError::OutputWriteFailed {
            path: path.clone(),
            source: e,
        };
        let mut tmp = tempfile::NamedTempFile::new_in(dest_dir).map_err(write_err)?;
        tmp.write_all(&bytes).map_err(write_err)?;
        tmp.persist(&path).map_err(|e| write_err(e.error))?;

        info!("Saved {} bytes to {}", bytes.len(), path.display());
        Ok(path)
    }

    fn build_form(
        &self,
        upload: &PdfUpload,
        tracker: Arc<ProgressTracker>,
    ) -> Result<Form, ConvertError> {
        let data = Arc::clone(&upload.bytes);
        let chunk_size = self.config.upload_chunk_size.max(1);
        let total = data.len();

        let chunks = stream::iter((0..total).step_by(chunk_size)).map(move |start| {
            let end = (start + chunk_size).min(total);
            tracker.advance((end - start) as u64);
            Ok::<Vec<u8>, std::io::Error>(data[start..end].to_vec())
        });

        let part = Part::stream_with_length(reqwest::Body::wrap_stream(chunks), total as u64)
            .file_name(upload.file_name.clone())
            .mime_str(&upload.mime_type)
            .map_err(|e| ConvertError::Internal(format!("multipart part: {e}")))?;

        Ok(Form::new().part(self.config.upload_field.clone(), part))
    }
}

impl fmt::Debug for ConversionClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionClient")
            .field("base_url", &self.config.base_url)
            .finish()
    }
}

/// Map a response status and body onto the result or the error taxonomy.
pub(crate) fn parse_response(
    status: StatusCode,
    body: &str,
) -> Result<ConversionResult, ConvertError> {
    if status.is_success() {
        let payload: SuccessPayload = serde_json::from_str(body).map_err(|e| {
            warn!("HTTP {} with an unparseable body: {}", status, e);
            ConvertError::MalformedResponse {
                status: status.as_u16(),
                detail: snippet(body),
            }
        })?;
        if payload.download_url.trim().is_empty() {
            return Err(ConvertError::MalformedResponse {
                status: status.as_u16(),
                detail: "empty downloadUrl".to_string(),
            });
        }
        let result = ConversionResult {
            download_reference: payload.download_url,
            preview_pages: payload.preview_image_urls.unwrap_or_default(),
        };
        info!(
            "Conversion succeeded: {} ({} preview pages)",
            result.download_reference,
            result.preview_pages.len()
        );
        return Ok(result);
    }

    let message = error_message(status, body);
    warn!("Conversion failed with HTTP {}: {}", status, message);
    Err(ConvertError::ServerError {
        status: status.as_u16(),
        message,
    })
}

/// `error`, then `message` from a JSON object body, then a non-JSON body
/// verbatim, then the status reason phrase.
fn error_message(status: StatusCode, body: &str) -> String {
    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(serde_json::Value::Object(map)) => {
            for key in ["error", "message"] {
                if let Some(serde_json::Value::String(s)) = map.get(key) {
                    if !s.is_empty() {
                        return s.clone();
                    }
                }
            }
        }
        // Valid JSON of another shape carries no usable message.
        Ok(_) => {}
        Err(_) => {
            let trimmed = body.trim();
            if !trimmed.is_empty() {
                return trimmed.to_string();
            }
        }
    }
    status
        .canonical_reason()
        .unwrap_or("Unknown error")
        .to_string()
}

fn classify_transport_error(e: reqwest::Error) -> ConvertError {
    if e.is_timeout() {
        warn!("Request timed out: {}", e);
        ConvertError::Aborted
    } else if e.is_builder() {
        ConvertError::Internal(error_chain(&e))
    } else {
        ConvertError::NetworkError {
            detail: error_chain(&e),
        }
    }
}

/// The error and all its sources, joined with `: `.
fn error_chain(e: &dyn std::error::Error) -> String {
    let mut out = e.to_string();
    let mut source = e.source();
    while let Some(s) = source {
        out.push_str(": ");
        out.push_str(&s.to_string());
        source = s.source();
    }
    out
}

fn snippet(body: &str) -> String {
    const MAX: usize = 200;
    if body.len() <= MAX {
        return body.to_string();
    }
    let mut end = MAX;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}\u{2026}", &body[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_accepts_pdf_only() {
        assert!(PdfUpload::new("a.pdf", PDF_MIME, b"%PDF-1.7".to_vec())
            .validate()
            .is_ok());
        let err = PdfUpload::new("a.png", "image/png", vec![0u8; 4])
            .validate()
            .unwrap_err();
        assert!(matches!(err, ConvertError::InvalidFileType { .. }));
    }

    #[test]
    fn from_path_detects_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let pdf = dir.path().join("report.pdf");
        std::fs::write(&pdf, b"%PDF-1.4\n%%EOF\n").unwrap();
        let upload = PdfUpload::from_path(&pdf).unwrap();
        assert_eq!(upload.file_name(), "report.pdf");
        assert_eq!(upload.mime_type(), PDF_MIME);

        let fake = dir.path().join("fake.pdf");
        std::fs::write(&fake, b"hello").unwrap();
        assert!(PdfUpload::from_path(&fake).unwrap().validate().is_err());
    }

    #[test]
    fn from_path_missing_file() {
        let err = PdfUpload::from_path("/definitely/not/here.pdf").unwrap_err();
        assert!(matches!(err, ConvertError::FileNotFound { .. }));
    }

    #[test]
    fn success_payload_parses() {
        let body = r#"{"downloadUrl":"/files/out.docx","previewImageUrls":["/img/p1.png","/img/p2.png"]}"#;
        let result = parse_response(StatusCode::OK, body).unwrap();
        assert_eq!(result.download_reference, "/files/out.docx");
        assert_eq!(result.preview_pages, vec!["/img/p1.png", "/img/p2.png"]);
    }

    #[test]
    fn null_preview_list_is_empty() {
        let body = r#"{"downloadUrl":"/files/out.docx","previewImageUrls":null}"#;
        assert!(parse_response(StatusCode::OK, body)
            .unwrap()
            .preview_pages
            .is_empty());
        let body = r#"{"downloadUrl":"/files/out.docx"}"#;
        assert!(parse_response(StatusCode::CREATED, body)
            .unwrap()
            .preview_pages
            .is_empty());
    }

    #[test]
    fn legacy_field_names_are_malformed() {
        let body = r#"{"docx_download_url":"/x.docx","preview_image_urls":[]}"#;
        let err = parse_response(StatusCode::OK, body).unwrap_err();
        assert!(matches!(err, ConvertError::MalformedResponse { status: 200, .. }));
    }

    #[test]
    fn non_json_success_is_malformed() {
        let err = parse_response(StatusCode::OK, "PK\u{3}\u{4}binary").unwrap_err();
        assert!(matches!(err, ConvertError::MalformedResponse { .. }));
    }

    #[test]
    fn server_error_message_sources() {
        let e = parse_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            r#"{"error":"OCR engine unavailable"}"#,
        )
        .unwrap_err();
        assert_eq!(e.user_message(), "OCR engine unavailable");

        let e = parse_response(StatusCode::BAD_REQUEST, r#"{"message":"bad pdf"}"#).unwrap_err();
        assert_eq!(e.user_message(), "bad pdf");

        let e = parse_response(StatusCode::BAD_GATEWAY, "upstream down").unwrap_err();
        assert_eq!(e.user_message(), "upstream down");

        let e = parse_response(StatusCode::SERVICE_UNAVAILABLE, "").unwrap_err();
        assert_eq!(e.user_message(), "Service Unavailable");

        let e = parse_response(StatusCode::NOT_FOUND, r#"{"detail":"x"}"#).unwrap_err();
        assert_eq!(e.user_message(), "Not Found");
        let e = parse_response(StatusCode::BAD_REQUEST, r#""oops""#).unwrap_err();
        assert_eq!(e.user_message(), "Bad Request");

        let e = parse_response(StatusCode::INTERNAL_SERVER_ERROR, r#"["a","b"]"#).unwrap_err();
        assert_eq!(e.user_message(), "Internal Server Error");

        let e = parse_response(StatusCode::BAD_GATEWAY, "{truncated").unwrap_err();
        assert_eq!(e.user_message(), "{truncated");
    }

    #[test]
    fn references_resolve_against_base() {
        let base = "http://localhost:5000/";
        assert_eq!(
            resolve_reference(base, "/files/out.docx"),
            "http://localhost:5000/files/out.docx"
        );
        assert_eq!(
            resolve_reference(base, "https://cdn.example.com/p1.png"),
            "https://cdn.example.com/p1.png"
        );
    }

    #[test]
    fn download_file_name_fallback() {
        let r = ConversionResult {
            download_reference: "/files/report_ocr.docx".into(),
            preview_pages: vec![],
        };
        assert_eq!(r.download_file_name("http://h"), "report_ocr.docx");

        let r = ConversionResult {
            download_reference: "/download/1234".into(),
            preview_pages: vec![],
        };
        assert_eq!(r.download_file_name("http://h"), FALLBACK_DOWNLOAD_NAME);
    }

    #[test]
    fn snippet_truncates_on_char_boundary() {
        let long = "é".repeat(300);
        let s = snippet(&long);
        assert!(s.ends_with('\u{2026}'));
        assert!(s.len() < long.len());
    }
}
