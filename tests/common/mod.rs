//! Shared fixtures: an in-process mock conversion server and a fake PDF
//! renderer that needs no pdfium.

#![allow(dead_code)]

use axum::extract::{Multipart, Path as AxumPath, State};
use axum::http::{StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use pdf2docx_studio::{
    PdfDocumentHandle, PdfRenderer, PdfUpload, RenderedPage, StudioConfig, ViewerError,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// What an endpoint answers.
#[derive(Clone, Debug)]
pub struct Reply {
    pub status: u16,
    pub body: String,
    pub delay: Duration,
}

impl Reply {
    pub fn ok(pages: usize) -> Self {
        let previews: Vec<String> = (1..=pages).map(|i| format!("/previews/p{i}.png")).collect();
        Self {
            status: 200,
            body: serde_json::json!({
                "downloadUrl": "/files/out.docx",
                "previewImageUrls": previews,
            })
            .to_string(),
            delay: Duration::ZERO,
        }
    }

    pub fn status(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            delay: Duration::ZERO,
        }
    }

    pub fn delayed(mut self, ms: u64) -> Self {
        self.delay = Duration::from_millis(ms);
        self
    }
}

/// One upload the server received.
#[derive(Clone, Debug)]
pub struct Hit {
    pub path: String,
    pub field: String,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub len: usize,
}

#[derive(Clone, Default)]
struct MockState {
    replies: Arc<Mutex<HashMap<String, Reply>>>,
    hits: Arc<Mutex<Vec<Hit>>>,
}

pub struct MockServer {
    pub base_url: String,
    state: MockState,
}

impl MockServer {
    pub async fn start() -> Self {
        let state = MockState::default();
        let app = Router::new()
            .route("/convert_digital", post(convert))
            .route("/convert_image_ocr", post(convert))
            .route("/files/:name", get(download))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock server");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("mock server");
        });

        Self {
            base_url: format!("http://{addr}"),
            state,
        }
    }

    pub fn reply(&self, path: &str, reply: Reply) {
        self.state
            .replies
            .lock()
            .unwrap()
            .insert(path.to_string(), reply);
    }

    pub fn hits(&self) -> Vec<Hit> {
        self.state.hits.lock().unwrap().clone()
    }

    pub fn config(&self) -> StudioConfig {
        StudioConfig::builder()
            .base_url(self.base_url.clone())
            .upload_chunk_size(16 * 1024)
            .animation_delay_ms(1)
            .build()
            .expect("valid config")
    }
}

async fn convert(State(state): State<MockState>, uri: Uri, mut multipart: Multipart) -> Response {
    let mut hit = Hit {
        path: uri.path().to_string(),
        field: String::new(),
        file_name: None,
        content_type: None,
        len: 0,
    };
    while let Ok(Some(field)) = multipart.next_field().await {
        hit.field = field.name().unwrap_or_default().to_string();
        hit.file_name = field.file_name().map(str::to_string);
        hit.content_type = field.content_type().map(str::to_string);
        hit.len = field.bytes().await.map(|b| b.len()).unwrap_or(0);
    }
    state.hits.lock().unwrap().push(hit);

    let reply = state
        .replies
        .lock()
        .unwrap()
        .get(uri.path())
        .cloned()
        .unwrap_or_else(|| Reply::ok(1));
    tokio::time::sleep(reply.delay).await;

    let status = StatusCode::from_u16(reply.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, reply.body).into_response()
}

async fn download(AxumPath(name): AxumPath<String>) -> Response {
    (StatusCode::OK, format!("PK fake docx {name}")).into_response()
}

// ── Fixtures ────────────────────────────────────────────────────────────

pub fn pdf(name: &str, len: usize) -> PdfUpload {
    let mut bytes = b"%PDF-1.7\n".to_vec();
    bytes.resize(len.max(bytes.len()), b'x');
    PdfUpload::new(name, "application/pdf", bytes)
}

/// Port with nothing listening on it.
pub fn closed_port_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().expect("addr").port();
    drop(listener);
    format!("http://127.0.0.1:{port}")
}

// ── Fake renderer ───────────────────────────────────────────────────────

/// Every PDF has `pages` pages; each renders as a 1×1 PNG.
pub struct FakeRenderer {
    pub pages: usize,
}

impl PdfRenderer for FakeRenderer {
    fn load(
        &self,
        _bytes: Arc<[u8]>,
        _password: Option<&str>,
    ) -> Result<Arc<dyn PdfDocumentHandle>, ViewerError> {
        Ok(Arc::new(FakeDocument { pages: self.pages }))
    }
}

struct FakeDocument {
    pages: usize,
}

impl PdfDocumentHandle for FakeDocument {
    fn page_count(&self) -> usize {
        self.pages
    }

    fn render_page(&self, page: usize, _max_pixels: u32) -> Result<RenderedPage, ViewerError> {
        let img = image::DynamicImage::new_rgba8(1, 1);
        RenderedPage::from_image(page, &img)
    }
}
