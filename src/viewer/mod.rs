//! Full-screen paginated viewer.
//!
//! Shows either the original PDF (decoded through a [`PdfRenderer`]) or the
//! server's preview page images, one page at a time:
//!
//! ```text
//! Closed ─open─▶ Opening ─▶ Ready ◀─navigate─┐
//!                   │         │   ──────────┘
//!                   ▼         ▼
//!                 Error ◀── render failure ── (navigating away re-renders)
//!         close() from anywhere ─▶ Closed
//! ```
//!
//! Renders complete out of order. Each request is tagged with the session id
//! and a per-session sequence number; a completion is applied only if both
//! are still the latest, so a slow page 1 never replaces a fast page 2, and
//! nothing lands after `close()`.

pub mod backend;
pub mod pdfium;

pub use backend::{PdfDocumentHandle, PdfRenderer, RenderedPage};
pub use pdfium::PdfiumRenderer;

use crate::config::StudioConfig;
use crate::error::ViewerError;
use crate::upload::PdfUpload;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

/// What to open in the viewer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewerSource {
    /// Raw PDF bytes (the user's original file).
    Pdf { name: String, bytes: Arc<[u8]> },
    /// Ordered page image references (the converted document's previews).
    Images(Vec<String>),
}

impl ViewerSource {
    pub fn from_upload(upload: &PdfUpload) -> Self {
        ViewerSource::Pdf {
            name: upload.file_name().to_string(),
            bytes: upload.shared_bytes(),
        }
    }

    pub fn kind(&self) -> DocumentKind {
        match self {
            ViewerSource::Pdf { .. } => DocumentKind::Pdf,
            ViewerSource::Images(_) => DocumentKind::ImageSequence,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    ImageSequence,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ViewerPhase {
    #[default]
    Closed,
    Opening,
    Ready,
    Error(ViewerError),
}

/// What the viewer currently displays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageContent {
    /// A rasterised PDF page.
    Rendered(RenderedPage),
    /// A preview image reference, displayed as-is.
    Image(String),
}

enum Document {
    Pdf(Arc<dyn PdfDocumentHandle>),
    Images(Vec<String>),
}

struct Session {
    id: u64,
    kind: DocumentKind,
    document: Option<Document>,
    current_page: usize,
    total_pages: usize,
    latest_request: u64,
    content: Option<PageContent>,
}

#[derive(Default)]
struct ViewerState {
    phase: ViewerPhase,
    session: Option<Session>,
    next_session_id: u64,
    render_requests: u64,
}

impl ViewerState {
    fn live(&mut self, session_id: u64) -> Option<&mut Session> {
        self.session.as_mut().filter(|s| s.id == session_id)
    }
}

/// The single full-screen viewer of a studio.
pub struct FullScreenViewer {
    renderer: Arc<dyn PdfRenderer>,
    max_rendered_pixels: u32,
    password: Option<String>,
    state: Mutex<ViewerState>,
}

impl FullScreenViewer {
    pub fn new(renderer: Arc<dyn PdfRenderer>) -> Self {
        Self {
            renderer,
            max_rendered_pixels: StudioConfig::default().max_rendered_pixels,
            password: None,
            state: Mutex::new(ViewerState::default()),
        }
    }

    /// Take render size and PDF password from `config`.
    pub fn with_config(mut self, config: &StudioConfig) -> Self {
        self.max_rendered_pixels = config.max_rendered_pixels;
        self.password = config.pdf_password.clone();
        self
    }

    fn lock(&self) -> MutexGuard<'_, ViewerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ── Session lifecycle ───────────────────────────────────────────────

    /// Open `source` at `initial_page` (clamped into range).
    ///
    /// Replaces any open session. A source with zero pages leaves the viewer
    /// in `Error(NoDocument)`.
    pub async fn open(&self, source: ViewerSource, initial_page: usize) -> Result<(), ViewerError> {
        let kind = source.kind();
        let session_id = {
            let mut st = self.lock();
            st.next_session_id += 1;
            let id = st.next_session_id;
            st.session = Some(Session {
                id,
                kind,
                document: None,
                current_page: 0,
                total_pages: 0,
                latest_request: 0,
                content: None,
            });
            st.phase = ViewerPhase::Opening;
            id
        };

        let loaded = match source {
            ViewerSource::Images(pages) => Ok(Document::Images(pages)),
            ViewerSource::Pdf { name, bytes } => {
                info!("Opening '{}' ({} bytes)", name, bytes.len());
                let renderer = Arc::clone(&self.renderer);
                let password = self.password.clone();
                tokio::task::spawn_blocking(move || renderer.load(bytes, password.as_deref()))
                    .await
                    .map_err(|e| ViewerError::Internal(format!("Decode task panicked: {e}")))
                    .and_then(|r| r)
                    .map(Document::Pdf)
            }
        };

        let page = {
            let mut st = self.lock();
            if st.live(session_id).is_none() {
                debug!("Session {} closed while opening; dropping document", session_id);
                return Ok(());
            }
            let document = match loaded {
                Ok(d) => d,
                Err(e) => {
                    warn!("Failed to open document: {}", e);
                    st.phase = ViewerPhase::Error(e.clone());
                    return Err(e);
                }
            };
            let total = match &document {
                Document::Pdf(handle) => handle.page_count(),
                Document::Images(pages) => pages.len(),
            };
            if total == 0 {
                st.phase = ViewerPhase::Error(ViewerError::NoDocument);
                return Err(ViewerError::NoDocument);
            }
            if let Some(session) = st.live(session_id) {
                session.document = Some(document);
                session.total_pages = total;
            }
            initial_page.clamp(1, total)
        };

        self.show_page(session_id, page).await
    }

    /// Close the session and release the document. Idempotent.
    pub fn close(&self) {
        let mut st = self.lock();
        if let Some(session) = st.session.take() {
            debug!("Closing viewer session {}", session.id);
        }
        st.phase = ViewerPhase::Closed;
    }

    // ── Navigation ──────────────────────────────────────────────────────

    /// One page forward. No-op on the last page.
    pub async fn next(&self) -> Result<(), ViewerError> {
        self.step(1).await
    }

    /// One page back. No-op on the first page.
    pub async fn previous(&self) -> Result<(), ViewerError> {
        self.step(-1).await
    }

    /// Jump to `page`, clamped into range.
    pub async fn go_to(&self, page: usize) -> Result<(), ViewerError> {
        let target = {
            let st = self.lock();
            match st.session.as_ref() {
                Some(s) if s.total_pages > 0 => Some((s.id, page.clamp(1, s.total_pages))),
                _ => None,
            }
        };
        match target {
            Some((id, page)) => self.show_page(id, page).await,
            None => Ok(()),
        }
    }

    async fn step(&self, delta: isize) -> Result<(), ViewerError> {
        let target = {
            let st = self.lock();
            st.session.as_ref().and_then(|s| {
                let next = s.current_page.checked_add_signed(delta)?;
                (s.total_pages > 0 && (1..=s.total_pages).contains(&next)).then_some((s.id, next))
            })
        };
        match target {
            Some((id, page)) => self.show_page(id, page).await,
            None => Ok(()),
        }
    }

    /// Make `page` current and fetch its content.
    async fn show_page(&self, session_id: u64, page: usize) -> Result<(), ViewerError> {
        let (seq, handle) = {
            let mut st = self.lock();
            st.render_requests += 1;
            let Some(session) = st.live(session_id) else {
                return Ok(());
            };
            session.latest_request += 1;
            session.current_page = page;
            let seq = session.latest_request;
            match &session.document {
                Some(Document::Images(pages)) => {
                    session.content = pages.get(page - 1).cloned().map(PageContent::Image);
                    st.phase = ViewerPhase::Ready;
                    return Ok(());
                }
                Some(Document::Pdf(handle)) => (seq, Arc::clone(handle)),
                None => return Ok(()),
            }
        };

        let max_pixels = self.max_rendered_pixels;
        let rendered = tokio::task::spawn_blocking(move || handle.render_page(page, max_pixels))
            .await
            .map_err(|e| ViewerError::Internal(format!("Render task panicked: {e}")))
            .and_then(|r| r);

        let mut st = self.lock();
        let current = st
            .live(session_id)
            .is_some_and(|s| s.latest_request == seq);
        if !current {
            debug!("Discarding stale render of page {}", page);
            return Ok(());
        }
        match rendered {
            Ok(rendered) => {
                if let Some(session) = st.live(session_id) {
                    session.content = Some(PageContent::Rendered(rendered));
                }
                st.phase = ViewerPhase::Ready;
                Ok(())
            }
            Err(e) => {
                warn!("Page {} failed to render: {}", page, e);
                if let Some(session) = st.live(session_id) {
                    session.content = None;
                }
                st.phase = ViewerPhase::Error(e.clone());
                Err(e)
            }
        }
    }

    // ── Queries ─────────────────────────────────────────────────────────

    pub fn phase(&self) -> ViewerPhase {
        self.lock().phase.clone()
    }

    pub fn is_open(&self) -> bool {
        self.lock().session.is_some()
    }

    pub fn kind(&self) -> Option<DocumentKind> {
        self.lock().session.as_ref().map(|s| s.kind)
    }

    /// 1-based; 0 when nothing is displayed.
    pub fn current_page(&self) -> usize {
        self.lock().session.as_ref().map_or(0, |s| s.current_page)
    }

    pub fn total_pages(&self) -> usize {
        self.lock().session.as_ref().map_or(0, |s| s.total_pages)
    }

    /// The displayed page; `None` unless the viewer is `Ready`.
    pub fn display(&self) -> Option<PageContent> {
        let st = self.lock();
        if st.phase != ViewerPhase::Ready {
            return None;
        }
        st.session.as_ref().and_then(|s| s.content.clone())
    }

    /// Page fetches issued over the viewer's lifetime.
    pub fn render_requests(&self) -> u64 {
        self.lock().render_requests
    }
}

impl std::fmt::Debug for FullScreenViewer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let st = self.lock();
        f.debug_struct("FullScreenViewer")
            .field("phase", &st.phase)
            .field("current_page", &st.session.as_ref().map(|s| s.current_page))
            .field("total_pages", &st.session.as_ref().map(|s| s.total_pages))
            .finish()
    }
}


#[cfg(test)]
mod tests {
    use super::testing::FakeRenderer;
    use super::*;

    fn pdf_source() -> ViewerSource {
        ViewerSource::Pdf {
            name: "doc.pdf".into(),
            bytes: Arc::from(b"%PDF-1.7".to_vec()),
        }
    }

    fn images(n: usize) -> ViewerSource {
        ViewerSource::Images((1..=n).map(|i| format!("/img/p{i}.png")).collect())
    }

    fn rendered_page(viewer: &FullScreenViewer) -> Option<usize> {
        match viewer.display() {
            Some(PageContent::Rendered(p)) => Some(p.page),
            _ => None,
        }
    }

    #[tokio::test]
    async fn opens_pdf_at_clamped_page() {
        let viewer = FullScreenViewer::new(Arc::new(FakeRenderer::with_pages(3)));
        viewer.open(pdf_source(), 9).await.unwrap();
        assert_eq!(viewer.phase(), ViewerPhase::Ready);
        assert_eq!(viewer.kind(), Some(DocumentKind::Pdf));
        assert_eq!((viewer.current_page(), viewer.total_pages()), (3, 3));
        assert_eq!(rendered_page(&viewer), Some(3));

        viewer.open(pdf_source(), 0).await.unwrap();
        assert_eq!(viewer.current_page(), 1);
    }

    #[tokio::test]
    async fn navigation_at_bounds_is_noop() {
        let viewer = FullScreenViewer::new(Arc::new(FakeRenderer::with_pages(2)));
        viewer.open(pdf_source(), 1).await.unwrap();
        let before = viewer.render_requests();

        viewer.previous().await.unwrap();
        assert_eq!(viewer.current_page(), 1);
        assert_eq!(viewer.render_requests(), before);

        viewer.next().await.unwrap();
        assert_eq!(viewer.current_page(), 2);
        assert_eq!(viewer.render_requests(), before + 1);

        viewer.next().await.unwrap();
        assert_eq!(viewer.current_page(), 2);
        assert_eq!(viewer.render_requests(), before + 1);
    }

    #[tokio::test]
    async fn image_sequence_shows_references_directly() {
        let viewer = FullScreenViewer::new(Arc::new(FakeRenderer::with_pages(0)));
        viewer.open(images(3), 2).await.unwrap();
        assert_eq!(viewer.kind(), Some(DocumentKind::ImageSequence));
        assert_eq!(
            viewer.display(),
            Some(PageContent::Image("/img/p2.png".into()))
        );
        viewer.go_to(7).await.unwrap();
        assert_eq!(viewer.current_page(), 3);
    }

    #[tokio::test]
    async fn empty_sources_are_no_document() {
        let viewer = FullScreenViewer::new(Arc::new(FakeRenderer::with_pages(0)));
        let err = viewer.open(pdf_source(), 1).await.unwrap_err();
        assert_eq!(err, ViewerError::NoDocument);
        assert_eq!(viewer.phase(), ViewerPhase::Error(ViewerError::NoDocument));
        assert!(viewer.display().is_none());

        let err = viewer.open(images(0), 1).await.unwrap_err();
        assert_eq!(err, ViewerError::NoDocument);
    }

    #[tokio::test]
    async fn decode_failure_is_error_phase() {
        let viewer = FullScreenViewer::new(Arc::new(FakeRenderer::with_pages(3)));
        let source = ViewerSource::Pdf {
            name: "bad.pdf".into(),
            bytes: Arc::from(b"garbage".to_vec()),
        };
        let err = viewer.open(source, 1).await.unwrap_err();
        assert!(matches!(err, ViewerError::Decode { .. }));
        assert!(matches!(viewer.phase(), ViewerPhase::Error(_)));
        assert!(viewer.is_open());
    }

    #[tokio::test]
    async fn render_failure_is_per_page() {
        let mut renderer = FakeRenderer::with_pages(3);
        renderer.failing_page = Some(2);
        let viewer = FullScreenViewer::new(Arc::new(renderer));
        viewer.open(pdf_source(), 1).await.unwrap();

        let err = viewer.next().await.unwrap_err();
        assert_eq!(err, ViewerError::Render { page: 2, detail: "boom".into() });
        assert!(viewer.display().is_none());

        viewer.next().await.unwrap();
        assert_eq!(viewer.phase(), ViewerPhase::Ready);
        assert_eq!(rendered_page(&viewer), Some(3));
    }

    #[tokio::test]
    async fn slow_render_does_not_overwrite_newer_page() {
        let mut renderer = FakeRenderer::with_pages(3);
        renderer.delays_ms = vec![0, 300, 10];
        let viewer = FullScreenViewer::new(Arc::new(renderer));
        viewer.open(pdf_source(), 1).await.unwrap();

        let (slow, fast) = tokio::join!(viewer.go_to(2), async {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            viewer.go_to(3).await
        });
        slow.unwrap();
        fast.unwrap();
        assert_eq!(viewer.current_page(), 3);
        assert_eq!(rendered_page(&viewer), Some(3));
    }

    #[tokio::test]
    async fn close_discards_in_flight_render_and_resets() {
        let mut renderer = FakeRenderer::with_pages(3);
        renderer.delays_ms = vec![0, 200, 0];
        let viewer = FullScreenViewer::new(Arc::new(renderer));
        viewer.open(pdf_source(), 1).await.unwrap();

        let (nav, ()) = tokio::join!(viewer.next(), async {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            viewer.close();
        });
        nav.unwrap();
        assert_eq!(viewer.phase(), ViewerPhase::Closed);
        assert!(viewer.display().is_none());
        assert_eq!((viewer.current_page(), viewer.total_pages()), (0, 0));

        viewer.close();
        viewer.open(pdf_source(), 1).await.unwrap();
        assert_eq!(viewer.current_page(), 1);
        assert_eq!(rendered_page(&viewer), Some(1));
    }
}
