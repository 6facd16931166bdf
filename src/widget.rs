//! Converter widget: one per conversion mode.
//!
//! Holds the selected file and drives the status machine
//!
//! ```text
//! ready ─convert─▶ uploading ─accepted─▶ converting ─▶ success
//!   ▲                  │                     │
//!   │                  └──────── fail ───────┴──────▶ error
//!   └──────────── convert another / new file ─────────┘
//! ```
//!
//! Upload progress fills the bar up to `upload_progress_cap` (50 by default).
//! Once the server answers, the rest of the bar is a short synthetic
//! animation: the server gives no progress of its own.
//!
//! Every attempt owns a [`CancellationToken`]. Selecting another file or
//! pressing "convert another" cancels it, and every mutation after an await
//! re-checks the token, so a late response never overwrites newer state.

use crate::cancel::CancellationToken;
use crate::config::ConversionMode;
use crate::coordinator::PreviewCoordinator;
use crate::error::ConvertError;
use crate::notify::{AlertLevel, SharedNotifier, TracingNotifier};
use crate::progress::{ProgressCallback, UploadProgressCallback};
use crate::status::{ConversionStatus, MessageKey, StatusMessage};
use crate::upload::{ConversionClient, ConversionResult, PdfUpload};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, info, warn};

/// What a host renders for one widget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetSnapshot {
    pub mode: ConversionMode,
    pub file_name: Option<String>,
    pub status: ConversionStatus,
    pub progress: u8,
    pub message: StatusMessage,
    pub result: Option<ConversionResult>,
    pub error: Option<String>,
    pub convert_enabled: bool,
    pub show_progress_bar: bool,
    pub show_convert_another: bool,
}

/// Receives a fresh [`WidgetSnapshot`] after every state change.
pub trait WidgetListener: Send + Sync {
    fn on_change(&self, snapshot: &WidgetSnapshot) {
        let _ = snapshot;
    }
}

/// Listener that ignores every change.
pub struct NoopWidgetListener;

impl WidgetListener for NoopWidgetListener {}

#[derive(Default)]
struct WidgetState {
    file: Option<PdfUpload>,
    status: ConversionStatus,
    progress: u8,
    message: StatusMessage,
    result: Option<ConversionResult>,
    error: Option<String>,
    attempt: CancellationToken,
}

impl WidgetState {
    /// Back to ready with nothing selected. Cancels the running attempt.
    fn reset(&mut self) {
        self.attempt.cancel();
        *self = WidgetState::default();
    }
}

/// A single converter widget (digital or image/OCR).
pub struct ConverterWidget {
    mode: ConversionMode,
    client: Arc<ConversionClient>,
    coordinator: Arc<PreviewCoordinator>,
    notifier: SharedNotifier,
    listener: Arc<dyn WidgetListener>,
    state: Arc<Mutex<WidgetState>>,
}

impl ConverterWidget {
    pub fn new(
        mode: ConversionMode,
        client: Arc<ConversionClient>,
        coordinator: Arc<PreviewCoordinator>,
    ) -> Self {
        Self {
            mode,
            client,
            coordinator,
            notifier: Arc::new(TracingNotifier),
            listener: Arc::new(NoopWidgetListener),
            state: Arc::new(Mutex::new(WidgetState::default())),
        }
    }

    /// Route alerts somewhere other than the log.
    pub fn with_notifier(mut self, notifier: SharedNotifier) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_listener(mut self, listener: Arc<dyn WidgetListener>) -> Self {
        self.listener = listener;
        self
    }

    pub fn mode(&self) -> ConversionMode {
        self.mode
    }

    pub fn client(&self) -> &ConversionClient {
        &self.client
    }

    fn lock(&self) -> MutexGuard<'_, WidgetState> {
        lock_state(&self.state)
    }

    // ── File selection ──────────────────────────────────────────────────

    /// The user picked a file (or cleared the picker with `None`).
    ///
    /// Any running attempt is cancelled. A file that is not
    /// `application/pdf` moves the widget to `noFile`, raises an alert and
    /// is returned as the error; nothing is sent to the server.
    pub fn select_file(&self, file: Option<PdfUpload>) -> Result<(), ConvertError> {
        let Some(file) = file else {
            let mut st = self.lock();
            st.reset();
            self.coordinator.file_selected(self.mode, None);
            drop(st);
            self.emit();
            return Ok(());
        };

        match file.validate() {
            Ok(()) => {
                info!("[{}] Selected '{}' ({} bytes)", self.mode, file.file_name(), file.len());
                {
                    let mut st = self.lock();
                    st.reset();
                    st.file = Some(file.clone());
                    st.message = StatusMessage::keyed(MessageKey::StatusReady);
                    self.coordinator.file_selected(self.mode, Some(file));
                }
                self.emit();
                Ok(())
            }
            Err(e) => {
                warn!("[{}] Rejected '{}': {}", self.mode, file.file_name(), e);
                {
                    let mut st = self.lock();
                    st.reset();
                    st.status = ConversionStatus::NoFile;
                    st.message = StatusMessage::keyed(MessageKey::InvalidFileType);
                    st.error = Some(MessageKey::InvalidFileType.english().to_string());
                    self.coordinator.file_selected(self.mode, None);
                }
                self.notifier
                    .alert(MessageKey::InvalidFileType.english(), AlertLevel::Error);
                self.emit();
                Err(e)
            }
        }
    }

    /// Leave success/error/noFile for a clean ready state.
    pub fn convert_another(&self) {
        debug!("[{}] Convert another", self.mode);
        {
            let mut st = self.lock();
            st.reset();
            self.coordinator.file_selected(self.mode, None);
        }
        self.emit();
    }

    // ── Conversion ──────────────────────────────────────────────────────

    /// Upload the armed file and drive the widget to success or error.
    ///
    /// Returns [`ConvertError::Superseded`] if the attempt was cancelled
    /// (new file, convert another) while it was in flight; in that case the
    /// widget and the coordinator are left untouched.
    ///
    /// Coordinator calls happen under the widget lock, so a reselection can
    /// never slip between arming an attempt and claiming the preview slot.
    pub async fn convert(&self) -> Result<ConversionResult, ConvertError> {
        let (file, attempt, claim) = {
            let mut st = self.lock();
            if st.status.is_busy() {
                return Err(ConvertError::ConversionInProgress);
            }
            match st.file.clone() {
                Some(file) => {
                    st.attempt.cancel();
                    st.attempt = CancellationToken::new();
                    st.status = ConversionStatus::Uploading;
                    st.progress = 0;
                    st.message = StatusMessage::with_progress(MessageKey::StatusUploading, 0);
                    st.result = None;
                    st.error = None;
                    let claim = self.coordinator.start_conversion(self.mode);
                    (file, st.attempt.clone(), claim)
                }
                None => {
                    st.status = ConversionStatus::NoFile;
                    st.message = StatusMessage::keyed(MessageKey::StatusNoFile);
                    st.error = Some(MessageKey::StatusNoFile.english().to_string());
                    drop(st);
                    self.notifier
                        .alert(MessageKey::StatusNoFile.english(), AlertLevel::Error);
                    self.emit();
                    return Err(ConvertError::NoFileSelected);
                }
            }
        };

        self.emit();

        let config = self.client.config();
        let cap = config.upload_progress_cap.min(100);
        let step = config.animation_step.max(1);
        let delay = Duration::from_millis(config.animation_delay_ms);

        let progress: ProgressCallback = Arc::new(WidgetProgress {
            state: Arc::clone(&self.state),
            listener: Arc::clone(&self.listener),
            mode: self.mode,
            attempt: attempt.clone(),
            cap,
        });

        let outcome = self.client.submit(self.mode, &file, progress).await;

        let result = match outcome {
            Ok(result) => result,
            Err(e) => {
                let message = e.user_message();
                let applied = self.update(&attempt, |st| {
                    st.status = ConversionStatus::Error;
                    st.message = StatusMessage::failure(message.clone());
                    st.error = Some(message.clone());
                });
                if !applied {
                    debug!("[{}] Discarding failure of a superseded attempt: {}", self.mode, e);
                    return Err(ConvertError::Superseded);
                }
                warn!("[{}] Conversion failed: {}", self.mode, message);
                self.notifier.alert(&message, AlertLevel::Error);
                self.coordinator.report_error(&claim, &message);
                return Err(e);
            }
        };

        if !self.update(&attempt, |st| {
            st.status = ConversionStatus::Converting;
            st.progress = st.progress.max(cap);
            st.message = StatusMessage::with_progress(MessageKey::StatusConverting, st.progress);
        }) {
            return Err(ConvertError::Superseded);
        }

        let mut pct = u16::from(cap) + 1;
        while pct <= 100 {
            let p = pct as u8;
            if !self.update(&attempt, |st| {
                st.progress = st.progress.max(p);
                st.message =
                    StatusMessage::with_progress(MessageKey::StatusConverting, st.progress);
            }) {
                return Err(ConvertError::Superseded);
            }
            tokio::time::sleep(delay).await;
            pct += u16::from(step);
        }

        if !self.update(&attempt, |st| {
            st.status = ConversionStatus::Success;
            st.progress = 100;
            st.message = StatusMessage::keyed(MessageKey::StatusSuccess);
            st.result = Some(result.clone());
        }) {
            return Err(ConvertError::Superseded);
        }

        info!(
            "[{}] '{}' converted ({} preview pages)",
            self.mode,
            file.file_name(),
            result.preview_pages.len()
        );
        self.coordinator
            .report_success(&claim, result.clone(), Some(file));
        Ok(result)
    }

    /// Apply `f` only while `attempt` is the widget's live attempt.
    fn update(&self, attempt: &CancellationToken, f: impl FnOnce(&mut WidgetState)) -> bool {
        let applied = {
            let mut st = self.lock();
            if attempt.is_cancelled() {
                false
            } else {
                f(&mut st);
                true
            }
        };
        if applied {
            self.emit();
        }
        applied
    }

    pub fn snapshot(&self) -> WidgetSnapshot {
        snapshot_of(self.mode, &self.lock())
    }

    fn emit(&self) {
        let snapshot = self.snapshot();
        self.listener.on_change(&snapshot);
    }
}

impl std::fmt::Debug for ConverterWidget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConverterWidget")
            .field("mode", &self.mode)
            .field("state", &self.snapshot())
            .finish()
    }
}

fn lock_state(state: &Mutex<WidgetState>) -> MutexGuard<'_, WidgetState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

fn snapshot_of(mode: ConversionMode, st: &WidgetState) -> WidgetSnapshot {
    WidgetSnapshot {
        mode,
        file_name: st.file.as_ref().map(|f| f.file_name().to_string()),
        status: st.status,
        progress: st.progress,
        message: st.message.clone(),
        result: st.result.clone(),
        error: st.error.clone(),
        convert_enabled: st.file.is_some() && !st.status.is_busy(),
        show_progress_bar: st.status.is_busy() || st.status == ConversionStatus::Success,
        show_convert_another: st.status.is_terminal(),
    }
}

/// Scales upload percentages onto the first part of the widget's bar.
fn scaled_upload_progress(percent: u8, cap: u8) -> u8 {
    // Halve with round-half-up, as the bar's upper half belongs to conversion.
    let half = (u16::from(percent.min(100)) + 1) / 2;
    half.min(u16::from(cap)) as u8
}

/// Feeds upload progress into the widget while its attempt is live.
struct WidgetProgress {
    state: Arc<Mutex<WidgetState>>,
    listener: Arc<dyn WidgetListener>,
    mode: ConversionMode,
    attempt: CancellationToken,
    cap: u8,
}

impl UploadProgressCallback for WidgetProgress {
    fn on_upload_progress(&self, percent: u8, bytes_sent: u64, total_bytes: u64) {
        let snapshot = {
            let mut st = lock_state(&self.state);
            if self.attempt.is_cancelled() || st.status != ConversionStatus::Uploading {
                return;
            }
            let scaled = scaled_upload_progress(percent, self.cap);
            if scaled <= st.progress {
                return;
            }
            st.progress = scaled;
            st.message = StatusMessage::with_progress(MessageKey::StatusUploading, scaled);
            snapshot_of(self.mode, &st)
        };
        debug!(
            "[{}] Upload {}% ({}/{} bytes)",
            self.mode, percent, bytes_sent, total_bytes
        );
        self.listener.on_change(&snapshot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StudioConfig;
    use crate::upload::PDF_MIME;

    #[derive(Default)]
    struct Alerts(Mutex<Vec<String>>);

    impl crate::notify::Notifier for Alerts {
        fn alert(&self, message: &str, _level: AlertLevel) {
            self.0.lock().unwrap().push(message.to_string());
        }
    }

    fn widget(alerts: Arc<Alerts>) -> (ConverterWidget, Arc<PreviewCoordinator>) {
        // Nothing listens on port 9; tests here never reach the network.
        let config = StudioConfig::builder()
            .base_url("http://127.0.0.1:9")
            .build()
            .unwrap();
        let client = Arc::new(ConversionClient::new(Arc::new(config)).unwrap());
        let coordinator = Arc::new(PreviewCoordinator::new());
        let w = ConverterWidget::new(ConversionMode::Digital, client, Arc::clone(&coordinator))
            .with_notifier(alerts);
        (w, coordinator)
    }

    fn pdf(name: &str) -> PdfUpload {
        PdfUpload::new(name, PDF_MIME, b"%PDF-1.7\n".to_vec())
    }

    #[test]
    fn upload_progress_is_halved_and_capped() {
        assert_eq!(scaled_upload_progress(0, 50), 0);
        assert_eq!(scaled_upload_progress(1, 50), 1);
        assert_eq!(scaled_upload_progress(33, 50), 17);
        assert_eq!(scaled_upload_progress(100, 50), 50);
        assert_eq!(scaled_upload_progress(100, 40), 40);
    }

    #[test]
    fn valid_file_arms_widget() {
        let alerts = Arc::new(Alerts::default());
        let (w, coordinator) = widget(Arc::clone(&alerts));
        w.select_file(Some(pdf("a.pdf"))).unwrap();

        let s = w.snapshot();
        assert_eq!(s.status, ConversionStatus::Ready);
        assert_eq!(s.file_name.as_deref(), Some("a.pdf"));
        assert!(s.convert_enabled);
        assert_eq!(
            coordinator.snapshot().active_widget,
            Some(ConversionMode::Digital)
        );
        assert!(alerts.0.lock().unwrap().is_empty());
    }

    #[test]
    fn invalid_file_moves_to_no_file() {
        let alerts = Arc::new(Alerts::default());
        let (w, coordinator) = widget(Arc::clone(&alerts));
        w.select_file(Some(pdf("a.pdf"))).unwrap();

        let err = w
            .select_file(Some(PdfUpload::new("cat.png", "image/png", vec![1, 2, 3])))
            .unwrap_err();
        assert!(matches!(err, ConvertError::InvalidFileType { .. }));

        let s = w.snapshot();
        assert_eq!(s.status, ConversionStatus::NoFile);
        assert_eq!(s.message.key, Some(MessageKey::InvalidFileType));
        assert!(!s.convert_enabled);
        assert!(s.file_name.is_none());
        assert_eq!(alerts.0.lock().unwrap().len(), 1);
        assert!(coordinator.snapshot().original_file.is_none());
    }

    #[tokio::test]
    async fn convert_without_file_is_no_file() {
        let alerts = Arc::new(Alerts::default());
        let (w, coordinator) = widget(Arc::clone(&alerts));
        let err = w.convert().await.unwrap_err();
        assert!(matches!(err, ConvertError::NoFileSelected));
        assert_eq!(w.snapshot().status, ConversionStatus::NoFile);
        assert_eq!(w.snapshot().message.key, Some(MessageKey::StatusNoFile));
        assert_eq!(alerts.0.lock().unwrap().len(), 1);
        assert!(!coordinator.snapshot().has_converted);
    }

    #[tokio::test]
    async fn network_failure_lands_in_error_and_reenables_convert() {
        let alerts = Arc::new(Alerts::default());
        let (w, coordinator) = widget(Arc::clone(&alerts));
        w.select_file(Some(pdf("a.pdf"))).unwrap();

        let err = w.convert().await.unwrap_err();
        assert!(matches!(err, ConvertError::NetworkError { .. }), "{err:?}");

        let s = w.snapshot();
        assert_eq!(s.status, ConversionStatus::Error);
        assert!(s.convert_enabled);
        assert!(s.show_convert_another);
        assert_eq!(alerts.0.lock().unwrap().len(), 1);

        let c = coordinator.snapshot();
        assert!(!c.is_loading);
        assert!(c.result.is_none());
    }

    #[test]
    fn convert_another_clears_everything() {
        let alerts = Arc::new(Alerts::default());
        let (w, coordinator) = widget(alerts);
        w.select_file(Some(pdf("a.pdf"))).unwrap();
        w.convert_another();

        let s = w.snapshot();
        assert_eq!(s.status, ConversionStatus::Ready);
        assert!(s.file_name.is_none());
        assert!(s.message.is_blank());
        assert_eq!(s.progress, 0);
        assert_eq!(coordinator.snapshot().active_widget, None);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn reselect_racing_convert_never_leaves_slot_loading() {
        for _ in 0..200 {
            let (w, coordinator) = widget(Arc::new(Alerts::default()));
            let w = Arc::new(w);
            w.select_file(Some(pdf("a.pdf"))).unwrap();

            let barrier = Arc::new(tokio::sync::Barrier::new(2));
            let converting = tokio::spawn({
                let (w, barrier) = (Arc::clone(&w), Arc::clone(&barrier));
                async move {
                    barrier.wait().await;
                    w.convert().await
                }
            });
            let reselecting = tokio::spawn({
                let (w, barrier) = (Arc::clone(&w), Arc::clone(&barrier));
                async move {
                    barrier.wait().await;
                    w.select_file(Some(pdf("b.pdf")))
                }
            });
            let _ = converting.await.unwrap();
            reselecting.await.unwrap().unwrap();

            assert!(!w.snapshot().status.is_busy());
            let c = coordinator.snapshot();
            assert!(!c.is_loading, "slot stuck loading: {c:?}");
        }
    }

    #[test]
    fn convert_enabled_tracks_what_convert_accepts() {
        let (w, _) = widget(Arc::new(Alerts::default()));
        assert!(!w.snapshot().convert_enabled);
        w.select_file(Some(pdf("a.pdf"))).unwrap();
        for status in [
            ConversionStatus::Ready,
            ConversionStatus::Error,
            ConversionStatus::Success,
        ] {
            w.lock().status = status;
            assert!(w.snapshot().convert_enabled, "{status:?}");
        }
        for status in [ConversionStatus::Uploading, ConversionStatus::Converting] {
            w.lock().status = status;
            assert!(!w.snapshot().convert_enabled, "{status:?}");
        }
    }

    #[test]
    fn reselect_cancels_running_attempt() {
        let (w, _) = widget(Arc::new(Alerts::default()));
        let first = {
            let mut st = w.lock();
            st.file = Some(pdf("a.pdf"));
            st.status = ConversionStatus::Uploading;
            st.attempt.clone()
        };
        w.select_file(Some(pdf("b.pdf"))).unwrap();
        assert!(first.is_cancelled());
        assert!(!w.update(&first, |st| st.status = ConversionStatus::Success));
        assert_eq!(w.snapshot().status, ConversionStatus::Ready);
    }
}
