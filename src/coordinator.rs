//! The shared preview slot both converter widgets publish into.
//!
//! Only one widget's output occupies the slot at a time. Publishing requires
//! a [`PreviewClaim`] obtained from [`PreviewCoordinator::start_conversion`];
//! any later `start_conversion` or `file_selected` bumps the generation and
//! silently invalidates every older claim. That is what keeps a slow
//! conversion in one widget from overwriting a newer one in the other.

use crate::config::ConversionMode;
use crate::upload::{ConversionResult, PdfUpload};
use crate::viewer::ViewerSource;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};

/// Proof that a widget started the conversion currently owning the slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreviewClaim {
    widget: ConversionMode,
    generation: u64,
}

impl PreviewClaim {
    pub fn widget(&self) -> ConversionMode {
        self.widget
    }
}

/// Read-only view of the preview slot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreviewSnapshot {
    /// Widget whose output the slot belongs to.
    pub active_widget: Option<ConversionMode>,
    /// The PDF the user picked in the active widget.
    pub original_file: Option<PdfUpload>,
    /// The converted document, once available.
    pub result: Option<ConversionResult>,
    /// A conversion is running for the active widget.
    pub is_loading: bool,
    /// A conversion was attempted since the last file selection; switches the
    /// preview area from the placeholder to the working area.
    pub has_converted: bool,
}

impl PreviewSnapshot {
    /// Preview page references of the current result (empty if none).
    pub fn preview_pages(&self) -> &[String] {
        self.result
            .as_ref()
            .map(|r| r.preview_pages.as_slice())
            .unwrap_or(&[])
    }

    /// The download button is shown only for a finished conversion.
    pub fn can_download(&self) -> bool {
        self.result.is_some() && !self.is_loading && self.has_converted
    }
}

#[derive(Default)]
struct Slot {
    snapshot: PreviewSnapshot,
    generation: u64,
}

/// Page-level preview state shared by the digital and image widgets.
#[derive(Default)]
pub struct PreviewCoordinator {
    slot: Mutex<Slot>,
}

impl PreviewCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// `widget` starts a conversion: it takes the slot and any previous
    /// result is dropped.
    pub fn start_conversion(&self, widget: ConversionMode) -> PreviewClaim {
        let mut slot = self.lock();
        slot.generation += 1;
        slot.snapshot.active_widget = Some(widget);
        slot.snapshot.result = None;
        slot.snapshot.is_loading = true;
        slot.snapshot.has_converted = true;
        info!("Preview slot claimed by {} (generation {})", widget, slot.generation);
        PreviewClaim {
            widget,
            generation: slot.generation,
        }
    }

    /// Publish a successful result. Returns `false` if the claim is stale.
    pub fn report_success(
        &self,
        claim: &PreviewClaim,
        result: ConversionResult,
        original: Option<PdfUpload>,
    ) -> bool {
        let mut slot = self.lock();
        if !Self::is_current(&slot, claim) {
            debug!("Ignoring stale success from {}", claim.widget);
            return false;
        }
        slot.snapshot.result = Some(result);
        slot.snapshot.original_file = original;
        slot.snapshot.is_loading = false;
        true
    }

    /// Publish a failure. Returns `false` if the claim is stale.
    pub fn report_error(&self, claim: &PreviewClaim, message: &str) -> bool {
        let mut slot = self.lock();
        if !Self::is_current(&slot, claim) {
            debug!("Ignoring stale error from {}: {}", claim.widget, message);
            return false;
        }
        slot.snapshot.result = None;
        slot.snapshot.is_loading = false;
        true
    }

    /// A widget's file selection changed.
    ///
    /// With a file, the widget takes the slot without starting a request.
    /// With `None`, the widget's contribution is removed if it owns the slot.
    pub fn file_selected(&self, widget: ConversionMode, file: Option<PdfUpload>) {
        let mut slot = self.lock();
        match file {
            Some(file) => {
                slot.generation += 1;
                slot.snapshot = PreviewSnapshot {
                    active_widget: Some(widget),
                    original_file: Some(file),
                    result: None,
                    is_loading: false,
                    has_converted: false,
                };
            }
            None if slot.snapshot.active_widget == Some(widget) => {
                slot.generation += 1;
                slot.snapshot = PreviewSnapshot::default();
            }
            None => {}
        }
    }

    /// `true` while `claim` still owns the slot.
    pub fn is_claim_current(&self, claim: &PreviewClaim) -> bool {
        Self::is_current(&self.lock(), claim)
    }

    fn is_current(slot: &Slot, claim: &PreviewClaim) -> bool {
        slot.snapshot.active_widget == Some(claim.widget) && slot.generation == claim.generation
    }

    pub fn snapshot(&self) -> PreviewSnapshot {
        self.lock().snapshot.clone()
    }

    /// Viewer source for the original-PDF pane, if a file is present.
    pub fn original_preview(&self) -> Option<ViewerSource> {
        self.lock()
            .snapshot
            .original_file
            .as_ref()
            .map(ViewerSource::from_upload)
    }

    /// Viewer source for the converted-document pane, if it has pages.
    pub fn converted_preview(&self) -> Option<ViewerSource> {
        let slot = self.lock();
        let result = slot.snapshot.result.as_ref()?;
        if result.preview_pages.is_empty() {
            return None;
        }
        Some(ViewerSource::Images(result.preview_pages.clone()))
    }
}

impl std::fmt::Debug for PreviewCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let slot = self.lock();
        f.debug_struct("PreviewCoordinator")
            .field("generation", &slot.generation)
            .field("snapshot", &slot.snapshot)
            .finish()
    }
}
