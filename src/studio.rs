//! The page that owns both converter widgets, the preview slot and the
//! full-screen viewer.
//!
//! Clicking a preview pane opens the viewer on what the coordinator holds;
//! with nothing to show the click does nothing.

use crate::config::{ConversionMode, StudioConfig};
use crate::coordinator::{PreviewCoordinator, PreviewSnapshot};
use crate::error::{ConvertError, ViewerError};
use crate::notify::SharedNotifier;
use crate::upload::ConversionClient;
use crate::viewer::{FullScreenViewer, PdfRenderer, ViewerSource};
use crate::widget::ConverterWidget;
use std::sync::Arc;
use tracing::debug;

pub struct Studio {
    config: Arc<StudioConfig>,
    client: Arc<ConversionClient>,
    digital: ConverterWidget,
    image: ConverterWidget,
    coordinator: Arc<PreviewCoordinator>,
    viewer: FullScreenViewer,
}

impl Studio {
    /// Wire both widgets to one client and one coordinator; PDFs in the
    /// viewer are decoded with `renderer`.
    pub fn new(config: StudioConfig, renderer: Arc<dyn PdfRenderer>) -> Result<Self, ConvertError> {
        let config = Arc::new(config);
        let client = Arc::new(ConversionClient::new(Arc::clone(&config))?);
        let coordinator = Arc::new(PreviewCoordinator::new());
        let widget =
            |mode| ConverterWidget::new(mode, Arc::clone(&client), Arc::clone(&coordinator));
        let digital = widget(ConversionMode::Digital);
        let image = widget(ConversionMode::Image);

        Ok(Self {
            viewer: FullScreenViewer::new(renderer).with_config(&config),
            config,
            client,
            digital,
            image,
            coordinator,
        })
    }

    /// Send alerts from both widgets to `notifier`.
    pub fn with_notifier(mut self, notifier: SharedNotifier) -> Self {
        self.digital = self.digital.with_notifier(Arc::clone(&notifier));
        self.image = self.image.with_notifier(notifier);
        self
    }

    pub fn config(&self) -> &StudioConfig {
        &self.config
    }

    pub fn client(&self) -> &ConversionClient {
        &self.client
    }

    pub fn widget(&self, mode: ConversionMode) -> &ConverterWidget {
        match mode {
            ConversionMode::Digital => &self.digital,
            ConversionMode::Image => &self.image,
        }
    }

    pub fn digital(&self) -> &ConverterWidget {
        &self.digital
    }

    pub fn image(&self) -> &ConverterWidget {
        &self.image
    }

    pub fn coordinator(&self) -> &PreviewCoordinator {
        &self.coordinator
    }

    pub fn preview(&self) -> PreviewSnapshot {
        self.coordinator.snapshot()
    }

    pub fn viewer(&self) -> &FullScreenViewer {
        &self.viewer
    }

    /// Open the viewer on the original PDF. Returns `false` if there is none.
    pub async fn open_original_preview(&self, page: usize) -> Result<bool, ViewerError> {
        self.open_source(self.coordinator.original_preview(), page)
            .await
    }

    /// Open the viewer on the converted document's preview pages.
    /// Returns `false` if there are none.
    pub async fn open_converted_preview(&self, page: usize) -> Result<bool, ViewerError> {
        let source = self.coordinator.converted_preview().map(|source| match source {
            ViewerSource::Images(pages) => ViewerSource::Images(
                pages
                    .iter()
                    .map(|p| crate::upload::resolve_reference(&self.config.base_url, p))
                    .collect(),
            ),
            other => other,
        });
        self.open_source(source, page).await
    }

    async fn open_source(
        &self,
        source: Option<ViewerSource>,
        page: usize,
    ) -> Result<bool, ViewerError> {
        let Some(source) = source else {
            debug!("Nothing to preview");
            return Ok(false);
        };
        self.viewer.open(source, page).await?;
        Ok(true)
    }

    pub fn close_preview(&self) {
        self.viewer.close();
    }
}

impl std::fmt::Debug for Studio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Studio")
            .field("base_url", &self.config.base_url)
            .field("digital", &self.digital)
            .field("image", &self.image)
            .field("coordinator", &self.coordinator)
            .field("viewer", &self.viewer)
            .finish()
    }
}
