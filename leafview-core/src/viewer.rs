use std::sync::{Arc, Weak};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument};

use crate::config::ViewerConfig;
use crate::controller::{LoadOutcome, PaginationController};
use crate::engine::DocumentEngine;
use crate::error::ViewerError;
use crate::host::{LoadAck, PageHost, ScrollEvent, ScrollHost};
use crate::item::{BackTarget, ViewerItem, ViewerSession};
use crate::navigation::{NavigationAnimator, NavigationOutcome};
use crate::scale::{ScaleManager, ScaleOutcome};
use crate::state::{PagePosition, PageState, ViewerStatus};

/// What every media viewer offers its surrounding shell.
#[async_trait]
pub trait DocumentViewer: Send + Sync {
    /// Opens the current (or restored) item and fills the viewport.
    async fn load_file(&self) -> Result<(), ViewerError>;
    /// Tears the viewer down and says where to go next.
    async fn go_back(&self, can_pop: bool) -> BackTarget;
}

pub struct PdfViewer {
    controller: Arc<PaginationController>,
    scale: ScaleManager,
    navigation: NavigationAnimator,
    scroll: Arc<dyn ScrollHost>,
    session: ViewerSession,
    item: Mutex<Option<ViewerItem>>,
}

impl PdfViewer {
    pub fn new(
        engine: Arc<dyn DocumentEngine>,
        page_host: Arc<dyn PageHost>,
        scroll: Arc<dyn ScrollHost>,
        session: ViewerSession,
        config: &ViewerConfig,
    ) -> Self {
        let controller = Arc::new(PaginationController::new(engine, page_host, config));
        Self {
            scale: ScaleManager::new(Arc::clone(&controller), config.busy_policy)
                .with_max_scale(config.max_scale),
            navigation: NavigationAnimator::new(
                Arc::clone(&controller),
                Arc::clone(&scroll),
                config.scroll_duration,
                config.landing_offset,
            ),
            controller,
            scroll,
            session,
            item: Mutex::new(None),
        }
    }

    pub fn set_item(&self, item: ViewerItem) {
        *self.item.lock() = Some(item);
    }

    pub fn item(&self) -> Option<ViewerItem> {
        self.item.lock().clone()
    }

    pub fn page_state(&self) -> PageState {
        self.controller.page_state()
    }

    pub fn positions(&self) -> Vec<PagePosition> {
        self.controller.positions()
    }

    pub fn status(&self) -> ViewerStatus {
        self.controller.status()
    }

    pub async fn load_next(&self, ack: &dyn LoadAck) -> LoadOutcome {
        self.controller.load_next(ack).await
    }

    pub async fn increase_scale(&self) -> ScaleOutcome {
        self.scale.increase().await
    }

    pub async fn decrease_scale(&self) -> ScaleOutcome {
        self.scale.decrease().await
    }

    pub fn can_decrease_scale(&self) -> bool {
        self.scale.can_decrease_scale()
    }

    pub fn can_increase_scale(&self) -> bool {
        self.scale.can_increase_scale()
    }

    pub fn is_first_page(&self) -> bool {
        self.navigation.is_first_page()
    }

    pub fn is_last_page(&self) -> bool {
        self.navigation.is_last_page()
    }

    pub async fn go_to_next_page(&self) -> NavigationOutcome {
        self.navigation.go_to_next_page().await
    }

    pub async fn go_to_previous_page(&self) -> NavigationOutcome {
        self.navigation.go_to_previous_page().await
    }

    pub async fn go_to_page(&self, page_number: usize) -> NavigationOutcome {
        self.navigation.go_to(page_number).await
    }

    pub fn on_scroll(&self, event: ScrollEvent) -> Option<usize> {
        self.navigation.on_scroll(event)
    }

    /// Re-opens the last item after a failed load.
    pub async fn retry(&self) -> Result<(), ViewerError> {
        if self.item.lock().is_none() {
            return Err(ViewerError::MissingItem);
        }
        info!("retrying document load");
        self.load_file().await
    }

    pub fn close(&self) {
        self.controller.close();
    }

    /// Keeps `current` in sync with the scroll host until the returned
    /// subscription is dropped.
    pub fn track_scroll(self: &Arc<Self>) -> ScrollSubscription {
        let mut events = self.scroll.subscribe();
        let viewer: Weak<Self> = Arc::downgrade(self);
        let task = tokio::spawn(async move {
            while events.changed().await.is_ok() {
                let event = *events.borrow_and_update();
                let Some(viewer) = viewer.upgrade() else {
                    break;
                };
                if let Some(page) = viewer.on_scroll(event) {
                    debug!(page, scroll_top = event.scroll_top, "current page");
                }
            }
        });
        ScrollSubscription { task }
    }
}

#[async_trait]
impl DocumentViewer for PdfViewer {
    #[instrument(skip(self))]
    async fn load_file(&self) -> Result<(), ViewerError> {
        let given = self.item.lock().clone();
        let item = self
            .session
            .restore(given)
            .ok_or(ViewerError::MissingItem)?;
        self.set_item(item.clone());

        self.controller.open(&item.file_path).await?;
        let viewport_height = self.controller.host().viewport_height();
        let extra = self.controller.ensure_viewport_filled(viewport_height).await;
        debug!(extra, "viewport filled");
        Ok(())
    }

    async fn go_back(&self, can_pop: bool) -> BackTarget {
        self.close();
        self.session.back_target(can_pop)
    }
}

pub struct ScrollSubscription {
    task: JoinHandle<()>,
}

impl Drop for ScrollSubscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}
