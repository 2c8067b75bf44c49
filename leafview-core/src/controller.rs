use std::sync::Arc;

use tracing::{debug, error, info, instrument, warn};

use crate::config::ViewerConfig;
use crate::engine::{DocumentEngine, DocumentHandle};
use crate::error::ViewerError;
use crate::host::{LoadAck, PageHost};
use crate::renderer::{PageCanvas, PageRenderer};
use crate::scale::ScaleManager;
use crate::state::{Generation, PagePosition, PageState, SharedState, ViewerState, ViewerStatus};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LoadOutcome {
    Loaded(PagePosition),
    /// Nothing left to load.
    NoOp,
    /// The page is already being fetched by another request.
    InFlight,
    /// The session moved on while the page was loading.
    Stale,
    OutOfRange,
    Failed,
}

impl LoadOutcome {
    pub fn position(&self) -> Option<PagePosition> {
        match self {
            LoadOutcome::Loaded(position) => Some(*position),
            _ => None,
        }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self, LoadOutcome::Loaded(_))
    }
}

/// Decides which pages to load and in what order. The only writer of
/// `last_loaded` and `total`.
pub struct PaginationController {
    engine: Arc<dyn DocumentEngine>,
    host: Arc<dyn PageHost>,
    renderer: PageRenderer,
    state: SharedState,
    device_pixel_ratio: Option<f32>,
}

impl PaginationController {
    pub fn new(
        engine: Arc<dyn DocumentEngine>,
        host: Arc<dyn PageHost>,
        config: &ViewerConfig,
    ) -> Self {
        Self {
            engine,
            host,
            renderer: PageRenderer::new(),
            state: ViewerState::shared(config.initial_scale, config.scale_rate),
            device_pixel_ratio: config.device_pixel_ratio,
        }
    }

    pub(crate) fn state(&self) -> &SharedState {
        &self.state
    }

    pub fn host(&self) -> &Arc<dyn PageHost> {
        &self.host
    }

    pub fn page_state(&self) -> PageState {
        self.state.lock().page
    }

    pub fn positions(&self) -> Vec<PagePosition> {
        self.state.lock().tracker.iter().copied().collect()
    }

    pub fn status(&self) -> ViewerStatus {
        self.state.lock().status.clone()
    }

    #[instrument(skip(self))]
    pub async fn open(&self, uri: &str) -> Result<usize, ViewerError> {
        let generation = self.state.lock().begin_session();
        self.host.clear();

        let document = match self.engine.open(uri).await {
            Ok(document) => document,
            Err(err) => {
                error!(uri, error = %format!("{err:#}"), "failed to open document");
                let mut state = self.state.lock();
                if state.generation == generation {
                    state.refreshing = false;
                    state.status = ViewerStatus::Failed(format!("{err:#}"));
                }
                return Err(ViewerError::DocumentOpen {
                    uri: uri.to_owned(),
                    source: err,
                });
            }
        };

        let total = document.page_count();
        {
            let mut state = self.state.lock();
            if state.generation != generation {
                debug!(uri, "document open superseded");
                return Err(ViewerError::Superseded {
                    uri: uri.to_owned(),
                });
            }
            state.page.total = total;
            state.document = Some(document);
            if total == 0 {
                state.refreshing = false;
                state.status = ViewerStatus::Ready;
            }
        }
        info!(uri, pages = total, "document opened");

        if total == 0 {
            return Ok(0);
        }

        let outcome = self.load_page(1).await;
        let mut state = self.state.lock();
        if state.generation == generation {
            state.refreshing = false;
            state.status = match outcome {
                LoadOutcome::Loaded(_) => ViewerStatus::Ready,
                _ => ViewerStatus::Failed("first page could not be rendered".into()),
            };
        }
        Ok(total)
    }

    /// Tears the session down and releases the document handle.
    pub fn close(&self) {
        self.state.lock().end_session();
        self.host.clear();
    }

    /// Keeps loading pages while the loaded run, measured in first-page
    /// heights, still fits inside `viewport_height`.
    pub async fn ensure_viewport_filled(&self, viewport_height: f32) -> usize {
        let mut loaded = 0;
        loop {
            let (last_loaded, total, first_height) = {
                let state = self.state.lock();
                (
                    state.page.last_loaded,
                    state.page.total,
                    state.tracker.first().map(|position| position.height),
                )
            };
            let Some(first_height) = first_height else {
                break;
            };
            if last_loaded >= total || last_loaded as f32 * first_height > viewport_height {
                break;
            }
            match self.load_page(last_loaded + 1).await {
                LoadOutcome::Loaded(_) => loaded += 1,
                outcome => {
                    debug!(?outcome, "stopped filling the viewport");
                    break;
                }
            }
        }
        loaded
    }

    /// Scroll-triggered load of the page after the last one. `ack` is
    /// completed whatever happens so the host keeps requesting.
    pub async fn load_next(&self, ack: &dyn LoadAck) -> LoadOutcome {
        let (last_loaded, total) = {
            let state = self.state.lock();
            (state.page.last_loaded, state.page.total)
        };
        let outcome = if last_loaded >= total {
            LoadOutcome::NoOp
        } else {
            self.load_page(last_loaded + 1).await
        };
        ack.complete();
        outcome
    }

    /// Loads `page_number`, first loading any unloaded pages before it so
    /// positions are always registered in page order.
    pub async fn load_page(&self, page_number: usize) -> LoadOutcome {
        let (generation, first_missing) = {
            let state = self.state.lock();
            if let Some(position) = state.tracker.position_of(page_number) {
                return LoadOutcome::Loaded(*position);
            }
            (state.generation, state.page.last_loaded + 1)
        };

        let mut outcome = LoadOutcome::OutOfRange;
        for number in first_missing.min(page_number)..=page_number {
            outcome = self.load_one(generation, number).await;
            if !outcome.is_loaded() {
                break;
            }
        }
        outcome
    }

    /// Drops every measured position and re-renders pages `1..=current` at
    /// `new_scale`, one after another. Without an open document nothing
    /// changes and 0 is returned.
    #[instrument(skip(self))]
    pub async fn rescale(&self, new_scale: f32) -> usize {
        let (generation, target) = {
            let mut state = self.state.lock();
            if state.document.is_none() {
                debug!("no document to rescale");
                return 0;
            }
            state.page.scale = new_scale;
            state.page.altered_scale = true;
            state.page.last_loaded = 0;
            state.tracker.reset();
            state.in_flight.clear();
            state.refreshing = true;
            state.generation = state.generation.next();
            (state.generation, state.page.current.min(state.page.total))
        };
        self.host.clear();

        let mut reloaded = 0;
        for page_number in 1..=target {
            match self.load_one(generation, page_number).await {
                LoadOutcome::Loaded(_) => reloaded += 1,
                outcome => {
                    warn!(page = page_number, ?outcome, "rescale reload stopped early");
                    break;
                }
            }
        }

        let mut state = self.state.lock();
        if state.generation == generation {
            state.refreshing = false;
            // current never points past the rendered run
            state.page.current = state.page.current.min(state.page.last_loaded.max(1));
            if reloaded > 0 {
                state.status = ViewerStatus::Ready;
            } else if target > 0 {
                state.status = ViewerStatus::Failed("first page could not be rendered".into());
            }
        }
        info!(scale = new_scale, pages = reloaded, "rescaled document");
        reloaded
    }

    async fn load_one(&self, generation: Generation, page_number: usize) -> LoadOutcome {
        let (document, scale, altered_scale) = match self.reserve(generation, page_number) {
            Ok(Some(reserved)) => reserved,
            Ok(None) => return LoadOutcome::InFlight,
            Err(ViewerError::PageOutOfRange { page, total }) => {
                debug!(page, total, "page out of range");
                return LoadOutcome::OutOfRange;
            }
            Err(ViewerError::Superseded { .. }) => return LoadOutcome::Stale,
            Err(err) => {
                warn!(page = page_number, error = %err, "cannot load page");
                return LoadOutcome::Failed;
            }
        };

        let slot = self.host.insert_page(page_number);
        let drawn = self
            .draw(document.as_ref(), page_number, scale, altered_scale)
            .await;

        let mut state = self.state.lock();
        if state.generation != generation {
            drop(state);
            self.host.remove(slot);
            debug!(page = page_number, "discarding page from a previous generation");
            return LoadOutcome::Stale;
        }
        state.in_flight.remove(&page_number);

        let (canvas, fitted_scale) = match drawn {
            Ok(drawn) => drawn,
            Err(err) => {
                drop(state);
                self.host.remove(slot);
                warn!(page = page_number, error = %format!("{err:#}"), "page load failed");
                return LoadOutcome::Failed;
            }
        };

        let Some(bounds) = self.host.attach(slot, canvas) else {
            warn!(page = page_number, "page slot vanished before attach");
            return LoadOutcome::Failed;
        };
        let position = PagePosition::new(page_number, bounds.top, bounds.height);
        if !state.tracker.record_page(position) {
            drop(state);
            self.host.remove(slot);
            warn!(page = page_number, "measured position breaks page order");
            return LoadOutcome::Failed;
        }

        if let Some(scale) = fitted_scale {
            state.page.scale = scale;
        }
        state.page.last_loaded = state.page.last_loaded.max(page_number);
        debug!(
            page = page_number,
            top = position.top,
            bottom = position.bottom,
            "page loaded"
        );
        LoadOutcome::Loaded(position)
    }

    /// Claims `page_number` for loading. `Ok(None)` means another request
    /// already holds it.
    fn reserve(
        &self,
        generation: Generation,
        page_number: usize,
    ) -> Result<Option<(Arc<dyn DocumentHandle>, f32, bool)>, ViewerError> {
        let mut state = self.state.lock();
        if state.generation != generation {
            return Err(ViewerError::Superseded {
                uri: String::new(),
            });
        }
        let document = state.document.clone().ok_or(ViewerError::NoDocument)?;
        if page_number == 0 || page_number > state.page.total {
            return Err(ViewerError::PageOutOfRange {
                page: page_number,
                total: state.page.total,
            });
        }
        if !state.in_flight.insert(page_number) {
            return Ok(None);
        }
        Ok(Some((document, state.page.scale, state.page.altered_scale)))
    }

    async fn draw(
        &self,
        document: &dyn DocumentHandle,
        page_number: usize,
        scale: f32,
        altered_scale: bool,
    ) -> Result<(PageCanvas, Option<f32>), ViewerError> {
        let page = document
            .page(page_number)
            .await
            .map_err(|source| ViewerError::PageLoad {
                page: page_number,
                source,
            })?;

        let fitted_scale = if ScaleManager::should_auto_fit(page_number, altered_scale) {
            let unscaled = page.viewport(1.0);
            ScaleManager::fit_to_width(self.host.container_width(), unscaled.width)
        } else {
            None
        };
        let render_scale = fitted_scale.unwrap_or(scale);
        let ratio = self
            .device_pixel_ratio
            .unwrap_or_else(|| self.host.device_pixel_ratio());

        let canvas = self
            .renderer
            .render(page.as_ref(), page_number, render_scale, ratio)
            .await?;
        Ok((canvas, fitted_scale))
    }
}
