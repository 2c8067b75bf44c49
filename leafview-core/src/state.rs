use std::collections::BTreeSet;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::engine::DocumentHandle;
use crate::tracker::ViewportTracker;

pub const DEFAULT_SCALE_RATE: f32 = 0.25;

/// Paging state of one open document.
///
/// `last_loaded` counts the pages rendered into the container so far; it is
/// zero until page 1 lands and is reset by a rescale before the reload runs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PageState {
    pub current: usize,
    pub last_loaded: usize,
    pub total: usize,
    pub scale: f32,
    pub scale_rate: f32,
    pub altered_scale: bool,
}

impl PageState {
    pub fn new(scale: f32, scale_rate: f32) -> Self {
        Self {
            current: 1,
            last_loaded: 0,
            total: 0,
            scale,
            scale_rate,
            altered_scale: false,
        }
    }
}

impl Default for PageState {
    fn default() -> Self {
        Self::new(1.0, DEFAULT_SCALE_RATE)
    }
}

/// Measured vertical interval of a rendered page inside the scroll container.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PagePosition {
    pub page_number: usize,
    pub top: f32,
    pub bottom: f32,
    pub height: f32,
}

impl PagePosition {
    pub fn new(page_number: usize, top: f32, height: f32) -> Self {
        Self {
            page_number,
            top,
            bottom: top + height,
            height,
        }
    }

    pub fn contains(&self, offset: f32) -> bool {
        offset >= self.top && offset <= self.bottom
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum ViewerStatus {
    #[default]
    Idle,
    Loading,
    Ready,
    Failed(String),
}

impl ViewerStatus {
    pub fn is_failed(&self) -> bool {
        matches!(self, ViewerStatus::Failed(_))
    }
}

/// Session generation. Bumped whenever previously issued loads must no longer
/// touch the page list (document switch, rescale, close).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Generation(u64);

impl Generation {
    pub fn next(self) -> Self {
        Generation(self.0.wrapping_add(1))
    }
}

pub(crate) type SharedState = Arc<Mutex<ViewerState>>;

pub(crate) struct ViewerState {
    pub page: PageState,
    pub tracker: ViewportTracker,
    pub generation: Generation,
    pub auto_scrolling: bool,
    pub refreshing: bool,
    pub status: ViewerStatus,
    pub document: Option<Arc<dyn DocumentHandle>>,
    pub in_flight: BTreeSet<usize>,
    initial_scale: f32,
}

impl ViewerState {
    pub fn new(initial_scale: f32, scale_rate: f32) -> Self {
        Self {
            page: PageState::new(initial_scale, scale_rate),
            tracker: ViewportTracker::new(),
            generation: Generation::default(),
            auto_scrolling: false,
            refreshing: false,
            status: ViewerStatus::Idle,
            document: None,
            in_flight: BTreeSet::new(),
            initial_scale,
        }
    }

    pub fn shared(initial_scale: f32, scale_rate: f32) -> SharedState {
        Arc::new(Mutex::new(Self::new(initial_scale, scale_rate)))
    }

    /// Drops everything tied to the previous document and returns the
    /// generation the new session runs under. The session counts as
    /// refreshing until its first page settles.
    pub fn begin_session(&mut self) -> Generation {
        let scale_rate = self.page.scale_rate;
        self.page = PageState::new(self.initial_scale, scale_rate);
        self.tracker.reset();
        self.document = None;
        self.in_flight.clear();
        self.refreshing = true;
        self.status = ViewerStatus::Loading;
        self.generation = self.generation.next();
        self.generation
    }

    pub fn end_session(&mut self) {
        self.begin_session();
        self.refreshing = false;
        self.status = ViewerStatus::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_interval_is_inclusive() {
        let position = PagePosition::new(2, 100.0, 50.0);
        assert_eq!(position.bottom, 150.0);
        assert!(position.contains(100.0));
        assert!(position.contains(150.0));
        assert!(!position.contains(150.5));
        assert!(!position.contains(99.9));
    }

    #[test]
    fn begin_session_resets_paging_but_keeps_scale_rate() {
        let mut state = ViewerState::new(1.0, 0.5);
        state.page.total = 9;
        state.page.current = 4;
        state.page.last_loaded = 5;
        state.page.scale = 3.0;
        state.page.altered_scale = true;
        state.tracker.record_page(PagePosition::new(1, 0.0, 10.0));
        state.in_flight.insert(6);
        let before = state.generation;

        let generation = state.begin_session();

        assert_ne!(generation, before);
        assert_eq!(state.page, PageState::new(1.0, 0.5));
        assert!(state.tracker.is_empty());
        assert!(state.in_flight.is_empty());
        assert!(state.refreshing);
        assert_eq!(state.status, ViewerStatus::Loading);

        state.end_session();
        assert!(!state.refreshing);
        assert_eq!(state.status, ViewerStatus::Idle);
    }
}
