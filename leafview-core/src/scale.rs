use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::controller::PaginationController;
use crate::state::PageState;

/// Upper zoom bound unless configured otherwise.
pub const DEFAULT_MAX_SCALE: f32 = 5.0;

/// How the auto-scroll and refresh flags combine into "busy" for zooming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BusyPolicy {
    /// Busy while either an animation or a refresh is running.
    #[default]
    Either,
    /// Busy only while both are running at once.
    Both,
}

impl BusyPolicy {
    pub fn is_busy(self, auto_scrolling: bool, refreshing: bool) -> bool {
        match self {
            BusyPolicy::Either => auto_scrolling || refreshing,
            BusyPolicy::Both => auto_scrolling && refreshing,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleOutcome {
    Rescaled { pages: usize },
    Busy,
    /// Zooming out would reach a non-positive scale.
    AtMinimum,
    /// Zooming in would pass the configured maximum.
    AtMaximum,
    /// Nothing is open yet.
    NoDocument,
}

pub struct ScaleManager {
    controller: Arc<PaginationController>,
    policy: BusyPolicy,
    max_scale: f32,
}

impl ScaleManager {
    pub fn new(controller: Arc<PaginationController>, policy: BusyPolicy) -> Self {
        Self {
            controller,
            policy,
            max_scale: DEFAULT_MAX_SCALE,
        }
    }

    pub fn with_max_scale(mut self, max_scale: f32) -> Self {
        self.max_scale = max_scale;
        self
    }

    /// Auto-fit only ever applies to page 1 and never after a manual zoom.
    pub fn should_auto_fit(page_number: usize, altered_scale: bool) -> bool {
        page_number == 1 && !altered_scale
    }

    /// Scale at which a page `unscaled_width` wide fills the container.
    pub fn fit_to_width(container_width: f32, unscaled_width: f32) -> Option<f32> {
        let scale = container_width / unscaled_width;
        (container_width > 0.0 && unscaled_width > 0.0 && scale.is_finite()).then_some(scale)
    }

    pub fn can_decrease(state: &PageState) -> bool {
        state.scale - state.scale_rate > 0.0
    }

    pub fn can_decrease_scale(&self) -> bool {
        Self::can_decrease(&self.controller.page_state())
    }

    pub fn can_increase(state: &PageState, max_scale: f32) -> bool {
        state.scale + state.scale_rate <= max_scale + f32::EPSILON
    }

    pub fn can_increase_scale(&self) -> bool {
        Self::can_increase(&self.controller.page_state(), self.max_scale)
    }

    pub fn is_busy(&self) -> bool {
        let state = self.controller.state().lock();
        self.policy.is_busy(state.auto_scrolling, state.refreshing)
    }

    pub async fn increase(&self) -> ScaleOutcome {
        self.apply(1.0).await
    }

    pub async fn decrease(&self) -> ScaleOutcome {
        self.apply(-1.0).await
    }

    async fn apply(&self, direction: f32) -> ScaleOutcome {
        let target = {
            let mut state = self.controller.state().lock();
            if self.policy.is_busy(state.auto_scrolling, state.refreshing) {
                debug!("zoom ignored while busy");
                return ScaleOutcome::Busy;
            }
            if state.document.is_none() {
                return ScaleOutcome::NoDocument;
            }
            if direction < 0.0 && !Self::can_decrease(&state.page) {
                return ScaleOutcome::AtMinimum;
            }
            if direction > 0.0 && !Self::can_increase(&state.page, self.max_scale) {
                return ScaleOutcome::AtMaximum;
            }
            // set before the first await so a concurrent zoom observes it
            state.refreshing = true;
            state.page.scale + direction * state.page.scale_rate
        };
        let pages = self.controller.rescale(target).await;
        ScaleOutcome::Rescaled { pages }
    }
}
