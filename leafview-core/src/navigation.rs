use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, instrument, warn};

use crate::controller::{LoadOutcome, PaginationController};
use crate::host::{ScrollEvent, ScrollHost};
use crate::state::SharedState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationOutcome {
    Scrolled { page: usize },
    /// Another animation is still running.
    Busy,
    OutOfRange,
    /// The target page could not be loaded.
    Unavailable,
    /// The host rejected or aborted the scroll.
    Interrupted,
}

/// Clears the auto-scroll flag on every exit path of a navigation.
struct AutoScrollGuard {
    state: SharedState,
}

impl Drop for AutoScrollGuard {
    fn drop(&mut self) {
        self.state.lock().auto_scrolling = false;
    }
}

pub struct NavigationAnimator {
    controller: Arc<PaginationController>,
    scroll: Arc<dyn ScrollHost>,
    duration: Duration,
    landing_offset: f32,
}

impl NavigationAnimator {
    pub fn new(
        controller: Arc<PaginationController>,
        scroll: Arc<dyn ScrollHost>,
        duration: Duration,
        landing_offset: f32,
    ) -> Self {
        Self {
            controller,
            scroll,
            duration,
            landing_offset,
        }
    }

    pub fn is_first_page(&self) -> bool {
        self.controller.page_state().current == 1
    }

    pub fn is_last_page(&self) -> bool {
        let state = self.controller.page_state();
        state.current >= state.total
    }

    pub fn is_auto_scrolling(&self) -> bool {
        self.controller.state().lock().auto_scrolling
    }

    pub async fn go_to_next_page(&self) -> NavigationOutcome {
        if self.is_last_page() {
            return NavigationOutcome::OutOfRange;
        }
        let target = self.controller.page_state().current + 1;
        self.go_to(target).await
    }

    pub async fn go_to_previous_page(&self) -> NavigationOutcome {
        if self.is_first_page() {
            return NavigationOutcome::OutOfRange;
        }
        let target = self.controller.page_state().current.saturating_sub(1);
        self.go_to(target).await
    }

    #[instrument(skip(self))]
    pub async fn go_to(&self, target: usize) -> NavigationOutcome {
        let state = Arc::clone(self.controller.state());
        let known = {
            let mut state = state.lock();
            if state.auto_scrolling {
                debug!("navigation already in flight");
                return NavigationOutcome::Busy;
            }
            if target < 1 || target > state.page.total {
                return NavigationOutcome::OutOfRange;
            }
            state.auto_scrolling = true;
            state.tracker.position_of(target).copied()
        };
        let _guard = AutoScrollGuard { state };

        let position = match known {
            Some(position) => position,
            None => match self.controller.load_page(target).await {
                LoadOutcome::Loaded(position) => position,
                outcome => {
                    warn!(page = target, ?outcome, "navigation target could not be loaded");
                    return NavigationOutcome::Unavailable;
                }
            },
        };

        let offset = position.top + self.landing_offset;
        match self.scroll.scroll_to(0.0, offset, self.duration).await {
            Ok(()) => NavigationOutcome::Scrolled { page: target },
            Err(err) => {
                warn!(page = target, error = %format!("{err:#}"), "scroll animation failed");
                NavigationOutcome::Interrupted
            }
        }
    }

    /// Follows the scroll position, whoever moved it. Offsets that fall
    /// outside every measured page leave `current` alone.
    pub fn on_scroll(&self, event: ScrollEvent) -> Option<usize> {
        let mut state = self.controller.state().lock();
        let page = state.tracker.page_at(event.scroll_top)?.page_number;
        state.page.current = page;
        Some(page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ViewerConfig;
    use crate::layout::StackedLayout;
    use crate::testing::{FakeEngine, FakeScroll};

    async fn animator(pages: usize) -> (NavigationAnimator, Arc<FakeScroll>) {
        let engine = Arc::new(FakeEngine::new(pages, 400.0, 500.0));
        let layout = Arc::new(StackedLayout::new(800.0, 600.0));
        let controller = Arc::new(PaginationController::new(
            engine,
            layout,
            &ViewerConfig::default(),
        ));
        controller.open("memory://doc.pdf").await.unwrap();
        let scroll = Arc::new(FakeScroll::new());
        let animator = NavigationAnimator::new(
            controller,
            scroll.clone(),
            Duration::from_millis(3000),
            10.0,
        );
        (animator, scroll)
    }

    #[tokio::test]
    async fn first_and_last_page_checks() {
        let (animator, _scroll) = animator(3).await;
        assert!(animator.is_first_page());
        assert!(!animator.is_last_page());

        animator.controller.state().lock().page.current = 3;
        assert!(!animator.is_first_page());
        assert!(animator.is_last_page());
    }

    #[tokio::test]
    async fn next_page_loads_target_then_scrolls() {
        let (animator, scroll) = animator(3).await;

        let outcome = animator.go_to_next_page().await;

        assert_eq!(outcome, NavigationOutcome::Scrolled { page: 2 });
        assert_eq!(scroll.calls(), vec![(1010.0, Duration::from_millis(3000))]);
        assert_eq!(animator.controller.page_state().last_loaded, 2);
        assert!(!animator.is_auto_scrolling());
    }

    #[tokio::test]
    async fn double_next_page_scrolls_once() {
        let (animator, scroll) = animator(3).await;
        animator.controller.load_page(2).await;

        let (first, second) = tokio::join!(animator.go_to_next_page(), animator.go_to_next_page());

        assert_eq!(first, NavigationOutcome::Scrolled { page: 2 });
        assert_eq!(second, NavigationOutcome::Busy);
        assert_eq!(scroll.calls().len(), 1);
    }

    #[tokio::test]
    async fn double_next_page_scrolls_once_while_target_loads() {
        let (animator, scroll) = animator(3).await;

        let (first, second) = tokio::join!(animator.go_to_next_page(), animator.go_to_next_page());

        assert_eq!(first, NavigationOutcome::Scrolled { page: 2 });
        assert_eq!(second, NavigationOutcome::Busy);
        assert_eq!(scroll.calls().len(), 1);
    }

    #[tokio::test]
    async fn failed_scroll_clears_flag() {
        let (animator, scroll) = animator(3).await;
        scroll.fail_next();

        assert_eq!(
            animator.go_to_next_page().await,
            NavigationOutcome::Interrupted
        );
        assert!(!animator.is_auto_scrolling());
        assert_eq!(
            animator.go_to_next_page().await,
            NavigationOutcome::Scrolled { page: 2 }
        );
    }

    #[tokio::test]
    async fn unloadable_target_clears_flag() {
        let engine = Arc::new(FakeEngine::new(3, 400.0, 500.0));
        engine.document().fail_raster(2);
        let layout = Arc::new(StackedLayout::new(800.0, 600.0));
        let controller = Arc::new(PaginationController::new(
            engine,
            layout,
            &ViewerConfig::default(),
        ));
        controller.open("memory://doc.pdf").await.unwrap();
        let scroll = Arc::new(FakeScroll::new());
        let animator =
            NavigationAnimator::new(controller, scroll.clone(), Duration::ZERO, 10.0);

        assert_eq!(
            animator.go_to_next_page().await,
            NavigationOutcome::Unavailable
        );
        assert!(!animator.is_auto_scrolling());
        assert!(scroll.calls().is_empty());
    }

    #[tokio::test]
    async fn out_of_range_targets_are_ignored() {
        let (animator, scroll) = animator(3).await;
        assert_eq!(animator.go_to_previous_page().await, NavigationOutcome::OutOfRange);
        assert_eq!(animator.go_to(0).await, NavigationOutcome::OutOfRange);
        assert_eq!(animator.go_to(4).await, NavigationOutcome::OutOfRange);
        assert!(scroll.calls().is_empty());
    }

    #[tokio::test]
    async fn previous_page_scrolls_to_known_position() {
        let (animator, scroll) = animator(3).await;
        animator.controller.load_page(3).await;
        animator.on_scroll(ScrollEvent { scroll_top: 2500.0 });
        assert_eq!(animator.controller.page_state().current, 3);

        let outcome = animator.go_to_previous_page().await;

        assert_eq!(outcome, NavigationOutcome::Scrolled { page: 2 });
        assert_eq!(scroll.calls()[0].0, 1010.0);
    }

    #[tokio::test]
    async fn scroll_outside_measured_pages_keeps_current() {
        let (animator, _scroll) = animator(3).await;
        assert_eq!(animator.on_scroll(ScrollEvent { scroll_top: 500.0 }), Some(1));
        assert_eq!(animator.on_scroll(ScrollEvent { scroll_top: 5000.0 }), None);
        assert_eq!(animator.controller.page_state().current, 1);
    }
}
