use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use leafview_core::{ScrollEvent, ScrollHost};
use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::trace;

const FRAME: Duration = Duration::from_millis(16);

struct ScrollState {
    scroll_top: f32,
    content_height: f32,
    viewport_height: f32,
    /// Bumped by every scroll request; a running animation stops once it
    /// no longer owns the latest one.
    epoch: u64,
}

impl ScrollState {
    fn max_scroll(&self) -> f32 {
        (self.content_height - self.viewport_height).max(0.0)
    }

    fn clamp(&self, y: f32) -> f32 {
        y.clamp(0.0, self.max_scroll())
    }
}

type Measure = Box<dyn Fn() -> f32 + Send + Sync>;

/// Vertical scroll position of the terminal viewport.
pub struct TerminalScrollHost {
    state: Mutex<ScrollState>,
    sender: watch::Sender<ScrollEvent>,
    measure: Option<Measure>,
}

impl TerminalScrollHost {
    pub fn new(viewport_height: f32) -> Self {
        let (sender, _) = watch::channel(ScrollEvent::default());
        Self {
            state: Mutex::new(ScrollState {
                scroll_top: 0.0,
                content_height: 0.0,
                viewport_height,
                epoch: 0,
            }),
            sender,
            measure: None,
        }
    }

    /// Reads the content height from `measure` before every scroll instead of
    /// relying on `set_content_height`.
    pub fn with_content_measure(mut self, measure: impl Fn() -> f32 + Send + Sync + 'static) -> Self {
        self.measure = Some(Box::new(measure));
        self
    }

    pub fn scroll_top(&self) -> f32 {
        self.state.lock().scroll_top
    }

    pub fn viewport_height(&self) -> f32 {
        self.state.lock().viewport_height
    }

    pub fn set_content_height(&self, content_height: f32) {
        self.state.lock().content_height = content_height.max(0.0);
    }

    pub fn set_viewport_height(&self, viewport_height: f32) {
        self.state.lock().viewport_height = viewport_height.max(0.0);
    }

    /// Immediate user scroll. Cancels any running animation.
    pub fn scroll_by(&self, delta: f32) -> f32 {
        self.refresh_content();
        let top = {
            let mut state = self.state.lock();
            state.epoch += 1;
            state.scroll_top = state.clamp(state.scroll_top + delta);
            state.scroll_top
        };
        self.sender.send_replace(ScrollEvent { scroll_top: top });
        top
    }

    fn refresh_content(&self) {
        if let Some(measure) = &self.measure {
            let content_height = measure();
            self.set_content_height(content_height);
        }
    }

    fn step(&self, epoch: u64, top: f32) -> bool {
        let mut state = self.state.lock();
        if state.epoch != epoch {
            return false;
        }
        state.scroll_top = top;
        drop(state);
        self.sender.send_replace(ScrollEvent { scroll_top: top });
        true
    }
}

fn ease_in_out(t: f32) -> f32 {
    if t < 0.5 {
        4.0 * t * t * t
    } else {
        1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
    }
}

#[async_trait]
impl ScrollHost for TerminalScrollHost {
    async fn scroll_to(&self, _x: f32, y: f32, duration: Duration) -> Result<()> {
        self.refresh_content();
        let (epoch, from, to) = {
            let mut state = self.state.lock();
            state.epoch += 1;
            (state.epoch, state.scroll_top, state.clamp(y))
        };

        let frames = (duration.as_millis() / FRAME.as_millis()).max(1) as u32;
        for frame in 1..=frames {
            if frames > 1 {
                tokio::time::sleep(FRAME).await;
            }
            let t = frame as f32 / frames as f32;
            let top = from + (to - from) * ease_in_out(t);
            if !self.step(epoch, top) {
                bail!("scroll animation interrupted");
            }
        }
        trace!(from, to, frames, "scroll animation finished");
        Ok(())
    }

    fn subscribe(&self) -> watch::Receiver<ScrollEvent> {
        self.sender.subscribe()
    }
}
