use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::renderer::PageCanvas;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId(pub u64);

/// Layout of an attached page as measured by the host.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageBounds {
    pub top: f32,
    pub height: f32,
}

/// The container rendered pages are inserted into.
///
/// Slots appear in insertion order. A slot stays in place until it is
/// removed or the container is cleared.
pub trait PageHost: Send + Sync {
    fn container_width(&self) -> f32;
    fn viewport_height(&self) -> f32;
    fn device_pixel_ratio(&self) -> f32;
    fn insert_page(&self, page_number: usize) -> SlotId;
    /// Fills the slot and returns its measured layout, or `None` when the slot
    /// no longer exists.
    fn attach(&self, slot: SlotId, canvas: PageCanvas) -> Option<PageBounds>;
    fn remove(&self, slot: SlotId);
    fn clear(&self);
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScrollEvent {
    pub scroll_top: f32,
}

/// The scrolling surface hosting the page container.
#[async_trait]
pub trait ScrollHost: Send + Sync {
    /// Resolves once the animation has finished.
    async fn scroll_to(&self, x: f32, y: f32, duration: Duration) -> Result<()>;
    fn subscribe(&self) -> watch::Receiver<ScrollEvent>;
}

/// Acknowledgement for a host-initiated load request.
pub trait LoadAck: Send + Sync {
    fn complete(&self);
}

impl<F> LoadAck for F
where
    F: Fn() + Send + Sync,
{
    fn complete(&self) {
        self()
    }
}

/// Requests the next page when the scroll position nears the end of the
/// loaded content. After a request the trigger stays quiet until the issued
/// ticket is completed.
#[derive(Debug)]
pub struct InfiniteLoadTrigger {
    threshold: f32,
    armed: Arc<AtomicBool>,
}

impl InfiniteLoadTrigger {
    pub fn new(threshold: f32) -> Self {
        Self {
            threshold: threshold.max(0.0),
            armed: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn poll(
        &self,
        scroll_top: f32,
        viewport_height: f32,
        content_bottom: f32,
    ) -> Option<LoadTicket> {
        if scroll_top + viewport_height + self.threshold < content_bottom {
            return None;
        }
        if self.armed.swap(false, Ordering::AcqRel) {
            Some(LoadTicket {
                armed: Arc::clone(&self.armed),
            })
        } else {
            None
        }
    }

    pub fn is_waiting(&self) -> bool {
        !self.armed.load(Ordering::Acquire)
    }
}

#[derive(Debug)]
pub struct LoadTicket {
    armed: Arc<AtomicBool>,
}

impl LoadAck for LoadTicket {
    fn complete(&self) {
        self.armed.store(true, Ordering::Release);
    }
}
