use parking_lot::Mutex;

use crate::host::{PageBounds, PageHost, SlotId};
use crate::renderer::PageCanvas;

/// In-memory page container that stacks pages vertically.
///
/// Empty slots take no space until a canvas is attached; every attached page
/// is followed by `page_gap` pixels.
pub struct StackedLayout {
    inner: Mutex<LayoutInner>,
}

struct LayoutInner {
    container_width: f32,
    viewport_height: f32,
    device_pixel_ratio: f32,
    page_gap: f32,
    next_slot: u64,
    slots: Vec<Slot>,
}

struct Slot {
    id: SlotId,
    page_number: usize,
    canvas: Option<PageCanvas>,
}

impl LayoutInner {
    fn top_of(&self, index: usize) -> f32 {
        self.slots[..index]
            .iter()
            .filter_map(|slot| slot.canvas.as_ref())
            .map(|canvas| canvas.css_height() + self.page_gap)
            .sum()
    }
}

impl StackedLayout {
    pub fn new(container_width: f32, viewport_height: f32) -> Self {
        Self {
            inner: Mutex::new(LayoutInner {
                container_width,
                viewport_height,
                device_pixel_ratio: 1.0,
                page_gap: 0.0,
                next_slot: 0,
                slots: Vec::new(),
            }),
        }
    }

    pub fn with_page_gap(self, page_gap: f32) -> Self {
        self.inner.lock().page_gap = page_gap.max(0.0);
        self
    }

    pub fn with_device_pixel_ratio(self, ratio: f32) -> Self {
        self.inner.lock().device_pixel_ratio = ratio;
        self
    }

    pub fn resize(&self, container_width: f32, viewport_height: f32) {
        let mut inner = self.inner.lock();
        inner.container_width = container_width;
        inner.viewport_height = viewport_height;
    }

    pub fn content_height(&self) -> f32 {
        let inner = self.inner.lock();
        inner.top_of(inner.slots.len())
    }

    /// Page numbers of the slots in container order, attached or not.
    pub fn page_numbers(&self) -> Vec<usize> {
        self.inner
            .lock()
            .slots
            .iter()
            .map(|slot| slot.page_number)
            .collect()
    }

    pub fn with_page<R>(&self, page_number: usize, f: impl FnOnce(&PageCanvas) -> R) -> Option<R> {
        let inner = self.inner.lock();
        inner
            .slots
            .iter()
            .filter_map(|slot| slot.canvas.as_ref())
            .find(|canvas| canvas.page_number == page_number)
            .map(f)
    }
}

impl PageHost for StackedLayout {
    fn container_width(&self) -> f32 {
        self.inner.lock().container_width
    }

    fn viewport_height(&self) -> f32 {
        self.inner.lock().viewport_height
    }

    fn device_pixel_ratio(&self) -> f32 {
        self.inner.lock().device_pixel_ratio
    }

    fn insert_page(&self, page_number: usize) -> SlotId {
        let mut inner = self.inner.lock();
        let id = SlotId(inner.next_slot);
        inner.next_slot += 1;
        inner.slots.push(Slot {
            id,
            page_number,
            canvas: None,
        });
        id
    }

    fn attach(&self, slot: SlotId, canvas: PageCanvas) -> Option<PageBounds> {
        let mut inner = self.inner.lock();
        let index = inner.slots.iter().position(|entry| entry.id == slot)?;
        let height = canvas.css_height();
        inner.slots[index].canvas = Some(canvas);
        Some(PageBounds {
            top: inner.top_of(index),
            height,
        })
    }

    fn remove(&self, slot: SlotId) {
        self.inner.lock().slots.retain(|entry| entry.id != slot);
    }

    fn clear(&self) {
        self.inner.lock().slots.clear();
    }
}
