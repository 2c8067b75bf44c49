//! In-memory engine and scroll host for unit tests.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{watch, Notify};

use crate::engine::{
    DocumentEngine, DocumentHandle, PageHandle, PageViewport, RasterSurface, TextContent, TextItem,
};
use crate::host::{ScrollEvent, ScrollHost};

#[derive(Default)]
struct Behaviour {
    fail_raster: BTreeSet<usize>,
    fail_text: BTreeSet<usize>,
    gates: HashMap<usize, Arc<Notify>>,
    rendered: Vec<(usize, f32)>,
}

pub(crate) struct FakeEngine {
    document: Arc<FakeDocument>,
    fail_open: AtomicBool,
}

impl FakeEngine {
    pub(crate) fn new(pages: usize, width: f32, height: f32) -> Self {
        Self {
            document: Arc::new(FakeDocument::new(pages, width, height)),
            fail_open: AtomicBool::new(false),
        }
    }

    pub(crate) fn fail_open(&self) {
        self.fail_open.store(true, Ordering::SeqCst);
    }

    pub(crate) fn document(&self) -> Arc<FakeDocument> {
        Arc::clone(&self.document)
    }
}

#[async_trait]
impl DocumentEngine for FakeEngine {
    async fn open(&self, uri: &str) -> Result<Arc<dyn DocumentHandle>> {
        tokio::task::yield_now().await;
        if self.fail_open.load(Ordering::SeqCst) {
            bail!("cannot open {uri}");
        }
        Ok(self.document.clone())
    }
}

pub(crate) struct FakeDocument {
    pages: usize,
    width: f32,
    height: f32,
    behaviour: Arc<Mutex<Behaviour>>,
}

impl FakeDocument {
    pub(crate) fn new(pages: usize, width: f32, height: f32) -> Self {
        Self {
            pages,
            width,
            height,
            behaviour: Arc::default(),
        }
    }

    pub(crate) fn fail_raster(&self, page_number: usize) {
        self.behaviour.lock().fail_raster.insert(page_number);
    }

    pub(crate) fn fail_text(&self, page_number: usize) {
        self.behaviour.lock().fail_text.insert(page_number);
    }

    pub(crate) fn heal(&self) {
        let mut behaviour = self.behaviour.lock();
        behaviour.fail_raster.clear();
        behaviour.fail_text.clear();
    }

    /// Holds the next render of `page_number` until the returned handle is
    /// notified.
    pub(crate) fn gate(&self, page_number: usize) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.behaviour
            .lock()
            .gates
            .insert(page_number, Arc::clone(&gate));
        gate
    }

    /// True until a render has picked up the gate for `page_number`.
    pub(crate) fn is_gated(&self, page_number: usize) -> bool {
        self.behaviour.lock().gates.contains_key(&page_number)
    }

    /// Successful renders as `(page, scale)`, oldest first.
    pub(crate) fn rendered(&self) -> Vec<(usize, f32)> {
        self.behaviour.lock().rendered.clone()
    }

    pub(crate) fn fake_page(&self, page_number: usize) -> FakePage {
        FakePage {
            number: page_number,
            width: self.width,
            height: self.height,
            behaviour: Arc::clone(&self.behaviour),
        }
    }
}

#[async_trait]
impl DocumentHandle for FakeDocument {
    fn page_count(&self) -> usize {
        self.pages
    }

    async fn page(&self, page_number: usize) -> Result<Arc<dyn PageHandle>> {
        if page_number == 0 || page_number > self.pages {
            bail!("page {page_number} does not exist");
        }
        Ok(Arc::new(self.fake_page(page_number)))
    }
}

pub(crate) struct FakePage {
    number: usize,
    width: f32,
    height: f32,
    behaviour: Arc<Mutex<Behaviour>>,
}

impl FakePage {
    pub(crate) fn new(number: usize, width: f32, height: f32) -> Self {
        Self {
            number,
            width,
            height,
            behaviour: Arc::default(),
        }
    }
}

#[async_trait]
impl PageHandle for FakePage {
    fn viewport(&self, scale: f32) -> PageViewport {
        PageViewport {
            width: self.width * scale,
            height: self.height * scale,
            scale,
        }
    }

    async fn render(&self, surface: &mut RasterSurface, viewport: &PageViewport) -> Result<()> {
        let gate = self.behaviour.lock().gates.remove(&self.number);
        if let Some(gate) = gate {
            gate.notified().await;
        }
        tokio::task::yield_now().await;

        let mut behaviour = self.behaviour.lock();
        if behaviour.fail_raster.contains(&self.number) {
            bail!("raster of page {} failed", self.number);
        }
        surface.pixels.fill(self.number as u8);
        behaviour.rendered.push((self.number, viewport.scale));
        Ok(())
    }

    async fn text_content(&self) -> Result<TextContent> {
        tokio::task::yield_now().await;
        if self.behaviour.lock().fail_text.contains(&self.number) {
            bail!("text of page {} failed", self.number);
        }
        Ok(TextContent {
            items: vec![TextItem {
                text: format!("page {}", self.number),
                x: 10.0,
                y: 10.0,
                width: 40.0,
                height: 12.0,
            }],
        })
    }
}

pub(crate) struct FakeScroll {
    sender: watch::Sender<ScrollEvent>,
    calls: Mutex<Vec<(f32, Duration)>>,
    fail_next: AtomicBool,
}

impl FakeScroll {
    pub(crate) fn new() -> Self {
        let (sender, _) = watch::channel(ScrollEvent::default());
        Self {
            sender,
            calls: Mutex::new(Vec::new()),
            fail_next: AtomicBool::new(false),
        }
    }

    /// Completed animations as `(target y, duration)`.
    pub(crate) fn calls(&self) -> Vec<(f32, Duration)> {
        self.calls.lock().clone()
    }

    pub(crate) fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    /// Simulates the user scrolling.
    pub(crate) fn emit(&self, scroll_top: f32) {
        self.sender.send_replace(ScrollEvent { scroll_top });
    }
}

#[async_trait]
impl ScrollHost for FakeScroll {
    async fn scroll_to(&self, _x: f32, y: f32, duration: Duration) -> Result<()> {
        tokio::task::yield_now().await;
        if self.fail_next.swap(false, Ordering::SeqCst) {
            bail!("scroll interrupted");
        }
        self.calls.lock().push((y, duration));
        self.sender.send_replace(ScrollEvent { scroll_top: y });
        Ok(())
    }

    fn subscribe(&self) -> watch::Receiver<ScrollEvent> {
        self.sender.subscribe()
    }
}
