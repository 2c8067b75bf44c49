use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

/// Page dimensions at a given scale, in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageViewport {
    pub width: f32,
    pub height: f32,
    pub scale: f32,
}

/// A run of text in unscaled page units, origin at the top-left corner.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TextItem {
    pub text: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TextContent {
    pub items: Vec<TextItem>,
}

/// Drawing target handed to the engine.
///
/// `width`/`height` are the backing resolution; `css_width`/`css_height` the
/// size the page occupies on screen. `transform_scale` is the factor the
/// engine must apply on top of the viewport scale when rasterizing.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterSurface {
    pub width: u32,
    pub height: u32,
    pub css_width: f32,
    pub css_height: f32,
    pub transform_scale: f32,
    pub image_smoothing: bool,
    pub pixels: Vec<u8>,
}

impl RasterSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            css_width: width as f32,
            css_height: height as f32,
            transform_scale: 1.0,
            image_smoothing: true,
            pixels: vec![0; buffer_len(width, height)],
        }
    }

    /// Changes the backing resolution. Clears the pixels and the CSS size
    /// follows the new resolution, like a canvas element.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.css_width = width as f32;
        self.css_height = height as f32;
        self.pixels = vec![0; buffer_len(width, height)];
    }

    pub fn set_css_size(&mut self, width: f32, height: f32) {
        self.css_width = width;
        self.css_height = height;
    }

    pub fn scale_context(&mut self, factor: f32) {
        self.transform_scale *= factor;
    }

    pub fn stride(&self) -> usize {
        self.width as usize * 4
    }
}

fn buffer_len(width: u32, height: u32) -> usize {
    width as usize * height as usize * 4
}

/// Port to the external document rendering engine.
#[async_trait]
pub trait DocumentEngine: Send + Sync {
    async fn open(&self, uri: &str) -> Result<Arc<dyn DocumentHandle>>;
}

#[async_trait]
pub trait DocumentHandle: Send + Sync {
    fn page_count(&self) -> usize;
    /// `page_number` is 1-based.
    async fn page(&self, page_number: usize) -> Result<Arc<dyn PageHandle>>;
}

#[async_trait]
pub trait PageHandle: Send + Sync {
    fn viewport(&self, scale: f32) -> PageViewport;
    async fn render(&self, surface: &mut RasterSurface, viewport: &PageViewport) -> Result<()>;
    async fn text_content(&self) -> Result<TextContent>;
}
