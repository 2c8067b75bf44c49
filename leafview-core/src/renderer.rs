use tracing::{instrument, warn};

use crate::engine::{PageHandle, PageViewport, RasterSurface, TextContent};
use crate::error::ViewerError;

/// Selectable text positioned over the raster, in CSS pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct TextSpan {
    pub text: String,
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextLayer {
    spans: Vec<TextSpan>,
}

impl TextLayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.spans.clear();
    }

    /// Lays the text content out for `viewport` so each span covers the
    /// glyphs it was extracted from.
    pub fn render(&mut self, content: &TextContent, viewport: &PageViewport) {
        let scale = viewport.scale;
        self.spans.extend(
            content
                .items
                .iter()
                .filter(|item| !item.text.trim().is_empty())
                .map(|item| TextSpan {
                    text: item.text.clone(),
                    left: item.x * scale,
                    top: item.y * scale,
                    width: item.width * scale,
                    height: item.height * scale,
                }),
        );
    }

    pub fn spans(&self) -> &[TextSpan] {
        &self.spans
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    pub fn text(&self) -> String {
        self.spans
            .iter()
            .map(|span| span.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// A fully drawn page ready to be attached to the page host.
#[derive(Debug, Clone, PartialEq)]
pub struct PageCanvas {
    pub page_number: usize,
    pub viewport: PageViewport,
    pub surface: RasterSurface,
    pub text_layer: TextLayer,
}

impl PageCanvas {
    pub fn css_height(&self) -> f32 {
        self.surface.css_height
    }

    pub fn css_width(&self) -> f32 {
        self.surface.css_width
    }
}

/// Sizes a drawing surface for `viewport`. On dense displays the backing
/// store is multiplied by the pixel ratio while the on-screen size stays
/// logical, and the drawing context is scaled to match.
pub fn prepare_surface(viewport: &PageViewport, device_pixel_ratio: f32) -> RasterSurface {
    let mut surface = RasterSurface::new(to_pixels(viewport.width), to_pixels(viewport.height));
    surface.image_smoothing = false;

    if device_pixel_ratio > 1.0 {
        let css_width = surface.width as f32;
        let css_height = surface.height as f32;
        surface.resize(
            to_pixels(css_width * device_pixel_ratio),
            to_pixels(css_height * device_pixel_ratio),
        );
        surface.set_css_size(css_width, css_height);
        surface.scale_context(device_pixel_ratio);
    }

    surface
}

fn to_pixels(value: f32) -> u32 {
    if value.is_finite() && value > 0.0 {
        value.floor().min(u32::MAX as f32) as u32
    } else {
        0
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PageRenderer;

impl PageRenderer {
    pub fn new() -> Self {
        Self
    }

    #[instrument(skip(self, page))]
    pub async fn render(
        &self,
        page: &dyn PageHandle,
        page_number: usize,
        scale: f32,
        device_pixel_ratio: f32,
    ) -> Result<PageCanvas, ViewerError> {
        let viewport = page.viewport(scale);
        let mut surface = prepare_surface(&viewport, device_pixel_ratio);

        if let Err(err) = page.render(&mut surface, &viewport).await {
            warn!(page = page_number, error = %format!("{err:#}"), "page raster failed");
            return Err(ViewerError::PageLoad {
                page: page_number,
                source: err,
            });
        }

        let content = match page.text_content().await {
            Ok(content) => content,
            Err(err) => {
                warn!(page = page_number, error = %format!("{err:#}"), "text content request failed");
                return Err(ViewerError::PageLoad {
                    page: page_number,
                    source: err,
                });
            }
        };

        let mut text_layer = TextLayer::new();
        text_layer.render(&content, &viewport);

        Ok(PageCanvas {
            page_number,
            viewport,
            surface,
            text_layer,
        })
    }
}
