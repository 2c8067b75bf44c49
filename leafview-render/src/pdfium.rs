use std::convert::TryFrom;
use std::mem;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use image::{imageops, RgbaImage};
use leafview_core::{
    DocumentEngine, DocumentHandle, PageHandle, PageViewport, RasterSurface, TextContent,
};
use parking_lot::Mutex;
use pdfium_render::prelude::*;
use tracing::{debug, info, instrument, warn};

use crate::text::{group_glyphs, Glyph};
use crate::uri::resolve_uri;

pub const PDFIUM_PATH_ENV: &str = "LEAFVIEW_PDFIUM_PATH";

pub struct PdfiumEngine {
    pdfium: Arc<Pdfium>,
}

impl PdfiumEngine {
    pub fn new() -> Result<Self> {
        let pdfium = match bind_pdfium_from_env() {
            Some(pdfium) => pdfium,
            None => bind_pdfium_default()?,
        };
        Ok(Self {
            pdfium: Arc::new(pdfium),
        })
    }
}

#[async_trait]
impl DocumentEngine for PdfiumEngine {
    #[instrument(skip(self))]
    async fn open(&self, uri: &str) -> Result<Arc<dyn DocumentHandle>> {
        let path = resolve_uri(uri)?;
        let cell = DocumentCell::open(Arc::clone(&self.pdfium), path)?;
        let page_count = cell.with_document(|document| {
            Ok(usize::try_from(document.pages().len()).unwrap_or_default())
        })?;
        info!(path = %cell.path.display(), pages = page_count, "pdf opened");
        Ok(Arc::new(PdfiumDocument {
            cell: Arc::new(cell),
            page_count,
        }))
    }
}

/// Owns an open pdfium document. `document` is declared before `_pdfium` so
/// it drops first.
struct DocumentCell {
    document: Mutex<PdfDocument<'static>>,
    path: PathBuf,
    _pdfium: Arc<Pdfium>,
}

impl DocumentCell {
    fn open(pdfium: Arc<Pdfium>, path: PathBuf) -> Result<Self> {
        let document = load_static(&pdfium, &path)?;
        Ok(Self {
            document: Mutex::new(document),
            path,
            _pdfium: pdfium,
        })
    }

    fn with_document<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&PdfDocument<'static>) -> Result<R>,
    {
        let document = self.document.lock();
        f(&document)
    }

    fn with_page<R, F>(&self, page_number: usize, f: F) -> Result<R>
    where
        F: FnOnce(&PdfPage<'_>) -> Result<R>,
    {
        self.with_document(|document| {
            let index = page_index(page_number)?;
            let page = document
                .pages()
                .get(index)
                .with_context(|| format!("page {} out of range", page_number))?;
            f(&page)
        })
    }
}

fn load_static(pdfium: &Pdfium, path: &Path) -> Result<PdfDocument<'static>> {
    let document = pdfium
        .load_pdf_from_file(path, None)
        .with_context(|| format!("failed to open {:?}", path))?;
    // SAFETY: the document borrows the bindings owned by the `Pdfium` behind the
    // cell's `Arc`. The cell keeps that `Arc` alive and drops the document
    // first, so the borrow never outlives the bindings.
    let document = unsafe { mem::transmute::<PdfDocument<'_>, PdfDocument<'static>>(document) };
    Ok(document)
}

fn page_index(page_number: usize) -> Result<PdfPageIndex> {
    page_number
        .checked_sub(1)
        .and_then(|index| PdfPageIndex::try_from(index).ok())
        .ok_or_else(|| anyhow!("page {} is out of supported range", page_number))
}

struct PdfiumDocument {
    cell: Arc<DocumentCell>,
    page_count: usize,
}

#[async_trait]
impl DocumentHandle for PdfiumDocument {
    fn page_count(&self) -> usize {
        self.page_count
    }

    async fn page(&self, page_number: usize) -> Result<Arc<dyn PageHandle>> {
        let (width, height) = self
            .cell
            .with_page(page_number, |page| Ok((page.width().value, page.height().value)))?;
        Ok(Arc::new(PdfiumPage {
            cell: Arc::clone(&self.cell),
            page_number,
            width,
            height,
        }))
    }
}

/// A page measured in PDF points, which map 1:1 to CSS pixels at scale 1.
struct PdfiumPage {
    cell: Arc<DocumentCell>,
    page_number: usize,
    width: f32,
    height: f32,
}

#[async_trait]
impl PageHandle for PdfiumPage {
    fn viewport(&self, scale: f32) -> PageViewport {
        PageViewport {
            width: self.width * scale,
            height: self.height * scale,
            scale,
        }
    }

    #[instrument(skip(self, surface, viewport), fields(page = self.page_number))]
    async fn render(&self, surface: &mut RasterSurface, viewport: &PageViewport) -> Result<()> {
        let factor = viewport.scale * surface.transform_scale;
        let rendered = self.cell.with_page(self.page_number, |page| {
            let config = PdfRenderConfig::new().scale_page_by_factor(factor.max(0.1));
            let bitmap = page
                .render_with_config(&config)
                .with_context(|| format!("failed to render page {}", self.page_number))?;
            Ok(bitmap.as_image().to_rgba8())
        })?;
        debug!(
            width = rendered.width(),
            height = rendered.height(),
            "page rasterized"
        );
        blit(surface, &rendered)
    }

    async fn text_content(&self) -> Result<TextContent> {
        let page_height = self.height;
        let glyphs = self.cell.with_page(self.page_number, |page| {
            let text = page
                .text()
                .with_context(|| format!("failed to extract text for page {}", self.page_number))?;
            let mut glyphs = Vec::new();
            for text_char in text.chars().iter() {
                let Some(ch) = text_char.unicode_char() else {
                    continue;
                };
                let bounds = match text_char.loose_bounds() {
                    Ok(bounds) => bounds,
                    Err(err) => {
                        warn!(?err, page = self.page_number, "glyph without bounds");
                        continue;
                    }
                };
                glyphs.push(Glyph {
                    ch,
                    x: bounds.left().value,
                    y: page_height - bounds.top().value,
                    width: bounds.right().value - bounds.left().value,
                    height: bounds.top().value - bounds.bottom().value,
                });
            }
            Ok(glyphs)
        })?;
        Ok(TextContent {
            items: group_glyphs(glyphs),
        })
    }
}

/// Copies the rendered page into the top-left corner of the surface; the
/// bitmap may be a pixel larger or smaller than the floored surface size.
fn blit(surface: &mut RasterSurface, rendered: &RgbaImage) -> Result<()> {
    let pixels = mem::take(&mut surface.pixels);
    let mut target = RgbaImage::from_raw(surface.width, surface.height, pixels)
        .ok_or_else(|| anyhow!("surface buffer does not match {}x{}", surface.width, surface.height))?;
    imageops::replace(&mut target, rendered, 0, 0);
    surface.pixels = target.into_raw();
    Ok(())
}

fn bind_pdfium_from_env() -> Option<Pdfium> {
    let path = std::env::var(PDFIUM_PATH_ENV).ok()?;
    if path.is_empty() {
        return None;
    }
    match Pdfium::bind_to_library(&path) {
        Ok(bindings) => Some(Pdfium::new(bindings)),
        Err(err) => {
            warn!("failed to load Pdfium from {}={}: {}", PDFIUM_PATH_ENV, path, err);
            None
        }
    }
}

fn bind_pdfium_default() -> Result<Pdfium> {
    let mut errors = Vec::new();

    let cwd_path = Pdfium::pdfium_platform_library_name_at_path("./");

    match Pdfium::bind_to_library(&cwd_path) {
        Ok(bindings) => return Ok(Pdfium::new(bindings)),
        Err(err) => {
            errors.push(format!("{}: {}", cwd_path.display(), err));
        }
    }

    match Pdfium::bind_to_system_library() {
        Ok(bindings) => Ok(Pdfium::new(bindings)),
        Err(err) => {
            errors.push(format!("system: {err}"));
            Err(anyhow!(
                "failed to bind to a pdfium library; set {} or install it ({})",
                PDFIUM_PATH_ENV,
                errors.join(", ")
            ))
        }
    }
}
