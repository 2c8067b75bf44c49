use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use clap::Parser;
use crossterm::cursor;
use crossterm::event;
use crossterm::terminal;
use directories::ProjectDirs;
use leafview_core::{
    DocumentEngine, DocumentViewer, FileItemStore, InfiniteLoadTrigger, ItemStore, PdfViewer,
    RasterSurface, StackedLayout, ViewerConfig, ViewerError, ViewerItem, ViewerSession,
    ViewerStatus,
};
use leafview_render::PdfiumEngine;
use leafview_tty::{
    compose, visible_slices, DrawParams, EventMapper, KittyRenderer, TerminalScrollHost, UiEvent,
    ViewerCommand,
};
use tracing::{debug, error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{prelude::*, EnvFilter};

const ITEM_KEY: &str = "pdf-viewer";
const FALLBACK_CELL_WIDTH: f32 = 8.0;
const FALLBACK_CELL_HEIGHT: f32 = 16.0;

#[derive(Debug, Parser)]
#[command(
    name = "leafview",
    version,
    about = "Continuous-scroll PDF viewer for kitty-compatible terminals"
)]
struct Args {
    /// Config file (defaults to the platform config directory)
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// Page to scroll to once the document is open (1-based)
    #[arg(short = 'p', long = "page")]
    page: Option<usize>,

    /// Print the measured page layout as JSON instead of starting the viewer
    #[arg(long = "dump-layout")]
    dump_layout: bool,

    /// Viewport used by --dump-layout, as WIDTHxHEIGHT pixels
    #[arg(long = "viewport", default_value = "800x1000", value_parser = parse_viewport)]
    viewport: (f32, f32),

    /// Directory for logs and the remembered item
    #[arg(long = "data-dir")]
    data_dir: Option<PathBuf>,

    /// PDF to open; the last viewed file is restored when omitted
    file: Option<PathBuf>,
}

fn parse_viewport(raw: &str) -> Result<(f32, f32), String> {
    let (width, height) = raw
        .split_once('x')
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got {raw}"))?;
    let width: f32 = width.trim().parse().map_err(|_| format!("bad width {width}"))?;
    let height: f32 = height.trim().parse().map_err(|_| format!("bad height {height}"))?;
    if width <= 0.0 || height <= 0.0 {
        return Err("viewport dimensions must be positive".into());
    }
    Ok((width, height))
}

struct RawModeGuard;

impl RawModeGuard {
    fn new() -> anyhow::Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
        let mut stdout = io::stdout();
        let _ = crossterm::execute!(stdout, cursor::Show);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let data_dir = match &args.data_dir {
        Some(dir) => dir.clone(),
        None => ProjectDirs::from("net", "leafview", "leafview")
            .map(|dirs| dirs.data_local_dir().to_path_buf())
            .ok_or_else(|| anyhow!("unable to resolve platform data directories"))?,
    };
    let _log_guard = init_logging(&data_dir.join("logs"), args.dump_layout)?;

    let mut config = match args.config.clone().or_else(ViewerConfig::default_path) {
        Some(path) => ViewerConfig::load(&path)?,
        None => ViewerConfig::default(),
    };

    let store: Arc<dyn ItemStore> = Arc::new(FileItemStore::new(data_dir.join("items"))?);
    let session = ViewerSession::new(store, ITEM_KEY);
    let item = session
        .restore(args.file.as_deref().map(item_for_path))
        .ok_or(ViewerError::MissingItem)?;
    info!(file = %item.file_path, "viewing");

    let engine: Arc<dyn DocumentEngine> = Arc::new(PdfiumEngine::new()?);

    if args.dump_layout {
        config.scroll_duration = Duration::ZERO;
        return dump_layout(engine, session, item, &config, args.viewport, args.page).await;
    }
    run_viewer(engine, session, item, &config, args.page).await
}

fn item_for_path(path: &Path) -> ViewerItem {
    let item = ViewerItem::new(path.display().to_string());
    match path.file_stem().and_then(|stem| stem.to_str()) {
        Some(stem) => item.with_title(stem),
        None => item,
    }
}

/// `usize::MAX` and anything past the end select the last page.
fn clamp_page(page: usize, total: usize) -> usize {
    page.min(total)
}

fn build_layout(config: &ViewerConfig, width: f32, height: f32) -> StackedLayout {
    let layout = StackedLayout::new(width, height).with_page_gap(config.page_gap);
    match config.device_pixel_ratio {
        Some(ratio) => layout.with_device_pixel_ratio(ratio),
        None => layout,
    }
}

async fn dump_layout(
    engine: Arc<dyn DocumentEngine>,
    session: ViewerSession,
    item: ViewerItem,
    config: &ViewerConfig,
    (width, height): (f32, f32),
    page: Option<usize>,
) -> Result<()> {
    let layout = Arc::new(build_layout(config, width, height));
    let measured = Arc::clone(&layout);
    let scroll = Arc::new(
        TerminalScrollHost::new(height).with_content_measure(move || measured.content_height()),
    );
    let viewer = PdfViewer::new(engine, layout, scroll.clone(), session, config);
    let file = item.file_path.clone();
    viewer.set_item(item);
    viewer.load_file().await?;

    let navigation = match page {
        Some(page) => {
            let target = clamp_page(page, viewer.page_state().total);
            Some(format!("{:?}", viewer.go_to_page(target).await))
        }
        None => None,
    };

    let report = serde_json::json!({
        "file": file,
        "status": viewer.status(),
        "page_state": viewer.page_state(),
        "positions": viewer.positions(),
        "scroll_top": scroll.scroll_top(),
        "navigation": navigation,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// Terminal size split into the page area and a one-row status line.
#[derive(Debug, Clone, Copy)]
struct Geometry {
    columns: u32,
    image_rows: u32,
    status_row: u16,
    width: f32,
    height: f32,
}

impl Geometry {
    fn query() -> Result<Self> {
        let window = terminal::window_size()?;
        let columns = u32::from(window.columns).max(1);
        let rows = u32::from(window.rows).max(2);
        let image_rows = rows - 1;
        let (pixel_width, pixel_height) = if window.width > 0 && window.height > 0 {
            (f32::from(window.width), f32::from(window.height))
        } else {
            (
                columns as f32 * FALLBACK_CELL_WIDTH,
                rows as f32 * FALLBACK_CELL_HEIGHT,
            )
        };
        Ok(Self {
            columns,
            image_rows,
            status_row: u16::try_from(image_rows).unwrap_or(u16::MAX),
            width: pixel_width.floor(),
            height: (pixel_height * image_rows as f32 / rows as f32).floor(),
        })
    }
}

/// Everything a redraw depends on; the frame is only re-sent when it changes.
#[derive(Debug, Clone, PartialEq)]
struct FrameKey {
    scroll_top: f32,
    content_height: f32,
    current: usize,
    total: usize,
    last_loaded: usize,
    scale: f32,
    status: ViewerStatus,
    pending: Option<String>,
}

impl FrameKey {
    fn capture(
        viewer: &PdfViewer,
        scroll: &TerminalScrollHost,
        layout: &StackedLayout,
        pending: Option<&str>,
    ) -> Self {
        let state = viewer.page_state();
        Self {
            scroll_top: scroll.scroll_top(),
            content_height: layout.content_height(),
            current: state.current,
            total: state.total,
            last_loaded: state.last_loaded,
            scale: state.scale,
            status: viewer.status(),
            pending: pending.map(str::to_owned),
        }
    }

    fn status_line(&self, title: &str) -> String {
        let mut line = match &self.status {
            ViewerStatus::Failed(reason) => format!("{title} | failed: {reason} (r to retry)"),
            ViewerStatus::Loading | ViewerStatus::Idle => format!("{title} | loading"),
            ViewerStatus::Ready => format!(
                "{title} | page {}/{} | {:.0}%",
                self.current,
                self.total,
                self.scale * 100.0
            ),
        };
        if let Some(pending) = &self.pending {
            line.push_str(" | ");
            line.push_str(pending);
        }
        line
    }
}

async fn run_viewer(
    engine: Arc<dyn DocumentEngine>,
    session: ViewerSession,
    item: ViewerItem,
    config: &ViewerConfig,
    page: Option<usize>,
) -> Result<()> {
    let mut geometry = Geometry::query()?;
    let layout = Arc::new(build_layout(config, geometry.width, geometry.height));
    let measured = Arc::clone(&layout);
    let scroll = Arc::new(
        TerminalScrollHost::new(geometry.height)
            .with_content_measure(move || measured.content_height()),
    );
    let viewer = Arc::new(PdfViewer::new(
        engine,
        layout.clone(),
        scroll.clone(),
        session,
        config,
    ));
    let title = item.title.clone().unwrap_or_else(|| item.file_path.clone());
    viewer.set_item(item);

    if let Err(err) = viewer.load_file().await {
        error!(error = %format!("{err:#}"), "failed to load document");
    }
    if let Some(page) = page {
        dispatch(&viewer, &scroll, ViewerCommand::GotoPage { page });
    }
    let _tracking = viewer.track_scroll();
    let trigger = InfiniteLoadTrigger::new(config.load_threshold);

    let _raw = RawModeGuard::new()?;
    let mut stdout = io::stdout();
    crossterm::execute!(stdout, cursor::Hide)?;
    let mut renderer = KittyRenderer::new(stdout);
    renderer.clear_all()?;
    let mut mapper = EventMapper::new();
    let mut last_frame: Option<FrameKey> = None;

    loop {
        if let Some(ticket) = trigger.poll(
            scroll.scroll_top(),
            scroll.viewport_height(),
            layout.content_height(),
        ) {
            let viewer = Arc::clone(&viewer);
            tokio::spawn(async move {
                let outcome = viewer.load_next(&ticket).await;
                debug!(?outcome, "scroll-triggered load");
            });
        }

        let key = FrameKey::capture(&viewer, &scroll, &layout, mapper.pending_input());
        if last_frame.as_ref() != Some(&key) {
            redraw(&mut renderer, &viewer, &layout, &geometry, &key, &title)?;
            last_frame = Some(key);
        }

        if event::poll(Duration::from_millis(30))? {
            match mapper.map_event(event::read()?) {
                UiEvent::Quit => break,
                UiEvent::Resize { .. } => {
                    geometry = Geometry::query()?;
                    layout.resize(geometry.width, geometry.height);
                    scroll.set_viewport_height(geometry.height);
                    renderer.clear_all()?;
                    last_frame = None;
                }
                UiEvent::Command(command) => dispatch(&viewer, &scroll, command),
                UiEvent::None => {}
            }
        }
    }

    renderer.clear_all()?;
    viewer.close();
    Ok(())
}

fn redraw(
    renderer: &mut KittyRenderer<io::Stdout>,
    viewer: &PdfViewer,
    layout: &StackedLayout,
    geometry: &Geometry,
    key: &FrameKey,
    title: &str,
) -> Result<()> {
    let mut frame = RasterSurface::new(geometry.width as u32, geometry.height as u32);
    let positions = viewer.positions();
    for slice in visible_slices(&positions, key.scroll_top, geometry.height) {
        layout.with_page(slice.page_number, |canvas| {
            compose(&mut frame, &slice, &canvas.surface)
        });
    }

    renderer.begin_sync_update()?;
    crossterm::execute!(renderer.writer(), cursor::MoveTo(0, 0))?;
    if frame.width > 0 && frame.height > 0 {
        renderer.draw(
            &frame,
            DrawParams::clamped(geometry.columns, geometry.image_rows),
        )?;
    }
    renderer.status_line(geometry.status_row, &key.status_line(title))?;
    renderer.end_sync_update()?;
    Ok(())
}

/// Scrolling is applied on the spot; everything else runs in the background
/// so a 3 s animation never blocks input.
fn dispatch(viewer: &Arc<PdfViewer>, scroll: &TerminalScrollHost, command: ViewerCommand) {
    if let ViewerCommand::ScrollBy { delta } = command {
        scroll.scroll_by(delta);
        return;
    }
    let viewer = Arc::clone(viewer);
    tokio::spawn(async move { run_command(&viewer, command).await });
}

async fn run_command(viewer: &PdfViewer, command: ViewerCommand) {
    match command {
        ViewerCommand::NextPage => {
            let outcome = viewer.go_to_next_page().await;
            debug!(?outcome, "next page");
        }
        ViewerCommand::PrevPage => {
            let outcome = viewer.go_to_previous_page().await;
            debug!(?outcome, "previous page");
        }
        ViewerCommand::GotoPage { page } => {
            let target = clamp_page(page, viewer.page_state().total);
            let outcome = viewer.go_to_page(target).await;
            debug!(page, ?outcome, "go to page");
        }
        ViewerCommand::ZoomIn => {
            let outcome = viewer.increase_scale().await;
            debug!(?outcome, "zoom in");
        }
        ViewerCommand::ZoomOut => {
            let outcome = viewer.decrease_scale().await;
            debug!(?outcome, "zoom out");
        }
        ViewerCommand::Retry => {
            if let Err(err) = viewer.retry().await {
                warn!(error = %format!("{err:#}"), "retry failed");
            }
        }
        ViewerCommand::ScrollBy { .. } => {}
    }
}

fn init_logging(log_dir: &Path, console: bool) -> Result<WorkerGuard> {
    fs::create_dir_all(log_dir)?;

    let file_appender = tracing_appender::rolling::never(log_dir, "leafview.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(file_writer);
    // the interactive viewer owns the terminal, so only the dump mode logs to stderr
    let console_layer = console.then(|| tracing_subscriber::fmt::layer().with_writer(io::stderr));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .map_err(|err| anyhow!(err))?;

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn viewport_argument_parses_width_and_height() {
        assert_eq!(parse_viewport("800x1000"), Ok((800.0, 1000.0)));
        assert!(parse_viewport("800").is_err());
        assert!(parse_viewport("0x10").is_err());
        assert!(parse_viewport("ax10").is_err());
    }

    #[test]
    fn requested_pages_are_clamped_to_the_document() {
        assert_eq!(clamp_page(3, 9), 3);
        assert_eq!(clamp_page(40, 9), 9);
        assert_eq!(clamp_page(usize::MAX, 9), 9);
        assert_eq!(clamp_page(2, 0), 0);
    }

    #[test]
    fn item_title_comes_from_file_stem() {
        let item = item_for_path(Path::new("/books/rust-in-action.pdf"));
        assert_eq!(item.file_path, "/books/rust-in-action.pdf");
        assert_eq!(item.title.as_deref(), Some("rust-in-action"));
    }

    #[test]
    fn status_line_reports_progress_and_failures() {
        let mut key = FrameKey {
            scroll_top: 0.0,
            content_height: 0.0,
            current: 2,
            total: 9,
            last_loaded: 3,
            scale: 1.25,
            status: ViewerStatus::Ready,
            pending: Some("12".into()),
        };
        assert_eq!(key.status_line("book"), "book | page 2/9 | 125% | 12");

        key.status = ViewerStatus::Failed("bad xref".into());
        key.pending = None;
        assert_eq!(
            key.status_line("book"),
            "book | failed: bad xref (r to retry)"
        );
    }
}
