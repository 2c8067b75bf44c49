use leafview_core::{PagePosition, RasterSurface};

/// The part of one page that shows through the viewport, in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Slice {
    pub page_number: usize,
    /// Offset inside the page.
    pub src_top: f32,
    /// Offset inside the viewport.
    pub dst_top: f32,
    pub height: f32,
}

pub fn visible_slices(
    positions: &[PagePosition],
    scroll_top: f32,
    viewport_height: f32,
) -> Vec<Slice> {
    let scroll_bottom = scroll_top + viewport_height;
    positions
        .iter()
        .filter(|position| position.bottom > scroll_top && position.top < scroll_bottom)
        .map(|position| {
            let visible_top = position.top.max(scroll_top);
            let visible_bottom = position.bottom.min(scroll_bottom);
            Slice {
                page_number: position.page_number,
                src_top: visible_top - position.top,
                dst_top: visible_top - scroll_top,
                height: visible_bottom - visible_top,
            }
        })
        .collect()
}

/// Copies `slice` of `page` into `frame`, sampling the nearest source pixel so
/// pages rendered for a different density still line up.
pub fn compose(frame: &mut RasterSurface, slice: &Slice, page: &RasterSurface) {
    let frame_ratio = density(frame);
    let page_ratio = density(page);
    if frame_ratio <= 0.0 || page_ratio <= 0.0 {
        return;
    }

    let first_row = (slice.dst_top * frame_ratio).floor().max(0.0) as u32;
    let last_row = (((slice.dst_top + slice.height) * frame_ratio).ceil() as u32).min(frame.height);
    let frame_stride = frame.stride();
    let page_stride = page.stride();

    for row in first_row..last_row {
        let css_y = row as f32 / frame_ratio - slice.dst_top + slice.src_top;
        let src_row = (css_y * page_ratio) as u32;
        if src_row >= page.height {
            break;
        }
        let dst_base = row as usize * frame_stride;
        let src_base = src_row as usize * page_stride;
        for col in 0..frame.width {
            let src_col = (col as f32 / frame_ratio * page_ratio) as u32;
            if src_col >= page.width {
                break;
            }
            let dst = dst_base + col as usize * 4;
            let src = src_base + src_col as usize * 4;
            frame.pixels[dst..dst + 4].copy_from_slice(&page.pixels[src..src + 4]);
        }
    }
}

fn density(surface: &RasterSurface) -> f32 {
    if surface.css_height > 0.0 {
        surface.height as f32 / surface.css_height
    } else {
        0.0
    }
}
