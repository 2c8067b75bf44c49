use std::io::{self, Write};

use anyhow::{ensure, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use crossterm::cursor::MoveTo;
use crossterm::terminal::{Clear, ClearType};
use leafview_core::RasterSurface;
use png::{BitDepth, ColorType, Encoder};

/// Largest base64 payload kitty accepts per escape sequence.
const CHUNK_SIZE: usize = 4096;
/// The viewport is always one image, replaced in place on every redraw.
const FRAME_IMAGE_ID: u32 = 1;
const FRAME_PLACEMENT_ID: u32 = 1;

const SYNC_BEGIN: &str = "\u{1b}[?2026h";
const SYNC_END: &str = "\u{1b}[?2026l";

/// Cell area the frame is stretched over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawParams {
    pub columns: u32,
    pub rows: u32,
}

impl DrawParams {
    pub fn clamped(columns: u32, rows: u32) -> Self {
        Self {
            columns: columns.max(1),
            rows: rows.max(1),
        }
    }
}

/// Writes composed viewport frames with the kitty graphics protocol.
pub struct KittyRenderer<W: Write> {
    out: W,
    frames_sent: u64,
}

impl<W: Write> KittyRenderer<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            frames_sent: 0,
        }
    }

    pub fn writer(&mut self) -> &mut W {
        &mut self.out
    }

    pub fn frames_sent(&self) -> u64 {
        self.frames_sent
    }

    pub fn draw(&mut self, frame: &RasterSurface, params: DrawParams) -> Result<()> {
        ensure!(
            frame.width > 0 && frame.height > 0,
            "cannot draw an empty {}x{} frame",
            frame.width,
            frame.height
        );
        let payload = BASE64.encode(encode_png(frame)?);
        let control = format!(
            "a=T,f=100,C=1,q=2,i={FRAME_IMAGE_ID},p={FRAME_PLACEMENT_ID},c={},r={},s={},v={},z=-1",
            params.columns, params.rows, frame.width, frame.height
        );
        transmit(&mut self.out, &control, payload.as_bytes())?;
        self.out.flush()?;
        self.frames_sent += 1;
        Ok(())
    }

    pub fn begin_sync_update(&mut self) -> Result<()> {
        self.out.write_all(SYNC_BEGIN.as_bytes())?;
        Ok(())
    }

    pub fn end_sync_update(&mut self) -> Result<()> {
        self.out.write_all(SYNC_END.as_bytes())?;
        self.out.flush()?;
        Ok(())
    }

    /// Deletes the placed frame and blanks the screen.
    pub fn clear_all(&mut self) -> Result<()> {
        write!(self.out, "\u{1b}_Ga=d,d=i,i={FRAME_IMAGE_ID},q=2\u{1b}\\")?;
        crossterm::queue!(self.out, Clear(ClearType::All), MoveTo(0, 0))?;
        self.out.flush()?;
        Ok(())
    }

    pub fn status_line(&mut self, row: u16, label: &str) -> Result<()> {
        crossterm::queue!(self.out, MoveTo(0, row), Clear(ClearType::CurrentLine))?;
        write_status_line(&mut self.out, label)?;
        Ok(())
    }
}

fn encode_png(frame: &RasterSurface) -> Result<Vec<u8>> {
    let mut png = Vec::with_capacity(frame.pixels.len() / 2);
    {
        let mut encoder = Encoder::new(&mut png, frame.width, frame.height);
        encoder.set_color(ColorType::Rgba);
        encoder.set_depth(BitDepth::Eight);
        let mut image = encoder.write_header()?;
        image.write_image_data(&frame.pixels)?;
        image.finish()?;
    }
    Ok(png)
}

/// Splits `payload` over as many escape sequences as needed; only the first
/// carries the control keys and every one but the last sets `m=1`.
fn transmit<W: Write>(out: &mut W, control: &str, payload: &[u8]) -> io::Result<()> {
    let chunks: Vec<&[u8]> = payload.chunks(CHUNK_SIZE).collect();
    let last = chunks.len().saturating_sub(1);
    for (index, chunk) in chunks.iter().enumerate() {
        let more = u8::from(index < last);
        if index == 0 {
            write!(out, "\u{1b}_G{control},m={more};")?;
        } else {
            write!(out, "\u{1b}_Gm={more},q=2;")?;
        }
        out.write_all(chunk)?;
        out.write_all(b"\x1b\\")?;
    }
    Ok(())
}

pub fn write_status_line<W: Write>(writer: &mut W, label: &str) -> io::Result<()> {
    writer.write_all(label.as_bytes())?;
    writer.flush()
}
