use anyhow::{Context, Result};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use image::{DynamicImage, ImageFormat, imageops::FilterType};
use ratatui::{
  buffer::Buffer,
  layout::Rect,
  style::{Color, Style},
  widgets::Widget,
};
use std::io::{Cursor, Write};

use crate::display::DisplayMode;

// --- Thumbnail Widget ---

/// Draws a preview into the cell buffer. Kitty previews are written to the
/// terminal out of band, so the widget leaves their area blank.
pub struct ThumbnailWidget<'a> {
  pub image: &'a DynamicImage,
  pub display_mode: DisplayMode,
}

const ASCII_RAMP: [&str; 10] = [" ", ".", ":", "-", "=", "+", "*", "#", "%", "@"];

/// Resize `image` to the pixel grid a mode needs for `area`.
/// Half-blocks pack two pixel rows per cell; ASCII uses one.
pub fn fit_to_area(image: &DynamicImage, area: Rect, mode: DisplayMode) -> DynamicImage {
  let w = u32::from(area.width).max(1);
  let h = match mode {
    DisplayMode::Direct => u32::from(area.height) * 2,
    _ => u32::from(area.height),
  };
  image.resize(w, h.max(1), FilterType::Triangle)
}

impl Widget for ThumbnailWidget<'_> {
  fn render(self, area: Rect, buf: &mut Buffer) {
    if area.is_empty() {
      return;
    }
    match self.display_mode {
      DisplayMode::Direct => render_half_blocks(self.image, area, buf),
      DisplayMode::Ascii => render_ascii(self.image, area, buf),
      DisplayMode::Kitty => {}
    }
  }
}

/// Top-left cell that centres a `cols` x `rows` block inside `area`.
fn centred_origin(area: Rect, cols: u32, rows: u32) -> (u16, u16) {
  let dx = u32::from(area.width).saturating_sub(cols) / 2;
  let dy = u32::from(area.height).saturating_sub(rows) / 2;
  (area.x.saturating_add(dx as u16), area.y.saturating_add(dy as u16))
}

fn render_half_blocks(image: &DynamicImage, area: Rect, buf: &mut Buffer) {
  let rgb = image.to_rgb8();
  let cols = rgb.width().min(u32::from(area.width));
  let rows = rgb.height().div_ceil(2).min(u32::from(area.height));
  let (x0, y0) = centred_origin(area, cols, rows);

  for row in 0..rows {
    for col in 0..cols {
      let top = rgb.get_pixel(col, row * 2);
      let bottom = if row * 2 + 1 < rgb.height() {
        let p = rgb.get_pixel(col, row * 2 + 1);
        Color::Rgb(p[0], p[1], p[2])
      } else {
        Color::Reset
      };
      buf.set_string(
        x0 + col as u16,
        y0 + row as u16,
        "▀",
        Style::default().fg(Color::Rgb(top[0], top[1], top[2])).bg(bottom),
      );
    }
  }
}

fn render_ascii(image: &DynamicImage, area: Rect, buf: &mut Buffer) {
  let luma = image.to_luma8();
  let cols = luma.width().min(u32::from(area.width));
  let rows = luma.height().min(u32::from(area.height));
  let (x0, y0) = centred_origin(area, cols, rows);
  let steps = ASCII_RAMP.len() - 1;

  for row in 0..rows {
    for col in 0..cols {
      let level = usize::from(luma.get_pixel(col, row)[0]) * steps / 255;
      buf.set_string(x0 + col as u16, y0 + row as u16, ASCII_RAMP[level.min(steps)], Style::default());
    }
  }
}

// --- Kitty Graphics Protocol ---
//
//   Transmit:  \x1B_G a=T,f=100,t=d,i=1,p=1,c=<cols>,r=<rows>,q=2,m=1;<base64 chunk>\x1B\\
//   Continue:  \x1B_G m=1;<base64 chunk>\x1B\\
//   Last:      \x1B_G m=0;<base64 chunk>\x1B\\
//   Delete all: \x1B_G a=d,d=a,q=2\x1B\\
//
// Re-sending with the same image/placement id replaces the previous preview in place.

const KITTY_CHUNK_SIZE: usize = 4096;

/// Delete all Kitty images currently displayed.
pub fn kitty_delete_all() -> Result<()> {
  let mut stdout = std::io::stdout();
  write!(stdout, "\x1B_Ga=d,d=a,q=2\x1B\\").context("Failed to write kitty delete all")?;
  stdout.flush().context("Failed to flush kitty delete")?;
  Ok(())
}

/// Send `image` as PNG and let the terminal scale it over `area`.
pub fn kitty_render_image(image: &DynamicImage, area: Rect) -> Result<()> {
  if area.is_empty() {
    return Ok(());
  }

  let mut png = Vec::new();
  image.write_to(&mut Cursor::new(&mut png), ImageFormat::Png).context("Failed to encode preview as PNG for kitty")?;
  let encoded = BASE64.encode(&png);
  let chunks: Vec<&[u8]> = encoded.as_bytes().chunks(KITTY_CHUNK_SIZE).collect();
  let last = chunks.len().saturating_sub(1);

  let mut stdout = std::io::stdout();
  write!(stdout, "\x1B[{};{}H", area.y.saturating_add(1), area.x.saturating_add(1))
    .context("Failed to position cursor for kitty image")?;

  for (i, chunk) in chunks.iter().enumerate() {
    let data = std::str::from_utf8(chunk).context("base64 chunk was not valid UTF-8")?;
    let more = u8::from(i < last);
    if i == 0 {
      write!(stdout, "\x1B_Ga=T,f=100,t=d,i=1,p=1,c={},r={},q=2,m={};{}\x1B\\", area.width, area.height, more, data)
        .context("Failed to write kitty image header chunk")?;
    } else {
      write!(stdout, "\x1B_Gm={};{}\x1B\\", more, data).context("Failed to write kitty image continuation chunk")?;
    }
  }

  stdout.flush().context("Failed to flush kitty image")?;
  Ok(())
}
