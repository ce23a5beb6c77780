use image::{DynamicImage, imageops::FilterType};
use ratatui::{
  buffer::Buffer,
  layout::Rect,
  style::{Color, Style},
  widgets::Widget,
};

use crate::display::DisplayMode;
use crate::focus::FocusPoint;

// --- Thumbnail Widget ---

pub struct ThumbnailWidget<'a> {
  pub image: &'a DynamicImage,
  pub display_mode: DisplayMode,
}

const ASCII_CHARS: [&str; 10] = [" ", ".", ":", "-", "=", "+", "*", "#", "%", "@"];

impl Widget for ThumbnailWidget<'_> {
  fn render(self, area: Rect, buf: &mut Buffer) {
    if area.is_empty() {
      return;
    }
    match self.display_mode {
      DisplayMode::Direct => render_direct(self.image, area, buf),
      DisplayMode::Ascii => render_ascii(self.image, area, buf),
    }
  }
}

/// Pixel size a thumbnail needs to fill `cols` x `rows` cells.
pub fn target_pixels(display_mode: DisplayMode, cols: u16, rows: u16) -> (u32, u32) {
  match display_mode {
    // Half-blocks pack two pixel rows per cell.
    DisplayMode::Direct => (cols as u32, rows as u32 * 2),
    DisplayMode::Ascii => (cols as u32, rows as u32),
  }
}

/// Scale `image` to cover `width` x `height`, then crop the overflow so the
/// focal point stays at the same relative position.
pub fn crop_to_fill(image: &DynamicImage, width: u32, height: u32, focus: FocusPoint) -> DynamicImage {
  let (width, height) = (width.max(1), height.max(1));
  let (iw, ih) = (image.width().max(1), image.height().max(1));
  let scale = (width as f64 / iw as f64).max(height as f64 / ih as f64);
  let sw = ((iw as f64 * scale).ceil() as u32).max(width);
  let sh = ((ih as f64 * scale).ceil() as u32).max(height);
  let scaled = image.resize_exact(sw, sh, FilterType::Triangle);
  let x = ((sw - width) as f64 * focus.x / 100.0).round() as u32;
  let y = ((sh - height) as f64 * focus.y / 100.0).round() as u32;
  scaled.crop_imm(x.min(sw - width), y.min(sh - height), width, height)
}

fn render_direct(image: &DynamicImage, area: Rect, buf: &mut Buffer) {
  // Image is already resized by the caller; just convert to RGB8.
  let resized = image.to_rgb8();
  let img_w = resized.width().min(area.width as u32);
  let img_h = resized.height();
  let cell_h = img_h.div_ceil(2);
  let offset_x = (area.width as u32).saturating_sub(img_w) / 2;
  let offset_y = (area.height as u32).saturating_sub(cell_h) / 2;

  for y in 0..cell_h.min(area.height as u32) {
    for x in 0..img_w {
      let upper = resized.get_pixel(x, y * 2);
      let lower_y = y * 2 + 1;
      let fg = Color::Rgb(upper[0], upper[1], upper[2]);
      let bg = if lower_y < img_h {
        let lower = resized.get_pixel(x, lower_y);
        Color::Rgb(lower[0], lower[1], lower[2])
      } else {
        Color::Reset
      };
      buf.set_string(
        area.x.saturating_add((offset_x + x).min(u16::MAX as u32) as u16),
        area.y.saturating_add((offset_y + y).min(u16::MAX as u32) as u16),
        "▀",
        Style::default().fg(fg).bg(bg),
      );
    }
  }
}

fn render_ascii(image: &DynamicImage, area: Rect, buf: &mut Buffer) {
  // Image is already resized by the caller; just convert to grayscale.
  let resized = image.to_luma8();
  let img_w = resized.width().min(area.width as u32);
  let img_h = resized.height().min(area.height as u32);
  let offset_x = (area.width as u32).saturating_sub(img_w) / 2;
  let offset_y = (area.height as u32).saturating_sub(img_h) / 2;

  for y in 0..img_h {
    for x in 0..img_w {
      let pixel = resized.get_pixel(x, y)[0];
      let idx = ((pixel as f32 / 255.0) * (ASCII_CHARS.len() - 1) as f32).round() as usize;
      let idx = idx.min(ASCII_CHARS.len() - 1);
      buf.set_string(
        area.x.saturating_add((offset_x + x).min(u16::MAX as u32) as u16),
        area.y.saturating_add((offset_y + y).min(u16::MAX as u32) as u16),
        ASCII_CHARS[idx],
        Style::default(),
      );
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::{Rgb, RgbImage};

  /// 20x10 image: left half black, right half white.
  fn split_image() -> DynamicImage {
    let img = RgbImage::from_fn(20, 10, |x, _| if x < 10 { Rgb([0, 0, 0]) } else { Rgb([255, 255, 255]) });
    DynamicImage::ImageRgb8(img)
  }

  #[test]
  fn crop_has_requested_size() {
    let out = crop_to_fill(&split_image(), 7, 3, FocusPoint::CENTER);
    assert_eq!((out.width(), out.height()), (7, 3));
  }

  #[test]
  fn focus_selects_the_kept_region() {
    let left = crop_to_fill(&split_image(), 4, 10, FocusPoint { x: 0.0, y: 50.0 }).to_rgb8();
    let right = crop_to_fill(&split_image(), 4, 10, FocusPoint { x: 100.0, y: 50.0 }).to_rgb8();
    assert_eq!(left.get_pixel(0, 5), &Rgb([0, 0, 0]));
    assert_eq!(right.get_pixel(3, 5), &Rgb([255, 255, 255]));
  }

  #[test]
  fn half_blocks_double_vertical_resolution() {
    assert_eq!(target_pixels(DisplayMode::Direct, 30, 8), (30, 16));
    assert_eq!(target_pixels(DisplayMode::Ascii, 30, 8), (30, 8));
  }

  #[test]
  fn ascii_widget_fills_area() {
    let image = crop_to_fill(&split_image(), 6, 2, FocusPoint::CENTER);
    let area = Rect::new(0, 0, 6, 2);
    let mut buf = Buffer::empty(area);
    ThumbnailWidget { image: &image, display_mode: DisplayMode::Ascii }.render(area, &mut buf);
    assert_eq!(buf[(0, 0)].symbol(), " ");
    assert_eq!(buf[(5, 0)].symbol(), "@");
  }
}
