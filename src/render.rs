//! Frame annotation: region boundary, detection boxes and the count banner.
//!
//! Colours are RGB (frames are RGB8). Text uses a built-in 5x7 bitmap font so
//! no font file has to ship with the binary.

use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect as DrawRect;

use crate::detect::Detection;
use crate::frame::Rect;
use crate::session::Readout;

pub const ROI_COLOUR: Rgb<u8> = Rgb([0, 0, 255]);
pub const REGION_BOX_COLOUR: Rgb<u8> = Rgb([0, 255, 0]);
pub const TRACKING_BOX_COLOUR: Rgb<u8> = Rgb([255, 165, 0]);
pub const BANNER_COLOUR: Rgb<u8> = Rgb([0, 0, 0]);
pub const COUNT_TEXT_COLOUR: Rgb<u8> = Rgb([0, 255, 0]);
pub const HINT_TEXT_COLOUR: Rgb<u8> = Rgb([255, 255, 255]);

const LINE_THICKNESS: i32 = 2;
const GLYPH_WIDTH: i32 = 5;
const GLYPH_HEIGHT: i32 = 7;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OverlayKind {
    /// Region-of-interest counting with an instantaneous count.
    Region,
    /// Full-frame tracking with a cumulative count.
    Tracking,
}

/// Per-variant overlay layout.
#[derive(Clone, Debug)]
pub struct Overlay {
    kind: OverlayKind,
    label: String,
}

impl Overlay {
    pub fn new(kind: OverlayKind, label: &str) -> Self {
        Self {
            kind,
            label: label.to_uppercase(),
        }
    }

    pub fn kind(&self) -> OverlayKind {
        self.kind
    }

    pub fn box_colour(&self) -> Rgb<u8> {
        match self.kind {
            OverlayKind::Region => REGION_BOX_COLOUR,
            OverlayKind::Tracking => TRACKING_BOX_COLOUR,
        }
    }

    fn banner_size(&self) -> (u32, u32) {
        match self.kind {
            OverlayKind::Region => (450, 80),
            OverlayKind::Tracking => (600, 60),
        }
    }

    /// Count line shown in the banner.
    pub fn headline(&self, readout: &Readout) -> String {
        match self.kind {
            OverlayKind::Region => format!("{} IN BUCKET: {}", self.label, readout.shown()),
            OverlayKind::Tracking => format!("TOTAL: {} | PRESS 'R' TO RESET", readout.shown()),
        }
    }

    pub fn hint(&self) -> Option<&'static str> {
        match self.kind {
            OverlayKind::Region => Some("S: SAVE IMAGE | Q: QUIT"),
            OverlayKind::Tracking => None,
        }
    }

    /// Draw the overlay onto `image`. `detections` must already be in frame
    /// coordinates.
    pub fn annotate(
        &self,
        image: &mut RgbImage,
        roi: Option<Rect>,
        detections: &[Detection],
        readout: &Readout,
    ) {
        if let Some(roi) = roi {
            draw_thick_rect(image, roi, ROI_COLOUR, LINE_THICKNESS);
        }
        for detection in detections {
            if let Some(rect) = detection.bbox.to_rect() {
                draw_thick_rect(image, rect, self.box_colour(), LINE_THICKNESS);
            }
        }

        let (banner_w, banner_h) = self.banner_size();
        draw_filled_rect_mut(
            image,
            DrawRect::at(0, 0).of_size(banner_w, banner_h),
            BANNER_COLOUR,
        );
        let headline = self.headline(readout);
        match self.hint() {
            Some(hint) => {
                draw_text(image, &headline, 10, 12, 3, COUNT_TEXT_COLOUR);
                draw_text(image, hint, 10, 52, 2, HINT_TEXT_COLOUR);
            }
            None => draw_text(image, &headline, 10, 20, 3, COUNT_TEXT_COLOUR),
        }
    }
}

/// Hollow rectangle grown outward by `thickness` pixels.
pub fn draw_thick_rect(image: &mut RgbImage, rect: Rect, colour: Rgb<u8>, thickness: i32) {
    if rect.is_empty() {
        return;
    }
    for offset in 0..thickness {
        let outline = DrawRect::at(rect.x1 as i32 - offset, rect.y1 as i32 - offset).of_size(
            rect.width() + (offset * 2) as u32,
            rect.height() + (offset * 2) as u32,
        );
        draw_hollow_rect_mut(image, outline, colour);
    }
}

/// Draw `text` with the 5x7 bitmap font, each font pixel `scale` x `scale`.
/// Pixels outside the image are clipped.
pub fn draw_text(image: &mut RgbImage, text: &str, x: i32, y: i32, scale: i32, colour: Rgb<u8>) {
    let advance = (GLYPH_WIDTH + 1) * scale;
    for (i, ch) in text.to_uppercase().chars().enumerate() {
        let origin_x = x + i as i32 * advance;
        for (row, bits) in glyph(ch).iter().enumerate() {
            for col in 0..GLYPH_WIDTH {
                if (bits >> (GLYPH_WIDTH - 1 - col)) & 1 == 0 {
                    continue;
                }
                let px = origin_x + col * scale;
                let py = y + row as i32 * scale;
                for dy in 0..scale {
                    for dx in 0..scale {
                        put_clipped(image, px + dx, py + dy, colour);
                    }
                }
            }
        }
    }
}

/// Width in pixels of `text` rendered at `scale`.
pub fn text_width(text: &str, scale: i32) -> i32 {
    let chars = text.chars().count() as i32;
    if chars == 0 {
        return 0;
    }
    chars * (GLYPH_WIDTH + 1) * scale - scale
}

fn put_clipped(image: &mut RgbImage, x: i32, y: i32, colour: Rgb<u8>) {
    if x >= 0 && y >= 0 && (x as u32) < image.width() && (y as u32) < image.height() {
        image.put_pixel(x as u32, y as u32, colour);
    }
}

fn glyph(ch: char) -> [u8; GLYPH_HEIGHT as usize] {
    match ch {
        '0' => [0b01110, 0b10001, 0b10011, 0b10101, 0b11001, 0b10001, 0b01110],
        '1' => [0b00100, 0b01100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        '2' => [0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b01000, 0b11111],
        '3' => [0b11111, 0b00010, 0b00100, 0b00010, 0b00001, 0b10001, 0b01110],
        '4' => [0b00010, 0b00110, 0b01010, 0b10010, 0b11111, 0b00010, 0b00010],
        '5' => [0b11111, 0b10000, 0b11110, 0b00001, 0b00001, 0b10001, 0b01110],
        '6' => [0b00110, 0b01000, 0b10000, 0b11110, 0b10001, 0b10001, 0b01110],
        '7' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b01000, 0b01000],
        '8' => [0b01110, 0b10001, 0b10001, 0b01110, 0b10001, 0b10001, 0b01110],
        '9' => [0b01110, 0b10001, 0b10001, 0b01111, 0b00001, 0b00010, 0b01100],
        'A' => [0b01110, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
        'B' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10001, 0b10001, 0b11110],
        'C' => [0b01110, 0b10001, 0b10000, 0b10000, 0b10000, 0b10001, 0b01110],
        'D' => [0b11100, 0b10010, 0b10001, 0b10001, 0b10001, 0b10010, 0b11100],
        'E' => [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b11111],
        'F' => [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b10000],
        'G' => [0b01110, 0b10001, 0b10000, 0b10111, 0b10001, 0b10001, 0b01111],
        'H' => [0b10001, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
        'I' => [0b01110, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        'J' => [0b00111, 0b00010, 0b00010, 0b00010, 0b00010, 0b10010, 0b01100],
        'K' => [0b10001, 0b10010, 0b10100, 0b11000, 0b10100, 0b10010, 0b10001],
        'L' => [0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b11111],
        'M' => [0b10001, 0b11011, 0b10101, 0b10101, 0b10001, 0b10001, 0b10001],
        'N' => [0b10001, 0b10001, 0b11001, 0b10101, 0b10011, 0b10001, 0b10001],
        'O' => [0b01110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        'P' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10000, 0b10000, 0b10000],
        'Q' => [0b01110, 0b10001, 0b10001, 0b10001, 0b10101, 0b10010, 0b01101],
        'R' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10100, 0b10010, 0b10001],
        'S' => [0b01111, 0b10000, 0b10000, 0b01110, 0b00001, 0b00001, 0b11110],
        'T' => [0b11111, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100],
        'U' => [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        'V' => [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01010, 0b00100],
        'W' => [0b10001, 0b10001, 0b10001, 0b10101, 0b10101, 0b10101, 0b01010],
        'X' => [0b10001, 0b10001, 0b01010, 0b00100, 0b01010, 0b10001, 0b10001],
        'Y' => [0b10001, 0b10001, 0b10001, 0b01010, 0b00100, 0b00100, 0b00100],
        'Z' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b10000, 0b11111],
        ':' => [0b00000, 0b01100, 0b01100, 0b00000, 0b01100, 0b01100, 0b00000],
        '|' => [0b00100; 7],
        '\'' => [0b01100, 0b00100, 0b01000, 0b00000, 0b00000, 0b00000, 0b00000],
        '.' => [0b00000, 0b00000, 0b00000, 0b00000, 0b00000, 0b01100, 0b01100],
        '-' => [0b00000, 0b00000, 0b00000, 0b11111, 0b00000, 0b00000, 0b00000],
        '/' => [0b00000, 0b00001, 0b00010, 0b00100, 0b01000, 0b10000, 0b00000],
        ' ' => [0; 7],
        _ => [0b11111, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b11111],
    }
}
