//! Frame and geometry primitives.
//!
//! - `Frame`: one still image captured from the camera stream (RGB8, channel order R,G,B).
//! - `BBox`: floating-point detection box in pixel coordinates.
//! - `Rect`: integer rectangle used for regions and drawing.
//!
//! Frames are ephemeral: produced once per capture cycle, consumed by the pipeline
//! and dropped after rendering unless a snapshot is requested.

use image::RgbImage;
use serde::{Deserialize, Serialize};

// ----------------------------------------------------------------------------
// Frame
// ----------------------------------------------------------------------------

/// One captured frame.
///
/// `seq` is assigned by the frame source and increases by one per successful
/// read. The capture layer uses it to tell a fresh frame from one it has
/// already handed out.
#[derive(Clone, Debug)]
pub struct Frame {
    pub image: RgbImage,
    pub seq: u64,
}

impl Frame {
    pub fn new(image: RgbImage, seq: u64) -> Self {
        Self { image, seq }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

// ----------------------------------------------------------------------------
// Rect
// ----------------------------------------------------------------------------

/// Integer rectangle with corners `(x1, y1)` (inclusive) and `(x2, y2)` (exclusive).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
}

impl Rect {
    pub fn new(x1: u32, y1: u32, x2: u32, y2: u32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> u32 {
        self.x2.saturating_sub(self.x1)
    }

    pub fn height(&self) -> u32 {
        self.y2.saturating_sub(self.y1)
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    /// Top-left corner, used to translate region-relative boxes.
    pub fn origin(&self) -> (u32, u32) {
        (self.x1, self.y1)
    }
}

// ----------------------------------------------------------------------------
// BBox
// ----------------------------------------------------------------------------

/// Detection box `(x1, y1, x2, y2)` in pixels of whatever image was fed to the detector.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    pub fn area(&self) -> f32 {
        self.width().max(0.0) * self.height().max(0.0)
    }

    /// Shift both corners by `(dx, dy)`.
    pub fn translate(&self, dx: f32, dy: f32) -> Self {
        Self {
            x1: self.x1 + dx,
            y1: self.y1 + dy,
            x2: self.x2 + dx,
            y2: self.y2 + dy,
        }
    }

    /// Scale both axes independently (model input space → image space).
    pub fn scale(&self, sx: f32, sy: f32) -> Self {
        Self {
            x1: self.x1 * sx,
            y1: self.y1 * sy,
            x2: self.x2 * sx,
            y2: self.y2 * sy,
        }
    }

    pub fn iou(&self, other: &BBox) -> f32 {
        let ix1 = self.x1.max(other.x1);
        let iy1 = self.y1.max(other.y1);
        let ix2 = self.x2.min(other.x2);
        let iy2 = self.y2.min(other.y2);
        let inter = (ix2 - ix1).max(0.0) * (iy2 - iy1).max(0.0);
        if inter == 0.0 {
            return 0.0;
        }
        let union = self.area() + other.area() - inter;
        if union <= 0.0 {
            return 0.0;
        }
        inter / union
    }

    /// Truncate to integer pixels for drawing. Returns `None` for boxes that are
    /// degenerate after truncation or lie entirely at negative coordinates.
    pub fn to_rect(&self) -> Option<Rect> {
        let x1 = self.x1.max(0.0) as u32;
        let y1 = self.y1.max(0.0) as u32;
        let x2 = self.x2.max(0.0) as u32;
        let y2 = self.y2.max(0.0) as u32;
        let rect = Rect::new(x1, y1, x2, y2);
        if rect.is_empty() {
            None
        } else {
            Some(rect)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn translate_moves_region_box_into_frame_space() {
        let region_box = BBox::new(10.0, 10.0, 50.0, 50.0);
        let framed = region_box.translate(160.0, 120.0);
        assert_eq!(framed, BBox::new(170.0, 130.0, 210.0, 170.0));
        assert_eq!(framed.width(), region_box.width());
    }

    #[test]
    fn iou_of_disjoint_boxes_is_zero() {
        let a = BBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BBox::new(20.0, 20.0, 30.0, 30.0);
        assert_eq!(a.iou(&b), 0.0);
        assert!((a.iou(&a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn to_rect_truncates_and_rejects_degenerate_boxes() {
        let rect = BBox::new(1.9, 2.2, 40.7, 30.1).to_rect();
        assert_eq!(rect, Some(Rect::new(1, 2, 40, 30)));
        assert_eq!(BBox::new(5.0, 5.0, 5.4, 20.0).to_rect(), None);
        assert_eq!(BBox::new(-10.0, -10.0, -1.0, -1.0).to_rect(), None);
    }
}
