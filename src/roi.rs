//! Region of interest selection.
//!
//! The counting zone is the central half of the frame in both axes. It is
//! recomputed for every frame so a resolution change mid-stream is picked up.

use image::{imageops, RgbImage};

use crate::frame::Rect;

/// Central region: `(0.25W, 0.25H)`-`(0.75W, 0.75H)`, truncated to integers.
pub fn region_of_interest(width: u32, height: u32) -> Rect {
    let w = width as f64;
    let h = height as f64;
    Rect::new(
        (w * 0.25) as u32,
        (h * 0.25) as u32,
        (w * 0.75) as u32,
        (h * 0.75) as u32,
    )
}

/// Copy the pixels of `rect` out of `image`.
pub fn crop(image: &RgbImage, rect: Rect) -> RgbImage {
    imageops::crop_imm(image, rect.x1, rect.y1, rect.width(), rect.height()).to_image()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn vga_region_is_exact() {
        assert_eq!(region_of_interest(640, 480), Rect::new(160, 120, 480, 360));
    }

    #[test]
    fn odd_dimensions_truncate() {
        let roi = region_of_interest(101, 7);
        assert_eq!(roi, Rect::new(25, 1, 75, 5));
    }

    #[test]
    fn tiny_frames_give_empty_region() {
        assert!(region_of_interest(1, 1).is_empty());
    }

    #[test]
    fn crop_copies_region_pixels() {
        let mut image = RgbImage::from_pixel(8, 8, Rgb([0, 0, 0]));
        image.put_pixel(2, 2, Rgb([9, 9, 9]));
        let roi = region_of_interest(8, 8);
        let cropped = crop(&image, roi);
        assert_eq!(cropped.dimensions(), (4, 4));
        assert_eq!(cropped.get_pixel(0, 0), &Rgb([9, 9, 9]));
    }
}
