use anyhow::Result;
use image::RgbImage;

use crate::detect::result::Detection;

/// Per-call detection parameters.
///
/// Everything the detector needs travels with the call; backends hold no
/// mutable configuration beyond their own model/tracker state.
#[derive(Clone, Debug, PartialEq)]
pub struct DetectRequest {
    /// Minimum confidence in `[0, 1]`.
    pub confidence: f32,
    /// IoU threshold for non-maximum suppression / tracker association.
    pub iou: f32,
    /// Square model input size in pixels.
    pub image_size: u32,
    /// Class allow-list. `None` returns every class.
    pub classes: Option<Vec<u32>>,
    /// Ask the backend to keep object identity across sequential calls.
    pub track: bool,
}

impl Default for DetectRequest {
    fn default() -> Self {
        Self {
            confidence: 0.5,
            iou: 0.5,
            image_size: 640,
            classes: None,
            track: false,
        }
    }
}

impl DetectRequest {
    pub fn allows_class(&self, class_id: u32) -> bool {
        self.classes
            .as_ref()
            .map(|classes| classes.contains(&class_id))
            .unwrap_or(true)
    }
}

/// Detector backend trait.
///
/// The detector is a black box: image in, detections out. Detection,
/// tracking and identity assignment all live behind this seam so the
/// counting and rendering code never depends on a particular model.
///
/// Calls are synchronous and may take arbitrarily long. When `track` is set,
/// sequential calls share tracker state inside the backend.
pub trait DetectorBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Whether the backend can assign persistent track ids.
    fn supports_tracking(&self) -> bool;

    /// Run detection on one image. Boxes are in `image` pixel coordinates.
    fn detect(&mut self, image: &RgbImage, request: &DetectRequest) -> Result<Vec<Detection>>;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
