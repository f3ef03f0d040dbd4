use serde::{Deserialize, Serialize};

use crate::frame::BBox;

/// COCO class id of "sports ball", the stand-in for the lid class.
pub const SPORTS_BALL_CLASS: u32 = 32;

/// One object instance observed in a single detector call.
///
/// `bbox` is relative to whatever image was passed to the detector (the
/// region crop or the full frame). `track_id` is only present when tracking
/// was requested and the tracker assigned an identity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub class_id: u32,
    pub confidence: f32,
    pub bbox: BBox,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub track_id: Option<u64>,
}

impl Detection {
    pub fn new(class_id: u32, confidence: f32, bbox: BBox) -> Self {
        Self {
            class_id,
            confidence,
            bbox,
            track_id: None,
        }
    }

    pub fn with_track_id(mut self, track_id: u64) -> Self {
        self.track_id = Some(track_id);
        self
    }

    /// Same detection with its box shifted by `(dx, dy)`.
    pub fn translated(&self, dx: f32, dy: f32) -> Self {
        Self {
            bbox: self.bbox.translate(dx, dy),
            ..self.clone()
        }
    }
}
