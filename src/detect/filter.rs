//! Class / confidence / size filter applied after every detector call.
//!
//! When the backend already honoured the class allow-list and threshold this
//! is a no-op; otherwise it is the only thing keeping background objects out
//! of the count.

use crate::detect::result::Detection;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DetectionFilter {
    pub target_class: u32,
    pub min_confidence: f32,
    /// Boxes narrower than this many pixels are discarded as false positives.
    pub min_box_width: Option<f32>,
}

impl DetectionFilter {
    pub fn new(target_class: u32, min_confidence: f32) -> Self {
        Self {
            target_class,
            min_confidence,
            min_box_width: None,
        }
    }

    pub fn with_min_box_width(mut self, width: Option<f32>) -> Self {
        self.min_box_width = width;
        self
    }

    pub fn keep(&self, detection: &Detection) -> bool {
        if detection.class_id != self.target_class {
            return false;
        }
        if detection.confidence < self.min_confidence {
            return false;
        }
        match self.min_box_width {
            Some(min_width) => detection.bbox.width() >= min_width,
            None => true,
        }
    }

    /// Keep matching detections, preserving detector order.
    pub fn apply(&self, detections: Vec<Detection>) -> Vec<Detection> {
        detections.into_iter().filter(|d| self.keep(d)).collect()
    }
}
