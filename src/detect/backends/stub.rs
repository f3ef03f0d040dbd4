use anyhow::{anyhow, Result};
use image::RgbImage;
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex};

use crate::detect::backend::{DetectRequest, DetectorBackend};
use crate::detect::result::Detection;
use crate::frame::BBox;

const MARKER_CONFIDENCE: f32 = 0.9;

/// Stub backend for the synthetic scene.
///
/// Looks for marker pixels `(255, id, 0)` and reports one detection per
/// distinct id, boxed by the pixel extent. The id doubles as the track id,
/// standing in for a real tracker's identity assignment.
pub struct MarkerBackend {
    class_id: u32,
}

impl MarkerBackend {
    pub fn new(class_id: u32) -> Self {
        Self { class_id }
    }
}

impl DetectorBackend for MarkerBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn supports_tracking(&self) -> bool {
        true
    }

    fn detect(&mut self, image: &RgbImage, request: &DetectRequest) -> Result<Vec<Detection>> {
        if MARKER_CONFIDENCE < request.confidence || !request.allows_class(self.class_id) {
            return Ok(Vec::new());
        }

        // id -> (min_x, min_y, max_x, max_y)
        let mut extents: BTreeMap<u8, (u32, u32, u32, u32)> = BTreeMap::new();
        for (x, y, pixel) in image.enumerate_pixels() {
            let [r, g, b] = pixel.0;
            if r != 255 || b != 0 || g == 0 {
                continue;
            }
            extents
                .entry(g)
                .and_modify(|e| {
                    e.0 = e.0.min(x);
                    e.1 = e.1.min(y);
                    e.2 = e.2.max(x);
                    e.3 = e.3.max(y);
                })
                .or_insert((x, y, x, y));
        }

        Ok(extents
            .into_iter()
            .map(|(id, (x1, y1, x2, y2))| {
                let bbox = BBox::new(x1 as f32, y1 as f32, (x2 + 1) as f32, (y2 + 1) as f32);
                let detection = Detection::new(self.class_id, MARKER_CONFIDENCE, bbox);
                if request.track {
                    detection.with_track_id(id as u64)
                } else {
                    detection
                }
            })
            .collect())
    }
}

/// Shared record of `(width, height, request)` for every scripted call.
pub type RequestLog = Arc<Mutex<Vec<(u32, u32, DetectRequest)>>>;

/// Test backend that replays scripted results, one per call.
///
/// Once the script runs out every call returns no detections. Scripted
/// results are returned verbatim, ignoring the request, so downstream
/// filtering is exercised.
pub struct ScriptedBackend {
    script: VecDeque<std::result::Result<Vec<Detection>, String>>,
    requests: RequestLog,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self {
            script: VecDeque::new(),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn then(mut self, detections: Vec<Detection>) -> Self {
        self.script.push_back(Ok(detections));
        self
    }

    pub fn then_fail(mut self, message: &str) -> Self {
        self.script.push_back(Err(message.to_string()));
        self
    }

    /// Handle to the call log; stays valid after the backend is moved.
    pub fn request_log(&self) -> RequestLog {
        self.requests.clone()
    }
}

impl Default for ScriptedBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectorBackend for ScriptedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn supports_tracking(&self) -> bool {
        true
    }

    fn detect(&mut self, image: &RgbImage, request: &DetectRequest) -> Result<Vec<Detection>> {
        if let Ok(mut log) = self.requests.lock() {
            log.push((image.width(), image.height(), request.clone()));
        }
        match self.script.pop_front() {
            Some(Ok(detections)) => Ok(detections),
            Some(Err(message)) => Err(anyhow!(message)),
            None => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::synthetic::{marker_colour, BACKGROUND};
    use image::Rgb;

    fn scene() -> RgbImage {
        let mut image = RgbImage::from_pixel(20, 10, BACKGROUND);
        for x in 2..5 {
            for y in 1..3 {
                image.put_pixel(x, y, marker_colour(7));
            }
        }
        image.put_pixel(15, 8, marker_colour(3));
        image.put_pixel(16, 8, Rgb([255, 0, 0]));
        image
    }

    #[test]
    fn marker_backend_boxes_each_marker_id() -> Result<()> {
        let mut backend = MarkerBackend::new(32);
        let request = DetectRequest {
            track: true,
            ..DetectRequest::default()
        };
        let detections = backend.detect(&scene(), &request)?;
        assert_eq!(detections.len(), 2);
        assert_eq!(detections[0].track_id, Some(3));
        assert_eq!(detections[0].bbox, BBox::new(15.0, 8.0, 16.0, 9.0));
        assert_eq!(detections[1].track_id, Some(7));
        assert_eq!(detections[1].bbox, BBox::new(2.0, 1.0, 5.0, 3.0));
        assert!(detections.iter().all(|d| d.class_id == 32));
        Ok(())
    }

    #[test]
    fn marker_backend_omits_ids_without_tracking() -> Result<()> {
        let mut backend = MarkerBackend::new(32);
        let detections = backend.detect(&scene(), &DetectRequest::default())?;
        assert!(detections.iter().all(|d| d.track_id.is_none()));
        Ok(())
    }

    #[test]
    fn marker_backend_honours_request_limits() -> Result<()> {
        let mut backend = MarkerBackend::new(32);
        let strict = DetectRequest {
            confidence: 0.95,
            ..DetectRequest::default()
        };
        assert!(backend.detect(&scene(), &strict)?.is_empty());
        let other_class = DetectRequest {
            classes: Some(vec![0]),
            ..DetectRequest::default()
        };
        assert!(backend.detect(&scene(), &other_class)?.is_empty());
        Ok(())
    }

    #[test]
    fn scripted_backend_replays_then_runs_dry() -> Result<()> {
        let det = Detection::new(32, 0.8, BBox::new(0.0, 0.0, 1.0, 1.0));
        let mut backend = ScriptedBackend::new()
            .then(vec![det.clone()])
            .then_fail("model crashed");
        let log = backend.request_log();
        let image = RgbImage::new(4, 3);

        assert_eq!(backend.detect(&image, &DetectRequest::default())?, vec![det]);
        assert!(backend.detect(&image, &DetectRequest::default()).is_err());
        assert!(backend.detect(&image, &DetectRequest::default())?.is_empty());
        assert_eq!(log.lock().unwrap().len(), 3);
        assert_eq!(log.lock().unwrap()[0].0, 4);
        Ok(())
    }
}
