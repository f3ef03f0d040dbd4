//! Processing loop: read the latest frame, detect, filter, count, annotate,
//! present, then handle queued user actions.

use anyhow::Result;
use std::sync::mpsc::Receiver;
use std::time::{Duration, Instant};

use crate::capture::Capture;
use crate::config::{CounterConfig, Variant};
use crate::detect::{DetectRequest, Detection, DetectionFilter, DetectorBackend};
use crate::frame::{Frame, Rect};
use crate::present::Presenter;
use crate::render::{Overlay, OverlayKind};
use crate::roi::{crop, region_of_interest};
use crate::session::{Action, CountMode, Outcome, Readout, Session};

pub const CAMERA_LOST_NOTICE: &str = "Camera input invalid. Restart the camera stream!";

const STATS_INTERVAL: Duration = Duration::from_secs(5);
const IDLE_WAIT: Duration = Duration::from_millis(5);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExitReason {
    /// The camera stopped producing frames.
    CameraLost,
    /// The operator asked to quit.
    Quit,
}

#[derive(Clone, Debug)]
pub struct RunSummary {
    pub exit: ExitReason,
    pub frames_processed: u64,
    pub detector_failures: u64,
    pub snapshots: u64,
    pub final_count: usize,
}

/// Result of processing one frame.
#[derive(Clone, Debug)]
pub struct Processed {
    /// Filtered detections in frame coordinates.
    pub detections: Vec<Detection>,
    pub roi: Option<Rect>,
    pub readout: Readout,
}

pub struct Pipeline {
    detector: Box<dyn DetectorBackend>,
    request: DetectRequest,
    filter: DetectionFilter,
    overlay: Overlay,
    use_roi: bool,
}

impl Pipeline {
    pub fn new(
        detector: Box<dyn DetectorBackend>,
        request: DetectRequest,
        filter: DetectionFilter,
        overlay: Overlay,
        use_roi: bool,
    ) -> Self {
        Self {
            detector,
            request,
            filter,
            overlay,
            use_roi,
        }
    }

    /// Wire the configured variant around `detector`.
    pub fn from_config(cfg: &CounterConfig, detector: Box<dyn DetectorBackend>) -> Self {
        let counting = &cfg.counting;
        let filter = DetectionFilter::new(counting.target_class, cfg.detector.confidence)
            .with_min_box_width(counting.min_box_width);
        let base = DetectRequest {
            confidence: cfg.detector.confidence,
            iou: cfg.detector.iou,
            image_size: cfg.detector.image_size,
            classes: None,
            track: false,
        };
        match counting.variant {
            Variant::Region => Self::new(
                detector,
                base,
                filter,
                Overlay::new(OverlayKind::Region, &counting.label),
                true,
            ),
            Variant::Tracking => {
                if !detector.supports_tracking() {
                    log::warn!(
                        "detector '{}' does not track; the cumulative count will stay at 0",
                        detector.name()
                    );
                }
                let request = DetectRequest {
                    classes: Some(vec![counting.target_class]),
                    track: true,
                    ..base
                };
                Self::new(
                    detector,
                    request,
                    filter,
                    Overlay::new(OverlayKind::Tracking, &counting.label),
                    false,
                )
            }
        }
    }

    pub fn mode(&self) -> CountMode {
        match self.overlay.kind() {
            OverlayKind::Region => CountMode::Instantaneous,
            OverlayKind::Tracking => CountMode::Cumulative,
        }
    }

    pub fn detector_name(&self) -> &'static str {
        self.detector.name()
    }

    /// Run the detector on the variant's input region and filter the result.
    /// Returned boxes are in frame coordinates.
    pub fn detect(&mut self, frame: &Frame) -> Result<(Vec<Detection>, Option<Rect>)> {
        let roi = self
            .use_roi
            .then(|| region_of_interest(frame.width(), frame.height()));

        let raw = match roi {
            Some(rect) if rect.is_empty() => Vec::new(),
            Some(rect) => {
                let region = crop(&frame.image, rect);
                let (dx, dy) = rect.origin();
                self.detector
                    .detect(&region, &self.request)?
                    .into_iter()
                    .map(|d| d.translated(dx as f32, dy as f32))
                    .collect()
            }
            None => self.detector.detect(&frame.image, &self.request)?,
        };
        Ok((self.filter.apply(raw), roi))
    }

    /// Detect, filter, count and annotate one frame.
    ///
    /// On detector failure nothing in `session` changes.
    pub fn process(&mut self, frame: &Frame, session: &mut Session) -> Result<Processed> {
        let (detections, roi) = self.detect(frame)?;
        let readout = session.record(&detections);

        let mut annotated = frame.image.clone();
        self.overlay
            .annotate(&mut annotated, roi, &detections, &readout);
        session.set_annotated(annotated);

        Ok(Processed {
            detections,
            roi,
            readout,
        })
    }
}

/// Run until the camera fails or a `Quit` action arrives.
///
/// The capture and the presenter are shut down on every exit path.
pub fn run(
    capture: &mut Capture,
    pipeline: &mut Pipeline,
    session: &mut Session,
    presenter: &mut dyn Presenter,
    actions: &Receiver<Action>,
) -> Result<RunSummary> {
    let result = run_loop(capture, pipeline, session, presenter, actions);
    if let Err(err) = capture.shutdown() {
        log::error!("capture shutdown failed: {:#}", err);
    }
    if let Err(err) = presenter.shutdown() {
        log::error!("{} shutdown failed: {:#}", presenter.name(), err);
    }
    result
}

fn run_loop(
    capture: &mut Capture,
    pipeline: &mut Pipeline,
    session: &mut Session,
    presenter: &mut dyn Presenter,
    actions: &Receiver<Action>,
) -> Result<RunSummary> {
    let mut frames_processed = 0u64;
    let mut detector_failures = 0u64;
    let mut last_seq: Option<u64> = None;
    let mut last_stats = Instant::now();

    let exit = loop {
        let frame = match capture.read() {
            Ok(frame) => frame,
            Err(err) => {
                log::error!("camera read failed: {:#}", err);
                presenter.notify(CAMERA_LOST_NOTICE);
                break ExitReason::CameraLost;
            }
        };

        if last_seq == Some(frame.seq) {
            // threaded capture has nothing newer yet
            if drain_actions(session, presenter, actions) {
                break ExitReason::Quit;
            }
            std::thread::sleep(IDLE_WAIT);
            continue;
        }
        last_seq = Some(frame.seq);

        match pipeline.process(&frame, session) {
            Ok(processed) => {
                frames_processed += 1;
                if let Some(image) = session.last_annotated() {
                    if let Err(err) = presenter.present(image, &processed.readout) {
                        log::warn!("{} could not show frame {}: {:#}", presenter.name(), frame.seq, err);
                    }
                }
            }
            Err(err) => {
                detector_failures += 1;
                log::warn!(
                    "detector '{}' failed on frame {}, skipping: {:#}",
                    pipeline.detector_name(),
                    frame.seq,
                    err
                );
            }
        }

        if drain_actions(session, presenter, actions) {
            break ExitReason::Quit;
        }

        if last_stats.elapsed() >= STATS_INTERVAL {
            log::info!(
                "frames={} detector_failures={} count={} snapshots={}",
                frames_processed,
                detector_failures,
                session.readout().shown(),
                session.snapshots_saved()
            );
            last_stats = Instant::now();
        }
    };

    Ok(RunSummary {
        exit,
        frames_processed,
        detector_failures,
        snapshots: session.snapshots_saved(),
        final_count: session.readout().shown(),
    })
}

/// Apply every queued action. Returns true when one of them was `Quit`.
fn drain_actions(
    session: &mut Session,
    presenter: &mut dyn Presenter,
    actions: &Receiver<Action>,
) -> bool {
    let mut quit = false;
    for action in actions.try_iter() {
        match session.apply(action) {
            Outcome::Saved(path) => presenter.notify(&format!("Saved image to: {}", path.display())),
            Outcome::SaveFailed(message) => {
                presenter.notify(&format!("Failed to save image: {}", message))
            }
            Outcome::NothingToSave => presenter.notify("No frame to save yet"),
            Outcome::Reset => presenter.notify("Counter has been reset"),
            Outcome::Quit => quit = true,
        }
    }
    quit
}
