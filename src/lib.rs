//! lidcount
//!
//! Visual counting for an IP webcam: pull frames, run an object detector over
//! a central region or the full frame, count one target class, draw the
//! result and save frames on demand as training material.
//!
//! # Variants
//!
//! - **region**: detect inside the central half of the frame and show how many
//!   target objects are in it right now.
//! - **tracking**: detect on the full frame with tracking enabled and show how
//!   many distinct objects have been seen since the last reset.
//!
//! # Module Structure
//!
//! - `ingest`: frame sources (HTTP MJPEG/JPEG, synthetic, image directory)
//! - `capture`: synchronous or threaded latest-frame capture
//! - `detect`: detector backends and the class/confidence/size filter
//! - `counter`, `session`: identity memory and per-run state
//! - `render`, `present`: overlays, console keys and the web dashboard
//! - `pipeline`: the processing loop
//! - `config`: file + environment configuration

pub mod capture;
pub mod config;
pub mod counter;
pub mod detect;
pub mod frame;
pub mod ingest;
pub mod pipeline;
pub mod present;
pub mod render;
pub mod roi;
pub mod session;
pub mod snapshot;

pub use capture::{Capture, Latest, ThreadedCapture};
pub use config::{BackendKind, CounterConfig, Variant};
pub use counter::IdentityMemory;
pub use detect::{build_backend, DetectRequest, Detection, DetectionFilter, DetectorBackend};
pub use frame::{BBox, Frame, Rect};
pub use ingest::{open_source, FrameSource};
pub use pipeline::{run, ExitReason, Pipeline, RunSummary, CAMERA_LOST_NOTICE};
pub use present::{ConsolePresenter, Dashboard, Presenter};
pub use session::{Action, CountMode, Readout, Session};
pub use snapshot::SnapshotWriter;
