//! Per-run counting state.
//!
//! A `Session` is created when a run starts and dropped when it ends. It is
//! only touched by the processing loop; other threads reach it through
//! `Action` messages.

use image::RgbImage;
use serde::Serialize;
use std::path::PathBuf;

use crate::counter::IdentityMemory;
use crate::detect::Detection;
use crate::snapshot::SnapshotWriter;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CountMode {
    /// Number of qualifying detections in the current frame.
    Instantaneous,
    /// Number of distinct track ids since the last reset.
    Cumulative,
}

/// Counts after one processed frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Readout {
    pub mode: CountMode,
    pub current: usize,
    pub total: usize,
}

impl Readout {
    pub fn empty(mode: CountMode) -> Self {
        Self {
            mode,
            current: 0,
            total: 0,
        }
    }

    /// The number the overlay shows.
    pub fn shown(&self) -> usize {
        match self.mode {
            CountMode::Instantaneous => self.current,
            CountMode::Cumulative => self.total,
        }
    }
}

/// User request from any input surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    Snapshot,
    Reset,
    Quit,
}

#[derive(Debug)]
pub enum Outcome {
    Saved(PathBuf),
    NothingToSave,
    SaveFailed(String),
    Reset,
    Quit,
}

pub struct Session {
    memory: IdentityMemory,
    snapshots: SnapshotWriter,
    last_annotated: Option<RgbImage>,
    readout: Readout,
}

impl Session {
    pub fn new(mode: CountMode, snapshots: SnapshotWriter) -> Self {
        Self {
            memory: IdentityMemory::new(),
            snapshots,
            last_annotated: None,
            readout: Readout::empty(mode),
        }
    }

    pub fn mode(&self) -> CountMode {
        self.readout.mode
    }

    /// Update counts from the filtered detections of one frame.
    pub fn record(&mut self, detections: &[Detection]) -> Readout {
        if self.readout.mode == CountMode::Cumulative {
            let fresh = self.memory.observe(detections);
            if fresh > 0 {
                log::debug!("session: {} new identities", fresh);
            }
        }
        self.readout = Readout {
            mode: self.readout.mode,
            current: detections.len(),
            total: self.memory.count(),
        };
        self.readout
    }

    pub fn set_annotated(&mut self, image: RgbImage) {
        self.last_annotated = Some(image);
    }

    pub fn last_annotated(&self) -> Option<&RgbImage> {
        self.last_annotated.as_ref()
    }

    pub fn readout(&self) -> Readout {
        self.readout
    }

    pub fn snapshots_saved(&self) -> u64 {
        self.snapshots.saved()
    }

    pub fn apply(&mut self, action: Action) -> Outcome {
        match action {
            Action::Snapshot => {
                let Some(image) = self.last_annotated.as_ref() else {
                    return Outcome::NothingToSave;
                };
                match self.snapshots.save(image) {
                    Ok(path) => {
                        log::info!("Saved image to: {}", path.display());
                        Outcome::Saved(path)
                    }
                    Err(err) => {
                        log::error!("snapshot failed: {:#}", err);
                        Outcome::SaveFailed(format!("{:#}", err))
                    }
                }
            }
            Action::Reset => {
                self.memory.reset();
                self.readout.total = 0;
                log::info!("counter has been reset");
                Outcome::Reset
            }
            Action::Quit => Outcome::Quit,
        }
    }
}
