//! Training snapshot writer.
//!
//! Files are named `test_shot_<n>.png` with `n` counting up from 0 for the
//! lifetime of the writer. The counter only moves after a successful write, so
//! a failed save can be retried under the same name.

use anyhow::{Context, Result};
use image::RgbImage;
use std::path::{Path, PathBuf};

pub const DEFAULT_SNAPSHOT_DIR: &str = "lid_images";

#[derive(Debug)]
pub struct SnapshotWriter {
    dir: PathBuf,
    next_index: u64,
}

impl SnapshotWriter {
    /// Create the output directory if it is missing.
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("create snapshot directory {}", dir.display()))?;
        Ok(Self { dir, next_index: 0 })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path the next successful save will use.
    pub fn next_path(&self) -> PathBuf {
        self.dir.join(format!("test_shot_{}.png", self.next_index))
    }

    /// Write `image` as PNG and advance the counter.
    pub fn save(&mut self, image: &RgbImage) -> Result<PathBuf> {
        let path = self.next_path();
        image
            .save_with_format(&path, image::ImageFormat::Png)
            .with_context(|| format!("write snapshot {}", path.display()))?;
        self.next_index += 1;
        Ok(path)
    }

    /// Number of successful saves.
    pub fn saved(&self) -> u64 {
        self.next_index
    }
}
