//! Local image directory source.
//!
//! `ImageDirSource` replays still images (`.png`, `.jpg`, `.jpeg`) from a local
//! directory in lexical file-name order, e.g. a folder of saved training shots.
//! Running past the last file is a read failure, which ends the run the same
//! way a lost camera does.

use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};

use crate::frame::Frame;

use super::FrameSource;

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

pub struct ImageDirSource {
    name: String,
    files: Vec<PathBuf>,
    next_index: usize,
}

impl ImageDirSource {
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        if dir.as_os_str().is_empty() {
            return Err(anyhow!("image directory path must not be empty"));
        }
        let entries = std::fs::read_dir(dir)
            .with_context(|| format!("read image directory {}", dir.display()))?;
        let mut files = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.is_file() && is_image_file(&path) {
                files.push(path);
            }
        }
        files.sort();
        log::info!(
            "ImageDirSource: {} images queued from {}",
            files.len(),
            dir.display()
        );
        Ok(Self {
            name: dir.to_string_lossy().to_string(),
            files,
            next_index: 0,
        })
    }

    pub fn remaining(&self) -> usize {
        self.files.len() - self.next_index
    }
}

fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

impl FrameSource for ImageDirSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn next_frame(&mut self) -> Result<Frame> {
        let path = self
            .files
            .get(self.next_index)
            .ok_or_else(|| anyhow!("image directory {} exhausted", self.name))?;
        let image = image::open(path)
            .with_context(|| format!("decode image {}", path.display()))?
            .into_rgb8();
        self.next_index += 1;
        Ok(Frame::new(image, self.next_index as u64))
    }
}
