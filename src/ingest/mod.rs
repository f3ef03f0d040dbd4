//! Frame ingestion sources.
//!
//! This module provides different sources for frames:
//! - HTTP MJPEG/JPEG streams (IP webcams such as DroidCam)
//! - Synthetic scene (`stub://`) for demos and tests
//! - Image directories (`dir://`) for replaying saved shots
//!
//! Every source implements `FrameSource`. A source owns its camera handle for
//! as long as it lives; dropping the source releases the handle. A read error
//! means the camera could not produce a frame and is terminal for the run.

pub mod http;
pub mod image_dir;
pub mod synthetic;

use anyhow::{anyhow, Result};
use std::path::Path;

use crate::frame::Frame;

pub use http::HttpSource;
pub use image_dir::ImageDirSource;
pub use synthetic::{SyntheticConfig, SyntheticSource};

/// Blocking, synchronous frame producer.
pub trait FrameSource: Send {
    /// Human-readable source identifier (URL or path).
    fn name(&self) -> &str;

    /// Block until the next frame is available.
    ///
    /// An error is the "camera could not produce a frame" condition. Callers
    /// treat it as fatal and do not retry.
    fn next_frame(&mut self) -> Result<Frame>;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn next_frame(&mut self) -> Result<Frame> {
        (**self).next_frame()
    }
}

/// Open a source by URL.
///
/// - `http://` / `https://` → `HttpSource`
/// - `stub://balls?count=3&fps=30` → `SyntheticSource`
/// - `dir:///path/to/shots` or an existing directory path → `ImageDirSource`
pub fn open_source(url: &str) -> Result<Box<dyn FrameSource>> {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return Err(anyhow!("camera url must not be empty"));
    }
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        return Ok(Box::new(HttpSource::new(trimmed)?));
    }
    if trimmed.starts_with("stub://") {
        let config = SyntheticConfig::from_url(trimmed)?;
        return Ok(Box::new(SyntheticSource::new(config)));
    }
    if let Some(path) = trimmed.strip_prefix("dir://") {
        return Ok(Box::new(ImageDirSource::open(path)?));
    }
    if !trimmed.contains("://") && Path::new(trimmed).is_dir() {
        return Ok(Box::new(ImageDirSource::open(trimmed)?));
    }
    Err(anyhow!(
        "unsupported camera url '{}'; expected http(s)://, stub:// or dir://",
        trimmed
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_source_dispatches_on_scheme() -> Result<()> {
        let source = open_source("stub://balls?count=2&fps=0")?;
        assert_eq!(source.name(), "stub://balls?count=2&fps=0");

        let source = open_source("http://192.168.0.37:4747/video")?;
        assert_eq!(source.name(), "http://192.168.0.37:4747/video");
        Ok(())
    }

    #[test]
    fn open_source_rejects_unknown_schemes() {
        assert!(open_source("").is_err());
        assert!(open_source("rtsp://camera/stream").is_err());
        assert!(open_source("/definitely/not/a/real/dir").is_err());
    }

    #[test]
    fn open_source_accepts_plain_directory() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().to_string_lossy().to_string();
        let source = open_source(&path)?;
        assert_eq!(source.name(), path);
        Ok(())
    }
}
