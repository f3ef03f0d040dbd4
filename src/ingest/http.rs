//! HTTP camera source.
//!
//! `HttpSource` ingests frames from IP webcams that serve MJPEG over HTTP
//! (`multipart/x-mixed-replace`) or a single JPEG per request.
//!
//! The source is responsible for:
//! - Connecting lazily on the first read
//! - Splitting the MJPEG byte stream into JPEG frames
//! - Decoding JPEG frames in-memory to RGB8
//!
//! It never reconnects. Once a read fails the caller ends the run.

use anyhow::{anyhow, Context, Result};
use std::io::Read;
use std::time::Duration;

use crate::frame::Frame;

use super::FrameSource;

const MAX_JPEG_BYTES: usize = 5 * 1024 * 1024;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// HTTP MJPEG/JPEG frame source.
pub struct HttpSource {
    url: String,
    agent: ureq::Agent,
    stream: Option<HttpStream>,
    frame_count: u64,
}

enum HttpStream {
    Mjpeg(MjpegStream),
    SingleJpeg,
}

impl HttpSource {
    pub fn new(url: &str) -> Result<Self> {
        let parsed = url::Url::parse(url).context("parse camera url")?;
        match parsed.scheme() {
            "http" | "https" => {}
            other => {
                return Err(anyhow!(
                    "unsupported camera scheme '{}'; expected http(s)",
                    other
                ))
            }
        }
        if parsed.host_str().is_none() {
            return Err(anyhow!("camera url '{}' has no host", url));
        }
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(CONNECT_TIMEOUT)
            .build();
        Ok(Self {
            url: url.to_string(),
            agent,
            stream: None,
            frame_count: 0,
        })
    }

    /// Open the camera URL. For a single-JPEG camera the response body is the
    /// first frame and is returned.
    fn connect(&mut self) -> Result<Option<Vec<u8>>> {
        let response = self
            .agent
            .get(&self.url)
            .call()
            .with_context(|| format!("connect to camera stream {}", self.url))?;
        let content_type = response.header("Content-Type").unwrap_or("").to_lowercase();
        if content_type.contains("multipart") {
            log::info!("HttpSource: connected to {} (mjpeg)", self.url);
            self.stream = Some(HttpStream::Mjpeg(MjpegStream::new(response.into_reader())));
            Ok(None)
        } else {
            log::info!("HttpSource: connected to {} (jpeg snapshots)", self.url);
            let first = read_jpeg_body(response)?;
            self.stream = Some(HttpStream::SingleJpeg);
            Ok(Some(first))
        }
    }

    fn fetch_single_jpeg(&self) -> Result<Vec<u8>> {
        let response = self
            .agent
            .get(&self.url)
            .call()
            .with_context(|| format!("fetch jpeg snapshot from {}", self.url))?;
        read_jpeg_body(response)
    }
}

fn read_jpeg_body(response: ureq::Response) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    response
        .into_reader()
        .take(MAX_JPEG_BYTES as u64 + 1)
        .read_to_end(&mut bytes)
        .context("read jpeg snapshot")?;
    if bytes.is_empty() {
        return Err(anyhow!("empty jpeg snapshot"));
    }
    if bytes.len() > MAX_JPEG_BYTES {
        return Err(anyhow!("jpeg snapshot exceeds {} bytes", MAX_JPEG_BYTES));
    }
    Ok(bytes)
}

impl FrameSource for HttpSource {
    fn name(&self) -> &str {
        &self.url
    }

    fn next_frame(&mut self) -> Result<Frame> {
        let first = if self.stream.is_none() {
            self.connect()?
        } else {
            None
        };
        let jpeg_bytes = match (first, self.stream.as_mut()) {
            (Some(bytes), _) => bytes,
            (None, Some(HttpStream::Mjpeg(stream))) => stream.read_next_jpeg()?,
            (None, Some(HttpStream::SingleJpeg)) => self.fetch_single_jpeg()?,
            (None, None) => return Err(anyhow!("camera stream not connected")),
        };
        let image = image::load_from_memory(&jpeg_bytes)
            .context("decode jpeg")?
            .into_rgb8();
        self.frame_count += 1;
        Ok(Frame::new(image, self.frame_count))
    }
}

impl Drop for HttpSource {
    fn drop(&mut self) {
        if self.stream.take().is_some() {
            log::info!(
                "HttpSource: released {} after {} frames",
                self.url,
                self.frame_count
            );
        }
    }
}

struct MjpegStream {
    reader: Box<dyn Read + Send>,
    buffer: Vec<u8>,
}

impl MjpegStream {
    fn new(reader: Box<dyn Read + Send>) -> Self {
        Self {
            reader,
            buffer: Vec::with_capacity(64 * 1024),
        }
    }

    fn read_next_jpeg(&mut self) -> Result<Vec<u8>> {
        let mut chunk = vec![0u8; 8192];
        loop {
            if let Some((start, end)) = find_jpeg_bounds(&self.buffer) {
                let frame = self.buffer[start..end].to_vec();
                self.buffer.drain(..end);
                return Ok(frame);
            }

            let read = self.reader.read(&mut chunk).context("read mjpeg chunk")?;
            if read == 0 {
                return Err(anyhow!("mjpeg stream ended"));
            }
            self.buffer.extend_from_slice(&chunk[..read]);

            if self.buffer.len() > MAX_JPEG_BYTES * 2 {
                let keep = 2.min(self.buffer.len());
                let drain_len = self.buffer.len() - keep;
                self.buffer.drain(..drain_len);
            }
        }
    }
}

/// Locate the first complete JPEG (SOI `FFD8` .. EOI `FFD9`) in `buffer`.
fn find_jpeg_bounds(buffer: &[u8]) -> Option<(usize, usize)> {
    let start = buffer.windows(2).position(|w| w == [0xFF, 0xD8])?;
    let end = buffer[start + 2..]
        .windows(2)
        .position(|w| w == [0xFF, 0xD9])?;
    Some((start, start + 2 + end + 2))
}
