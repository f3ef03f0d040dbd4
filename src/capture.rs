//! Capture layer between a frame source and the processing loop.
//!
//! - `Capture::Direct`: the loop blocks on every camera read.
//! - `Capture::Threaded`: one producer thread keeps overwriting a single
//!   latest-frame slot; the loop reads whatever is newest without waiting.
//!
//! The slot holds an `Arc<Frame>` behind a mutex. The producer builds the whole
//! frame first and swaps the pointer under the lock, so a reader always gets a
//! frame from exactly one camera read. There is no queue: when the loop is slower
//! than the camera, intermediate frames are dropped.

use anyhow::{anyhow, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::frame::Frame;
use crate::ingest::FrameSource;

const STOP_GRACE: Duration = Duration::from_millis(500);
const STOP_POLL: Duration = Duration::from_millis(5);

/// Contents of the latest-frame slot.
#[derive(Clone, Debug)]
pub enum Latest {
    Frame(Arc<Frame>),
    /// The camera failed; the producer has exited and released the source.
    Failed(String),
}

/// Frame acquisition as seen by the processing loop.
pub enum Capture {
    Direct(DirectCapture),
    Threaded(ThreadedCapture),
}

impl Capture {
    /// Wrap `source` in the requested capture mode.
    pub fn open(source: Box<dyn FrameSource>, threaded: bool, warmup: Duration) -> Result<Self> {
        if threaded {
            Ok(Capture::Threaded(ThreadedCapture::start(source, warmup)?))
        } else {
            Ok(Capture::Direct(DirectCapture::new(source)))
        }
    }

    /// Most recent frame, or the camera failure that ended the stream.
    pub fn read(&mut self) -> Result<Arc<Frame>> {
        match self {
            Capture::Direct(capture) => capture.read(),
            Capture::Threaded(capture) => match capture.read() {
                Latest::Frame(frame) => Ok(frame),
                Latest::Failed(message) => Err(anyhow!(message)),
            },
        }
    }

    pub fn is_threaded(&self) -> bool {
        matches!(self, Capture::Threaded(_))
    }

    /// Release the camera. Safe to call more than once.
    pub fn shutdown(&mut self) -> Result<()> {
        match self {
            Capture::Direct(capture) => {
                capture.release();
                Ok(())
            }
            Capture::Threaded(capture) => capture.stop(),
        }
    }
}

// ----------------------------------------------------------------------------
// Direct (synchronous) capture
// ----------------------------------------------------------------------------

pub struct DirectCapture {
    source: Option<Box<dyn FrameSource>>,
}

impl DirectCapture {
    pub fn new(source: Box<dyn FrameSource>) -> Self {
        Self {
            source: Some(source),
        }
    }

    /// Blocking read. A failed read releases the source immediately.
    pub fn read(&mut self) -> Result<Arc<Frame>> {
        let source = self
            .source
            .as_mut()
            .ok_or_else(|| anyhow!("camera already released"))?;
        match source.next_frame() {
            Ok(frame) => Ok(Arc::new(frame)),
            Err(err) => {
                self.release();
                Err(err)
            }
        }
    }

    pub fn release(&mut self) {
        if let Some(source) = self.source.take() {
            log::info!("capture: releasing {}", source.name());
        }
    }
}

// ----------------------------------------------------------------------------
// Threaded capture
// ----------------------------------------------------------------------------

/// Background reader with a single latest-frame slot.
pub struct ThreadedCapture {
    name: String,
    slot: Arc<Mutex<Latest>>,
    stop: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl ThreadedCapture {
    /// Prime the slot with one synchronous read, spawn the producer, then wait
    /// `warmup` for the camera to settle.
    ///
    /// A failed priming read does not spawn a producer; the source is released
    /// right away and the slot reports the failure.
    pub fn start<S: FrameSource + 'static>(mut source: S, warmup: Duration) -> Result<Self> {
        let name = source.name().to_string();
        let stop = Arc::new(AtomicBool::new(false));

        let first = match source.next_frame() {
            Ok(frame) => frame,
            Err(err) => {
                log::error!("capture: first read from {} failed: {:#}", name, err);
                drop(source);
                return Ok(Self {
                    name,
                    slot: Arc::new(Mutex::new(Latest::Failed(format!("{:#}", err)))),
                    stop,
                    join: None,
                });
            }
        };

        let slot = Arc::new(Mutex::new(Latest::Frame(Arc::new(first))));
        let producer_slot = slot.clone();
        let producer_stop = stop.clone();
        let join = std::thread::Builder::new()
            .name("frame-capture".to_string())
            .spawn(move || produce(source, producer_slot, producer_stop))?;

        if !warmup.is_zero() {
            std::thread::sleep(warmup);
        }

        log::info!("capture: threaded reader started for {}", name);
        Ok(Self {
            name,
            slot,
            stop,
            join: Some(join),
        })
    }

    /// Current slot contents. Never waits on the camera.
    pub fn read(&self) -> Latest {
        match self.slot.lock() {
            Ok(guard) => guard.clone(),
            Err(_) => Latest::Failed("capture slot poisoned".to_string()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Signal the producer to exit and wait up to `STOP_GRACE` for it to
    /// release the source.
    ///
    /// A producer still blocked in a camera read after the grace period is
    /// detached; it releases the source once that read returns.
    pub fn stop(&mut self) -> Result<()> {
        self.stop.store(true, Ordering::SeqCst);
        let Some(join) = self.join.take() else {
            return Ok(());
        };
        let deadline = Instant::now() + STOP_GRACE;
        while !join.is_finished() {
            if Instant::now() >= deadline {
                log::warn!(
                    "capture: {} still blocked in a read after {:?}, detaching reader",
                    self.name,
                    STOP_GRACE
                );
                return Ok(());
            }
            std::thread::sleep(STOP_POLL);
        }
        join.join()
            .map_err(|_| anyhow!("capture thread for {} panicked", self.name))
    }
}

impl Drop for ThreadedCapture {
    fn drop(&mut self) {
        if let Err(err) = self.stop() {
            log::error!("capture: {}", err);
        }
    }
}

fn produce<S: FrameSource>(mut source: S, slot: Arc<Mutex<Latest>>, stop: Arc<AtomicBool>) {
    while !stop.load(Ordering::SeqCst) {
        let next = match source.next_frame() {
            Ok(frame) => Latest::Frame(Arc::new(frame)),
            Err(err) => {
                log::error!("capture: read from {} failed: {:#}", source.name(), err);
                Latest::Failed(format!("{:#}", err))
            }
        };
        let failed = matches!(next, Latest::Failed(_));
        let previous = match slot.lock() {
            Ok(mut guard) => std::mem::replace(&mut *guard, next),
            Err(_) => break,
        };
        drop(previous);
        if failed {
            break;
        }
    }
    log::info!("capture: releasing {}", source.name());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::{SyntheticConfig, SyntheticSource};

    fn synthetic() -> SyntheticSource {
        SyntheticSource::new(SyntheticConfig {
            fps: 0,
            width: 64,
            height: 48,
            ..SyntheticConfig::default()
        })
    }

    #[test]
    fn direct_capture_returns_sequential_frames() -> Result<()> {
        let mut capture = Capture::open(Box::new(synthetic()), false, Duration::ZERO)?;
        assert!(!capture.is_threaded());
        assert_eq!(capture.read()?.seq, 1);
        assert_eq!(capture.read()?.seq, 2);
        capture.shutdown()?;
        assert!(capture.read().is_err());
        Ok(())
    }

    #[test]
    fn threaded_capture_serves_latest_frame() -> Result<()> {
        let mut capture = Capture::open(Box::new(synthetic()), true, Duration::ZERO)?;
        assert!(capture.is_threaded());
        let first = capture.read()?;
        std::thread::sleep(Duration::from_millis(20));
        let later = capture.read()?;
        assert!(later.seq >= first.seq);
        capture.shutdown()?;
        capture.shutdown()?;
        Ok(())
    }
}
