//! Synthetic frame source (`stub://`).
//!
//! Renders a deterministic scene: balls travel left to right across a gray
//! background, one lane per ball. Every time a ball wraps around it comes back
//! as a new object. Ball identity is painted into the marker colour
//! `(255, id, 0)` so the marker detector can recover it without any model.

use anyhow::{anyhow, Context, Result};
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_filled_circle_mut;
use std::time::{Duration, Instant};

use crate::frame::Frame;

use super::FrameSource;

pub const BACKGROUND: Rgb<u8> = Rgb([96, 96, 96]);
const BALL_RADIUS: i32 = 18;
const SPEED_PX_PER_FRAME: u64 = 8;

/// Configuration for a synthetic source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyntheticConfig {
    pub url: String,
    pub width: u32,
    pub height: u32,
    /// Number of lanes, one ball per lane.
    pub balls: u32,
    /// Pacing in frames per second; 0 produces frames as fast as they are read.
    pub fps: u32,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            url: "stub://balls".to_string(),
            width: 640,
            height: 480,
            balls: 3,
            fps: 30,
        }
    }
}

impl SyntheticConfig {
    /// Parse `stub://balls?count=3&fps=30&width=640&height=480`.
    pub fn from_url(raw: &str) -> Result<Self> {
        let url = url::Url::parse(raw).context("parse stub url")?;
        if url.scheme() != "stub" {
            return Err(anyhow!("synthetic source needs a stub:// url"));
        }
        let mut config = Self {
            url: raw.to_string(),
            ..Self::default()
        };
        for (key, value) in url.query_pairs() {
            let parsed: u32 = value
                .parse()
                .map_err(|_| anyhow!("stub url parameter '{}' must be an integer", key))?;
            match key.as_ref() {
                "count" => config.balls = parsed,
                "fps" => config.fps = parsed,
                "width" => config.width = parsed,
                "height" => config.height = parsed,
                other => return Err(anyhow!("unknown stub url parameter '{}'", other)),
            }
        }
        if config.width == 0 || config.height == 0 {
            return Err(anyhow!("stub frame dimensions must be non-zero"));
        }
        if config.balls > 254 {
            return Err(anyhow!("stub scene supports at most 254 balls"));
        }
        Ok(config)
    }
}

/// Deterministic moving-ball scene.
pub struct SyntheticSource {
    config: SyntheticConfig,
    frame_count: u64,
    last_frame_at: Option<Instant>,
}

/// One ball as rendered into a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Ball {
    pub id: u8,
    pub center: (i32, i32),
    pub radius: i32,
}

impl SyntheticSource {
    pub fn new(config: SyntheticConfig) -> Self {
        log::info!("SyntheticSource: connected to {} (synthetic)", config.url);
        Self {
            config,
            frame_count: 0,
            last_frame_at: None,
        }
    }

    /// Balls visible in frame `seq`.
    pub fn scene(config: &SyntheticConfig, seq: u64) -> Vec<Ball> {
        let lanes = config.balls as u64;
        if lanes == 0 {
            return Vec::new();
        }
        let period = config.width as u64 + 4 * BALL_RADIUS as u64;
        (0..lanes)
            .map(|lane| {
                let travelled = seq * SPEED_PX_PER_FRAME + lane * period / lanes;
                let lap = travelled / period;
                let x = (travelled % period) as i32 - 2 * BALL_RADIUS;
                let y = (config.height as u64 * (lane + 1) / (lanes + 1)) as i32;
                let id = ((lap * lanes + lane) % 254 + 1) as u8;
                Ball {
                    id,
                    center: (x, y),
                    radius: BALL_RADIUS,
                }
            })
            .collect()
    }

    fn render(&self, seq: u64) -> RgbImage {
        let mut image = RgbImage::from_pixel(self.config.width, self.config.height, BACKGROUND);
        for ball in Self::scene(&self.config, seq) {
            draw_filled_circle_mut(&mut image, ball.center, ball.radius, marker_colour(ball.id));
        }
        image
    }

    fn pace(&mut self) {
        if self.config.fps == 0 {
            return;
        }
        let interval = Duration::from_millis((1000 / self.config.fps).max(1) as u64);
        if let Some(last) = self.last_frame_at {
            let elapsed = last.elapsed();
            if elapsed < interval {
                std::thread::sleep(interval - elapsed);
            }
        }
        self.last_frame_at = Some(Instant::now());
    }
}

/// Marker colour carrying a ball id in the green channel.
pub fn marker_colour(id: u8) -> Rgb<u8> {
    Rgb([255, id, 0])
}

impl FrameSource for SyntheticSource {
    fn name(&self) -> &str {
        &self.config.url
    }

    fn next_frame(&mut self) -> Result<Frame> {
        self.pace();
        self.frame_count += 1;
        Ok(Frame::new(self.render(self.frame_count), self.frame_count))
    }
}
