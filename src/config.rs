use anyhow::{anyhow, bail, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::detect::SPORTS_BALL_CLASS;
use crate::snapshot::DEFAULT_SNAPSHOT_DIR;

const DEFAULT_CAMERA_URL: &str = "stub://balls";
const DEFAULT_DASHBOARD_ADDR: &str = "127.0.0.1:8798";
const DEFAULT_IMAGE_SIZE: u32 = 640;
const DEFAULT_IOU: f32 = 0.5;
const DEFAULT_LABEL: &str = "balls";
const TRACKING_WARMUP_MS: u64 = 2000;
const TRACKING_MIN_BOX_WIDTH: f32 = 30.0;

/// Which counting program to run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    /// Detect inside the central region, report the per-frame count.
    Region,
    /// Detect on the full frame, report the number of distinct track ids.
    Tracking,
}

impl Variant {
    pub fn as_str(&self) -> &'static str {
        match self {
            Variant::Region => "region",
            Variant::Tracking => "tracking",
        }
    }

    pub fn default_confidence(&self) -> f32 {
        match self {
            Variant::Region => 0.5,
            Variant::Tracking => 0.6,
        }
    }

    pub fn default_threaded(&self) -> bool {
        matches!(self, Variant::Tracking)
    }

    pub fn default_warmup(&self) -> Duration {
        match self {
            Variant::Region => Duration::ZERO,
            Variant::Tracking => Duration::from_millis(TRACKING_WARMUP_MS),
        }
    }

    pub fn default_min_box_width(&self) -> Option<f32> {
        match self {
            Variant::Region => None,
            Variant::Tracking => Some(TRACKING_MIN_BOX_WIDTH),
        }
    }
}

impl FromStr for Variant {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "region" | "roi" => Ok(Variant::Region),
            "tracking" | "track" => Ok(Variant::Tracking),
            other => Err(anyhow!("unknown variant '{}' (expected region|tracking)", other)),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Stub,
    Remote,
    Tract,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Stub => "stub",
            BackendKind::Remote => "remote",
            BackendKind::Tract => "tract",
        }
    }
}

impl FromStr for BackendKind {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "stub" => Ok(BackendKind::Stub),
            "remote" => Ok(BackendKind::Remote),
            "tract" => Ok(BackendKind::Tract),
            other => Err(anyhow!(
                "unknown detector backend '{}' (expected stub|remote|tract)",
                other
            )),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
struct CounterConfigFile {
    camera: Option<CameraConfigFile>,
    detector: Option<DetectorConfigFile>,
    counting: Option<CountingConfigFile>,
    snapshots: Option<SnapshotConfigFile>,
    dashboard: Option<DashboardConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct CameraConfigFile {
    url: Option<String>,
    threaded: Option<bool>,
    warmup_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectorConfigFile {
    backend: Option<BackendKind>,
    model_path: Option<PathBuf>,
    endpoint: Option<String>,
    confidence: Option<f32>,
    iou: Option<f32>,
    image_size: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct CountingConfigFile {
    variant: Option<Variant>,
    target_class: Option<u32>,
    min_box_width: Option<f32>,
    label: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct SnapshotConfigFile {
    dir: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
struct DashboardConfigFile {
    addr: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CounterConfig {
    pub camera: CameraSettings,
    pub detector: DetectorSettings,
    pub counting: CountingSettings,
    pub snapshot_dir: PathBuf,
    pub dashboard_addr: String,
}

#[derive(Debug, Clone)]
pub struct CameraSettings {
    pub url: String,
    pub threaded: bool,
    pub warmup: Duration,
}

#[derive(Debug, Clone)]
pub struct DetectorSettings {
    pub backend: BackendKind,
    pub model_path: Option<PathBuf>,
    pub endpoint: Option<String>,
    pub confidence: f32,
    pub iou: f32,
    pub image_size: u32,
}

#[derive(Debug, Clone)]
pub struct CountingSettings {
    pub variant: Variant,
    pub target_class: u32,
    pub min_box_width: Option<f32>,
    pub label: String,
}

impl CounterConfig {
    /// Load from `path` (or `LIDCOUNT_CONFIG`), fill defaults, apply env
    /// overrides, validate.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(path) => Some(path.to_path_buf()),
            None => std::env::var("LIDCOUNT_CONFIG")
                .ok()
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),
        };
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(path)?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Defaults for `variant` with no file and no environment.
    pub fn for_variant(variant: Variant) -> Self {
        Self {
            camera: CameraSettings {
                url: DEFAULT_CAMERA_URL.to_string(),
                threaded: variant.default_threaded(),
                warmup: variant.default_warmup(),
            },
            detector: DetectorSettings {
                backend: BackendKind::Stub,
                model_path: None,
                endpoint: None,
                confidence: variant.default_confidence(),
                iou: DEFAULT_IOU,
                image_size: DEFAULT_IMAGE_SIZE,
            },
            counting: CountingSettings {
                variant,
                target_class: SPORTS_BALL_CLASS,
                min_box_width: variant.default_min_box_width(),
                label: DEFAULT_LABEL.to_string(),
            },
            snapshot_dir: PathBuf::from(DEFAULT_SNAPSHOT_DIR),
            dashboard_addr: DEFAULT_DASHBOARD_ADDR.to_string(),
        }
    }

    fn from_file(file: CounterConfigFile) -> Result<Self> {
        let counting_file = file.counting.unwrap_or_default();
        let variant = counting_file.variant.unwrap_or(Variant::Region);
        let mut cfg = Self::for_variant(variant);

        if let Some(camera) = file.camera {
            if let Some(url) = camera.url {
                cfg.camera.url = url;
            }
            if let Some(threaded) = camera.threaded {
                cfg.camera.threaded = threaded;
            }
            if let Some(ms) = camera.warmup_ms {
                cfg.camera.warmup = Duration::from_millis(ms);
            }
        }
        if let Some(detector) = file.detector {
            if let Some(backend) = detector.backend {
                cfg.detector.backend = backend;
            }
            cfg.detector.model_path = detector.model_path;
            cfg.detector.endpoint = detector.endpoint;
            if let Some(confidence) = detector.confidence {
                cfg.detector.confidence = confidence;
            }
            if let Some(iou) = detector.iou {
                cfg.detector.iou = iou;
            }
            if let Some(image_size) = detector.image_size {
                cfg.detector.image_size = image_size;
            }
        }
        if let Some(target_class) = counting_file.target_class {
            cfg.counting.target_class = target_class;
        }
        if let Some(width) = counting_file.min_box_width {
            cfg.counting.min_box_width = if width > 0.0 { Some(width) } else { None };
        }
        if let Some(label) = counting_file.label {
            cfg.counting.label = label;
        }
        if let Some(dir) = file.snapshots.and_then(|s| s.dir) {
            cfg.snapshot_dir = dir;
        }
        if let Some(addr) = file.dashboard.and_then(|d| d.addr) {
            cfg.dashboard_addr = addr;
        }
        Ok(cfg)
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(variant) = std::env::var("LIDCOUNT_VARIANT") {
            if !variant.trim().is_empty() {
                self.switch_variant(variant.parse()?);
            }
        }
        if let Ok(url) = std::env::var("LIDCOUNT_CAMERA_URL") {
            if !url.trim().is_empty() {
                self.camera.url = url;
            }
        }
        if let Ok(backend) = std::env::var("LIDCOUNT_DETECTOR") {
            if !backend.trim().is_empty() {
                self.detector.backend = backend.parse()?;
            }
        }
        if let Ok(confidence) = std::env::var("LIDCOUNT_CONFIDENCE") {
            self.detector.confidence = confidence
                .trim()
                .parse()
                .map_err(|_| anyhow!("LIDCOUNT_CONFIDENCE must be a number between 0 and 1"))?;
        }
        if let Ok(dir) = std::env::var("LIDCOUNT_SNAPSHOT_DIR") {
            if !dir.trim().is_empty() {
                self.snapshot_dir = PathBuf::from(dir);
            }
        }
        if let Ok(addr) = std::env::var("LIDCOUNT_DASHBOARD_ADDR") {
            if !addr.trim().is_empty() {
                self.dashboard_addr = addr;
            }
        }
        Ok(())
    }

    /// Change variant, moving every setting that still holds the old
    /// variant's default to the new variant's default.
    pub fn switch_variant(&mut self, variant: Variant) {
        let old = self.counting.variant;
        if old == variant {
            return;
        }
        if self.detector.confidence == old.default_confidence() {
            self.detector.confidence = variant.default_confidence();
        }
        if self.camera.threaded == old.default_threaded() {
            self.camera.threaded = variant.default_threaded();
        }
        if self.camera.warmup == old.default_warmup() {
            self.camera.warmup = variant.default_warmup();
        }
        if self.counting.min_box_width == old.default_min_box_width() {
            self.counting.min_box_width = variant.default_min_box_width();
        }
        self.counting.variant = variant;
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.detector.confidence) {
            bail!("detector confidence must be within [0, 1]");
        }
        if !(0.0..=1.0).contains(&self.detector.iou) {
            bail!("detector iou must be within [0, 1]");
        }
        if self.detector.image_size == 0 {
            bail!("detector image_size must be greater than zero");
        }
        match self.detector.backend {
            BackendKind::Remote if self.detector.endpoint.is_none() => {
                bail!("remote detector requires detector.endpoint")
            }
            BackendKind::Tract if self.detector.model_path.is_none() => {
                bail!("tract detector requires detector.model_path")
            }
            _ => {}
        }
        if self.camera.url.trim().is_empty() {
            bail!("camera url must not be empty");
        }
        if self.counting.label.trim().is_empty() {
            bail!("counting label must not be empty");
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<CounterConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("toml"))
        .unwrap_or(false);
    let cfg = if is_toml {
        toml::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}
