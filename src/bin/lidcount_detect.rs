//! lidcount_detect - run the configured detector over still images
//!
//! Prints one JSON line per image with the filtered detections in image
//! coordinates. Useful for checking saved training shots against a model.

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::path::PathBuf;

use lidcount::config::{BackendKind, CounterConfig, Variant};
use lidcount::{build_backend, Frame, Pipeline};

#[derive(Parser, Debug)]
#[command(author, version, about = "Run the lidcount detector over image files")]
struct Args {
    /// JSON or TOML configuration file.
    #[arg(long, env = "LIDCOUNT_CONFIG")]
    config: Option<PathBuf>,

    /// Counting variant: region crops to the central region first.
    #[arg(long)]
    variant: Option<String>,

    /// Detector backend: stub, remote or tract.
    #[arg(long)]
    detector: Option<String>,

    /// Inference service URL for the remote backend.
    #[arg(long)]
    endpoint: Option<String>,

    /// ONNX model for the tract backend.
    #[arg(long)]
    model: Option<PathBuf>,

    /// Images to check.
    #[arg(required = true)]
    images: Vec<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Args::parse();
    let mut cfg = CounterConfig::load(args.config.as_deref())?;
    if let Some(variant) = &args.variant {
        cfg.switch_variant(variant.parse::<Variant>()?);
    }
    if let Some(detector) = &args.detector {
        cfg.detector.backend = detector.parse::<BackendKind>()?;
    }
    if let Some(endpoint) = &args.endpoint {
        cfg.detector.endpoint = Some(endpoint.clone());
    }
    if let Some(model) = &args.model {
        cfg.detector.model_path = Some(model.clone());
    }
    cfg.validate()?;

    let detector = build_backend(&cfg.detector, cfg.counting.target_class)?;
    let mut pipeline = Pipeline::from_config(&cfg, detector);

    let mut failures = 0usize;
    for (index, path) in args.images.iter().enumerate() {
        let image = match image::open(path) {
            Ok(image) => image.into_rgb8(),
            Err(err) => {
                log::error!("skipping {}: {}", path.display(), err);
                failures += 1;
                continue;
            }
        };
        let frame = Frame::new(image, index as u64 + 1);
        let (detections, roi) = pipeline
            .detect(&frame)
            .with_context(|| format!("detect on {}", path.display()))?;
        let line = serde_json::json!({
            "file": path.display().to_string(),
            "width": frame.width(),
            "height": frame.height(),
            "roi": roi,
            "count": detections.len(),
            "detections": detections,
        });
        println!("{}", line);
    }

    if failures == args.images.len() {
        return Err(anyhow!("no readable images"));
    }
    Ok(())
}
