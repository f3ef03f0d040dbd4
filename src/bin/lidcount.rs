//! lidcount - count objects in an IP webcam stream
//!
//! 1. Loads configuration (file, environment, command line)
//! 2. Opens the camera and the detector backend
//! 3. Counts the target class per frame (region) or by track id (tracking)
//! 4. Shows annotated frames on the console or the web dashboard
//! 5. Saves annotated frames as training shots on request

use anyhow::{anyhow, Result};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use lidcount::config::{BackendKind, CounterConfig, Variant};
use lidcount::present::{action_channel, ConsolePresenter, Dashboard, Presenter};
use lidcount::{build_backend, open_source, run, Action, Capture, ExitReason, Pipeline, Session};
use lidcount::SnapshotWriter;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum PresenterKind {
    Console,
    Dashboard,
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Count objects in an IP webcam stream")]
struct Args {
    /// JSON or TOML configuration file.
    #[arg(long, env = "LIDCOUNT_CONFIG")]
    config: Option<PathBuf>,

    /// Camera URL: http(s)://host:4747/video, stub://balls?count=3, dir://path.
    #[arg(long)]
    source: Option<String>,

    /// Counting variant: region or tracking.
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

    /// Where annotated frames are shown.
    #[arg(long, value_enum, default_value = "console")]
    presenter: PresenterKind,

    /// Read the camera on a background thread.
    #[arg(long, conflicts_with = "sync")]
    threaded: bool,

    /// Read the camera on the processing thread.
    #[arg(long)]
    sync: bool,

    /// Directory for saved training shots.
    #[arg(long)]
    out: Option<PathBuf>,

    /// Dashboard listen address.
    #[arg(long)]
    addr: Option<String>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let cfg = resolve_config(&args)?;
    log::info!(
        "variant={} camera={} detector={} threaded={} snapshots={}",
        cfg.counting.variant.as_str(),
        cfg.camera.url,
        cfg.detector.backend.as_str(),
        cfg.camera.threaded,
        cfg.snapshot_dir.display()
    );

    let detector = build_backend(&cfg.detector, cfg.counting.target_class)?;
    let mut pipeline = Pipeline::from_config(&cfg, detector);
    let mut session = Session::new(pipeline.mode(), SnapshotWriter::new(&cfg.snapshot_dir)?);

    let (tx, rx) = action_channel();
    let signal_tx = tx.clone();
    ctrlc::set_handler(move || {
        let _ = signal_tx.send(Action::Quit);
    })
    .map_err(|e| anyhow!("error setting Ctrl-C handler: {}", e))?;

    let mut presenter: Box<dyn Presenter> = match args.presenter {
        PresenterKind::Console => Box::new(ConsolePresenter::new(tx)?),
        PresenterKind::Dashboard => {
            Box::new(Dashboard::spawn(&cfg.dashboard_addr, pipeline.mode(), tx)?)
        }
    };

    let source = open_source(&cfg.camera.url)?;
    let mut capture = Capture::open(source, cfg.camera.threaded, cfg.camera.warmup)?;

    let summary = run(
        &mut capture,
        &mut pipeline,
        &mut session,
        presenter.as_mut(),
        &rx,
    )?;

    match summary.exit {
        ExitReason::CameraLost => log::warn!("stopped: camera stream lost"),
        ExitReason::Quit => log::info!("stopped: quit requested"),
    }
    log::info!(
        "frames={} detector_failures={} final_count={} snapshots={}",
        summary.frames_processed,
        summary.detector_failures,
        summary.final_count,
        summary.snapshots
    );
    Ok(())
}

fn resolve_config(args: &Args) -> Result<CounterConfig> {
    let mut cfg = CounterConfig::load(args.config.as_deref())?;
    if let Some(variant) = &args.variant {
        cfg.switch_variant(variant.parse::<Variant>()?);
    }
    if let Some(source) = &args.source {
        cfg.camera.url = source.clone();
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
    if args.threaded {
        cfg.camera.threaded = true;
    }
    if args.sync {
        cfg.camera.threaded = false;
    }
    if let Some(out) = &args.out {
        cfg.snapshot_dir = out.clone();
    }
    if let Some(addr) = &args.addr {
        cfg.dashboard_addr = addr.clone();
    }
    cfg.validate()?;
    Ok(cfg)
}
