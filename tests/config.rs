use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use tempfile::NamedTempFile;

use lidcount::config::{BackendKind, CounterConfig, Variant};

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "LIDCOUNT_CONFIG",
        "LIDCOUNT_CAMERA_URL",
        "LIDCOUNT_VARIANT",
        "LIDCOUNT_DETECTOR",
        "LIDCOUNT_CONFIDENCE",
        "LIDCOUNT_SNAPSHOT_DIR",
        "LIDCOUNT_DASHBOARD_ADDR",
    ] {
        std::env::remove_var(key);
    }
}

fn config_file(suffix: &str, body: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(suffix)
        .tempfile()
        .expect("temp config");
    file.write_all(body.as_bytes()).expect("write config");
    file
}

#[test]
fn defaults_without_file_or_env() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = CounterConfig::load(None).expect("load config");
    assert_eq!(cfg.counting.variant, Variant::Region);
    assert_eq!(cfg.camera.url, "stub://balls");
    assert_eq!(cfg.detector.backend, BackendKind::Stub);
    assert_eq!(cfg.detector.confidence, 0.5);
    assert_eq!(cfg.snapshot_dir, PathBuf::from("lid_images"));
    assert!(!cfg.camera.threaded);
}

#[test]
fn loads_json_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = config_file(
        ".json",
        r#"{
            "camera": { "url": "http://192.168.0.37:4747/video", "warmup_ms": 500 },
            "detector": {
                "backend": "remote",
                "endpoint": "http://127.0.0.1:9000/detect",
                "iou": 0.45,
                "image_size": 480
            },
            "counting": { "variant": "tracking", "label": "lids" },
            "snapshots": { "dir": "shots" },
            "dashboard": { "addr": "127.0.0.1:9100" }
        }"#,
    );

    std::env::set_var("LIDCOUNT_CONFIG", file.path());
    std::env::set_var("LIDCOUNT_CONFIDENCE", "0.7");
    std::env::set_var("LIDCOUNT_SNAPSHOT_DIR", "/tmp/lid_shots");

    let cfg = CounterConfig::load(None).expect("load config");

    assert_eq!(cfg.camera.url, "http://192.168.0.37:4747/video");
    assert_eq!(cfg.camera.warmup, Duration::from_millis(500));
    assert!(cfg.camera.threaded);
    assert_eq!(cfg.detector.backend, BackendKind::Remote);
    assert_eq!(cfg.detector.endpoint.as_deref(), Some("http://127.0.0.1:9000/detect"));
    assert_eq!(cfg.detector.iou, 0.45);
    assert_eq!(cfg.detector.image_size, 480);
    assert_eq!(cfg.detector.confidence, 0.7);
    assert_eq!(cfg.counting.variant, Variant::Tracking);
    assert_eq!(cfg.counting.min_box_width, Some(30.0));
    assert_eq!(cfg.counting.label, "lids");
    assert_eq!(cfg.snapshot_dir, PathBuf::from("/tmp/lid_shots"));
    assert_eq!(cfg.dashboard_addr, "127.0.0.1:9100");

    clear_env();
}

#[test]
fn loads_toml_by_extension() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = config_file(
        ".toml",
        r#"
[camera]
url = "stub://balls?count=2"
threaded = true

[counting]
variant = "region"
min_box_width = 12.0
"#,
    );

    let cfg = CounterConfig::load(Some(file.path())).expect("load config");
    assert_eq!(cfg.camera.url, "stub://balls?count=2");
    assert!(cfg.camera.threaded);
    assert_eq!(cfg.counting.variant, Variant::Region);
    assert_eq!(cfg.counting.min_box_width, Some(12.0));
}

#[test]
fn env_variant_switch_moves_defaults() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("LIDCOUNT_VARIANT", "tracking");
    let cfg = CounterConfig::load(None).expect("load config");
    assert_eq!(cfg.counting.variant, Variant::Tracking);
    assert_eq!(cfg.detector.confidence, 0.6);
    assert!(cfg.camera.threaded);
    assert_eq!(cfg.camera.warmup, Duration::from_secs(2));

    clear_env();
}

#[test]
fn rejects_invalid_settings() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("LIDCOUNT_CONFIDENCE", "1.5");
    assert!(CounterConfig::load(None).is_err());
    clear_env();

    std::env::set_var("LIDCOUNT_CONFIDENCE", "high");
    assert!(CounterConfig::load(None).is_err());
    clear_env();

    std::env::set_var("LIDCOUNT_DETECTOR", "remote");
    let err = CounterConfig::load(None).unwrap_err();
    assert!(err.to_string().contains("endpoint"));
    clear_env();

    let file = config_file(".json", r#"{ "counting": { "variant": "both" } }"#);
    assert!(CounterConfig::load(Some(file.path())).is_err());

    let missing = PathBuf::from("/nonexistent/lidcount.json");
    assert!(CounterConfig::load(Some(&missing)).is_err());
}
