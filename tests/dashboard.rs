use anyhow::{anyhow, Result};
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::time::{Duration, Instant};

use lidcount::config::{CounterConfig, Variant};
use lidcount::detect::MarkerBackend;
use lidcount::present::action_channel;
use lidcount::{open_source, run, Capture, Dashboard, ExitReason, Pipeline, Session, SnapshotWriter};

fn request(addr: SocketAddr, method: &str, path: &str) -> Result<String> {
    let mut stream = TcpStream::connect(addr)?;
    stream.set_read_timeout(Some(Duration::from_secs(5)))?;
    write!(
        stream,
        "{} {} HTTP/1.1\r\nHost: localhost\r\nContent-Length: 0\r\n\r\n",
        method, path
    )?;
    let mut response = Vec::new();
    stream.read_to_end(&mut response)?;
    Ok(String::from_utf8_lossy(&response).into_owned())
}

#[test]
fn dashboard_buttons_drive_the_loop() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let cfg = CounterConfig::for_variant(Variant::Tracking);
    let mut pipeline = Pipeline::from_config(&cfg, Box::new(MarkerBackend::new(32)));
    let mut session = Session::new(pipeline.mode(), SnapshotWriter::new(dir.path())?);

    let (tx, rx) = action_channel();
    let mut dashboard = Dashboard::spawn("127.0.0.1:0", pipeline.mode(), tx)?;
    let addr = dashboard.addr();

    let client = std::thread::spawn(move || -> Result<()> {
        let deadline = Instant::now() + Duration::from_secs(10);
        loop {
            if request(addr, "GET", "/frame.jpg")?.starts_with("HTTP/1.1 200") {
                break;
            }
            if Instant::now() > deadline {
                return Err(anyhow!("no frame published"));
            }
            std::thread::sleep(Duration::from_millis(20));
        }
        let status = request(addr, "GET", "/status")?;
        if !status.contains(r#""mode":"cumulative""#) {
            return Err(anyhow!("unexpected status {}", status));
        }
        if !request(addr, "POST", "/snapshot")?.starts_with("HTTP/1.1 202") {
            return Err(anyhow!("snapshot not accepted"));
        }
        if !request(addr, "POST", "/quit")?.starts_with("HTTP/1.1 202") {
            return Err(anyhow!("quit not accepted"));
        }
        Ok(())
    });

    let source = open_source("stub://balls?count=2&fps=60&width=320&height=240")?;
    let mut capture = Capture::open(source, false, Duration::ZERO)?;
    let summary = run(&mut capture, &mut pipeline, &mut session, &mut dashboard, &rx)?;

    client.join().map_err(|_| anyhow!("client thread panicked"))??;
    assert_eq!(summary.exit, ExitReason::Quit);
    assert_eq!(summary.snapshots, 1);
    assert!(dir.path().join("test_shot_0.png").is_file());
    // run() stopped the server
    assert!(TcpStream::connect_timeout(&addr, Duration::from_millis(200))
        .and_then(|mut s| {
            s.set_read_timeout(Some(Duration::from_millis(500)))?;
            s.write_all(b"GET /health HTTP/1.1\r\n\r\n")?;
            let mut buf = Vec::new();
            s.read_to_end(&mut buf).map(|_| buf)
        })
        .map(|buf| buf.is_empty())
        .unwrap_or(true));
    Ok(())
}
