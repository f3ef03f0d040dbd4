use anyhow::{anyhow, Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;
use serde::Serialize;
use std::collections::VecDeque;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use super::Presenter;
use crate::session::{Action, CountMode, Readout};

const MAX_REQUEST_BYTES: usize = 8192;
const MAX_NOTICES: usize = 8;
const JPEG_QUALITY: u8 = 80;
const STREAM_POLL: Duration = Duration::from_millis(500);
const BOUNDARY: &str = "frame";

const INDEX_HTML: &str = r#"<!doctype html>
<html>
<head>
<meta charset="utf-8">
<title>lidcount</title>
<style>
body { font-family: sans-serif; background: #111; color: #eee; margin: 0; display: flex; }
#view { flex: 3; padding: 12px; }
#view img { max-width: 100%; border: 1px solid #333; }
#panel { flex: 1; padding: 12px; }
#count { font-size: 64px; color: #3c3; }
button { font-size: 18px; margin: 4px 0; width: 100%; }
#notices { font-size: 13px; color: #fa3; }
</style>
</head>
<body>
<div id="view"><img src="/stream.mjpg" alt="camera"></div>
<div id="panel">
  <div id="mode"></div>
  <div id="count">-</div>
  <div>in frame: <span id="current">-</span></div>
  <div>frames: <span id="frames">-</span></div>
  <button onclick="act('/snapshot')">Save image</button>
  <button onclick="act('/reset')">Reset counter</button>
  <button onclick="act('/quit')">Quit</button>
  <ul id="notices"></ul>
</div>
<script>
function act(path) { fetch(path, { method: 'POST' }); }
async function poll() {
  try {
    const s = await (await fetch('/status')).json();
    document.getElementById('mode').textContent = s.mode === 'cumulative' ? 'TOTAL' : 'IN BUCKET';
    document.getElementById('count').textContent = s.mode === 'cumulative' ? s.total : s.current;
    document.getElementById('current').textContent = s.current;
    document.getElementById('frames').textContent = s.frames;
    const list = document.getElementById('notices');
    list.replaceChildren(...s.notices.map(n => {
      const li = document.createElement('li');
      li.textContent = n;
      return li;
    }));
  } catch (e) {}
  setTimeout(poll, 500);
}
poll();
</script>
</body>
</html>
"#;

#[derive(Clone, Debug, Serialize)]
struct Status {
    mode: CountMode,
    current: usize,
    total: usize,
    frames: u64,
    notices: VecDeque<String>,
}

struct Board {
    jpeg: Option<Arc<Vec<u8>>>,
    generation: u64,
    status: Status,
}

struct Shared {
    board: Mutex<Board>,
    updated: Condvar,
    shutdown: AtomicBool,
    actions: Mutex<Sender<Action>>,
}

impl Shared {
    fn board(&self) -> Result<std::sync::MutexGuard<'_, Board>> {
        self.board
            .lock()
            .map_err(|_| anyhow!("dashboard state poisoned"))
    }

    fn send(&self, action: Action) -> Result<()> {
        let actions = self
            .actions
            .lock()
            .map_err(|_| anyhow!("dashboard action channel poisoned"))?;
        actions
            .send(action)
            .map_err(|_| anyhow!("processing loop is no longer listening"))
    }
}

/// Local web view: annotated MJPEG stream, live metrics, action buttons.
pub struct Dashboard {
    addr: SocketAddr,
    shared: Arc<Shared>,
    join: Option<JoinHandle<()>>,
}

impl Dashboard {
    pub fn spawn(addr: &str, mode: CountMode, actions: Sender<Action>) -> Result<Self> {
        let configured_addr: SocketAddr = addr
            .parse()
            .with_context(|| format!("invalid dashboard address '{}'", addr))?;
        let listener = TcpListener::bind(configured_addr)
            .with_context(|| format!("bind dashboard on {}", configured_addr))?;
        let addr = listener.local_addr()?;
        if configured_addr.ip().is_loopback() && !addr.ip().is_loopback() {
            return Err(anyhow!(
                "dashboard configured for loopback address '{}', but bound to non-loopback address '{}'",
                configured_addr,
                addr
            ));
        }
        listener.set_nonblocking(true)?;

        let shared = Arc::new(Shared {
            board: Mutex::new(Board {
                jpeg: None,
                generation: 0,
                status: Status {
                    mode,
                    current: 0,
                    total: 0,
                    frames: 0,
                    notices: VecDeque::new(),
                },
            }),
            updated: Condvar::new(),
            shutdown: AtomicBool::new(false),
            actions: Mutex::new(actions),
        });
        let shared_thread = shared.clone();
        let join = std::thread::Builder::new()
            .name("dashboard".to_string())
            .spawn(move || {
                if let Err(err) = run_dashboard(listener, shared_thread) {
                    log::error!("dashboard stopped: {}", err);
                }
            })?;

        log::info!("dashboard listening on http://{}", addr);
        Ok(Self {
            addr,
            shared,
            join: Some(join),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stop accepting, end every viewer stream and join the server thread.
    pub fn stop(&mut self) -> Result<()> {
        self.shared.shutdown.store(true, Ordering::SeqCst);
        self.shared.updated.notify_all();
        if let Some(join) = self.join.take() {
            join.join()
                .map_err(|_| anyhow!("dashboard server thread panicked"))?;
        }
        Ok(())
    }
}

impl Drop for Dashboard {
    fn drop(&mut self) {
        if let Err(err) = self.stop() {
            log::error!("{}", err);
        }
    }
}

impl Presenter for Dashboard {
    fn name(&self) -> &'static str {
        "dashboard"
    }

    fn present(&mut self, image: &RgbImage, readout: &Readout) -> Result<()> {
        let mut jpeg = Vec::new();
        JpegEncoder::new_with_quality(&mut jpeg, JPEG_QUALITY)
            .encode_image(image)
            .context("encode dashboard frame")?;
        {
            let mut board = self.shared.board()?;
            board.jpeg = Some(Arc::new(jpeg));
            board.generation += 1;
            board.status.mode = readout.mode;
            board.status.current = readout.current;
            board.status.total = readout.total;
            board.status.frames += 1;
        }
        self.shared.updated.notify_all();
        Ok(())
    }

    fn notify(&mut self, notice: &str) {
        log::warn!("{}", notice);
        if let Ok(mut board) = self.shared.board() {
            if board.status.notices.len() == MAX_NOTICES {
                board.status.notices.pop_front();
            }
            board.status.notices.push_back(notice.to_string());
        }
    }

    fn shutdown(&mut self) -> Result<()> {
        self.stop()
    }
}

fn run_dashboard(listener: TcpListener, shared: Arc<Shared>) -> Result<()> {
    let mut viewers: Vec<JoinHandle<()>> = Vec::new();
    loop {
        if shared.shutdown.load(Ordering::SeqCst) {
            break;
        }
        match listener.accept() {
            Ok((stream, _)) => match handle_connection(stream, &shared) {
                Ok(Some(viewer)) => viewers.push(viewer),
                Ok(None) => {}
                Err(err) => log::warn!("dashboard request rejected: {}", err),
            },
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                viewers.retain(|viewer| !viewer.is_finished());
                std::thread::sleep(Duration::from_millis(50));
                continue;
            }
            Err(err) => return Err(err.into()),
        }
    }
    for viewer in viewers {
        let _ = viewer.join();
    }
    Ok(())
}

/// Serve one request. Returns the viewer thread for stream requests.
fn handle_connection(mut stream: TcpStream, shared: &Arc<Shared>) -> Result<Option<JoinHandle<()>>> {
    stream.set_nonblocking(false)?;
    let peer = stream.peer_addr()?;
    let local = stream.local_addr()?;
    if local.ip().is_loopback() && !peer.ip().is_loopback() {
        write_json_response(&mut stream, 403, r#"{"error":"forbidden"}"#)?;
        return Ok(None);
    }

    let request = read_request(&mut stream)?;
    match (request.method.as_str(), request.path.as_str()) {
        ("GET", "/") | ("GET", "/index.html") => {
            write_response(&mut stream, 200, "text/html; charset=utf-8", INDEX_HTML.as_bytes())?;
        }
        ("GET", "/health") => {
            write_json_response(&mut stream, 200, r#"{"status":"ok"}"#)?;
        }
        ("GET", "/status") => {
            let status = shared.board()?.status.clone();
            let payload = serde_json::to_vec(&status)?;
            write_response(&mut stream, 200, "application/json", &payload)?;
        }
        ("GET", "/frame.jpg") => {
            let jpeg = shared.board()?.jpeg.clone();
            match jpeg {
                Some(jpeg) => write_response(&mut stream, 200, "image/jpeg", &jpeg)?,
                None => write_json_response(&mut stream, 404, r#"{"error":"no_frame"}"#)?,
            }
        }
        ("GET", "/stream.mjpg") => {
            let shared = shared.clone();
            let viewer = std::thread::Builder::new()
                .name("dashboard-viewer".to_string())
                .spawn(move || {
                    if let Err(err) = stream_frames(stream, &shared) {
                        log::debug!("dashboard viewer left: {}", err);
                    }
                })?;
            return Ok(Some(viewer));
        }
        ("POST", path) => {
            let action = match path {
                "/snapshot" => Action::Snapshot,
                "/reset" => Action::Reset,
                "/quit" => Action::Quit,
                _ => {
                    write_json_response(&mut stream, 404, r#"{"error":"not_found"}"#)?;
                    return Ok(None);
                }
            };
            match shared.send(action) {
                Ok(()) => write_json_response(&mut stream, 202, r#"{"status":"accepted"}"#)?,
                Err(err) => {
                    write_json_response(&mut stream, 503, r#"{"error":"not_running"}"#)?;
                    return Err(err);
                }
            }
        }
        ("GET", _) => {
            write_json_response(&mut stream, 404, r#"{"error":"not_found"}"#)?;
        }
        _ => {
            write_json_response(&mut stream, 405, r#"{"error":"method_not_allowed"}"#)?;
        }
    }
    Ok(None)
}

/// Push every new annotated frame to one viewer until it disconnects or the
/// dashboard stops.
fn stream_frames(mut stream: TcpStream, shared: &Shared) -> Result<()> {
    let header = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: multipart/x-mixed-replace; boundary={}\r\nCache-Control: no-store\r\nConnection: close\r\n\r\n",
        BOUNDARY
    );
    stream.write_all(header.as_bytes())?;
    let mut seen = 0u64;
    loop {
        let jpeg = {
            let mut board = shared.board()?;
            while board.generation == seen && !shared.shutdown.load(Ordering::SeqCst) {
                let (next, _) = shared
                    .updated
                    .wait_timeout(board, STREAM_POLL)
                    .map_err(|_| anyhow!("dashboard state poisoned"))?;
                board = next;
            }
            if shared.shutdown.load(Ordering::SeqCst) {
                return Ok(());
            }
            seen = board.generation;
            board.jpeg.clone()
        };
        let Some(jpeg) = jpeg else { continue };
        let part = format!(
            "--{}\r\nContent-Type: image/jpeg\r\nContent-Length: {}\r\n\r\n",
            BOUNDARY,
            jpeg.len()
        );
        stream.write_all(part.as_bytes())?;
        stream.write_all(&jpeg)?;
        stream.write_all(b"\r\n")?;
        stream.flush()?;
    }
}

#[derive(Debug)]
struct HttpRequest {
    method: String,
    path: String,
}

fn read_request(stream: &mut TcpStream) -> Result<HttpRequest> {
    stream.set_read_timeout(Some(Duration::from_secs(2)))?;
    let mut buf = [0u8; 1024];
    let mut data = Vec::new();
    loop {
        let n = stream.read(&mut buf)?;
        if n == 0 {
            break;
        }
        data.extend_from_slice(&buf[..n]);
        if data.len() > MAX_REQUEST_BYTES {
            return Err(anyhow!("request too large"));
        }
        if data.windows(4).any(|w| w == b"\r\n\r\n") {
            break;
        }
    }
    let text = String::from_utf8_lossy(&data);
    let request_line = text
        .split("\r\n")
        .next()
        .ok_or_else(|| anyhow!("empty request"))?;
    let mut parts = request_line.split_whitespace();
    let method = parts.next().ok_or_else(|| anyhow!("missing method"))?;
    let raw_path = parts.next().ok_or_else(|| anyhow!("missing path"))?;
    let path = raw_path.split('?').next().unwrap_or(raw_path).to_string();
    Ok(HttpRequest {
        method: method.to_string(),
        path,
    })
}

fn write_json_response(stream: &mut TcpStream, status: u16, body: &str) -> Result<()> {
    write_response(stream, status, "application/json", body.as_bytes())
}

fn write_response(
    stream: &mut TcpStream,
    status: u16,
    content_type: &str,
    body: &[u8],
) -> Result<()> {
    let status_line = match status {
        200 => "HTTP/1.1 200 OK",
        202 => "HTTP/1.1 202 Accepted",
        403 => "HTTP/1.1 403 Forbidden",
        404 => "HTTP/1.1 404 Not Found",
        405 => "HTTP/1.1 405 Method Not Allowed",
        503 => "HTTP/1.1 503 Service Unavailable",
        _ => "HTTP/1.1 500 Internal Server Error",
    };
    let header = format!(
        "{status_line}\r\nContent-Type: {content_type}\r\nContent-Length: {len}\r\nCache-Control: no-store\r\nConnection: close\r\n\r\n",
        status_line = status_line,
        content_type = content_type,
        len = body.len()
    );
    stream.write_all(header.as_bytes())?;
    stream.write_all(body)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

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
    fn frame_is_404_until_first_present() -> Result<()> {
        let (tx, _rx) = mpsc::channel();
        let mut dashboard = Dashboard::spawn("127.0.0.1:0", CountMode::Cumulative, tx)?;
        let addr = dashboard.addr();

        assert!(request(addr, "GET", "/frame.jpg")?.starts_with("HTTP/1.1 404"));

        let readout = Readout {
            mode: CountMode::Cumulative,
            current: 1,
            total: 4,
        };
        dashboard.present(&RgbImage::new(16, 16), &readout)?;
        dashboard.notify("Saved image to: shots/test_shot_0.png");

        let frame = request(addr, "GET", "/frame.jpg")?;
        assert!(frame.starts_with("HTTP/1.1 200"));
        assert!(frame.contains("image/jpeg"));

        let status = request(addr, "GET", "/status")?;
        assert!(status.contains(r#""total":4"#));
        assert!(status.contains(r#""mode":"cumulative""#));
        assert!(status.contains("test_shot_0.png"));

        assert!(request(addr, "GET", "/health")?.contains(r#""ok""#));
        assert!(request(addr, "GET", "/")?.contains("<title>lidcount</title>"));
        assert!(request(addr, "GET", "/missing")?.starts_with("HTTP/1.1 404"));
        dashboard.stop()?;
        Ok(())
    }

    #[test]
    fn post_routes_enqueue_actions() -> Result<()> {
        let (tx, rx) = mpsc::channel();
        let mut dashboard = Dashboard::spawn("127.0.0.1:0", CountMode::Instantaneous, tx)?;
        let addr = dashboard.addr();

        assert!(request(addr, "POST", "/snapshot")?.starts_with("HTTP/1.1 202"));
        assert!(request(addr, "POST", "/reset")?.starts_with("HTTP/1.1 202"));
        assert!(request(addr, "POST", "/quit")?.starts_with("HTTP/1.1 202"));
        assert!(request(addr, "PUT", "/quit")?.starts_with("HTTP/1.1 405"));

        let received: Vec<Action> = rx.try_iter().collect();
        assert_eq!(received, vec![Action::Snapshot, Action::Reset, Action::Quit]);
        dashboard.stop()?;
        dashboard.stop()?;
        Ok(())
    }

    #[test]
    fn stream_pushes_multipart_jpeg() -> Result<()> {
        let (tx, _rx) = mpsc::channel();
        let mut dashboard = Dashboard::spawn("127.0.0.1:0", CountMode::Instantaneous, tx)?;
        let addr = dashboard.addr();

        let mut stream = TcpStream::connect(addr)?;
        stream.set_read_timeout(Some(Duration::from_secs(5)))?;
        write!(stream, "GET /stream.mjpg HTTP/1.1\r\nHost: localhost\r\n\r\n")?;
        std::thread::sleep(Duration::from_millis(200));
        dashboard.present(&RgbImage::new(8, 8), &Readout::empty(CountMode::Instantaneous))?;

        let mut received = Vec::new();
        let mut buf = [0u8; 4096];
        while !received.windows(2).any(|w| w == [0xFF, 0xD8]) {
            let n = stream.read(&mut buf)?;
            if n == 0 {
                break;
            }
            received.extend_from_slice(&buf[..n]);
        }
        let text = String::from_utf8_lossy(&received);
        assert!(text.contains("multipart/x-mixed-replace; boundary=frame"));
        assert!(text.contains("--frame\r\nContent-Type: image/jpeg"));
        drop(stream);
        dashboard.stop()?;
        Ok(())
    }

    #[test]
    fn notices_are_rendered_as_text() -> Result<()> {
        let (tx, _rx) = mpsc::channel();
        let mut dashboard = Dashboard::spawn("127.0.0.1:0", CountMode::Cumulative, tx)?;
        let addr = dashboard.addr();

        let notice = "Failed to save image: <img src=x onerror=alert(1)>";
        dashboard.notify(notice);
        assert!(request(addr, "GET", "/status")?.contains(notice));

        let page = request(addr, "GET", "/")?;
        assert!(page.contains("li.textContent = n"));
        assert!(!page.contains("innerHTML"));
        dashboard.stop()?;
        Ok(())
    }
}
