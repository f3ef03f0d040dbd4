use anyhow::{anyhow, Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;
use serde::Deserialize;
use std::time::Duration;
use url::Url;

use crate::detect::backend::{DetectRequest, DetectorBackend};
use crate::detect::result::Detection;
use crate::frame::BBox;

const JPEG_QUALITY: u8 = 90;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Backend that delegates detection (and tracking) to an HTTP inference service.
///
/// Each call POSTs the JPEG-encoded image to the endpoint. Request parameters
/// travel in the query string:
///
/// `POST <endpoint>?conf=0.6&iou=0.5&imgsz=640&classes=32&track=true`
///
/// The service answers with
/// `{"detections":[{"class_id":32,"confidence":0.8,"bbox":[x1,y1,x2,y2],"track_id":4}]}`.
/// Tracker continuity is the service's concern; sequential calls are assumed
/// to share its tracker state.
pub struct RemoteBackend {
    endpoint: Url,
    agent: ureq::Agent,
}

#[derive(Debug, Deserialize)]
struct RemoteResponse {
    detections: Vec<RemoteDetection>,
}

#[derive(Debug, Deserialize)]
struct RemoteDetection {
    class_id: u32,
    confidence: f32,
    bbox: [f32; 4],
    #[serde(default)]
    track_id: Option<u64>,
}

impl RemoteBackend {
    pub fn new(endpoint: &str) -> Result<Self> {
        let endpoint = Url::parse(endpoint).context("parse detector endpoint")?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(anyhow!(
                "detector endpoint must be http(s), got '{}'",
                endpoint.scheme()
            ));
        }
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(CONNECT_TIMEOUT)
            .build();
        Ok(Self { endpoint, agent })
    }

    fn request_url(&self, request: &DetectRequest) -> Url {
        let mut url = self.endpoint.clone();
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("conf", &request.confidence.to_string());
            query.append_pair("iou", &request.iou.to_string());
            query.append_pair("imgsz", &request.image_size.to_string());
            if let Some(classes) = &request.classes {
                let joined = classes
                    .iter()
                    .map(|c| c.to_string())
                    .collect::<Vec<_>>()
                    .join(",");
                query.append_pair("classes", &joined);
            }
            query.append_pair("track", if request.track { "true" } else { "false" });
        }
        url
    }
}

fn encode_jpeg(image: &RgbImage) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY)
        .encode_image(image)
        .context("encode frame as jpeg")?;
    Ok(out)
}

fn parse_response(body: &str) -> Result<Vec<Detection>> {
    let response: RemoteResponse =
        serde_json::from_str(body).context("invalid detector response")?;
    response
        .detections
        .into_iter()
        .map(|d| {
            if !(0.0..=1.0).contains(&d.confidence) {
                return Err(anyhow!(
                    "detector returned confidence {} outside [0, 1]",
                    d.confidence
                ));
            }
            let [x1, y1, x2, y2] = d.bbox;
            Ok(Detection {
                class_id: d.class_id,
                confidence: d.confidence,
                bbox: BBox::new(x1, y1, x2, y2),
                track_id: d.track_id,
            })
        })
        .collect()
}

impl DetectorBackend for RemoteBackend {
    fn name(&self) -> &'static str {
        "remote"
    }

    fn supports_tracking(&self) -> bool {
        true
    }

    fn detect(&mut self, image: &RgbImage, request: &DetectRequest) -> Result<Vec<Detection>> {
        let body = encode_jpeg(image)?;
        let url = self.request_url(request);
        let response = self
            .agent
            .post(url.as_str())
            .set("Content-Type", "image/jpeg")
            .send_bytes(&body)
            .with_context(|| format!("detector request to {}", self.endpoint))?;
        let text = response
            .into_string()
            .context("read detector response body")?;
        parse_response(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;

    #[test]
    fn request_url_carries_parameters() -> Result<()> {
        let backend = RemoteBackend::new("http://127.0.0.1:9000/detect")?;
        let url = backend.request_url(&DetectRequest {
            confidence: 0.6,
            iou: 0.5,
            image_size: 640,
            classes: Some(vec![32, 41]),
            track: true,
        });
        let query = url.query().unwrap_or_default();
        assert!(query.contains("conf=0.6"));
        assert!(query.contains("imgsz=640"));
        assert!(query.contains("classes=32%2C41"));
        assert!(query.contains("track=true"));
        Ok(())
    }

    #[test]
    fn parses_detections_with_optional_track_ids() -> Result<()> {
        let detections = parse_response(
            r#"{"detections":[
                {"class_id":32,"confidence":0.8,"bbox":[1,2,3,4],"track_id":9},
                {"class_id":32,"confidence":0.7,"bbox":[5,6,7,8]}
            ]}"#,
        )?;
        assert_eq!(detections.len(), 2);
        assert_eq!(detections[0].track_id, Some(9));
        assert_eq!(detections[0].bbox, BBox::new(1.0, 2.0, 3.0, 4.0));
        assert_eq!(detections[1].track_id, None);
        assert!(parse_response(r#"{"detections":[{"class_id":1,"confidence":1.5,"bbox":[0,0,1,1]}]}"#).is_err());
        assert!(parse_response("not json").is_err());
        Ok(())
    }

    #[test]
    fn rejects_non_http_endpoint() {
        assert!(RemoteBackend::new("ftp://host/detect").is_err());
    }

    #[test]
    fn posts_jpeg_and_reads_detections() -> Result<()> {
        let listener = TcpListener::bind("127.0.0.1:0")?;
        let addr = listener.local_addr()?;
        let server = std::thread::spawn(move || -> Result<String> {
            let (stream, _) = listener.accept()?;
            let mut reader = BufReader::new(stream.try_clone()?);
            let mut request_line = String::new();
            reader.read_line(&mut request_line)?;
            let mut content_length = 0usize;
            loop {
                let mut line = String::new();
                reader.read_line(&mut line)?;
                if line == "\r\n" || line.is_empty() {
                    break;
                }
                if let Some((k, v)) = line.split_once(':') {
                    if k.trim().eq_ignore_ascii_case("content-length") {
                        content_length = v.trim().parse()?;
                    }
                }
            }
            let mut body = vec![0u8; content_length];
            reader.read_exact(&mut body)?;
            assert_eq!(&body[..2], &[0xFF, 0xD8]);
            let payload =
                r#"{"detections":[{"class_id":32,"confidence":0.75,"bbox":[0,0,4,4],"track_id":1}]}"#;
            let mut stream = stream;
            write!(
                stream,
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                payload.len(),
                payload
            )?;
            Ok(request_line)
        });

        let mut backend = RemoteBackend::new(&format!("http://{}/detect", addr))?;
        let image = RgbImage::new(16, 16);
        let request = DetectRequest {
            track: true,
            classes: Some(vec![32]),
            ..DetectRequest::default()
        };
        let detections = backend.detect(&image, &request)?;
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].track_id, Some(1));

        let request_line = server.join().expect("server thread")?;
        assert!(request_line.starts_with("POST /detect?"));
        assert!(request_line.contains("track=true"));
        Ok(())
    }
}
