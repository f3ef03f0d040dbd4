mod backend;
pub mod backends;
mod filter;
mod result;

use anyhow::{anyhow, Result};

pub use backend::{DetectRequest, DetectorBackend};
pub use backends::{MarkerBackend, RemoteBackend, RequestLog, ScriptedBackend};
#[cfg(feature = "backend-tract")]
pub use backends::TractBackend;
pub use filter::DetectionFilter;
pub use result::{Detection, SPORTS_BALL_CLASS};

use crate::config::{BackendKind, DetectorSettings};

/// Build the configured detector backend.
pub fn build_backend(
    settings: &DetectorSettings,
    target_class: u32,
) -> Result<Box<dyn DetectorBackend>> {
    let mut backend: Box<dyn DetectorBackend> = match settings.backend {
        BackendKind::Stub => Box::new(MarkerBackend::new(target_class)),
        BackendKind::Remote => {
            let endpoint = settings
                .endpoint
                .as_deref()
                .ok_or_else(|| anyhow!("remote detector requires an endpoint"))?;
            Box::new(RemoteBackend::new(endpoint)?)
        }
        #[cfg(feature = "backend-tract")]
        BackendKind::Tract => {
            let model_path = settings
                .model_path
                .as_ref()
                .ok_or_else(|| anyhow!("tract detector requires a model path"))?;
            Box::new(TractBackend::new(model_path, settings.image_size)?)
        }
        #[cfg(not(feature = "backend-tract"))]
        BackendKind::Tract => {
            return Err(anyhow!(
                "tract detector requires the backend-tract feature"
            ))
        }
    };
    backend.warm_up()?;
    log::info!(
        "detector backend '{}' ready (tracking support: {})",
        backend.name(),
        backend.supports_tracking()
    );
    Ok(backend)
}
