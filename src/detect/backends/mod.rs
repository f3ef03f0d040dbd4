pub mod remote;
pub mod stub;

#[cfg(feature = "backend-tract")]
pub mod tract;

pub use remote::RemoteBackend;
pub use stub::{MarkerBackend, RequestLog, ScriptedBackend};

#[cfg(feature = "backend-tract")]
pub use tract::TractBackend;
