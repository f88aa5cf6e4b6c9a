//! Flight media recorder - asynchronous multi-track recording to local storage.
//!
//! Capture and encode threads hand video and audio samples to a [`Recorder`],
//! which persists them on a background thread and keeps a CSV session index
//! describing where every sample landed.

pub mod recorder;
pub mod utils;

pub use recorder::{
    DiskStatus, NullStatus, Recorder, RecorderConfig, RecorderEvent, RecorderState, RecorderStats,
    StatusSink, TrackKind, TrackSpec,
};
pub use utils::error::{RecorderError, RecorderResult};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install the default tracing subscriber
///
/// Honours `RUST_LOG`, falling back to debug output for this crate. Fails if
/// a global subscriber is already installed.
pub fn init_tracing() -> Result<(), tracing_subscriber::util::TryInitError> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "flight_media_recorder=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init()?;

    tracing::info!("Flight media recorder v{}", env!("CARGO_PKG_VERSION"));
    Ok(())
}
