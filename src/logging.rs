//! Tracing setup.
//!
//! The local terminal carries the relayed session, so logs always go to a
//! file and never to stdout or stderr.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::error::Result;

pub const DEFAULT_FILTER: &str = "tattle=info,tattle_lib=info";

/// Initialise the global tracing subscriber writing to `path`.
///
/// `RUST_LOG` overrides [`DEFAULT_FILTER`]. With `log_json` every line is a
/// JSON object.
pub fn init_tracing(path: &Path, log_json: bool) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(path)?;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| DEFAULT_FILTER.into());
    let layer = tracing_subscriber::fmt::layer()
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_thread_names(true);

    if log_json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(layer.json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(layer)
            .init();
    }
    Ok(())
}
