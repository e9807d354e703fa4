pub mod commands;

use std::path::Path;

use anyhow::{Context, Result};
use matcher_core::config::{load_config, MatchConfig};
use tracing_subscriber::EnvFilter;

pub use commands::*;

/// Initialise stderr logging. `verbosity` raises the default level from
/// `warn`; `RUST_LOG` takes precedence when set.
pub fn init_logging(verbosity: u8) {
    let default = match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    // a second init (e.g. from tests calling commands directly) is harmless
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).try_init();
}

/// Load the config at `path`, or defaults when no path is given.
pub fn load_config_or_default(path: Option<&Path>) -> Result<MatchConfig> {
    match path {
        Some(path) => load_config(path),
        None => Ok(MatchConfig::default()),
    }
}

/// Write `value` as pretty JSON to `path`.
pub fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

