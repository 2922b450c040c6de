pub mod build;
pub mod check;

use crate::infra::AppSettings;
use crate::infra::config::{DEFAULT_CONFIG_FILE_NAME, load_settings};
use anyhow::Result;
use std::path::Path;
use tracing::debug;

pub use build::BuildArgs;

/// Loads the settings file if one was given, or `./layerbox.toml` when present
pub fn resolve_settings(config: Option<&Path>) -> Result<AppSettings> {
    if let Some(path) = config {
        return load_settings(path);
    }

    let local = Path::new(DEFAULT_CONFIG_FILE_NAME);
    if local.exists() {
        debug!("usando {:?}", local);
        return load_settings(local);
    }

    Ok(AppSettings::default())
}
