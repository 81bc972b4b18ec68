use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::layout::LayoutMetrics;
use crate::roadmaps::state_dir;
use crate::storage::StorageError;

const SETTINGS_FILE: &str = "settings.toml";

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub layout: LayoutMetrics,
}

pub fn load_settings(cli_path: Option<&Path>) -> Result<Settings, StorageError> {
    let path = cli_path
        .map(Path::to_path_buf)
        .unwrap_or_else(default_settings_path);

    let raw = match fs::read_to_string(&path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == ErrorKind::NotFound && cli_path.is_none() => {
            debug!(path = %path.display(), "no settings file, using defaults");
            return Ok(Settings::default());
        }
        Err(err) => return Err(StorageError::Io(err)),
    };

    let settings = parse_settings(&raw)?;
    debug!(path = %path.display(), "loaded settings");
    Ok(settings)
}

fn parse_settings(raw: &str) -> Result<Settings, StorageError> {
    toml::from_str(raw).map_err(StorageError::TomlDecode)
}

fn default_settings_path() -> PathBuf {
    state_dir().join(SETTINGS_FILE)
}
