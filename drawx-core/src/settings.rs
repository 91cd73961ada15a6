//! User settings that outlive a session.
//!
//! Kept as a small JSON file next to the stroke store: the last pencil picked,
//! and the server/user the app last connected as.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;
use thiserror::Error;

use crate::palette::SwatchColor;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Settings I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Settings parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(default)]
pub struct DrawSettings {
    /// Name of the last pencil used.
    pub last_color: String,
    /// Sync server address, without scheme.
    pub server_address: Option<String>,
    pub username: Option<String>,
}

impl Default for DrawSettings {
    fn default() -> Self {
        Self {
            last_color: SwatchColor::Indigo.name().to_string(),
            server_address: None,
            username: None,
        }
    }
}

impl DrawSettings {
    /// Load settings, or defaults when the file does not exist yet.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        match fs::read(path) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::debug!("No settings at {}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Write settings through a temp file so a crash never leaves half a file.
    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(self)?)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    /// The stored pencil, or the default one if the name is stale.
    pub fn last_swatch(&self) -> SwatchColor {
        SwatchColor::from_name(&self.last_color).unwrap_or_else(|| {
            log::warn!("Unknown saved pencil {:?}, using default", self.last_color);
            SwatchColor::Indigo
        })
    }
}
