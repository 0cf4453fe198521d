//! Locally persisted user preferences.
//!
//! Today this is a single value: the display currency code, stored as
//! plain text under a fixed path. Read at startup, written on change.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Currency used when no preference has been saved yet.
pub const DEFAULT_CURRENCY: &str = "USD";

#[derive(Debug, Error)]
pub enum PrefsError {
    #[error("Failed to read preference file '{}': {1}", .0.display())]
    Read(PathBuf, #[source] std::io::Error),
    #[error("Failed to write preference file '{}': {1}", .0.display())]
    Write(PathBuf, #[source] std::io::Error),
}

/// Default preference file path: ~/.config/famcart/currency
pub fn default_currency_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("famcart")
        .join("currency")
}

/// Load the saved currency code, falling back to [`DEFAULT_CURRENCY`]
/// when none has been saved.
pub fn load_currency(path: &Path) -> Result<String, PrefsError> {
    match std::fs::read_to_string(path) {
        Ok(contents) => {
            let code = contents.trim();
            if code.is_empty() {
                Ok(DEFAULT_CURRENCY.to_string())
            } else {
                Ok(code.to_string())
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(DEFAULT_CURRENCY.to_string()),
        Err(e) => Err(PrefsError::Read(path.to_path_buf(), e)),
    }
}

/// Persist the currency code.
pub fn save_currency(path: &Path, currency: &str) -> Result<(), PrefsError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| PrefsError::Write(path.to_path_buf(), e))?;
    }
    std::fs::write(path, format!("{}\n", currency.trim()))
        .map_err(|e| PrefsError::Write(path.to_path_buf(), e))
}
