use std::path::PathBuf;

use crate::error::PrefsStoreError;

pub const PREFS_DIR: &str = "dllm_chat";
pub const PREFS_FILE: &str = "prefs.json";

/// Default preference file location under the user configuration directory.
pub fn default_prefs_path() -> Result<PathBuf, PrefsStoreError> {
    let base = dirs::config_dir().ok_or(PrefsStoreError::MissingConfigDir)?;
    Ok(base.join(PREFS_DIR).join(PREFS_FILE))
}
