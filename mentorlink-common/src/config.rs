//! Configuration loading and root folder resolution

use crate::{Error, Result};
use std::path::PathBuf;

/// Default listen port for the mentorlink-api service
pub const DEFAULT_PORT: u16 = 5780;

/// Root folder resolution priority order:
/// 1. Environment variable (`MENTORLINK_ROOT`)
/// 2. TOML config file (`root_folder` key)
/// 3. OS-dependent compiled default (fallback)
pub fn resolve_root_folder() -> PathBuf {
    // Priority 1: Environment variable
    if let Ok(path) = std::env::var("MENTORLINK_ROOT") {
        return PathBuf::from(path);
    }

    // Priority 2: TOML config file
    if let Ok(config_path) = locate_config_file() {
        if let Ok(toml_content) = std::fs::read_to_string(&config_path) {
            if let Ok(config) = toml::from_str::<toml::Value>(&toml_content) {
                if let Some(root_folder) = config.get("root_folder").and_then(|v| v.as_str()) {
                    return PathBuf::from(root_folder);
                }
            }
        }
    }

    // Priority 3: OS-dependent compiled default
    default_root_folder()
}

/// Resolve the listen port: `MENTORLINK_PORT` env var, else the default.
pub fn resolve_port() -> u16 {
    std::env::var("MENTORLINK_PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_PORT)
}

/// Path of the SQLite database inside the root folder
pub fn database_path(root_folder: &std::path::Path) -> PathBuf {
    root_folder.join("mentorlink.db")
}

/// Create the root folder if it does not exist yet
pub fn ensure_root_folder(root_folder: &std::path::Path) -> Result<()> {
    std::fs::create_dir_all(root_folder)?;
    Ok(())
}

/// Get default configuration file path for the platform
fn locate_config_file() -> Result<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("mentorlink").join("config.toml"));

    if let Some(path) = user_config {
        if path.exists() {
            return Ok(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/mentorlink/config.toml");
        if system_config.exists() {
            return Ok(system_config);
        }
    }

    Err(Error::Config("No config file found".to_string()))
}

/// Get OS-dependent default root folder path
fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("mentorlink"))
        .unwrap_or_else(|| PathBuf::from("./mentorlink_data"))
}
