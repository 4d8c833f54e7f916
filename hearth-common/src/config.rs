//! Configuration loading and root folder resolution

use crate::{Error, Result};
use std::path::PathBuf;

/// Database file name under the root folder
pub const DATABASE_FILE: &str = "hearth.db";

/// Root folder resolution priority order [HEARTH-INIT-005]:
/// 1. Command-line argument (highest priority)
/// 2. `HEARTH_ROOT_FOLDER` environment variable
/// 3. TOML config file (`root_folder` key)
/// 4. OS-dependent compiled default (fallback)
pub fn resolve_root_folder(cli_arg: Option<&str>) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return PathBuf::from(path);
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var("HEARTH_ROOT_FOLDER") {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    // Priority 3: TOML config file
    if let Ok(config_path) = locate_config_file() {
        if let Ok(toml_content) = std::fs::read_to_string(&config_path) {
            if let Ok(config) = toml::from_str::<toml::Value>(&toml_content) {
                if let Some(root_folder) = config.get("root_folder").and_then(|v| v.as_str()) {
                    return PathBuf::from(root_folder);
                }
            }
        }
    }

    // Priority 4: OS-dependent compiled default
    default_root_folder()
}

/// Resolved database path under a root folder
pub fn database_path(root_folder: &std::path::Path) -> PathBuf {
    root_folder.join(DATABASE_FILE)
}

/// Ensure the root folder exists before opening the database
pub fn ensure_root_folder(root_folder: &std::path::Path) -> Result<()> {
    std::fs::create_dir_all(root_folder)?;
    Ok(())
}

/// Locate the platform config file
fn locate_config_file() -> Result<PathBuf> {
    if cfg!(target_os = "linux") {
        // Try ~/.config/hearth/config.toml first, then /etc/hearth/config.toml
        if let Some(path) = dirs::config_dir().map(|d| d.join("hearth").join("config.toml")) {
            if path.exists() {
                return Ok(path);
            }
        }
        let system_config = PathBuf::from("/etc/hearth/config.toml");
        if system_config.exists() {
            return Ok(system_config);
        }
        Err(Error::Config("No config file found".to_string()))
    } else {
        let path = dirs::config_dir()
            .map(|d| d.join("hearth").join("config.toml"))
            .ok_or_else(|| Error::Config("Could not determine config directory".to_string()))?;
        if path.exists() {
            Ok(path)
        } else {
            Err(Error::Config(format!("Config file not found: {:?}", path)))
        }
    }
}

/// OS-dependent default root folder
fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        dirs::data_local_dir()
            .map(|d| d.join("hearth"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/hearth"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("hearth"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/hearth"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("hearth"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\hearth"))
    } else {
        PathBuf::from("./hearth_data")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_arg_wins_over_everything() {
        let resolved = resolve_root_folder(Some("/tmp/hearth-cli"));
        assert_eq!(resolved, PathBuf::from("/tmp/hearth-cli"));
    }

    #[test]
    fn database_path_joins_file_name() {
        let path = database_path(std::path::Path::new("/data/hearth"));
        assert_eq!(path, PathBuf::from("/data/hearth/hearth.db"));
    }
}
