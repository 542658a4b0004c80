use std::path::{Path, PathBuf};

use tracing::debug;

use crate::{
    env_subst::substitute_env,
    error::{Error, Result},
    schema::ChatsyncConfig,
};

/// Standard config file names, checked in order.
pub const CONFIG_FILENAMES: &[&str] = &[
    "chatsync.toml",
    "chatsync.yaml",
    "chatsync.yml",
    "chatsync.json",
];

/// A parsed config together with its untyped tree, kept for validation.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: ChatsyncConfig,
    pub value: serde_json::Value,
    /// `None` when no file was found and defaults are in use.
    pub path: Option<PathBuf>,
}

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> Result<LoadedConfig> {
    let raw = std::fs::read_to_string(path).map_err(|source| Error::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let value = parse_value(&substitute_env(&raw), path)?;
    let config = serde_json::from_value(value.clone()).map_err(|e| Error::parse(path, e))?;
    Ok(LoadedConfig {
        config,
        value,
        path: Some(path.to_path_buf()),
    })
}

/// Load `explicit` if given, otherwise the first file found in the standard
/// locations, otherwise defaults.
///
/// Search order:
/// 1. `./chatsync.{toml,yaml,yml,json}`
/// 2. `~/.config/chatsync/chatsync.{toml,yaml,yml,json}`
pub fn discover_and_load(explicit: Option<&Path>) -> Result<LoadedConfig> {
    if let Some(path) = explicit {
        if !path.exists() {
            return Err(Error::NotFound(path.to_path_buf()));
        }
        return load_config(path);
    }
    match find_config_file() {
        Some(path) => {
            debug!(path = %path.display(), "loading config");
            load_config(&path)
        },
        None => {
            debug!("no config file found, using defaults");
            Ok(LoadedConfig {
                config: ChatsyncConfig::default(),
                value: serde_json::Value::Object(serde_json::Map::new()),
                path: None,
            })
        },
    }
}

/// Find the first config file in standard locations.
pub fn find_config_file() -> Option<PathBuf> {
    find_in(Path::new("."))
        .or_else(|| config_dir().and_then(|dir| find_in(&dir)))
}

fn find_in(dir: &Path) -> Option<PathBuf> {
    CONFIG_FILENAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|p| p.is_file())
}

/// Returns the user-global config directory (`~/.config/chatsync/`).
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "chatsync").map(|d| d.config_dir().to_path_buf())
}

fn parse_value(raw: &str, path: &Path) -> Result<serde_json::Value> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");
    let parsed = match ext {
        "toml" => toml::from_str::<toml::Value>(raw)
            .map_err(|e| Error::parse(path, e))
            .and_then(|v| serde_json::to_value(v).map_err(|e| Error::parse(path, e))),
        "yaml" | "yml" => serde_yaml::from_str::<serde_yaml::Value>(raw)
            .map_err(|e| Error::parse(path, e))
            .and_then(|v| serde_json::to_value(v).map_err(|e| Error::parse(path, e))),
        "json" => serde_json::from_str(raw).map_err(|e| Error::parse(path, e)),
        other => Err(Error::UnsupportedFormat(other.to_string())),
    }?;
    // An empty YAML document parses as null.
    Ok(match parsed {
        serde_json::Value::Null => serde_json::Value::Object(serde_json::Map::new()),
        v => v,
    })
}
