use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::model::ConnectionConfig;

const APP_DIR: &str = "remote-fs-ops";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoreFile {
    #[serde(default)]
    pub connections: Vec<ConnectionConfig>,
    #[serde(default)]
    pub engine: EngineConfig,
}

impl StoreFile {
    /// Looks a connection up by its name, then by `user@host`.
    pub fn find_connection(&self, selector: &str) -> Option<&ConnectionConfig> {
        self.connections
            .iter()
            .find(|conn| conn.name == selector)
            .or_else(|| {
                self.connections
                    .iter()
                    .find(|conn| format!("{}@{}", conn.user, conn.host) == selector)
            })
    }

    pub fn remember_remote_dir(&mut self, selector: &str, dir: &str) -> bool {
        let matches = |conn: &ConnectionConfig| {
            conn.name == selector || format!("{}@{}", conn.user, conn.host) == selector
        };
        let Some(conn) = self.connections.iter_mut().find(|conn| matches(conn)) else {
            return false;
        };
        conn.last_remote_dir = Some(dir.to_string());
        true
    }
}

fn app_dir() -> Result<PathBuf> {
    if let Some(mut dir) = dirs::config_dir() {
        dir.push(APP_DIR);
        return Ok(dir);
    }
    std::env::current_dir().context("current dir")
}

pub fn config_path() -> Result<PathBuf> {
    Ok(app_dir()?.join("config.json"))
}

pub fn log_path() -> Result<PathBuf> {
    Ok(app_dir()?.join("remote-fs-ops.log"))
}

pub fn load_store(path: &Path) -> Result<StoreFile> {
    let content = fs::read_to_string(path).context("read config file")?;
    let store = serde_json::from_str(&content).context("parse config file")?;
    Ok(store)
}

/// A missing file is a fresh install, not an error.
pub fn load_or_default(path: &Path) -> Result<StoreFile> {
    if !path.exists() {
        return Ok(StoreFile::default());
    }
    load_store(path)
}

pub fn save_store(path: &Path, store: &StoreFile) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("create config dir")?;
    }
    let content = serde_json::to_string_pretty(store).context("serialize config")?;
    fs::write(path, content).context("write config file")?;
    Ok(())
}
