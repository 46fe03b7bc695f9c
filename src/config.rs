use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub const DEFAULT_HISTORY_CAPACITY: usize = 50;
pub const DEFAULT_ARCHIVE_PREFIX: &str = "upload_";
pub const DEFAULT_EXTRACT_COMMAND: &str = "unzip -o -q";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EngineConfig {
    pub history_capacity: usize,
    /// Scratch space for upload archives and relayed files; system temp when unset.
    pub temp_dir: Option<PathBuf>,
    pub archive_prefix: String,
    pub extract_command: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            temp_dir: None,
            archive_prefix: DEFAULT_ARCHIVE_PREFIX.to_string(),
            extract_command: DEFAULT_EXTRACT_COMMAND.to_string(),
        }
    }
}

impl EngineConfig {
    pub fn temp_dir(&self) -> PathBuf {
        self.temp_dir.clone().unwrap_or_else(std::env::temp_dir)
    }

    pub fn history_capacity(&self) -> usize {
        self.history_capacity.max(1)
    }
}
