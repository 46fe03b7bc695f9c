use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    pub name: String,
    pub path: String,
    pub is_dir: bool,
    pub size: u64,
    pub modified: Option<DateTime<Utc>>,
}

impl RemoteEntry {
    pub fn parent_link(parent: String) -> Self {
        Self {
            name: "..".to_string(),
            path: parent,
            is_dir: true,
            size: 0,
            modified: None,
        }
    }

    pub fn is_dot_entry(&self) -> bool {
        self.name == "." || self.name == ".."
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandOutput {
    pub exit_status: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_status == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Cancelled,
    SafetyViolation,
    RemoteCommandFailure,
    TransferFailure,
    OperationInProgress,
    Unexpected,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Cancelled => "cancelled",
            Self::SafetyViolation => "safety violation",
            Self::RemoteCommandFailure => "remote command failure",
            Self::TransferFailure => "transfer failure",
            Self::OperationInProgress => "operation in progress",
            Self::Unexpected => "unexpected error",
        };
        f.write_str(label)
    }
}

/// Outcome of a mutating call. Expected failures end up here instead of in an `Err`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationResult {
    pub is_success: bool,
    pub error_message: Option<String>,
    pub failure: Option<FailureKind>,
    pub payload: Option<String>,
}

impl OperationResult {
    pub fn success() -> Self {
        Self {
            is_success: true,
            error_message: None,
            failure: None,
            payload: None,
        }
    }

    pub fn failure(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            is_success: false,
            error_message: Some(message.into()),
            failure: Some(kind),
            payload: None,
        }
    }

    pub fn cancelled() -> Self {
        Self::failure(FailureKind::Cancelled, "cancelled")
    }

    pub fn is_cancelled(&self) -> bool {
        self.failure == Some(FailureKind::Cancelled)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConnectionConfig {
    #[serde(default)]
    pub name: String,
    pub user: String,
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub auth: AuthConfig,
    #[serde(default)]
    pub last_remote_dir: Option<String>,
}

fn default_port() -> u16 {
    22
}

impl ConnectionConfig {
    pub fn label(&self) -> String {
        if self.name.trim().is_empty() {
            self.host.clone()
        } else {
            self.name.clone()
        }
    }

    /// Parse `user@host` or `user@host:port`.
    pub fn from_target(target: &str) -> Option<Self> {
        let (user, host_port) = target.split_once('@')?;
        let (host, port) = match host_port.split_once(':') {
            Some((host, port)) => (host, port.parse().ok()?),
            None => (host_port, default_port()),
        };
        if user.is_empty() || host.is_empty() {
            return None;
        }
        Some(Self {
            name: String::new(),
            user: user.to_string(),
            host: host.to_string(),
            port,
            auth: AuthConfig::Agent,
            last_remote_dir: None,
        })
    }
}

/// Passwords are never persisted; `Password` means "prompt on connect".
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum AuthConfig {
    Password,
    PrivateKey {
        path: String,
        #[serde(default)]
        passphrase_prompt: bool,
    },
    Agent,
}
