//! Transport seam: everything the engine needs from a connected SSH host.

use std::path::Path;

use thiserror::Error;

use crate::cancel::CancelToken;
use crate::model::{CommandOutput, RemoteEntry};

#[cfg(test)]
pub(crate) mod mock;
mod ssh;

pub use ssh::{Ssh2Session, connect_ssh};

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("connection lost: {0}")]
    Connection(String),
    #[error("cancelled")]
    Cancelled,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Other(String),
}

pub type SessionResult<T> = Result<T, SessionError>;

/// Blocking primitives of one connected host. Calls are expected to be made from
/// worker threads; implementations never reconnect on their own.
pub trait RemoteSession: Send + Sync {
    /// Working directory the session starts in.
    fn home_dir(&self) -> SessionResult<String>;

    fn list_directory(&self, path: &str) -> SessionResult<Vec<RemoteEntry>>;

    fn stat(&self, path: &str) -> SessionResult<RemoteEntry>;

    fn exists(&self, path: &str) -> SessionResult<bool> {
        match self.stat(path) {
            Ok(_) => Ok(true),
            Err(SessionError::NotFound(_)) => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Streams a local file to `remote_path` and returns the bytes written.
    /// Must check `cancel` between chunks and return `SessionError::Cancelled`.
    fn upload_file(
        &self,
        local_path: &Path,
        remote_path: &str,
        cancel: &CancelToken,
    ) -> SessionResult<u64>;

    fn download_file(
        &self,
        remote_path: &str,
        local_path: &Path,
        cancel: &CancelToken,
    ) -> SessionResult<u64>;

    fn create_directory(&self, path: &str) -> SessionResult<()>;

    fn delete_file(&self, path: &str) -> SessionResult<()>;

    fn delete_empty_directory(&self, path: &str) -> SessionResult<()>;

    fn rename(&self, old_path: &str, new_path: &str) -> SessionResult<()>;

    /// Runs a shell command over a separate exec channel to the same host.
    fn run_command(&self, command: &str) -> SessionResult<CommandOutput>;
}
