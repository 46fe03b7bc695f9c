//! File operations against a remote session: server-side fast path first,
//! SFTP streaming as the fallback.

use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use tracing::{debug, warn};

use crate::cancel::{CancelToken, OperationSlot};
use crate::clipboard::ClipboardState;
use crate::config::EngineConfig;
use crate::error::{ConnectionLost, OpError};
use crate::events::{EngineEvents, ProgressScope};
use crate::model::{CommandOutput, FailureKind, OperationResult};
use crate::path;
use crate::session::RemoteSession;

mod archive;
mod commands;
mod create;
mod delete;
mod download;
mod mirror;
mod paste;
mod safety;
mod upload;
pub mod worker;

pub use upload::TransferBatch;

pub type EngineResult = Result<OperationResult, ConnectionLost>;

pub struct FileOperationEngine {
    session: Arc<dyn RemoteSession>,
    events: EngineEvents,
    config: EngineConfig,
    clipboard: Mutex<ClipboardState>,
    slot: OperationSlot,
    home: OnceLock<Option<String>>,
}

impl FileOperationEngine {
    pub fn new(
        session: Arc<dyn RemoteSession>,
        events: EngineEvents,
        config: EngineConfig,
    ) -> Self {
        Self {
            session,
            events,
            config,
            clipboard: Mutex::new(ClipboardState::default()),
            slot: OperationSlot::default(),
            home: OnceLock::new(),
        }
    }

    pub fn clipboard(&self) -> ClipboardState {
        self.clipboard
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn has_clipboard_content(&self) -> bool {
        self.clipboard
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .has_content()
    }

    pub fn update_clipboard(&self, path: &str, is_cut: bool) {
        self.update_multi_clipboard(vec![path.to_string()], is_cut);
    }

    pub fn update_multi_clipboard(&self, paths: Vec<String>, is_cut: bool) {
        self.mutate_clipboard(|clipboard| clipboard.set(paths, is_cut));
        let snapshot = self.clipboard();
        let verb = if snapshot.is_cut { "Cut" } else { "Copied" };
        self.events
            .log(&format!("{verb} {} item(s) to clipboard", snapshot.len()));
    }

    pub fn clear_clipboard(&self) {
        self.mutate_clipboard(ClipboardState::clear);
    }

    fn mutate_clipboard(&self, f: impl FnOnce(&mut ClipboardState)) {
        let snapshot = {
            let mut clipboard = self.clipboard.lock().unwrap_or_else(PoisonError::into_inner);
            f(&mut clipboard);
            clipboard.clone()
        };
        self.events.clipboard.on_clipboard_changed(&snapshot);
    }

    /// Cancels the operation currently holding the slot; `false` when idle.
    pub fn request_cancel_current_operation(&self) -> bool {
        let cancelled = self.slot.cancel_current();
        if cancelled {
            self.events.log("Cancellation requested");
        }
        cancelled
    }

    pub fn is_busy(&self) -> bool {
        self.slot.is_busy()
    }

    /// Home directory as reported by the session, looked up once.
    pub(crate) fn home(&self) -> Option<&str> {
        self.home
            .get_or_init(|| match self.session.home_dir() {
                Ok(home) if !home.trim().is_empty() => Some(home),
                Ok(_) => None,
                Err(err) => {
                    warn!("could not determine remote home directory: {err}");
                    None
                }
            })
            .as_deref()
    }

    pub(crate) fn resolve(&self, raw: &str) -> String {
        let resolved = path::resolve(raw, self.home());
        if resolved == path::HOME_MARKER {
            warn!("home directory unknown, resolving '{raw}' to /");
            return path::ROOT.to_string();
        }
        resolved
    }

    /// Acquires the operation slot, runs `op`, and turns the outcome into the
    /// public result with exactly one terminal log line.
    fn run_operation(
        &self,
        label: &str,
        op: impl FnOnce(&CancelToken, &ProgressScope<'_>) -> Result<Option<String>, OpError>,
    ) -> EngineResult {
        let Some(guard) = self.slot.acquire() else {
            warn!("{label} rejected: another operation holds the slot");
            return self.finish(label, Err(OpError::InProgress));
        };
        let outcome = {
            let progress = self.events.progress_scope(label);
            op(guard.token(), &progress)
        };
        drop(guard);
        self.finish(label, outcome)
    }

    fn finish(&self, label: &str, outcome: Result<Option<String>, OpError>) -> EngineResult {
        match outcome {
            Ok(payload) => {
                self.events.log(&format!("{label} succeeded"));
                Ok(OperationResult {
                    payload,
                    ..OperationResult::success()
                })
            }
            Err(OpError::Cancelled) => {
                self.events.log(&format!("{label} cancelled"));
                Ok(OperationResult::cancelled())
            }
            Err(OpError::ConnectionLost(lost)) => {
                self.events.log(&format!("{label} failed: {lost}"));
                Err(lost)
            }
            Err(err) => {
                self.events.log(&format!("{label} failed: {err}"));
                let kind = err.kind();
                if kind == FailureKind::Unexpected {
                    warn!("{label}: unexpected failure: {err}");
                }
                Ok(OperationResult::failure(kind, err.to_string()))
            }
        }
    }

    /// Runs a fast-path command; a non-zero exit becomes `RemoteCommand`.
    pub(crate) fn run_remote_command(&self, command: &str) -> Result<CommandOutput, OpError> {
        debug!("exec: {command}");
        let output = self.session.run_command(command)?;
        if !output.success() {
            return Err(OpError::RemoteCommand {
                command: command.to_string(),
                status: output.exit_status,
                stderr: output.stderr.trim().to_string(),
            });
        }
        Ok(output)
    }
}

pub(crate) fn check_cancel(cancel: &CancelToken) -> Result<(), OpError> {
    if cancel.is_cancelled() {
        return Err(OpError::Cancelled);
    }
    Ok(())
}
