//! Sinks the engine reports into. Implementations must be cheap and must not
//! call back into the engine.

use std::sync::Arc;

use crate::clipboard::ClipboardState;
use crate::model::RemoteEntry;

pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, show: bool, message: &str, current: Option<u64>, total: Option<u64>);
}

pub trait LogSink: Send + Sync {
    fn on_log(&self, message: &str);
}

pub trait ClipboardChangedSink: Send + Sync {
    fn on_clipboard_changed(&self, clipboard: &ClipboardState);
}

/// Display side of a directory listing.
pub trait ListingSink: Send + Sync {
    fn clear(&self);
    fn push_entry(&self, entry: &RemoteEntry);
    fn set_path(&self, path: &str);
    fn set_history_availability(&self, can_go_back: bool, can_go_forward: bool);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn on_progress(
        &self,
        _show: bool,
        _message: &str,
        _current: Option<u64>,
        _total: Option<u64>,
    ) {
    }
}

impl LogSink for NullSink {
    fn on_log(&self, _message: &str) {}
}

impl ClipboardChangedSink for NullSink {
    fn on_clipboard_changed(&self, _clipboard: &ClipboardState) {}
}

impl ListingSink for NullSink {
    fn clear(&self) {}
    fn push_entry(&self, _entry: &RemoteEntry) {}
    fn set_path(&self, _path: &str) {}
    fn set_history_availability(&self, _can_go_back: bool, _can_go_forward: bool) {}
}

#[derive(Clone)]
pub struct EngineEvents {
    pub progress: Arc<dyn ProgressSink>,
    pub log: Arc<dyn LogSink>,
    pub clipboard: Arc<dyn ClipboardChangedSink>,
}

impl Default for EngineEvents {
    fn default() -> Self {
        Self {
            progress: Arc::new(NullSink),
            log: Arc::new(NullSink),
            clipboard: Arc::new(NullSink),
        }
    }
}

impl EngineEvents {
    pub(crate) fn log(&self, message: &str) {
        tracing::info!(target: "remote_fs_ops::log", "{message}");
        self.log.on_log(message);
    }

    /// Shows progress now and hides it again when the returned guard drops.
    pub(crate) fn progress_scope(&self, message: &str) -> ProgressScope<'_> {
        self.progress.on_progress(true, message, None, None);
        ProgressScope { events: self }
    }
}

pub(crate) struct ProgressScope<'a> {
    events: &'a EngineEvents,
}

impl ProgressScope<'_> {
    pub(crate) fn update(&self, message: &str, current: u64, total: Option<u64>) {
        self.events
            .progress
            .on_progress(true, message, Some(current), total);
    }
}

impl Drop for ProgressScope<'_> {
    fn drop(&mut self) {
        self.events.progress.on_progress(false, "", None, None);
    }
}
