//! Current directory, its listing and the back/forward history.

use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::error::ConnectionLost;
use crate::events::{ListingSink, LogSink};
use crate::model::RemoteEntry;
use crate::path;
use crate::session::{RemoteSession, SessionError};

mod history;

pub use history::NavigationHistory;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationOutcome {
    /// The listing of this absolute path is now on display.
    Loaded(String),
    /// Another load was running; nothing changed.
    Busy,
    /// Nothing to do, e.g. going back with no history.
    NoOp,
    /// The listing could not be shown; the previous location stays current.
    Failed(String),
}

pub type NavigationResult = Result<NavigationOutcome, ConnectionLost>;

#[derive(Debug)]
struct NavigationState {
    current_path: String,
    history: NavigationHistory,
    is_loading: bool,
}

#[derive(Debug, Clone, Copy)]
enum Mode {
    Record,
    Replay(usize),
}

pub struct NavigationManager {
    session: Arc<dyn RemoteSession>,
    listing: Arc<dyn ListingSink>,
    log: Arc<dyn LogSink>,
    state: Mutex<NavigationState>,
    home: OnceLock<Option<String>>,
}

/// Clears `is_loading` when the load ends, however it ends.
struct LoadingGuard<'a> {
    state: &'a Mutex<NavigationState>,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_loading = false;
    }
}

impl NavigationManager {
    pub fn new(
        session: Arc<dyn RemoteSession>,
        listing: Arc<dyn ListingSink>,
        log: Arc<dyn LogSink>,
        config: &EngineConfig,
    ) -> Self {
        Self {
            session,
            listing,
            log,
            state: Mutex::new(NavigationState {
                current_path: path::HOME_MARKER.to_string(),
                history: NavigationHistory::new(config.history_capacity()),
                is_loading: false,
            }),
            home: OnceLock::new(),
        }
    }

    fn state(&self) -> MutexGuard<'_, NavigationState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn log(&self, message: &str) {
        tracing::info!(target: "remote_fs_ops::log", "{message}");
        self.log.on_log(message);
    }

    fn home(&self) -> Option<&str> {
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

    fn resolve(&self, raw: &str) -> String {
        let resolved = path::resolve(raw, self.home());
        if resolved == path::HOME_MARKER {
            return path::ROOT.to_string();
        }
        resolved
    }

    pub fn current_path(&self) -> String {
        self.state().current_path.clone()
    }

    pub fn can_go_back(&self) -> bool {
        self.state().history.can_go_back()
    }

    pub fn can_go_forward(&self) -> bool {
        self.state().history.can_go_forward()
    }

    pub fn is_loading(&self) -> bool {
        self.state().is_loading
    }

    pub fn history(&self) -> NavigationHistory {
        self.state().history.clone()
    }

    pub fn go_to_folder(&self, requested: &str) -> NavigationResult {
        self.load(requested, Mode::Record)
    }

    pub fn navigate_back(&self) -> NavigationResult {
        let target = {
            let state = self.state();
            if state.is_loading {
                return Ok(self.reject_busy("back"));
            }
            state
                .history
                .back_target()
                .map(|(index, path)| (index, path.to_string()))
        };
        match target {
            Some((index, path)) => self.load(&path, Mode::Replay(index)),
            None => Ok(NavigationOutcome::NoOp),
        }
    }

    pub fn navigate_forward(&self) -> NavigationResult {
        let target = {
            let state = self.state();
            if state.is_loading {
                return Ok(self.reject_busy("forward"));
            }
            state
                .history
                .forward_target()
                .map(|(index, path)| (index, path.to_string()))
        };
        match target {
            Some((index, path)) => self.load(&path, Mode::Replay(index)),
            None => Ok(NavigationOutcome::NoOp),
        }
    }

    pub fn navigate_up(&self) -> NavigationResult {
        let current = self.current_path();
        if current == path::HOME_MARKER || path::is_root(&current) {
            return Ok(NavigationOutcome::NoOp);
        }
        self.load(&path::join(&current, ".."), Mode::Record)
    }

    /// Reloads the listing on display; the history is left as it is.
    pub fn refresh_current_directory(&self) -> NavigationResult {
        let current = self.current_path();
        self.load(&current, Mode::Record)
    }

    fn reject_busy(&self, request: &str) -> NavigationOutcome {
        warn!("navigation '{request}' ignored: a directory is still loading");
        self.log("Still loading, navigation ignored");
        NavigationOutcome::Busy
    }

    fn begin_loading(&self, request: &str) -> Option<LoadingGuard<'_>> {
        let mut state = self.state();
        if state.is_loading {
            drop(state);
            self.reject_busy(request);
            return None;
        }
        state.is_loading = true;
        Some(LoadingGuard { state: &self.state })
    }

    fn load(&self, requested: &str, mode: Mode) -> NavigationResult {
        let Some(_loading) = self.begin_loading(requested) else {
            return Ok(NavigationOutcome::Busy);
        };
        let target = self.resolve(requested);
        debug!("listing {target}");

        let (shown, mode, listing) = match self.session.list_directory(&target) {
            Err(SessionError::NotFound(_)) if self.may_retry_at_home(&target) => {
                let home = self.resolve(path::HOME_MARKER);
                self.log(&format!("'{target}' not found, opening {home} instead"));
                let listing = self.session.list_directory(&home);
                (home, Mode::Record, listing)
            }
            listing => (target, mode, listing),
        };

        match listing {
            Ok(entries) => {
                self.display(&shown, &entries);
                self.commit(&shown, mode);
                Ok(NavigationOutcome::Loaded(shown))
            }
            Err(SessionError::Connection(message)) => {
                self.log(&format!("Connection lost while listing '{shown}': {message}"));
                Err(ConnectionLost(message))
            }
            Err(err) => {
                let message = match err {
                    SessionError::PermissionDenied(_) => format!("Access denied: '{shown}'"),
                    SessionError::NotFound(_) => format!("Folder not found: '{shown}'"),
                    other => format!("Could not list '{shown}': {other}"),
                };
                self.log(&message);
                self.revert_displayed_path();
                Ok(NavigationOutcome::Failed(message))
            }
        }
    }

    fn may_retry_at_home(&self, target: &str) -> bool {
        if path::is_root(target) {
            return false;
        }
        match self.home() {
            Some(home) => path::segments(home) != path::segments(target),
            None => false,
        }
    }

    fn display(&self, dir: &str, entries: &[RemoteEntry]) {
        self.listing.clear();
        self.listing.set_path(dir);
        if !path::is_root(dir) {
            self.listing
                .push_entry(&RemoteEntry::parent_link(path::parent(dir)));
        }
        for entry in entries.iter().filter(|entry| !entry.is_dot_entry()) {
            self.listing.push_entry(entry);
        }
    }

    fn commit(&self, shown: &str, mode: Mode) {
        let (can_back, can_forward) = {
            let mut state = self.state();
            match mode {
                Mode::Record => {
                    state.history.record(shown);
                }
                Mode::Replay(index) => state.history.move_to(index),
            }
            state.current_path = shown.to_string();
            (state.history.can_go_back(), state.history.can_go_forward())
        };
        self.listing.set_history_availability(can_back, can_forward);
    }

    fn revert_displayed_path(&self) {
        let (previous, can_back, can_forward) = {
            let state = self.state();
            let previous = state
                .history
                .current()
                .unwrap_or(state.current_path.as_str())
                .to_string();
            (previous, state.history.can_go_back(), state.history.can_go_forward())
        };
        self.listing.set_path(&previous);
        self.listing.set_history_availability(can_back, can_forward);
    }
}
