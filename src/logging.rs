use std::collections::VecDeque;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use chrono::{Datelike, NaiveDateTime};
use tracing_subscriber::EnvFilter;

use crate::events::LogSink;

pub const LOG_TIMESTAMP_FORMAT: &str = "%m-%d %H:%M:%S";
const LOG_PARSE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
pub const LOG_SEPARATOR: &str = " | ";

pub const LOG_RETENTION_DAYS: i64 = 7;
pub const LOG_MAX_ENTRIES: usize = 10_000;
pub const LOG_MAX_IN_MEMORY: usize = 100;

/// Appends timestamped lines to a log file and keeps the newest ones in memory.
pub struct FileLogSink {
    path: PathBuf,
    echo: bool,
    tail: Mutex<VecDeque<String>>,
}

impl FileLogSink {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            echo: false,
            tail: Mutex::new(VecDeque::new()),
        }
    }

    /// Like `new`, but first drops lines older than the retention window and
    /// caps the file at the newest `LOG_MAX_ENTRIES` lines.
    pub fn open(path: PathBuf) -> Self {
        let sink = Self::new(path);
        sink.prune(chrono::Local::now().naive_local());
        sink
    }

    fn prune(&self, now: NaiveDateTime) {
        let Ok(content) = fs::read_to_string(&self.path) else {
            return;
        };
        let kept = retained_lines(&content, now);
        if kept.is_empty() {
            let _ = fs::remove_file(&self.path);
        } else {
            let _ = fs::write(&self.path, kept.join("\n") + "\n");
        }
    }

    /// Also prints every line to stderr.
    pub fn with_echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn recent(&self) -> Vec<String> {
        self.tail
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }
}

impl LogSink for FileLogSink {
    fn on_log(&self, message: &str) {
        let timestamp = chrono::Local::now().format(LOG_TIMESTAMP_FORMAT);
        let line = format!("{timestamp}{LOG_SEPARATOR}{message}");
        if let Some(parent) = self.path.parent() {
            let _ = fs::create_dir_all(parent);
        }
        if let Ok(mut file) = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
        {
            let _ = writeln!(file, "{line}");
        }
        if self.echo {
            eprintln!("{message}");
        }
        let mut tail = self.tail.lock().unwrap_or_else(PoisonError::into_inner);
        tail.push_back(line);
        while tail.len() > LOG_MAX_IN_MEMORY {
            tail.pop_front();
        }
    }
}

/// Lines carry no year, so a stamp that would lie in the future belongs to
/// the previous one.
fn line_time(line: &str, now: NaiveDateTime) -> Option<NaiveDateTime> {
    let (stamp, _) = line.split_once(LOG_SEPARATOR)?;
    let parse = |year: i32| {
        NaiveDateTime::parse_from_str(&format!("{year}-{stamp}"), LOG_PARSE_FORMAT).ok()
    };
    match parse(now.year()) {
        Some(time) if time <= now => Some(time),
        _ => parse(now.year() - 1),
    }
}

fn retained_lines(content: &str, now: NaiveDateTime) -> Vec<&str> {
    let cutoff = now - chrono::Duration::days(LOG_RETENTION_DAYS);
    let kept: Vec<&str> = content
        .lines()
        .filter(|line| line_time(line, now).is_some_and(|time| time >= cutoff))
        .collect();
    let overflow = kept.len().saturating_sub(LOG_MAX_ENTRIES);
    kept[overflow..].to_vec()
}

/// Diagnostics go to stderr, filtered by `RUST_LOG` (default `warn`).
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
