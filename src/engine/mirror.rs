//! Primitive-only tree walks used by the fallback strategies. All of them use
//! an explicit stack and visit entries in the same depth-first pre-order a
//! recursive walk would.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::cancel::CancelToken;
use crate::engine::check_cancel;
use crate::error::OpError;
use crate::events::ProgressScope;
use crate::path;
use crate::session::RemoteSession;

/// Local scratch file removed on drop, whatever the outcome.
pub(crate) struct TempFile {
    path: PathBuf,
}

impl TempFile {
    pub(crate) fn new(dir: &Path, prefix: &str, suffix: &str) -> Self {
        Self::at(dir.join(format!("{prefix}{}{suffix}", uuid::Uuid::new_v4().simple())))
    }

    pub(crate) fn at(path: PathBuf) -> Self {
        Self { path }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        if self.path.exists() {
            if let Err(err) = fs::remove_file(&self.path) {
                debug!("could not remove {}: {err}", self.path.display());
            }
        }
    }
}

enum Work<T> {
    Dir { source: String, target: T },
    File { source: String, target: T },
}

/// Streams one remote file to another remote path through a local temp file.
pub(crate) fn relay_file(
    session: &dyn RemoteSession,
    source: &str,
    target: &str,
    temp_dir: &Path,
    cancel: &CancelToken,
) -> Result<u64, OpError> {
    check_cancel(cancel)?;
    fs::create_dir_all(temp_dir)?;
    let scratch = TempFile::new(temp_dir, "relay_", ".part");
    session.download_file(source, scratch.path(), cancel)?;
    check_cancel(cancel)?;
    let written = session.upload_file(scratch.path(), target, cancel)?;
    Ok(written)
}

/// Recreates the remote directory `source` at `target`, file by file.
pub(crate) fn copy_remote_tree(
    session: &dyn RemoteSession,
    source: &str,
    target: &str,
    temp_dir: &Path,
    cancel: &CancelToken,
    progress: &ProgressScope<'_>,
) -> Result<usize, OpError> {
    let mut stack = vec![Work::Dir {
        source: source.to_string(),
        target: target.to_string(),
    }];
    let mut copied = 0usize;
    while let Some(work) = stack.pop() {
        check_cancel(cancel)?;
        match work {
            Work::Dir { source, target } => {
                session.create_directory(&target)?;
                push_children(session, &mut stack, &source, |name| path::join(&target, name))?;
            }
            Work::File { source, target } => {
                relay_file(session, &source, &target, temp_dir, cancel)?;
                copied += 1;
                progress.update(&format!("Copied {source}"), copied as u64, None);
            }
        }
    }
    Ok(copied)
}

/// Mirrors the remote directory `source` into the local directory `target`.
pub(crate) fn download_tree(
    session: &dyn RemoteSession,
    source: &str,
    target: &Path,
    cancel: &CancelToken,
    progress: &ProgressScope<'_>,
) -> Result<usize, OpError> {
    let mut stack = vec![Work::Dir {
        source: source.to_string(),
        target: target.to_path_buf(),
    }];
    let mut downloaded = 0usize;
    while let Some(work) = stack.pop() {
        check_cancel(cancel)?;
        match work {
            Work::Dir { source, target } => {
                fs::create_dir_all(&target)?;
                push_children(session, &mut stack, &source, |name| target.join(name))?;
            }
            Work::File { source, target } => {
                session.download_file(&source, &target, cancel)?;
                downloaded += 1;
                progress.update(&format!("Downloaded {source}"), downloaded as u64, None);
            }
        }
    }
    Ok(downloaded)
}

fn push_children<T>(
    session: &dyn RemoteSession,
    stack: &mut Vec<Work<T>>,
    source: &str,
    target_for: impl Fn(&str) -> T,
) -> Result<(), OpError> {
    let entries = session.list_directory(source)?;
    // Reversed so the first listed child is popped first.
    for entry in entries.into_iter().rev() {
        if entry.is_dot_entry() {
            continue;
        }
        let target = target_for(&entry.name);
        let source = path::join(source, &entry.name);
        stack.push(if entry.is_dir {
            Work::Dir { source, target }
        } else {
            Work::File { source, target }
        });
    }
    Ok(())
}

/// Deletes a remote tree bottom-up with SFTP primitives only.
pub(crate) fn remove_remote_tree(
    session: &dyn RemoteSession,
    root: &str,
    cancel: &CancelToken,
) -> Result<usize, OpError> {
    let mut stack = vec![(root.to_string(), false)];
    let mut removed = 0usize;
    while let Some((dir, children_done)) = stack.pop() {
        check_cancel(cancel)?;
        if children_done {
            session.delete_empty_directory(&dir)?;
            removed += 1;
            continue;
        }
        stack.push((dir.clone(), true));
        for entry in session.list_directory(&dir)?.into_iter().rev() {
            if entry.is_dot_entry() {
                continue;
            }
            let child = path::join(&dir, &entry.name);
            if entry.is_dir {
                stack.push((child, false));
            } else {
                session.delete_file(&child)?;
                removed += 1;
            }
        }
    }
    Ok(removed)
}
