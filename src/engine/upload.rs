use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::cancel::CancelToken;
use crate::config::EngineConfig;
use crate::engine::mirror::TempFile;
use crate::engine::{EngineResult, FileOperationEngine, archive, check_cancel, commands};
use crate::error::OpError;
use crate::events::ProgressScope;
use crate::path;
use crate::session::SessionError;

const BATCH_STEPS: u64 = 3;

/// One archive round trip: everything selected goes up as a single zip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferBatch {
    pub local_paths: Vec<PathBuf>,
    pub archive_name: String,
    pub remote_archive_path: String,
    pub local_archive_path: PathBuf,
}

impl TransferBatch {
    pub fn new(local_paths: Vec<PathBuf>, remote_dir: &str, config: &EngineConfig) -> Self {
        let archive_name = format!(
            "{}{}.zip",
            config.archive_prefix,
            uuid::Uuid::new_v4().simple()
        );
        Self {
            remote_archive_path: path::join(remote_dir, &archive_name),
            local_archive_path: config.temp_dir().join(&archive_name),
            archive_name,
            local_paths,
        }
    }
}

fn local_name(local: &Path) -> Result<String, OpError> {
    local
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| OpError::Safety(format!("cannot upload '{}'", local.display())))
}

impl FileOperationEngine {
    pub fn upload_file(&self, local_path: &Path, remote_path: &str) -> EngineResult {
        let label = format!("Upload '{}'", local_path.display());
        self.run_operation(&label, |cancel, _progress| {
            let target = self.resolve(remote_path);
            check_cancel(cancel)?;
            let written = self.session.upload_file(local_path, &target, cancel)?;
            debug!("uploaded {written} bytes to {target}");
            Ok(Some(target))
        })
    }

    /// Uploads the selection into `remote_dir`. A single plain file is streamed
    /// directly; anything else travels as one archive extracted on the host.
    pub fn upload_files(&self, local_paths: &[PathBuf], remote_dir: &str) -> EngineResult {
        let label = format!("Upload {} item(s) to '{remote_dir}'", local_paths.len());
        self.run_operation(&label, |cancel, progress| {
            if local_paths.is_empty() {
                return Err(OpError::Safety("nothing to upload".to_string()));
            }
            if let Some(missing) = local_paths.iter().find(|local| !local.exists()) {
                return Err(OpError::Transfer(format!(
                    "local path '{}' does not exist",
                    missing.display()
                )));
            }
            let remote_dir = self.resolve(remote_dir);
            check_cancel(cancel)?;

            if let [single] = local_paths {
                if single.is_file() {
                    let target = path::join(&remote_dir, &local_name(single)?);
                    self.session.upload_file(single, &target, cancel)?;
                    return Ok(Some(target));
                }
            }

            let batch = TransferBatch::new(local_paths.to_vec(), &remote_dir, &self.config);
            self.upload_batch(&batch, &remote_dir, cancel, progress)?;
            Ok(Some(remote_dir))
        })
    }

    fn upload_batch(
        &self,
        batch: &TransferBatch,
        remote_dir: &str,
        cancel: &CancelToken,
        progress: &ProgressScope<'_>,
    ) -> Result<(), OpError> {
        fs::create_dir_all(self.config.temp_dir())?;
        // Removes the local zip on every exit, including a half-written one.
        let local_archive = TempFile::at(batch.local_archive_path.clone());

        progress.update(
            &format!("Packing {} item(s)", batch.local_paths.len()),
            1,
            Some(BATCH_STEPS),
        );
        let entries = archive::build_archive_offloaded(
            batch.local_paths.clone(),
            local_archive.path().to_path_buf(),
            cancel.clone(),
        )?;
        debug!("{} packed with {entries} entries", batch.archive_name);
        check_cancel(cancel)?;

        progress.update(
            &format!("Uploading {}", batch.archive_name),
            2,
            Some(BATCH_STEPS),
        );
        let outcome =
            self.send_and_extract(batch, local_archive.path(), remote_dir, cancel, progress);
        self.remove_remote_archive(batch);
        outcome
    }

    fn send_and_extract(
        &self,
        batch: &TransferBatch,
        local_archive: &Path,
        remote_dir: &str,
        cancel: &CancelToken,
        progress: &ProgressScope<'_>,
    ) -> Result<(), OpError> {
        self.session
            .upload_file(local_archive, &batch.remote_archive_path, cancel)?;
        check_cancel(cancel)?;

        progress.update(
            &format!("Extracting {}", batch.archive_name),
            3,
            Some(BATCH_STEPS),
        );
        let extractor = &self.config.extract_command;
        let command = commands::extract_command(extractor, remote_dir, &batch.archive_name);
        self.run_remote_command(&command)?;
        Ok(())
    }

    /// Best effort; the archive may never have made it to the host.
    fn remove_remote_archive(&self, batch: &TransferBatch) {
        match self.session.delete_file(&batch.remote_archive_path) {
            Ok(()) => debug!("removed {}", batch.remote_archive_path),
            Err(SessionError::NotFound(_)) => {}
            Err(err) => warn!(
                "could not remove remote archive {}: {err}",
                batch.remote_archive_path
            ),
        }
    }
}
