use std::fs;
use std::path::Path;

use tracing::debug;

use crate::engine::{EngineResult, FileOperationEngine, check_cancel, mirror};

impl FileOperationEngine {
    /// Copies `remote_path` to `local_path`. Folders are mirrored entry by entry
    /// into a freshly created local directory.
    pub fn download(&self, remote_path: &str, local_path: &Path, is_folder: bool) -> EngineResult {
        let label = format!("Download '{remote_path}'");
        self.run_operation(&label, |cancel, progress| {
            let source = self.resolve(remote_path);
            check_cancel(cancel)?;
            if is_folder {
                let session = self.session.as_ref();
                let files = mirror::download_tree(session, &source, local_path, cancel, progress)?;
                debug!("downloaded {files} file(s) from {source}");
            } else {
                if let Some(parent) = local_path.parent() {
                    fs::create_dir_all(parent)?;
                }
                self.session.download_file(&source, local_path, cancel)?;
            }
            Ok(Some(local_path.display().to_string()))
        })
    }
}
