use crate::engine::{EngineResult, FileOperationEngine, check_cancel, commands, safety};
use crate::error::OpError;

impl FileOperationEngine {
    /// Folders go in one `rm -rf`, files through SFTP unlink. A failure here is
    /// final; there is no streaming fallback for deletes.
    pub fn delete(&self, path: &str, is_folder: bool) -> EngineResult {
        let kind = if is_folder { "folder" } else { "file" };
        let label = format!("Delete {kind} '{path}'");
        self.run_operation(&label, |cancel, _progress| {
            let target = self.resolve(path);
            safety::check_delete_target(path, &target, self.home())?;
            check_cancel(cancel)?;
            if is_folder {
                self.run_remote_command(&commands::remove_command(&[target.clone()]))?;
            } else {
                self.session.delete_file(&target)?;
            }
            Ok(Some(target))
        })
    }

    pub fn delete_many(&self, paths: &[String]) -> EngineResult {
        let label = format!("Delete {} item(s)", paths.len());
        self.run_operation(&label, |cancel, _progress| {
            if paths.is_empty() {
                return Err(OpError::Safety("nothing to delete".to_string()));
            }
            let mut targets = Vec::with_capacity(paths.len());
            for requested in paths {
                let target = self.resolve(requested);
                safety::check_delete_target(requested, &target, self.home())?;
                targets.push(target);
            }
            check_cancel(cancel)?;
            self.run_remote_command(&commands::remove_command(&targets))?;
            Ok(Some(targets.len().to_string()))
        })
    }
}
