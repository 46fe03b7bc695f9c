use crate::engine::{EngineResult, FileOperationEngine, check_cancel, safety};
use crate::error::OpError;
use crate::path;

impl FileOperationEngine {
    pub fn create_folder(&self, name: &str, current_dir: &str) -> EngineResult {
        let label = format!("Create folder '{name}'");
        self.run_operation(&label, |cancel, _progress| {
            safety::check_entry_name(name)?;
            let target = self.resolve(&path::join(current_dir, name.trim()));
            check_cancel(cancel)?;
            self.session.create_directory(&target)?;
            Ok(Some(target))
        })
    }

    pub fn rename(&self, old_path: &str, new_name: &str, is_folder: bool) -> EngineResult {
        let kind = if is_folder { "folder" } else { "file" };
        let label = format!("Rename {kind} '{old_path}' to '{new_name}'");
        self.run_operation(&label, |cancel, _progress| {
            safety::check_entry_name(new_name)?;
            let source = self.resolve(old_path);
            if path::is_root(&source) {
                return Err(OpError::Safety("cannot rename the root directory".to_string()));
            }
            let target = path::join(&path::parent(&source), new_name.trim());
            check_cancel(cancel)?;
            self.session.rename(&source, &target)?;
            Ok(Some(target))
        })
    }
}
