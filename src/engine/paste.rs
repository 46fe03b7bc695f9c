use tracing::debug;

use crate::cancel::CancelToken;
use crate::engine::{EngineResult, FileOperationEngine, check_cancel, commands, mirror, safety};
use crate::error::OpError;
use crate::events::ProgressScope;
use crate::path;

impl FileOperationEngine {
    /// Copies or moves the clipboard into `destination_dir`. The clipboard is
    /// cleared once the paste has passed its safety checks, whatever the outcome.
    pub fn paste(&self, destination_dir: &str) -> EngineResult {
        let clipboard = self.clipboard();
        let verb = if clipboard.is_cut { "Move" } else { "Copy" };
        let label = format!("{verb} {} item(s) to '{destination_dir}'", clipboard.len());
        self.run_operation(&label, |cancel, progress| {
            if clipboard.is_empty() {
                return Err(OpError::Safety("nothing to paste".to_string()));
            }
            let destination_dir = self.resolve(destination_dir);
            let pairs: Vec<(String, String)> = clipboard
                .source_paths
                .iter()
                .map(|source| {
                    let source = self.resolve(source);
                    let target = path::join(&destination_dir, path::file_name(&source));
                    (source, target)
                })
                .collect();
            safety::check_transfer_pairs(&pairs)?;
            check_cancel(cancel)?;

            let outcome = match pairs.as_slice() {
                [(source, target)] => {
                    self.paste_single(source, target, clipboard.is_cut, cancel, progress)
                }
                _ => {
                    self.paste_multiple(&pairs, &destination_dir, clipboard.is_cut, cancel, progress)
                }
            };
            self.clear_clipboard();
            outcome
        })
    }

    fn paste_single(
        &self,
        source: &str,
        target: &str,
        is_cut: bool,
        cancel: &CancelToken,
        progress: &ProgressScope<'_>,
    ) -> Result<Option<String>, OpError> {
        match self.paste_fast_path(&[source.to_string()], target, is_cut) {
            Ok(()) => return Ok(Some(target.to_string())),
            Err(OpError::ConnectionLost(lost)) => return Err(lost.into()),
            Err(err) => debug!("fast path failed for {source}, streaming instead: {err}"),
        }
        check_cancel(cancel)?;
        self.paste_fallback(source, target, is_cut, cancel, progress)?;
        Ok(Some(target.to_string()))
    }

    fn paste_multiple(
        &self,
        pairs: &[(String, String)],
        destination_dir: &str,
        is_cut: bool,
        cancel: &CancelToken,
        progress: &ProgressScope<'_>,
    ) -> Result<Option<String>, OpError> {
        let total = pairs.len();
        let sources: Vec<String> = pairs.iter().map(|(source, _)| source.clone()).collect();
        match self.paste_fast_path(&sources, destination_dir, is_cut) {
            Ok(()) => return Ok(Some(format!("{total}/{total}"))),
            Err(OpError::ConnectionLost(lost)) => return Err(lost.into()),
            Err(err) => debug!("bulk fast path failed, pasting item by item: {err}"),
        }

        let mut succeeded = 0usize;
        let mut failed = 0usize;
        for (index, (source, target)) in pairs.iter().enumerate() {
            check_cancel(cancel)?;
            progress.update(
                &format!("Pasting {source}"),
                index as u64 + 1,
                Some(total as u64),
            );
            match self.paste_fallback(source, target, is_cut, cancel, progress) {
                Ok(()) => {
                    succeeded += 1;
                    self.events.log(&format!("Pasted '{source}' to '{target}'"));
                }
                Err(err @ (OpError::Cancelled | OpError::ConnectionLost(_))) => return Err(err),
                Err(err) => {
                    failed += 1;
                    self.events.log(&format!("Could not paste '{source}': {err}"));
                }
            }
        }

        if succeeded == 0 {
            return Err(OpError::Transfer(format!("all {failed} item(s) failed")));
        }
        Ok(Some(format!("{succeeded}/{total}")))
    }

    /// One server-side `mv`/`cp -R`. A single source is moved or copied onto
    /// its exact target; `mv -f` replaces an existing file there. Any non-zero
    /// exit hands over to the fallback.
    fn paste_fast_path(
        &self,
        sources: &[String],
        destination: &str,
        is_cut: bool,
    ) -> Result<(), OpError> {
        let command = if is_cut {
            commands::move_command(sources, destination)
        } else {
            commands::copy_command(sources, destination)
        };
        self.run_remote_command(&command)?;
        Ok(())
    }

    /// Streams `source` to `target` over SFTP, then removes the original on cut.
    fn paste_fallback(
        &self,
        source: &str,
        target: &str,
        is_cut: bool,
        cancel: &CancelToken,
        progress: &ProgressScope<'_>,
    ) -> Result<(), OpError> {
        let session = self.session.as_ref();
        let temp_dir = self.config.temp_dir();
        let entry = session.stat(source)?;
        if entry.is_dir {
            mirror::copy_remote_tree(session, source, target, &temp_dir, cancel, progress)?;
        } else {
            mirror::relay_file(session, source, target, &temp_dir, cancel)?;
        }
        if !is_cut {
            return Ok(());
        }
        check_cancel(cancel)?;
        if entry.is_dir {
            mirror::remove_remote_tree(session, source, cancel)?;
        } else {
            session.delete_file(source)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::engine::test_support::fixture;
    use crate::model::FailureKind;
    use crate::session::mock::MockFailure;

    #[test]
    fn paste_into_own_subtree_is_refused_before_transfer() {
        let fx = fixture();
        fx.session.enable_shell();
        fx.session.add_dir("/a/b/c");
        fx.engine.update_clipboard("/a/b", false);

        let result = fx.engine.paste("/a/b/c").unwrap();
        assert_eq!(result.failure, Some(FailureKind::SafetyViolation));
        assert!(fx.session.commands().is_empty());
        assert!(fx.session.uploads().is_empty());
        assert!(fx.engine.has_clipboard_content());
    }

    #[test]
    fn cut_paste_falls_back_to_streaming() {
        let fx = fixture();
        fx.session.add_file("/src/file.txt", b"payload");
        fx.session.add_dir("/dst");
        fx.engine.update_clipboard("/src/file.txt", true);

        let result = fx.engine.paste("/dst").unwrap();
        assert!(result.is_success, "{:?}", result.error_message);
        assert_eq!(result.payload.as_deref(), Some("/dst/file.txt"));
        assert!(!fx.session.contains("/src/file.txt"));
        assert_eq!(fx.session.file("/dst/file.txt"), Some(b"payload".to_vec()));
        assert!(!fx.engine.has_clipboard_content());
        assert_eq!(fx.session.commands().len(), 1);
    }

    #[test]
    fn cut_paste_uses_server_side_move() {
        let fx = fixture();
        fx.session.enable_shell();
        fx.session.add_file("/src/file.txt", b"payload");
        fx.session.add_dir("/dst");
        fx.engine.update_clipboard("/src/file.txt", true);

        let result = fx.engine.paste("/dst").unwrap();
        assert!(result.is_success);
        assert_eq!(
            fx.session.commands(),
            vec!["mv -f -T -- '/src/file.txt' '/dst/file.txt'".to_string()]
        );
        assert!(fx.session.uploads().is_empty());
        assert_eq!(fx.session.file("/dst/file.txt"), Some(b"payload".to_vec()));
        assert!(!fx.session.contains("/src/file.txt"));
    }

    #[test]
    fn copy_paste_of_directory_mirrors_tree() {
        let fx = fixture();
        fx.session.add_file("/src/tree/a.txt", b"a");
        fx.session.add_dir("/src/tree/empty");
        fx.session.add_dir("/dst");
        fx.engine.update_clipboard("/src/tree", false);

        let result = fx.engine.paste("/dst").unwrap();
        assert!(result.is_success);
        assert_eq!(fx.session.file("/dst/tree/a.txt"), Some(b"a".to_vec()));
        assert!(fx.session.is_dir("/dst/tree/empty"));
        assert!(fx.session.contains("/src/tree/a.txt"));
        assert!(!fx.engine.has_clipboard_content());
    }

    #[test]
    fn copy_onto_existing_directory_does_not_nest() {
        let fx = fixture();
        fx.session.enable_shell();
        fx.session.add_file("/src/tree/a.txt", b"a");
        fx.session.add_file("/dst/tree/old.txt", b"old");

        fx.engine.update_clipboard("/src/tree", false);

        let result = fx.engine.paste("/dst").unwrap();
        assert!(result.is_success, "{:?}", result.error_message);
        assert_eq!(
            fx.session.commands(),
            vec!["cp -R -T -- '/src/tree' '/dst/tree'".to_string()]
        );
        assert_eq!(fx.session.file("/dst/tree/a.txt"), Some(b"a".to_vec()));
        assert!(fx.session.contains("/dst/tree/old.txt"));
        assert!(!fx.session.contains("/dst/tree/tree"));
    }

    #[test]
    fn failed_bulk_paste_reports_partial_success() {
        let fx = fixture();
        fx.session.add_file("/src/a.txt", b"a");
        fx.session.add_file("/src/b.txt", b"b");
        fx.session.fail_path("/src/b.txt", MockFailure::Broken);
        fx.session.add_dir("/dst");
        fx.engine.update_multi_clipboard(
            vec!["/src/a.txt".to_string(), "/src/b.txt".to_string()],
            false,
        );

        let result = fx.engine.paste("/dst").unwrap();
        assert!(result.is_success);
        assert_eq!(result.payload.as_deref(), Some("1/2"));
        assert_eq!(fx.session.file("/dst/a.txt"), Some(b"a".to_vec()));
        assert!(!fx.session.contains("/dst/b.txt"));
        let logs = fx.sink.logs();
        assert!(logs.iter().any(|line| line.starts_with("Could not paste '/src/b.txt'")));
        assert!(!fx.engine.has_clipboard_content());
    }

    #[test]
    fn bulk_paste_where_every_item_fails_is_a_failure() {
        let fx = fixture();
        fx.session.add_dir("/dst");
        fx.engine
            .update_multi_clipboard(vec!["/gone/a".to_string(), "/gone/b".to_string()], false);

        let result = fx.engine.paste("/dst").unwrap();
        assert!(!result.is_success);
        assert_eq!(result.failure, Some(FailureKind::TransferFailure));
        assert!(!fx.engine.has_clipboard_content());
    }

    #[test]
    fn bulk_paste_runs_one_command_on_success() {
        let fx = fixture();
        fx.session.enable_shell();
        fx.session.add_file("/src/a.txt", b"a");
        fx.session.add_file("/src/b.txt", b"b");
        fx.session.add_dir("/dst");
        fx.engine.update_multi_clipboard(
            vec!["/src/a.txt".to_string(), "/src/b.txt".to_string()],
            true,
        );

        let result = fx.engine.paste("/dst").unwrap();
        assert_eq!(result.payload.as_deref(), Some("2/2"));
        assert_eq!(
            fx.session.commands(),
            vec!["mv -f -- '/src/a.txt' '/src/b.txt' '/dst'".to_string()]
        );
        assert!(fx.session.contains("/dst/b.txt"));
    }

    #[test]
    fn one_unsafe_pair_aborts_bulk_paste() {
        let fx = fixture();
        fx.session.enable_shell();
        fx.session.add_dir("/a/b/c");
        fx.session.add_file("/x.txt", b"x");
        fx.engine
            .update_multi_clipboard(vec!["/x.txt".to_string(), "/a/b".to_string()], false);

        let result = fx.engine.paste("/a/b/c").unwrap();
        assert_eq!(result.failure, Some(FailureKind::SafetyViolation));
        assert!(fx.session.commands().is_empty());
        assert!(!fx.session.contains("/a/b/c/x.txt"));
    }

    #[test]
    fn paste_with_empty_clipboard_is_refused() {
        let fx = fixture();
        let result = fx.engine.paste("/home/test").unwrap();
        assert_eq!(result.failure, Some(FailureKind::SafetyViolation));
    }

    #[test]
    fn cancel_mid_multi_paste_stops_and_clears_clipboard() {
        let fx = fixture();
        fx.session.cancel_mid_upload();
        fx.session.add_file("/src/a.txt", b"aaaa");
        fx.session.add_file("/src/b.txt", b"bbbb");
        fx.session.add_dir("/dst");
        fx.engine.update_multi_clipboard(
            vec!["/src/a.txt".to_string(), "/src/b.txt".to_string()],
            true,
        );

        let result = fx.engine.paste("/dst").unwrap();
        assert!(result.is_cancelled());
        assert_eq!(result.error_message.as_deref(), Some("cancelled"));
        assert_eq!(fx.session.uploads().len(), 1);
        assert!(fx.session.contains("/src/a.txt"));
        assert!(fx.session.contains("/src/b.txt"));
        assert!(!fx.session.contains("/dst/b.txt"));
        assert!(!fx.engine.has_clipboard_content());
    }

    #[test]
    fn connection_loss_during_fast_path_escalates() {
        let fx = fixture();
        fx.session.add_file("/src/a.txt", b"a");
        fx.session.add_dir("/dst");
        fx.session.fail_path("<exec>", MockFailure::ConnectionLost);
        fx.engine.update_clipboard("/src/a.txt", false);

        assert!(fx.engine.paste("/dst").is_err());
        assert!(fx.session.uploads().is_empty());
    }
}
