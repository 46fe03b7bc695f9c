use crate::error::OpError;
use crate::path::{self, HOME_MARKER};

/// Rejects delete targets that would wipe the root or the home directory.
pub(crate) fn check_delete_target(
    requested: &str,
    resolved: &str,
    home: Option<&str>,
) -> Result<(), OpError> {
    let requested = requested.trim();
    if requested.is_empty() || requested == HOME_MARKER {
        return Err(OpError::Safety(format!(
            "refusing to delete protected path '{requested}'"
        )));
    }
    let resolved = resolved.trim();
    if resolved.is_empty() || resolved == HOME_MARKER || path::is_root(resolved) {
        return Err(OpError::Safety(format!(
            "refusing to delete protected path '{resolved}'"
        )));
    }
    if let Some(home) = home {
        if path::segments(home) == path::segments(resolved) {
            return Err(OpError::Safety(format!(
                "refusing to delete home directory '{resolved}'"
            )));
        }
    }
    Ok(())
}

/// Every pair must pass or the whole batch is refused.
pub(crate) fn check_transfer_pairs(pairs: &[(String, String)]) -> Result<(), OpError> {
    for (source, destination) in pairs {
        if path::is_root(source) {
            return Err(OpError::Safety(format!(
                "refusing to copy or move the root directory into '{destination}'"
            )));
        }
        if path::is_same_or_nested(source, destination) {
            return Err(OpError::Safety(format!(
                "cannot paste '{source}' into itself ('{destination}')"
            )));
        }
    }
    Ok(())
}

pub(crate) fn check_entry_name(name: &str) -> Result<(), OpError> {
    let trimmed = name.trim();
    if trimmed.is_empty() || trimmed == "." || trimmed == ".." || trimmed.contains('/') {
        return Err(OpError::Safety(format!("invalid name '{name}'")));
    }
    Ok(())
}
