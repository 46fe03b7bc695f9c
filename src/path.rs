pub const HOME_MARKER: &str = "~";
pub const ROOT: &str = "/";

/// Turn a possibly relative, `~`-prefixed or `..`-laden path into an absolute
/// remote path. Never fails: anything that cannot be made sense of ends up as `/`.
///
/// When `home` is unknown the home marker is kept as is, so callers can resolve
/// it later once the session reported its working directory.
pub fn resolve(path: &str, home: Option<&str>) -> String {
    let trimmed = path.trim();
    if trimmed.is_empty() || trimmed == HOME_MARKER {
        return match home {
            Some(home) if !home.trim().is_empty() => normalize_plain(home.trim()),
            _ => HOME_MARKER.to_string(),
        };
    }
    let expanded = match home {
        Some(home) if trimmed.contains(HOME_MARKER) && !home.trim().is_empty() => {
            trimmed.replace(HOME_MARKER, home.trim())
        }
        _ => trimmed.to_string(),
    };
    if expanded.split('/').any(|segment| segment == "..") {
        return normalize(&expanded);
    }
    normalize_plain(&expanded)
}

/// Lexical stack resolution of `.`/`..` segments.
pub fn normalize(path: &str) -> String {
    let mut stack: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                stack.pop();
            }
            other => stack.push(other),
        }
    }
    if stack.is_empty() {
        return ROOT.to_string();
    }
    format!("/{}", stack.join("/"))
}

fn normalize_plain(path: &str) -> String {
    let absolute = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    };
    let trimmed = absolute.trim_end_matches('/');
    if trimmed.is_empty() {
        ROOT.to_string()
    } else {
        trimmed.to_string()
    }
}

pub fn join(dir: &str, name: &str) -> String {
    let name = name.trim_start_matches('/');
    if dir.ends_with('/') {
        format!("{dir}{name}")
    } else {
        format!("{dir}/{name}")
    }
}

pub fn parent(path: &str) -> String {
    path.trim_end_matches('/')
        .rsplit_once('/')
        .map(|(base, _)| {
            if base.is_empty() {
                ROOT.to_string()
            } else {
                base.to_string()
            }
        })
        .unwrap_or_else(|| ROOT.to_string())
}

pub fn file_name(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}

pub fn segments(path: &str) -> Vec<&str> {
    path.split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect()
}

/// Segment-wise prefix check: `/a/b` contains `/a/b` and `/a/b/c`, not `/a/bc`.
pub fn is_same_or_nested(ancestor: &str, path: &str) -> bool {
    let ancestor = segments(ancestor);
    let path = segments(path);
    path.len() >= ancestor.len() && path[..ancestor.len()] == ancestor[..]
}

pub fn is_root(path: &str) -> bool {
    segments(path).is_empty() && path.trim().starts_with('/')
}
