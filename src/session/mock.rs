use std::collections::{BTreeMap, HashMap};
use std::io::{Cursor, Read};
use std::path::Path;
use std::sync::Mutex;

use crate::cancel::CancelToken;
use crate::model::{CommandOutput, RemoteEntry};
use crate::path;
use crate::session::{RemoteSession, SessionError, SessionResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Node {
    Dir,
    File(Vec<u8>),
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum MockFailure {
    NotFound,
    PermissionDenied,
    ConnectionLost,
    Broken,
}

impl MockFailure {
    fn to_error(self, path: &str) -> SessionError {
        match self {
            Self::NotFound => SessionError::NotFound(path.to_string()),
            Self::PermissionDenied => SessionError::PermissionDenied(path.to_string()),
            Self::ConnectionLost => SessionError::Connection("socket closed".to_string()),
            Self::Broken => SessionError::Other(format!("broken pipe on {path}")),
        }
    }
}

struct MockState {
    nodes: BTreeMap<String, Node>,
    commands: Vec<String>,
    uploads: Vec<(String, Vec<u8>)>,
    failures: HashMap<String, MockFailure>,
    shell_enabled: bool,
    forced_exit: Option<i32>,
    extract_exit: Option<i32>,
    cancel_mid_upload: bool,
}

/// In-memory host: a path-keyed tree plus an optional tiny shell.
pub(crate) struct MockSession {
    home: String,
    state: Mutex<MockState>,
}

impl Default for MockSession {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSession {
    pub(crate) fn new() -> Self {
        let session = Self {
            home: "/home/test".to_string(),
            state: Mutex::new(MockState {
                nodes: BTreeMap::from([("/".to_string(), Node::Dir)]),
                commands: vec![],
                uploads: vec![],
                failures: HashMap::new(),
                shell_enabled: false,
                forced_exit: None,
                extract_exit: None,
                cancel_mid_upload: false,
            }),
        };
        session.add_dir("/home/test");
        session
    }

    pub(crate) fn home(&self) -> &str {
        &self.home
    }

    pub(crate) fn add_dir(&self, dir: &str) {
        let mut state = self.state.lock().unwrap();
        insert_dir_all(&mut state.nodes, &path::normalize(dir));
    }

    pub(crate) fn add_file(&self, file: &str, content: &[u8]) {
        let file = path::normalize(file);
        let mut state = self.state.lock().unwrap();
        insert_dir_all(&mut state.nodes, &path::parent(&file));
        state.nodes.insert(file, Node::File(content.to_vec()));
    }

    pub(crate) fn file(&self, file: &str) -> Option<Vec<u8>> {
        match self.state.lock().unwrap().nodes.get(file) {
            Some(Node::File(content)) => Some(content.clone()),
            _ => None,
        }
    }

    pub(crate) fn is_dir(&self, dir: &str) -> bool {
        matches!(self.state.lock().unwrap().nodes.get(dir), Some(Node::Dir))
    }

    pub(crate) fn contains(&self, node: &str) -> bool {
        self.state.lock().unwrap().nodes.contains_key(node)
    }

    pub(crate) fn commands(&self) -> Vec<String> {
        self.state.lock().unwrap().commands.clone()
    }

    pub(crate) fn uploads(&self) -> Vec<(String, Vec<u8>)> {
        self.state.lock().unwrap().uploads.clone()
    }

    pub(crate) fn enable_shell(&self) {
        self.state.lock().unwrap().shell_enabled = true;
    }

    pub(crate) fn force_exit_status(&self, status: i32) {
        self.state.lock().unwrap().forced_exit = Some(status);
    }

    pub(crate) fn force_extract_exit_status(&self, status: i32) {
        self.state.lock().unwrap().extract_exit = Some(status);
    }

    pub(crate) fn fail_path(&self, target: &str, failure: MockFailure) {
        self.state
            .lock()
            .unwrap()
            .failures
            .insert(target.to_string(), failure);
    }

    pub(crate) fn cancel_mid_upload(&self) {
        self.state.lock().unwrap().cancel_mid_upload = true;
    }

    fn check_failure(state: &MockState, target: &str) -> SessionResult<()> {
        match state.failures.get(target) {
            Some(failure) => Err(failure.to_error(target)),
            None => Ok(()),
        }
    }
}

fn insert_dir_all(nodes: &mut BTreeMap<String, Node>, dir: &str) {
    let mut current = String::from("/");
    for segment in path::segments(dir) {
        current = path::join(&current, segment);
        nodes.entry(current.clone()).or_insert(Node::Dir);
    }
}

fn children<'a>(nodes: &'a BTreeMap<String, Node>, dir: &str) -> Vec<(&'a String, &'a Node)> {
    nodes
        .iter()
        .filter(|(key, _)| key.as_str() != "/" && path::parent(key) == dir)
        .collect()
}

fn subtree_keys(nodes: &BTreeMap<String, Node>, root: &str) -> Vec<String> {
    nodes
        .keys()
        .filter(|key| path::is_same_or_nested(root, key))
        .cloned()
        .collect()
}

fn entry_for(key: &str, node: &Node) -> RemoteEntry {
    RemoteEntry {
        name: path::file_name(key).to_string(),
        path: key.to_string(),
        is_dir: matches!(node, Node::Dir),
        size: match node {
            Node::File(content) => content.len() as u64,
            Node::Dir => 0,
        },
        modified: None,
    }
}

/// Splits a command line the way `sh` would for single-quoted words.
fn tokenize(command: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut chars = command.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '\'' => {
                in_token = true;
                for quoted in chars.by_ref() {
                    if quoted == '\'' {
                        break;
                    }
                    current.push(quoted);
                }
            }
            '\\' => {
                in_token = true;
                if let Some(escaped) = chars.next() {
                    current.push(escaped);
                }
            }
            ch if ch.is_whitespace() => {
                if in_token {
                    tokens.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            other => {
                in_token = true;
                current.push(other);
            }
        }
    }
    if in_token {
        tokens.push(current);
    }
    tokens
}

fn operands(args: &[String]) -> Vec<String> {
    let mut past_options = false;
    let mut out = Vec::new();
    for arg in args {
        if !past_options && arg == "--" {
            past_options = true;
        } else if !past_options && arg.starts_with('-') {
            continue;
        } else {
            out.push(arg.clone());
        }
    }
    out
}

fn failed(message: &str) -> CommandOutput {
    CommandOutput {
        exit_status: 1,
        stdout: String::new(),
        stderr: message.to_string(),
    }
}

/// `-T`: the destination is the exact target, never a directory to land in.
fn no_target_directory(args: &[String]) -> bool {
    args.iter()
        .take_while(|arg| arg.as_str() != "--")
        .any(|arg| arg == "-T")
}

fn transfer_nodes(
    nodes: &mut BTreeMap<String, Node>,
    operands: &[String],
    remove_source: bool,
    exact_target: bool,
) -> CommandOutput {
    let Some((dest, sources)) = operands.split_last() else {
        return failed("missing operand");
    };
    if sources.is_empty() {
        return failed("missing destination");
    }
    let dest_exists_as_dir = matches!(nodes.get(dest), Some(Node::Dir));
    if exact_target && sources.len() > 1 {
        return failed("extra operand");
    }
    if exact_target && dest_exists_as_dir {
        if !matches!(nodes.get(&sources[0]), Some(Node::Dir)) {
            return failed("cannot overwrite directory with non-directory");
        }
        if remove_source && !children(nodes, dest).is_empty() {
            return failed("Directory not empty");
        }
    }
    let dest_is_dir = dest_exists_as_dir && !exact_target;
    if sources.len() > 1 && !dest_is_dir {
        return failed("target is not a directory");
    }
    for source in sources {
        if !nodes.contains_key(source) {
            return failed("no such file or directory");
        }
        let target = if dest_is_dir {
            path::join(dest, path::file_name(source))
        } else {
            dest.clone()
        };
        if path::is_same_or_nested(source, &target) {
            return failed("cannot copy a directory into itself");
        }
        if !matches!(nodes.get(&path::parent(&target)), Some(Node::Dir)) {
            return failed("no such file or directory");
        }
        for key in subtree_keys(nodes, source) {
            let Some(node) = nodes.get(&key).cloned() else {
                continue;
            };
            let moved = format!("{target}{}", &key[source.len()..]);
            nodes.insert(moved, node);
            if remove_source {
                nodes.remove(&key);
            }
        }
    }
    CommandOutput::default()
}

fn unzip_into(nodes: &mut BTreeMap<String, Node>, dir: &str, archive: &str) -> CommandOutput {
    let archive_path = if archive.starts_with('/') {
        archive.to_string()
    } else {
        path::join(dir, archive)
    };
    let Some(Node::File(bytes)) = nodes.get(&archive_path).cloned() else {
        return failed("cannot find archive");
    };
    let Ok(mut zip) = zip::ZipArchive::new(Cursor::new(bytes)) else {
        return failed("not a zip archive");
    };
    for index in 0..zip.len() {
        let Ok(mut file) = zip.by_index(index) else {
            return failed("corrupt entry");
        };
        let name = file.name().to_string();
        let target = path::normalize(&path::join(dir, &name));
        if name.ends_with('/') {
            insert_dir_all(nodes, &target);
        } else {
            let mut content = Vec::new();
            if file.read_to_end(&mut content).is_err() {
                return failed("corrupt entry");
            }
            insert_dir_all(nodes, &path::parent(&target));
            nodes.insert(target, Node::File(content));
        }
    }
    CommandOutput::default()
}

fn interpret(state: &mut MockState, command: &str) -> CommandOutput {
    let tokens = tokenize(command);
    let mut cwd = "/".to_string();
    let mut rest: &[String] = &tokens;
    if rest.first().map(String::as_str) == Some("cd") {
        let Some(dir) = rest.get(1) else {
            return failed("cd: missing operand");
        };
        if !matches!(state.nodes.get(dir), Some(Node::Dir)) {
            return failed("cd: no such directory");
        }
        cwd = dir.clone();
        if rest.get(2).map(String::as_str) != Some("&&") {
            return CommandOutput::default();
        }
        rest = &rest[3..];
    }
    let Some((program, args)) = rest.split_first() else {
        return CommandOutput::default();
    };
    let operands = operands(args);
    let exact_target = no_target_directory(args);
    match program.as_str() {
        "mv" => transfer_nodes(&mut state.nodes, &operands, true, exact_target),
        "cp" => transfer_nodes(&mut state.nodes, &operands, false, exact_target),
        "rm" => {
            for target in &operands {
                for key in subtree_keys(&state.nodes, target) {
                    state.nodes.remove(&key);
                }
            }
            state.nodes.entry("/".to_string()).or_insert(Node::Dir);
            CommandOutput::default()
        }
        "unzip" => {
            if let Some(status) = state.extract_exit {
                return CommandOutput {
                    exit_status: status,
                    stdout: String::new(),
                    stderr: "unzip failed".to_string(),
                };
            }
            match operands.first() {
                Some(archive) => unzip_into(&mut state.nodes, &cwd, archive),
                None => failed("unzip: missing archive"),
            }
        }
        other => CommandOutput {
            exit_status: 127,
            stdout: String::new(),
            stderr: format!("{other}: command not found"),
        },
    }
}

impl RemoteSession for MockSession {
    fn home_dir(&self) -> SessionResult<String> {
        Ok(self.home.clone())
    }

    fn list_directory(&self, dir: &str) -> SessionResult<Vec<RemoteEntry>> {
        let state = self.state.lock().unwrap();
        Self::check_failure(&state, dir)?;
        match state.nodes.get(dir) {
            Some(Node::Dir) => Ok(children(&state.nodes, dir)
                .into_iter()
                .map(|(key, node)| entry_for(key, node))
                .collect()),
            Some(Node::File(_)) => Err(SessionError::Other(format!("{dir} is not a directory"))),
            None => Err(SessionError::NotFound(dir.to_string())),
        }
    }

    fn stat(&self, target: &str) -> SessionResult<RemoteEntry> {
        let state = self.state.lock().unwrap();
        Self::check_failure(&state, target)?;
        state
            .nodes
            .get(target)
            .map(|node| entry_for(target, node))
            .ok_or_else(|| SessionError::NotFound(target.to_string()))
    }

    fn upload_file(
        &self,
        local_path: &Path,
        remote_path: &str,
        cancel: &CancelToken,
    ) -> SessionResult<u64> {
        let content = std::fs::read(local_path)?;
        let mut state = self.state.lock().unwrap();
        Self::check_failure(&state, remote_path)?;
        if !matches!(state.nodes.get(&path::parent(remote_path)), Some(Node::Dir)) {
            return Err(SessionError::NotFound(remote_path.to_string()));
        }
        state.uploads.push((remote_path.to_string(), content.clone()));
        if state.cancel_mid_upload {
            let partial = content[..content.len() / 2].to_vec();
            state
                .nodes
                .insert(remote_path.to_string(), Node::File(partial));
            cancel.cancel();
        }
        if cancel.is_cancelled() {
            return Err(SessionError::Cancelled);
        }
        let written = content.len() as u64;
        state
            .nodes
            .insert(remote_path.to_string(), Node::File(content));
        Ok(written)
    }

    fn download_file(
        &self,
        remote_path: &str,
        local_path: &Path,
        cancel: &CancelToken,
    ) -> SessionResult<u64> {
        if cancel.is_cancelled() {
            return Err(SessionError::Cancelled);
        }
        let state = self.state.lock().unwrap();
        Self::check_failure(&state, remote_path)?;
        match state.nodes.get(remote_path) {
            Some(Node::File(content)) => {
                std::fs::write(local_path, content)?;
                Ok(content.len() as u64)
            }
            Some(Node::Dir) => Err(SessionError::Other(format!(
                "{remote_path} is a directory"
            ))),
            None => Err(SessionError::NotFound(remote_path.to_string())),
        }
    }

    fn create_directory(&self, dir: &str) -> SessionResult<()> {
        let mut state = self.state.lock().unwrap();
        Self::check_failure(&state, dir)?;
        if state.nodes.contains_key(dir) {
            return Err(SessionError::Other(format!("{dir} already exists")));
        }
        if !matches!(state.nodes.get(&path::parent(dir)), Some(Node::Dir)) {
            return Err(SessionError::NotFound(dir.to_string()));
        }
        state.nodes.insert(dir.to_string(), Node::Dir);
        Ok(())
    }

    fn delete_file(&self, target: &str) -> SessionResult<()> {
        let mut state = self.state.lock().unwrap();
        Self::check_failure(&state, target)?;
        match state.nodes.get(target) {
            Some(Node::File(_)) => {
                state.nodes.remove(target);
                Ok(())
            }
            Some(Node::Dir) => Err(SessionError::Other(format!("{target} is a directory"))),
            None => Err(SessionError::NotFound(target.to_string())),
        }
    }

    fn delete_empty_directory(&self, target: &str) -> SessionResult<()> {
        let mut state = self.state.lock().unwrap();
        Self::check_failure(&state, target)?;
        match state.nodes.get(target) {
            Some(Node::Dir) if children(&state.nodes, target).is_empty() => {
                state.nodes.remove(target);
                Ok(())
            }
            Some(_) => Err(SessionError::Other(format!("{target} is not empty"))),
            None => Err(SessionError::NotFound(target.to_string())),
        }
    }

    fn rename(&self, old_path: &str, new_path: &str) -> SessionResult<()> {
        let mut state = self.state.lock().unwrap();
        Self::check_failure(&state, old_path)?;
        if !state.nodes.contains_key(old_path) {
            return Err(SessionError::NotFound(old_path.to_string()));
        }
        if state.nodes.contains_key(new_path) {
            return Err(SessionError::Other(format!("{new_path} already exists")));
        }
        for key in subtree_keys(&state.nodes, old_path) {
            if let Some(node) = state.nodes.remove(&key) {
                state
                    .nodes
                    .insert(format!("{new_path}{}", &key[old_path.len()..]), node);
            }
        }
        Ok(())
    }

    fn run_command(&self, command: &str) -> SessionResult<CommandOutput> {
        let mut state = self.state.lock().unwrap();
        state.commands.push(command.to_string());
        if let Some(failure) = state.failures.get("<exec>") {
            return Err(failure.to_error(command));
        }
        if let Some(status) = state.forced_exit {
            return Ok(CommandOutput {
                exit_status: status,
                stdout: String::new(),
                stderr: "forced failure".to_string(),
            });
        }
        if !state.shell_enabled {
            return Ok(CommandOutput {
                exit_status: 127,
                stdout: String::new(),
                stderr: "sh: exec channel disabled".to_string(),
            });
        }
        Ok(interpret(&mut state, command))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_handles_escaped_quotes() {
        let tokens = tokenize(r"mv -f -- '/a/it'\''s' '/b c'");
        assert_eq!(tokens, vec!["mv", "-f", "--", "/a/it's", "/b c"]);
    }

    #[test]
    fn shell_moves_into_directory() {
        let session = MockSession::new();
        session.enable_shell();
        session.add_file("/src/a.txt", b"a");
        session.add_dir("/dst");
        let output = session.run_command("mv -f -- '/src/a.txt' '/dst'").unwrap();
        assert!(output.success());
        assert_eq!(session.file("/dst/a.txt"), Some(b"a".to_vec()));
        assert!(!session.contains("/src/a.txt"));
    }

    #[test]
    fn exact_target_copy_merges_into_existing_directory() {
        let session = MockSession::new();
        session.enable_shell();
        session.add_file("/src/tree/a.txt", b"a");
        session.add_dir("/dst/tree");
        let output = session
            .run_command("cp -R -T -- '/src/tree' '/dst/tree'")
            .unwrap();
        assert!(output.success());
        assert_eq!(session.file("/dst/tree/a.txt"), Some(b"a".to_vec()));
        assert!(!session.contains("/dst/tree/tree"));
    }

    #[test]
    fn rename_moves_subtree() {
        let session = MockSession::new();
        session.add_file("/a/b/c.txt", b"c");
        session.rename("/a", "/z").unwrap();
        assert_eq!(session.file("/z/b/c.txt"), Some(b"c".to_vec()));
        assert!(!session.contains("/a"));
    }
}
