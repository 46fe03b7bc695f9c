use std::fs::File;
use std::io::{self, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::DateTime;
use ssh2::{ErrorCode, FileStat, OpenFlags, OpenType, Session, Sftp};

use crate::cancel::CancelToken;
use crate::model::{AuthConfig, CommandOutput, ConnectionConfig, RemoteEntry};
use crate::path;
use crate::session::{RemoteSession, SessionError, SessionResult};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const CHUNK_SIZE: usize = 32 * 1024;

// libssh2 session error codes that mean the transport itself is gone.
const LIBSSH2_ERROR_SOCKET_SEND: i32 = -7;
const LIBSSH2_ERROR_TIMEOUT: i32 = -9;
const LIBSSH2_ERROR_SOCKET_DISCONNECT: i32 = -13;
const LIBSSH2_ERROR_SOCKET_TIMEOUT: i32 = -30;
const LIBSSH2_ERROR_SOCKET_RECV: i32 = -43;
const LIBSSH2_FX_NO_SUCH_FILE: i32 = 2;
const LIBSSH2_FX_PERMISSION_DENIED: i32 = 3;

pub fn connect_ssh(config: &ConnectionConfig, secret: Option<&str>) -> Result<Session> {
    let address = format!("{}:{}", config.host, config.port);
    let mut last_err = None;
    let mut tcp = None;
    for addr in address.to_socket_addrs().context("resolve address")? {
        match TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT) {
            Ok(stream) => {
                tcp = Some(stream);
                break;
            }
            Err(err) => last_err = Some(err),
        }
    }
    let tcp = tcp.ok_or_else(|| {
        let err = last_err.unwrap_or_else(|| io::Error::other("connect failed"));
        anyhow::anyhow!("connect tcp failed: {err}")
    })?;
    tcp.set_read_timeout(Some(CONNECT_TIMEOUT)).ok();
    tcp.set_write_timeout(Some(CONNECT_TIMEOUT)).ok();

    let mut session = Session::new().context("create session")?;
    session.set_timeout(CONNECT_TIMEOUT.as_millis() as u32);
    session.set_tcp_stream(tcp.try_clone().context("clone tcp stream")?);
    session.handshake().context("ssh handshake")?;

    match &config.auth {
        AuthConfig::Password => {
            let password = secret.context("password required")?;
            session
                .userauth_password(&config.user, password)
                .context("password auth")?;
        }
        AuthConfig::PrivateKey { path, .. } => {
            let path = expand_tilde(path);
            if !path.exists() {
                anyhow::bail!("Private key not found at {}", path.display());
            }
            session
                .userauth_pubkey_file(&config.user, None, &path, secret)
                .context("private key auth")?;
        }
        AuthConfig::Agent => {
            session.userauth_agent(&config.user).context("agent auth")?;
        }
    }

    if !session.authenticated() {
        anyhow::bail!("Authentication failed");
    }

    // Long-running remote commands must not trip the handshake timeouts.
    session.set_timeout(0);
    tcp.set_read_timeout(None).ok();
    tcp.set_write_timeout(None).ok();
    Ok(session)
}

pub(crate) fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

/// `RemoteSession` over an authenticated `ssh2::Session`.
pub struct Ssh2Session {
    session: Session,
    sftp: Mutex<Option<Sftp>>,
}

impl Ssh2Session {
    pub fn new(session: Session) -> Self {
        Self {
            session,
            sftp: Mutex::new(None),
        }
    }

    /// ssh2 flattens libssh2 failures inside `Read`/`Write` into bare
    /// `io::Error`s, so the session's last error decides whether the
    /// transport went away.
    fn stream_error(&self, err: io::Error) -> SessionError {
        classify_io_error(err, ssh2::Error::last_session_error(&self.session))
    }

    fn with_sftp<T>(&self, f: impl FnOnce(&Sftp) -> SessionResult<T>) -> SessionResult<T> {
        let mut guard = self.sftp.lock().unwrap_or_else(PoisonError::into_inner);
        if guard.is_none() {
            *guard = Some(self.session.sftp().map_err(map_ssh_error)?);
        }
        match guard.as_ref() {
            Some(sftp) => f(sftp),
            None => Err(SessionError::Connection(
                "SFTP session not available".to_string(),
            )),
        }
    }
}

fn map_ssh_error(err: ssh2::Error) -> SessionError {
    match err.code() {
        ErrorCode::SFTP(LIBSSH2_FX_NO_SUCH_FILE) => {
            SessionError::NotFound(err.message().to_string())
        }
        ErrorCode::SFTP(LIBSSH2_FX_PERMISSION_DENIED) => {
            SessionError::PermissionDenied(err.message().to_string())
        }
        ErrorCode::Session(
            LIBSSH2_ERROR_SOCKET_SEND
            | LIBSSH2_ERROR_TIMEOUT
            | LIBSSH2_ERROR_SOCKET_DISCONNECT
            | LIBSSH2_ERROR_SOCKET_TIMEOUT
            | LIBSSH2_ERROR_SOCKET_RECV,
        ) => SessionError::Connection(err.to_string()),
        _ => SessionError::Other(err.to_string()),
    }
}

fn map_io_error(err: io::Error) -> SessionError {
    match err.kind() {
        io::ErrorKind::NotFound => SessionError::NotFound(err.to_string()),
        io::ErrorKind::PermissionDenied => SessionError::PermissionDenied(err.to_string()),
        io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::BrokenPipe
        | io::ErrorKind::TimedOut => SessionError::Connection(err.to_string()),
        _ => SessionError::Io(err),
    }
}

fn classify_io_error(err: io::Error, last: Option<ssh2::Error>) -> SessionError {
    match map_io_error(err) {
        SessionError::Io(err) => match last.map(map_ssh_error) {
            Some(lost @ SessionError::Connection(_)) => lost,
            _ => SessionError::Io(err),
        },
        classified => classified,
    }
}

fn entry_from_stat(name: String, path: String, stat: &FileStat) -> RemoteEntry {
    RemoteEntry {
        name,
        path,
        is_dir: stat.is_dir(),
        size: stat.size.unwrap_or(0),
        modified: stat
            .mtime
            .and_then(|secs| i64::try_from(secs).ok())
            .and_then(|secs| DateTime::from_timestamp(secs, 0)),
    }
}

fn copy_stream(
    reader: &mut impl Read,
    writer: &mut impl Write,
    cancel: &CancelToken,
    classify: impl Fn(io::Error) -> SessionError,
) -> SessionResult<u64> {
    let mut buffer = vec![0u8; CHUNK_SIZE];
    let mut total = 0u64;
    loop {
        if cancel.is_cancelled() {
            return Err(SessionError::Cancelled);
        }
        let read = reader.read(&mut buffer).map_err(&classify)?;
        if read == 0 {
            break;
        }
        writer.write_all(&buffer[..read]).map_err(&classify)?;
        total = total.saturating_add(read as u64);
    }
    writer.flush().map_err(classify)?;
    Ok(total)
}

impl RemoteSession for Ssh2Session {
    fn home_dir(&self) -> SessionResult<String> {
        self.with_sftp(|sftp| {
            let home = sftp.realpath(Path::new(".")).map_err(map_ssh_error)?;
            Ok(home.to_string_lossy().into_owned())
        })
    }

    fn list_directory(&self, dir: &str) -> SessionResult<Vec<RemoteEntry>> {
        self.with_sftp(|sftp| {
            let mut entries = Vec::new();
            for (child, stat) in sftp.readdir(Path::new(dir)).map_err(map_ssh_error)? {
                let name = child
                    .file_name()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| String::from("/"));
                if name == "." || name == ".." {
                    continue;
                }
                let full = path::join(dir, &name);
                entries.push(entry_from_stat(name, full, &stat));
            }
            entries.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
            Ok(entries)
        })
    }

    fn stat(&self, remote_path: &str) -> SessionResult<RemoteEntry> {
        self.with_sftp(|sftp| {
            let stat = sftp.stat(Path::new(remote_path)).map_err(map_ssh_error)?;
            Ok(entry_from_stat(
                path::file_name(remote_path).to_string(),
                remote_path.to_string(),
                &stat,
            ))
        })
    }

    fn upload_file(
        &self,
        local_path: &Path,
        remote_path: &str,
        cancel: &CancelToken,
    ) -> SessionResult<u64> {
        let mut local = File::open(local_path)?;
        self.with_sftp(|sftp| {
            let mut remote = sftp
                .open_mode(
                    Path::new(remote_path),
                    OpenFlags::CREATE | OpenFlags::TRUNCATE | OpenFlags::WRITE,
                    0o644,
                    OpenType::File,
                )
                .map_err(map_ssh_error)?;
            copy_stream(&mut local, &mut remote, cancel, |err| self.stream_error(err))
        })
    }

    fn download_file(
        &self,
        remote_path: &str,
        local_path: &Path,
        cancel: &CancelToken,
    ) -> SessionResult<u64> {
        self.with_sftp(|sftp| {
            let mut remote = sftp.open(Path::new(remote_path)).map_err(map_ssh_error)?;
            let mut local = File::create(local_path)?;
            copy_stream(&mut remote, &mut local, cancel, |err| self.stream_error(err))
        })
    }

    fn create_directory(&self, remote_path: &str) -> SessionResult<()> {
        self.with_sftp(|sftp| {
            sftp.mkdir(Path::new(remote_path), 0o755)
                .map_err(map_ssh_error)
        })
    }

    fn delete_file(&self, remote_path: &str) -> SessionResult<()> {
        self.with_sftp(|sftp| sftp.unlink(Path::new(remote_path)).map_err(map_ssh_error))
    }

    fn delete_empty_directory(&self, remote_path: &str) -> SessionResult<()> {
        self.with_sftp(|sftp| sftp.rmdir(Path::new(remote_path)).map_err(map_ssh_error))
    }

    fn rename(&self, old_path: &str, new_path: &str) -> SessionResult<()> {
        self.with_sftp(|sftp| {
            sftp.rename(Path::new(old_path), Path::new(new_path), None)
                .map_err(map_ssh_error)
        })
    }

    fn run_command(&self, command: &str) -> SessionResult<CommandOutput> {
        let mut channel = self.session.channel_session().map_err(map_ssh_error)?;
        channel.exec(command).map_err(map_ssh_error)?;
        let mut stdout = String::new();
        channel
            .read_to_string(&mut stdout)
            .map_err(|err| self.stream_error(err))?;
        let mut stderr = String::new();
        channel
            .stderr()
            .read_to_string(&mut stderr)
            .map_err(|err| self.stream_error(err))?;
        channel.wait_close().map_err(map_ssh_error)?;
        let exit_status = channel.exit_status().map_err(map_ssh_error)?;
        Ok(CommandOutput {
            exit_status,
            stdout,
            stderr,
        })
    }
}
