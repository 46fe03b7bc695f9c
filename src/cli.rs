use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, Subcommand};
use rpassword::prompt_password;

use remote_fs_ops::logging::FileLogSink;
use remote_fs_ops::model::{AuthConfig, ConnectionConfig};
use remote_fs_ops::session::{Ssh2Session, connect_ssh};
use remote_fs_ops::storage::{self, StoreFile};
use remote_fs_ops::{
    EngineEvents, EngineResult, FileOperationEngine, ListingSink, LogSink, NavigationManager,
    NavigationOutcome, NullSink, ProgressSink, RemoteEntry, RemoteSession, spawn_operation,
};

/// Browse and change files on an SSH host
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Saved connection name, or user@host[:port]
    #[arg(short, long)]
    pub connection: String,

    /// Private key to authenticate with
    #[arg(short = 'i', long, value_name = "KEY")]
    pub identity: Option<String>,

    /// Prompt for a password instead of using the SSH agent
    #[arg(long)]
    pub password: bool,

    /// Echo log lines to stderr
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// List a remote directory (defaults to the last one visited)
    Ls { path: Option<String> },
    /// Create a folder
    Mkdir {
        name: String,
        #[arg(long, default_value = "~")]
        dir: String,
    },
    /// Rename a file or folder in place
    Rename {
        path: String,
        new_name: String,
        #[arg(long)]
        folder: bool,
    },
    /// Delete files, or folders with -r
    Rm {
        #[arg(required = true)]
        paths: Vec<String>,
        #[arg(short, long)]
        recursive: bool,
    },
    /// Copy remote items into a remote directory
    Cp {
        #[arg(required = true)]
        sources: Vec<String>,
        #[arg(long)]
        to: String,
    },
    /// Move remote items into a remote directory
    Mv {
        #[arg(required = true)]
        sources: Vec<String>,
        #[arg(long)]
        to: String,
    },
    /// Upload local files and folders into a remote directory
    Put {
        #[arg(required = true)]
        local: Vec<PathBuf>,
        #[arg(long, default_value = "~")]
        to: String,
    },
    /// Download a remote file, or a folder with -r
    Get {
        remote: String,
        local: PathBuf,
        #[arg(short, long)]
        recursive: bool,
    },
}

struct ConsoleListing;

impl ListingSink for ConsoleListing {
    fn clear(&self) {}

    fn push_entry(&self, entry: &RemoteEntry) {
        let kind = if entry.is_dir { 'd' } else { '-' };
        let modified = entry
            .modified
            .map(|time| time.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();
        println!("{kind} {:>12} {modified:>16} {}", entry.size, entry.name);
    }

    fn set_path(&self, path: &str) {
        println!("{path}:");
    }

    fn set_history_availability(&self, _can_go_back: bool, _can_go_forward: bool) {}
}

#[derive(Default)]
struct ConsoleProgress {
    last: Mutex<Option<String>>,
}

impl ProgressSink for ConsoleProgress {
    fn on_progress(&self, show: bool, message: &str, current: Option<u64>, total: Option<u64>) {
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        if !show {
            *last = None;
            return;
        }
        let line = match (current, total) {
            (Some(current), Some(total)) => format!("[{current}/{total}] {message}"),
            (Some(current), None) => format!("[{current}] {message}"),
            _ => message.to_string(),
        };
        if last.as_deref() != Some(line.as_str()) {
            eprintln!("{line}");
            *last = Some(line);
        }
    }
}

fn resolve_connection(store: &StoreFile, args: &Args) -> Result<ConnectionConfig> {
    let mut conn = match store.find_connection(&args.connection) {
        Some(conn) => conn.clone(),
        None => ConnectionConfig::from_target(&args.connection)
            .with_context(|| format!("unknown connection '{}'", args.connection))?,
    };
    if let Some(identity) = &args.identity {
        conn.auth = AuthConfig::PrivateKey {
            path: identity.clone(),
            passphrase_prompt: false,
        };
    }
    if args.password {
        conn.auth = AuthConfig::Password;
    }
    Ok(conn)
}

fn prompt_secret(conn: &ConnectionConfig) -> Result<Option<String>> {
    let secret = match &conn.auth {
        AuthConfig::Password => Some(
            prompt_password(format!("Password for {}@{}: ", conn.user, conn.host))
                .context("read password")?,
        ),
        AuthConfig::PrivateKey {
            passphrase_prompt: true,
            ..
        } => Some(prompt_password("Key passphrase: ").context("read passphrase")?),
        _ => None,
    };
    Ok(secret)
}

fn report(result: EngineResult) -> Result<()> {
    let result = result.map_err(|lost| anyhow!(lost))?;
    if result.is_success {
        if let Some(payload) = result.payload {
            println!("{payload}");
        }
        return Ok(());
    }
    let kind = result
        .failure
        .map(|kind| kind.to_string())
        .unwrap_or_else(|| "failed".to_string());
    bail!("{kind}: {}", result.error_message.unwrap_or_default())
}

pub fn run(args: Args) -> Result<()> {
    let config_path = storage::config_path()?;
    let mut store = storage::load_or_default(&config_path)?;
    let conn = resolve_connection(&store, &args)?;
    let secret = prompt_secret(&conn)?;

    let log_path = storage::log_path()?;
    let log_sink = Arc::new(FileLogSink::open(log_path).with_echo(args.verbose));

    let ssh = connect_ssh(&conn, secret.as_deref())
        .with_context(|| format!("connect to {}", conn.label()))?;
    let session: Arc<dyn RemoteSession> = Arc::new(Ssh2Session::new(ssh));

    if let Command::Ls { path } = &args.command {
        let nav = NavigationManager::new(
            session,
            Arc::new(ConsoleListing),
            log_sink,
            &store.engine,
        );
        let target = path
            .clone()
            .or_else(|| conn.last_remote_dir.clone())
            .unwrap_or_else(|| "~".to_string());
        return match nav.go_to_folder(&target).map_err(|lost| anyhow!(lost))? {
            NavigationOutcome::Loaded(shown) => {
                if store.remember_remote_dir(&args.connection, &shown) {
                    storage::save_store(&config_path, &store)?;
                }
                Ok(())
            }
            NavigationOutcome::Failed(message) => bail!(message),
            NavigationOutcome::Busy | NavigationOutcome::NoOp => Ok(()),
        };
    }

    let events = EngineEvents {
        progress: Arc::new(ConsoleProgress::default()),
        log: log_sink as Arc<dyn LogSink>,
        clipboard: Arc::new(NullSink),
    };
    let engine = Arc::new(FileOperationEngine::new(session, events, store.engine.clone()));
    let handle = spawn_operation(engine, move |engine| match args.command {
        Command::Ls { .. } => Ok(remote_fs_ops::OperationResult::success()),
        Command::Mkdir { name, dir } => engine.create_folder(&name, &dir),
        Command::Rename {
            path,
            new_name,
            folder,
        } => engine.rename(&path, &new_name, folder),
        Command::Rm { paths, recursive } => match paths.as_slice() {
            [single] => engine.delete(single, recursive),
            _ => engine.delete_many(&paths),
        },
        Command::Cp { sources, to } => {
            engine.update_multi_clipboard(sources, false);
            engine.paste(&to)
        }
        Command::Mv { sources, to } => {
            engine.update_multi_clipboard(sources, true);
            engine.paste(&to)
        }
        Command::Put { local, to } => engine.upload_files(&local, &to),
        Command::Get {
            remote,
            local,
            recursive,
        } => engine.download(&remote, &local, recursive),
    });
    report(handle.wait())
}
