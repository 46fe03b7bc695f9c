//! Browse and mutate files on an SSH host. Mutations try one server-side
//! command first and fall back to streaming over SFTP.

pub mod cancel;
pub mod clipboard;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod logging;
pub mod model;
pub mod navigation;
pub mod path;
pub mod session;
pub mod storage;

pub use cancel::CancelToken;
pub use clipboard::ClipboardState;
pub use config::EngineConfig;
pub use engine::worker::{OperationHandle, spawn_operation};
pub use engine::{EngineResult, FileOperationEngine, TransferBatch};
pub use error::ConnectionLost;
pub use events::{ClipboardChangedSink, EngineEvents, ListingSink, LogSink, NullSink, ProgressSink};
pub use model::{FailureKind, OperationResult, RemoteEntry};
pub use navigation::{NavigationManager, NavigationOutcome};
pub use session::{RemoteSession, SessionError};
