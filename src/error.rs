use thiserror::Error;

use crate::model::FailureKind;
use crate::session::SessionError;

/// The only failure that leaves the engine as an `Err`: the caller owns reconnection.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("connection lost: {0}")]
pub struct ConnectionLost(pub String);

#[derive(Error, Debug)]
pub(crate) enum OpError {
    #[error("cancelled")]
    Cancelled,
    #[error("{0}")]
    Safety(String),
    #[error("`{command}` exited with status {status}: {stderr}")]
    RemoteCommand {
        command: String,
        status: i32,
        stderr: String,
    },
    #[error("transfer failed: {0}")]
    Transfer(String),
    #[error("another operation is in progress")]
    InProgress,
    #[error("{0}")]
    Unexpected(String),
    #[error(transparent)]
    ConnectionLost(#[from] ConnectionLost),
}

impl OpError {
    pub(crate) fn kind(&self) -> FailureKind {
        match self {
            Self::Cancelled => FailureKind::Cancelled,
            Self::Safety(_) => FailureKind::SafetyViolation,
            Self::RemoteCommand { .. } => FailureKind::RemoteCommandFailure,
            Self::Transfer(_) => FailureKind::TransferFailure,
            Self::InProgress => FailureKind::OperationInProgress,
            Self::Unexpected(_) | Self::ConnectionLost(_) => FailureKind::Unexpected,
        }
    }
}

impl From<SessionError> for OpError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Cancelled => Self::Cancelled,
            SessionError::Connection(message) => Self::ConnectionLost(ConnectionLost(message)),
            SessionError::NotFound(_) | SessionError::PermissionDenied(_) | SessionError::Io(_) => {
                Self::Transfer(err.to_string())
            }
            SessionError::Other(message) => Self::Unexpected(message),
        }
    }
}

impl From<std::io::Error> for OpError {
    fn from(err: std::io::Error) -> Self {
        Self::Transfer(err.to_string())
    }
}
