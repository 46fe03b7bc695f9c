//! Runs one engine call on a background thread so the caller never blocks on
//! the network.

use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvError, TryRecvError};
use std::thread;

use crate::engine::{EngineResult, FileOperationEngine};
use crate::model::{FailureKind, OperationResult};

pub struct OperationHandle {
    rx: Receiver<EngineResult>,
    engine: Arc<FileOperationEngine>,
}

impl OperationHandle {
    /// Asks the running operation to stop; it still delivers a (cancelled) result.
    pub fn cancel(&self) -> bool {
        self.engine.request_cancel_current_operation()
    }

    /// `None` while the operation is still running.
    pub fn try_result(&self) -> Option<EngineResult> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Ok(worker_vanished())),
        }
    }

    pub fn wait(self) -> EngineResult {
        match self.rx.recv() {
            Ok(result) => result,
            Err(RecvError) => Ok(worker_vanished()),
        }
    }
}

fn worker_vanished() -> OperationResult {
    OperationResult::failure(
        FailureKind::Unexpected,
        "operation worker exited without a result",
    )
}

pub fn spawn_operation<F>(engine: Arc<FileOperationEngine>, op: F) -> OperationHandle
where
    F: FnOnce(&FileOperationEngine) -> EngineResult + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    let worker_engine = Arc::clone(&engine);
    thread::spawn(move || {
        let result = op(&worker_engine);
        let _ = tx.send(result);
    });
    OperationHandle { rx, engine }
}
