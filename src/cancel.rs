use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Cooperative cancellation flag shared between an operation and whoever may stop it.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Holds the token of the one mutating operation allowed at a time.
#[derive(Debug, Default)]
pub(crate) struct OperationSlot {
    current: Mutex<Option<CancelToken>>,
}

impl OperationSlot {
    /// `None` while another operation still holds the slot.
    pub(crate) fn acquire(&self) -> Option<SlotGuard<'_>> {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        if current.is_some() {
            return None;
        }
        let token = CancelToken::new();
        *current = Some(token.clone());
        Some(SlotGuard { slot: self, token })
    }

    pub(crate) fn cancel_current(&self) -> bool {
        let current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        match current.as_ref() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub(crate) fn is_busy(&self) -> bool {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

pub(crate) struct SlotGuard<'a> {
    slot: &'a OperationSlot,
    token: CancelToken,
}

impl SlotGuard<'_> {
    pub(crate) fn token(&self) -> &CancelToken {
        &self.token
    }
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        let mut current = self
            .slot
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *current = None;
    }
}
