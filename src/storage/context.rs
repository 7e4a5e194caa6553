use tokio::sync::watch;

use crate::error::{Result, StorageError};

/// Per-request state passed to every storage operation.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub user: Option<String>,
    cancelled: watch::Receiver<bool>,
}

/// Owner side of a [`RequestContext`]; cancels every context it produced.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx }
    }

    pub fn context(&self) -> RequestContext {
        RequestContext {
            user: None,
            cancelled: self.tx.subscribe(),
        }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

impl Default for CancelHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestContext {
    /// A context that is never cancelled.
    pub fn background() -> Self {
        // Dropping the sender freezes the value at `false`.
        let (_, rx) = watch::channel(false);
        Self {
            user: None,
            cancelled: rx,
        }
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancelled.borrow()
    }

    /// Fails with [`StorageError::Cancelled`] once the owner has cancelled.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(StorageError::Cancelled);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn background_is_never_cancelled() {
        let ctx = RequestContext::background().with_user("admin");
        assert!(!ctx.is_cancelled());
        assert!(ctx.check().is_ok());
        assert_eq!(ctx.user.as_deref(), Some("admin"));
    }

    #[test]
    fn cancel_reaches_existing_contexts() {
        let handle = CancelHandle::new();
        let ctx = handle.context();
        let copy = ctx.clone();
        assert!(!ctx.is_cancelled());

        handle.cancel();
        assert!(ctx.is_cancelled());
        assert!(matches!(copy.check(), Err(StorageError::Cancelled)));
    }
}
