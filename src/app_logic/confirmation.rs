/*
 * Confirmation protocol for destructive or risky operations. The logic layer
 * never blocks on a dialog: it files a `ConfirmationRequest` describing the
 * pending action, and whatever UI is present later resolves it by id.
 */
use crate::core::Serial;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConfirmationId(pub u64);

impl std::fmt::Display for ConfirmationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/* The operation that runs once a request is confirmed. */
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingAction {
    CloseTab { path: String },
    DeleteFile { path: String },
    Save { author: String, message: Option<String> },
    Restore { serial: Serial },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmationRequest {
    pub id: ConfirmationId,
    pub title: String,
    pub body: String,
    pub action: PendingAction,
}

/* Outstanding requests in the order they were filed. */
#[derive(Debug, Default)]
pub struct ConfirmationQueue {
    next_id: u64,
    pending: Vec<ConfirmationRequest>,
}

impl ConfirmationQueue {
    pub fn new() -> Self {
        ConfirmationQueue {
            next_id: 1,
            pending: Vec::new(),
        }
    }

    pub fn request(
        &mut self,
        title: impl Into<String>,
        body: impl Into<String>,
        action: PendingAction,
    ) -> ConfirmationRequest {
        let request = ConfirmationRequest {
            id: ConfirmationId(self.next_id.max(1)),
            title: title.into(),
            body: body.into(),
            action,
        };
        self.next_id = request.id.0 + 1;
        log::debug!(
            "ConfirmationQueue: Filed {} '{}' for {:?}",
            request.id,
            request.title,
            request.action
        );
        self.pending.push(request.clone());
        request
    }

    /* Removes and returns the request; `None` if it was already resolved. */
    pub fn take(&mut self, id: ConfirmationId) -> Option<ConfirmationRequest> {
        let idx = self.pending.iter().position(|r| r.id == id)?;
        Some(self.pending.remove(idx))
    }

    pub fn pending(&self) -> &[ConfirmationRequest] {
        &self.pending
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /* Drops every outstanding request, e.g. when another stencil is loaded. */
    pub fn clear(&mut self) {
        if !self.pending.is_empty() {
            log::debug!(
                "ConfirmationQueue: Discarding {} unresolved request(s)",
                self.pending.len()
            );
        }
        self.pending.clear();
    }
}
