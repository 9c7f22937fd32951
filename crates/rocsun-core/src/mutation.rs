//! Single in-flight create/update/delete with local list reconciliation.
//!
//! At most one operation is pending per controller. A second `save` or
//! `delete` while one is outstanding is refused with [`ConsoleError::Busy`]
//! before anything is sent.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::api::{ApiError, UserGateway};
use crate::clock::Clock;
use crate::error::ConsoleError;
use crate::models::{UserDraft, UserForm};
use crate::notify::Notifier;
use crate::query::QueryController;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Create,
    Update,
    Delete,
}

impl OperationKind {
    fn verb(&self) -> &'static str {
        match self {
            OperationKind::Create => "create",
            OperationKind::Update => "update",
            OperationKind::Delete => "delete",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingOperation {
    pub kind: OperationKind,
    pub target_id: Option<i64>,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug)]
struct MutationResult {
    seq: u64,
    kind: OperationKind,
    target_id: Option<i64>,
    draft: Option<UserDraft>,
    result: Result<(), ApiError>,
}

#[derive(Debug)]
pub enum MutationOutcome {
    /// New user accepted; a list refresh has been dispatched.
    Created,
    /// Record patched in place on the current page.
    Updated(i64),
    /// Record removed from the current page and the total.
    Deleted(i64),
    /// The backend refused or could not be reached; local state is untouched.
    Failed(ConsoleError),
}

pub struct MutationController {
    gateway: Arc<dyn UserGateway>,
    notifier: Notifier,
    clock: Arc<dyn Clock>,
    pending: Option<PendingOperation>,
    seq: u64,
    results_tx: mpsc::UnboundedSender<MutationResult>,
    results_rx: mpsc::UnboundedReceiver<MutationResult>,
}

impl MutationController {
    pub fn new(gateway: Arc<dyn UserGateway>, notifier: Notifier, clock: Arc<dyn Clock>) -> Self {
        let (results_tx, results_rx) = mpsc::unbounded_channel();
        Self {
            gateway,
            notifier,
            clock,
            pending: None,
            seq: 0,
            results_tx,
            results_rx,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.pending.is_some()
    }

    pub fn pending(&self) -> Option<&PendingOperation> {
        self.pending.as_ref()
    }

    /// Create (no id) or update (with id) a user.
    pub fn save(&mut self, draft: UserDraft) -> Result<(), ConsoleError> {
        self.ensure_idle()?;

        let kind = if draft.is_create() {
            OperationKind::Create
        } else {
            OperationKind::Update
        };
        let target_id = draft.id;
        let gateway = Arc::clone(&self.gateway);
        let seq = self.begin(kind, target_id);
        let tx = self.results_tx.clone();

        tokio::spawn(async move {
            let result = match kind {
                OperationKind::Create => gateway.create_user(&draft).await,
                _ => gateway.update_user(&draft).await,
            };
            let done = MutationResult {
                seq,
                kind,
                target_id,
                draft: Some(draft),
                result,
            };
            if tx.send(done).is_err() {
                debug!(seq, "Save finished after controller was dropped");
            }
        });
        Ok(())
    }

    /// Validate an edit form and save it.
    pub fn save_form(&mut self, form: UserForm) -> Result<(), ConsoleError> {
        self.ensure_idle()?;
        let draft = form.into_draft()?;
        self.save(draft)
    }

    /// Logically delete a user shown on the current page.
    ///
    /// Nothing happens unless `confirmed` is true. An id that is not on the
    /// current page, including one already deleted, is reported as not found
    /// without contacting the backend. Returns whether a delete was sent.
    pub fn delete(
        &mut self,
        id: i64,
        confirmed: bool,
        query: &QueryController,
    ) -> Result<bool, ConsoleError> {
        self.ensure_idle()?;
        if !confirmed {
            debug!(id, "Delete not confirmed");
            return Ok(false);
        }
        if query.find(id).is_none() {
            return Err(ConsoleError::NotFound(id));
        }

        let gateway = Arc::clone(&self.gateway);
        let seq = self.begin(OperationKind::Delete, Some(id));
        let tx = self.results_tx.clone();

        tokio::spawn(async move {
            let result = gateway.logic_delete(id).await;
            let done = MutationResult {
                seq,
                kind: OperationKind::Delete,
                target_id: Some(id),
                draft: None,
                result,
            };
            if tx.send(done).is_err() {
                debug!(seq, "Delete finished after controller was dropped");
            }
        });
        Ok(true)
    }

    fn ensure_idle(&self) -> Result<(), ConsoleError> {
        if let Some(pending) = &self.pending {
            debug!(kind = ?pending.kind, "Rejecting operation while another is pending");
            return Err(ConsoleError::Busy);
        }
        Ok(())
    }

    fn begin(&mut self, kind: OperationKind, target_id: Option<i64>) -> u64 {
        self.seq += 1;
        self.pending = Some(PendingOperation {
            kind,
            target_id,
            submitted_at: self.clock.now(),
        });
        debug!(seq = self.seq, ?kind, ?target_id, "Mutation submitted");
        self.seq
    }

    fn apply(
        &mut self,
        done: MutationResult,
        query: &mut QueryController,
    ) -> Option<MutationOutcome> {
        if done.seq != self.seq || self.pending.is_none() {
            debug!(seq = done.seq, "Ignoring result for an operation no longer pending");
            return None;
        }
        self.pending = None;

        if let Err(e) = done.result {
            warn!(error = %e, kind = ?done.kind, target_id = ?done.target_id, "Mutation failed");
            self.notifier.error(format!(
                "Failed to {} user: {}",
                done.kind.verb(),
                e.user_message()
            ));
            return Some(MutationOutcome::Failed(e.into()));
        }

        let outcome = match (done.kind, done.target_id) {
            (OperationKind::Create, _) => {
                info!("User created");
                self.notifier.success("User created");
                // The new row's page and position are decided by the server.
                query.refresh();
                MutationOutcome::Created
            }
            (OperationKind::Update, Some(id)) => {
                if let Some(draft) = &done.draft {
                    query.patch_record(draft);
                }
                info!(id, "User updated");
                self.notifier.success("User updated");
                MutationOutcome::Updated(id)
            }
            (OperationKind::Delete, Some(id)) => {
                query.remove_record(id);
                info!(id, "User deleted");
                self.notifier.success("User deleted");
                MutationOutcome::Deleted(id)
            }
            (kind, None) => {
                warn!(?kind, "Completed operation has no target id");
                let err = ApiError::InvalidResponse("missing target id".to_string());
                MutationOutcome::Failed(err.into())
            }
        };
        Some(outcome)
    }

    /// Apply any completed operation without waiting.
    pub fn poll_results(&mut self, query: &mut QueryController) -> Vec<MutationOutcome> {
        let mut done = Vec::new();
        while let Ok(result) = self.results_rx.try_recv() {
            done.push(result);
        }
        done.into_iter()
            .filter_map(|r| self.apply(r, query))
            .collect()
    }

    /// Wait for the pending operation to finish and apply it.
    pub async fn next_result(&mut self, query: &mut QueryController) -> Option<MutationOutcome> {
        while self.pending.is_some() {
            let done = self.results_rx.recv().await?;
            if let Some(outcome) = self.apply(done, query) {
                return Some(outcome);
            }
        }
        None
    }
}
