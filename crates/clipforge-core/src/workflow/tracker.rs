//! In-process registry of running and recently finished workflows.
//!
//! The engine publishes a snapshot after every stage; readers get clones and
//! never observe a half-written stage.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::models::{WorkflowResult, WorkflowSummary};

const OPEN: u8 = 0;
const CANCELLED: u8 = 1;
const SEALED: u8 = 2;

/// Cooperative cancellation signal shared between a caller and an engine run.
///
/// The engine seals the flag right before dispatching its final wave. From
/// then on there is nothing left to skip and `cancel` reports `false`.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicU8>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Returns whether the request will take effect.
    pub fn cancel(&self) -> bool {
        match self
            .0
            .compare_exchange(OPEN, CANCELLED, Ordering::SeqCst, Ordering::SeqCst)
        {
            Ok(_) => true,
            Err(state) => state == CANCELLED,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst) == CANCELLED
    }

    /// Close the flag to further cancellation. Returns false when a cancel
    /// got in first.
    pub fn seal(&self) -> bool {
        match self
            .0
            .compare_exchange(OPEN, SEALED, Ordering::SeqCst, Ordering::SeqCst)
        {
            Ok(_) => true,
            Err(state) => state != CANCELLED,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TrackedWorkflow {
    pub snapshot: WorkflowResult,
    pub cancel: CancelFlag,
}

#[derive(Default)]
pub struct WorkflowTracker {
    workflows: RwLock<HashMap<String, TrackedWorkflow>>,
}

impl WorkflowTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, snapshot: WorkflowResult, cancel: CancelFlag) {
        self.workflows.write().await.insert(
            snapshot.workflow_id.clone(),
            TrackedWorkflow { snapshot, cancel },
        );
    }

    /// Replace the stored snapshot. Unknown ids are registered on the fly.
    pub async fn publish(&self, snapshot: WorkflowResult) {
        let mut workflows = self.workflows.write().await;
        match workflows.get_mut(&snapshot.workflow_id) {
            Some(tracked) => tracked.snapshot = snapshot,
            None => {
                workflows.insert(
                    snapshot.workflow_id.clone(),
                    TrackedWorkflow {
                        snapshot,
                        cancel: CancelFlag::new(),
                    },
                );
            }
        }
    }

    /// Forget a workflow, typically once its final snapshot is persisted.
    pub async fn remove(&self, workflow_id: &str) -> Option<WorkflowResult> {
        self.workflows
            .write()
            .await
            .remove(workflow_id)
            .map(|t| t.snapshot)
    }

    pub async fn get(&self, workflow_id: &str) -> Option<WorkflowResult> {
        self.workflows
            .read()
            .await
            .get(workflow_id)
            .map(|t| t.snapshot.clone())
    }

    /// Signal a running workflow to stop. Returns false for unknown or
    /// finished workflows, and for runs already dispatching their last wave.
    pub async fn cancel(&self, workflow_id: &str) -> bool {
        let workflows = self.workflows.read().await;
        match workflows.get(workflow_id) {
            Some(tracked) if !tracked.snapshot.status.is_terminal() => {
                let accepted = tracked.cancel.cancel();
                tracing::info!(
                    "[WorkflowTracker] Cancellation of {} {}",
                    workflow_id,
                    if accepted { "requested" } else { "too late, final wave running" }
                );
                accepted
            }
            _ => false,
        }
    }

    /// Newest first.
    pub async fn list(&self) -> Vec<WorkflowSummary> {
        let mut rows: Vec<_> = self
            .workflows
            .read()
            .await
            .values()
            .map(|t| t.snapshot.summary())
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        rows
    }
}
