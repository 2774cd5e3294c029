//! The labelling checkpoint protocol.
//!
//! Each call runs one commit-then-fetch cycle for a user:
//!
//! 1. Read the checkpoint (last committed sequence index, or -1).
//! 2. Parse and place any pending labels, then commit them in one store
//!    transaction guarded by the checkpoint read in step 1.
//! 3. Fetch the next page of contexts after the new checkpoint.
//! 4. Return the page, or `Complete` when nothing is left.
//!
//! The only resumption state is the labels table. A client that reconnects
//! or reloads simply calls again and receives the page after whatever was
//! durably committed.

use std::sync::Arc;

use labeller_core::{parse_batch, place_batch, Checkpoint, UserId};
use labeller_store::{CommitResult, Store, StoreExt};
use serde::Serialize;

use crate::config::ProtocolConfig;
use crate::error::{Result, ServiceError};

/// What a client receives from one cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextBatch {
    /// Context payloads in ascending id order.
    Contexts(Vec<String>),
    /// Every context has been labelled.
    Complete,
}

impl NextBatch {
    pub fn is_complete(&self) -> bool {
        matches!(self, NextBatch::Complete)
    }
}

/// Wire form of [`NextBatch`]: `{"contexts":[...]}` or `{"complete":true}`.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum BatchResponse {
    Contexts { contexts: Vec<String> },
    Complete { complete: bool },
}

impl From<NextBatch> for BatchResponse {
    fn from(batch: NextBatch) -> Self {
        match batch {
            NextBatch::Contexts(contexts) => BatchResponse::Contexts { contexts },
            NextBatch::Complete => BatchResponse::Complete { complete: true },
        }
    }
}

/// Runs the commit-then-fetch cycle against a store.
pub struct CheckpointProtocol<S: Store + ?Sized> {
    store: Arc<S>,
    config: ProtocolConfig,
}

impl<S: Store + ?Sized> CheckpointProtocol<S> {
    pub fn new(store: Arc<S>, config: ProtocolConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    /// Commit `pending` labels (if any) and return the next batch.
    ///
    /// `pending` holds the raw JSON documents as the client sent them. If any
    /// of them fails to parse nothing is written.
    pub async fn get_next_batch(&self, user_id: UserId, pending: &[String]) -> Result<NextBatch> {
        let checkpoint = self.store.checkpoint(user_id).await?;

        let checkpoint = if pending.is_empty() {
            checkpoint
        } else {
            self.commit(user_id, checkpoint, pending).await?
        };

        let page = self
            .store
            .contexts_after(checkpoint, self.config.page_size.get())
            .await?;

        if page.is_empty() {
            tracing::debug!(%user_id, %checkpoint, "all contexts labelled");
            return Ok(NextBatch::Complete);
        }

        tracing::debug!(%user_id, %checkpoint, served = page.len(), "serving contexts");
        Ok(NextBatch::Contexts(
            page.into_iter().map(|context| context.content).collect(),
        ))
    }

    /// Place and commit a batch; returns the checkpoint after it.
    async fn commit(&self, user_id: UserId, checkpoint: Checkpoint, raw: &[String]) -> Result<Checkpoint> {
        let labels = parse_batch(raw)?;
        let plan = place_batch(checkpoint, &labels)?;

        if plan.replayed > 0 {
            tracing::info!(%user_id, replayed = plan.replayed, "skipping already committed labels");
        }
        if !plan.is_write() {
            return Ok(checkpoint);
        }

        match self
            .store
            .commit_labels(user_id, plan.expected, &plan.labels)
            .await?
        {
            CommitResult::Committed {
                checkpoint,
                visit_id,
            } => {
                tracing::info!(
                    %user_id,
                    ?visit_id,
                    committed = plan.labels.len(),
                    %checkpoint,
                    "committed label batch"
                );
                Ok(checkpoint)
            }
            CommitResult::Stale { current } => Err(ServiceError::StaleCheckpoint {
                expected: plan.expected,
                current,
            }),
        }
    }
}
