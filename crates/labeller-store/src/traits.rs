//! Store trait: the abstract interface for Labeller persistence.
//!
//! This trait allows the services to be storage-agnostic. Implementations
//! include SQLite (primary) and in-memory (for tests).

use async_trait::async_trait;
use labeller_core::{Checkpoint, ContextId, PlacedLabel, Polarity, UserId, UserType, VisitId};

use crate::error::Result;

/// A stored user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub user_id: UserId,
    pub user_type: UserType,
    pub created_at: i64,
}

/// A stored visit (access-log row).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Visit {
    pub visit_id: VisitId,
    pub user_id: UserId,
    pub client_address: Option<String>,
    /// Unix ms.
    pub timestamp: i64,
}

/// A context to be labelled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Context {
    pub context_id: ContextId,
    pub content: String,
}

/// A committed label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelRecord {
    pub sequence_index: i64,
    pub user_id: UserId,
    pub visit_id: VisitId,
    pub intent_label: Polarity,
    pub abuse_label: Polarity,
    pub created_at: i64,
}

/// Result of committing a label batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitResult {
    /// Every label was written. `checkpoint` is the new checkpoint.
    Committed {
        checkpoint: Checkpoint,
        visit_id: VisitId,
    },
    /// The checkpoint moved since the batch was planned. Nothing was written.
    Stale { current: Checkpoint },
}

/// The Store trait: async interface for Labeller persistence.
///
/// All methods are async to support both sync (SQLite) and async backends.
/// For SQLite, we use `spawn_blocking` internally to avoid blocking the runtime.
#[async_trait]
pub trait Store: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Users
    // ─────────────────────────────────────────────────────────────────────────

    /// Insert a user and return its generated key.
    async fn insert_user(&self, user_type: UserType) -> Result<UserId>;

    /// Get a user by key.
    async fn get_user(&self, user_id: UserId) -> Result<Option<User>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Visits
    // ─────────────────────────────────────────────────────────────────────────

    /// Append a visit row and return its generated key.
    async fn insert_visit(&self, user_id: UserId, client_address: Option<&str>) -> Result<VisitId>;

    /// The most recent visit of a user, if any.
    async fn latest_visit(&self, user_id: UserId) -> Result<Option<Visit>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Labels
    // ─────────────────────────────────────────────────────────────────────────

    /// The label with the greatest sequence index for a user.
    async fn last_label(&self, user_id: UserId) -> Result<Option<LabelRecord>>;

    /// Commit a planned batch atomically.
    ///
    /// Re-reads the checkpoint under the write lock. If it differs from
    /// `expected`, returns `Stale` and writes nothing. Otherwise writes every
    /// label attributed to the user's latest visit. A user with no visit is
    /// a `NotFound` error.
    async fn commit_labels(
        &self,
        user_id: UserId,
        expected: Checkpoint,
        labels: &[PlacedLabel],
    ) -> Result<CommitResult>;

    /// All labels of a user, ordered by sequence index.
    async fn labels_for_user(&self, user_id: UserId) -> Result<Vec<LabelRecord>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Contexts
    // ─────────────────────────────────────────────────────────────────────────

    /// Insert contexts with explicit ids. Returns the number inserted.
    async fn insert_contexts(&self, contexts: &[Context]) -> Result<usize>;

    /// Number of contexts.
    async fn count_contexts(&self) -> Result<u64>;

    /// Contexts with `context_id > after`, ascending, at most `limit`.
    async fn contexts_after(&self, after: Checkpoint, limit: usize) -> Result<Vec<Context>>;
}

/// Extension trait for common store patterns.
pub trait StoreExt: Store {
    /// The user's checkpoint, derived from the last committed label.
    fn checkpoint(
        &self,
        user_id: UserId,
    ) -> impl std::future::Future<Output = Result<Checkpoint>> + Send;

    /// Seed contexts with ids `0..n` if the table is empty.
    ///
    /// Returns the number of contexts inserted (0 when already seeded).
    fn seed_contexts_if_empty(
        &self,
        contents: &[String],
    ) -> impl std::future::Future<Output = Result<usize>> + Send;
}

impl<S: Store + ?Sized> StoreExt for S {
    async fn checkpoint(&self, user_id: UserId) -> Result<Checkpoint> {
        let last = self.last_label(user_id).await?;
        Ok(Checkpoint::from_last(last.map(|l| l.sequence_index)))
    }

    async fn seed_contexts_if_empty(&self, contents: &[String]) -> Result<usize> {
        if self.count_contexts().await? > 0 {
            return Ok(0);
        }

        let contexts: Vec<Context> = contents
            .iter()
            .enumerate()
            .map(|(i, content)| Context {
                context_id: ContextId(i as i64),
                content: content.clone(),
            })
            .collect();

        self.insert_contexts(&contexts).await
    }
}
