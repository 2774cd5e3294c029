//! In-memory implementation of the Store trait.
//!
//! This is primarily for testing. It has the same semantics as SQLite
//! but keeps everything in memory with no persistence.

use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use labeller_core::{now_millis, Checkpoint, ContextId, PlacedLabel, UserId, UserType, VisitId};

use crate::error::{Result, StoreError};
use crate::traits::{CommitResult, Context, LabelRecord, Store, User, Visit};

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

#[derive(Default)]
struct MemoryStoreInner {
    /// Users in insertion order; `user_id` is index + 1.
    users: Vec<User>,

    /// Visits in insertion order; `visit_id` is index + 1.
    visits: Vec<Visit>,

    /// Contexts by id.
    contexts: BTreeMap<ContextId, String>,

    /// Labels by (user, sequence_index).
    labels: BTreeMap<(UserId, i64), LabelRecord>,
}

impl MemoryStoreInner {
    fn checkpoint(&self, user_id: UserId) -> Checkpoint {
        let last = self
            .labels
            .range((user_id, i64::MIN)..=(user_id, i64::MAX))
            .next_back()
            .map(|(_, label)| label.sequence_index);
        Checkpoint::from_last(last)
    }

    fn latest_visit(&self, user_id: UserId) -> Option<&Visit> {
        self.visits.iter().rev().find(|v| v.user_id == user_id)
    }
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryStoreInner::default()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryStoreInner>> {
        self.inner
            .read()
            .map_err(|e| StoreError::Task(format!("lock poisoned: {}", e)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryStoreInner>> {
        self.inner
            .write()
            .map_err(|e| StoreError::Task(format!("lock poisoned: {}", e)))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_user(&self, user_type: UserType) -> Result<UserId> {
        let mut inner = self.write()?;
        let user_id = UserId(inner.users.len() as i64 + 1);
        inner.users.push(User {
            user_id,
            user_type,
            created_at: now_millis(),
        });
        Ok(user_id)
    }

    async fn get_user(&self, user_id: UserId) -> Result<Option<User>> {
        let inner = self.read()?;
        Ok(inner.users.iter().find(|u| u.user_id == user_id).cloned())
    }

    async fn insert_visit(&self, user_id: UserId, client_address: Option<&str>) -> Result<VisitId> {
        let mut inner = self.write()?;
        if !inner.users.iter().any(|u| u.user_id == user_id) {
            return Err(StoreError::NotFound(format!("user {}", user_id)));
        }

        let visit_id = VisitId(inner.visits.len() as i64 + 1);
        inner.visits.push(Visit {
            visit_id,
            user_id,
            client_address: client_address.map(str::to_owned),
            timestamp: now_millis(),
        });
        Ok(visit_id)
    }

    async fn latest_visit(&self, user_id: UserId) -> Result<Option<Visit>> {
        let inner = self.read()?;
        Ok(inner.latest_visit(user_id).cloned())
    }

    async fn last_label(&self, user_id: UserId) -> Result<Option<LabelRecord>> {
        let inner = self.read()?;
        Ok(inner
            .labels
            .range((user_id, i64::MIN)..=(user_id, i64::MAX))
            .next_back()
            .map(|(_, label)| label.clone()))
    }

    async fn commit_labels(
        &self,
        user_id: UserId,
        expected: Checkpoint,
        labels: &[PlacedLabel],
    ) -> Result<CommitResult> {
        for (i, label) in labels.iter().enumerate() {
            if label.sequence_index != expected.next_index() + i as i64 {
                return Err(StoreError::InvalidData(format!(
                    "label {} placed at {} after checkpoint {}",
                    i, label.sequence_index, expected
                )));
            }
        }

        let mut inner = self.write()?;

        let current = inner.checkpoint(user_id);
        if current != expected {
            return Ok(CommitResult::Stale { current });
        }

        let visit_id = inner
            .latest_visit(user_id)
            .map(|v| v.visit_id)
            .ok_or_else(|| StoreError::NotFound(format!("no visit for user {}", user_id)))?;

        let now = now_millis();
        for label in labels {
            inner.labels.insert(
                (user_id, label.sequence_index),
                LabelRecord {
                    sequence_index: label.sequence_index,
                    user_id,
                    visit_id,
                    intent_label: label.intent_label,
                    abuse_label: label.abuse_label,
                    created_at: now,
                },
            );
        }

        Ok(CommitResult::Committed {
            checkpoint: expected.advance(labels.len()),
            visit_id,
        })
    }

    async fn labels_for_user(&self, user_id: UserId) -> Result<Vec<LabelRecord>> {
        let inner = self.read()?;
        Ok(inner
            .labels
            .range((user_id, i64::MIN)..=(user_id, i64::MAX))
            .map(|(_, label)| label.clone())
            .collect())
    }

    async fn insert_contexts(&self, contexts: &[Context]) -> Result<usize> {
        let mut inner = self.write()?;
        if let Some(dup) = contexts
            .iter()
            .find(|c| inner.contexts.contains_key(&c.context_id))
        {
            return Err(StoreError::InvalidData(format!(
                "context {:?} already exists",
                dup.context_id
            )));
        }

        for context in contexts {
            inner
                .contexts
                .insert(context.context_id, context.content.clone());
        }
        Ok(contexts.len())
    }

    async fn count_contexts(&self) -> Result<u64> {
        let inner = self.read()?;
        Ok(inner.contexts.len() as u64)
    }

    async fn contexts_after(&self, after: Checkpoint, limit: usize) -> Result<Vec<Context>> {
        let inner = self.read()?;
        Ok(inner
            .contexts
            .range(ContextId(after.index().saturating_add(1))..)
            .take(limit)
            .map(|(id, content)| Context {
                context_id: *id,
                content: content.clone(),
            })
            .collect())
    }
}
