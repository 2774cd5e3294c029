//! Visit recording: the append-only access log.

use std::sync::Arc;

use labeller_core::{UserId, VisitId};
use labeller_store::Store;
use tokio::task::JoinHandle;

use crate::error::Result;

/// Appends visit rows for authenticated requests.
pub struct VisitRecorder<S: Store + ?Sized> {
    store: Arc<S>,
}

impl<S: Store + ?Sized> Clone for VisitRecorder<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: Store + ?Sized + 'static> VisitRecorder<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Record a visit and wait for the row to be written.
    pub async fn record(&self, user_id: UserId, client_address: Option<&str>) -> Result<VisitId> {
        let visit_id = self.store.insert_visit(user_id, client_address).await?;
        tracing::debug!(%user_id, ?visit_id, client_address, "recorded visit");
        Ok(visit_id)
    }

    /// Record a visit in the background.
    ///
    /// The caller's response does not wait on the insert and never sees its
    /// failure; failures are only logged.
    pub fn record_detached(&self, user_id: UserId, client_address: Option<String>) -> JoinHandle<()> {
        let store = Arc::clone(&self.store);

        tokio::spawn(async move {
            match store.insert_visit(user_id, client_address.as_deref()).await {
                Ok(visit_id) => {
                    tracing::debug!(%user_id, ?visit_id, "recorded visit");
                }
                Err(e) => {
                    tracing::warn!(%user_id, error = %e, "failed to record visit");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use labeller_core::Polarity;
    use labeller_store::MemoryStore;

    #[tokio::test]
    async fn test_detached_visit_lands() {
        let store = Arc::new(MemoryStore::new());
        let user = store.insert_user(Polarity::Positive).await.unwrap();
        let recorder = VisitRecorder::new(store.clone());

        recorder
            .record_detached(user, Some("192.0.2.7".into()))
            .await
            .unwrap();

        let visit = store.latest_visit(user).await.unwrap().unwrap();
        assert_eq!(visit.client_address.as_deref(), Some("192.0.2.7"));
    }

    #[tokio::test]
    async fn test_detached_failure_is_swallowed() {
        let store = Arc::new(MemoryStore::new());
        let recorder = VisitRecorder::new(store.clone());

        // Unknown user: the insert fails but the task completes normally.
        recorder.record_detached(UserId(99), None).await.unwrap();
        assert!(store.latest_visit(UserId(99)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_record_appends_every_call() {
        let store = Arc::new(MemoryStore::new());
        let user = store.insert_user(Polarity::Negative).await.unwrap();
        let recorder = VisitRecorder::new(store.clone());

        let a = recorder.record(user, None).await.unwrap();
        let b = recorder.record(user, None).await.unwrap();
        assert_ne!(a, b);
    }
}
