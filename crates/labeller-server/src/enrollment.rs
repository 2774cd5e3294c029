//! Enrollment: create a user, record the first visit, hand back a credential.

use std::sync::Arc;

use labeller_core::{now_millis, Credential, CredentialIssuer, UserId, UserType};
use labeller_store::Store;

use crate::error::Result;
use crate::visits::VisitRecorder;

/// Outcome of a successful enrollment.
#[derive(Debug, Clone)]
pub struct Enrollment {
    pub user_id: UserId,
    pub credential: Credential,
}

/// Creates user identities.
pub struct EnrollmentService<S: Store + ?Sized> {
    store: Arc<S>,
    issuer: Arc<CredentialIssuer>,
    visits: VisitRecorder<S>,
}

impl<S: Store + ?Sized + 'static> EnrollmentService<S> {
    pub fn new(store: Arc<S>, issuer: Arc<CredentialIssuer>) -> Self {
        let visits = VisitRecorder::new(Arc::clone(&store));
        Self {
            store,
            issuer,
            visits,
        }
    }

    /// Enroll a new user.
    ///
    /// Any store failure aborts the flow. If the visit insert fails the user
    /// row stays behind without a visit, which is acceptable because visits
    /// are audit-only; the caller never receives that user's credential.
    pub async fn enroll(&self, user_type: UserType, client_address: Option<&str>) -> Result<Enrollment> {
        let user_id = self.store.insert_user(user_type).await?;
        let credential = self.issuer.issue(user_id, now_millis())?;
        self.visits.record(user_id, client_address).await?;

        tracing::info!(%user_id, %user_type, "enrolled user");
        Ok(Enrollment {
            user_id,
            credential,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use labeller_core::{Keypair, Polarity};
    use labeller_store::MemoryStore;

    #[tokio::test]
    async fn test_enroll_creates_user_and_visit() {
        let store = Arc::new(MemoryStore::new());
        let issuer = Arc::new(CredentialIssuer::new(Keypair::generate()));
        let service = EnrollmentService::new(store.clone(), issuer.clone());

        let enrollment = service
            .enroll(Polarity::Positive, Some("198.51.100.4"))
            .await
            .unwrap();

        let claims = issuer.verify(enrollment.credential.as_str()).unwrap();
        assert_eq!(claims.user_id, enrollment.user_id);

        let user = store.get_user(enrollment.user_id).await.unwrap().unwrap();
        assert_eq!(user.user_type, Polarity::Positive);

        let visit = store.latest_visit(enrollment.user_id).await.unwrap().unwrap();
        assert_eq!(visit.client_address.as_deref(), Some("198.51.100.4"));
    }

    #[tokio::test]
    async fn test_concurrent_enrollments_get_distinct_ids() {
        let store = Arc::new(MemoryStore::new());
        let issuer = Arc::new(CredentialIssuer::new(Keypair::generate()));
        let service = Arc::new(EnrollmentService::new(store, issuer));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let service = Arc::clone(&service);
                tokio::spawn(async move { service.enroll(Polarity::Negative, None).await })
            })
            .collect();

        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap().unwrap().user_id);
        }
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 8);
    }
}
