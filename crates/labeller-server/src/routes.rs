//! HTTP surface.
//!
//! | Method | Path | Auth | Body / query | Response |
//! |---|---|---|---|---|
//! | POST | `/signup` | none | `{"user_type": ...}` | `{"auth_token": ...}` |
//! | POST | `/login` | credential | none | `200 OK` |
//! | GET | `/get_content` | credential | `labels` (repeatable) | `{"contexts":[...]}` or `{"complete":true}` |
//! | GET | `/health` | none | none | `ok` |

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::{RawQuery, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use labeller_core::{CredentialIssuer, UserType};
use labeller_store::Store;
use serde::{Deserialize, Serialize};

use crate::auth::{AuthenticatedUser, ClientAddress};
use crate::checkpoint::{BatchResponse, CheckpointProtocol};
use crate::config::ProtocolConfig;
use crate::enrollment::EnrollmentService;
use crate::error::Result;
use crate::visits::VisitRecorder;

/// The store handle shared by every service.
pub type SharedStore = Arc<dyn Store>;

/// Shared server state injected into all handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: SharedStore,
    pub issuer: Arc<CredentialIssuer>,
    pub enrollment: Arc<EnrollmentService<dyn Store>>,
    pub visits: VisitRecorder<dyn Store>,
    pub protocol: Arc<CheckpointProtocol<dyn Store>>,
}

impl AppState {
    /// Wire every service to one store handle and one issuer.
    pub fn new(store: SharedStore, issuer: CredentialIssuer, config: ProtocolConfig) -> Self {
        let issuer = Arc::new(issuer);
        Self {
            enrollment: Arc::new(EnrollmentService::new(
                Arc::clone(&store),
                Arc::clone(&issuer),
            )),
            visits: VisitRecorder::new(Arc::clone(&store)),
            protocol: Arc::new(CheckpointProtocol::new(Arc::clone(&store), config)),
            store,
            issuer,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub user_type: UserType,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SignupResponse {
    pub auth_token: String,
}

/// Build the router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/get_content", get(get_content))
        .with_state(state)
}

async fn signup(
    State(state): State<AppState>,
    ClientAddress(client_address): ClientAddress,
    Json(request): Json<SignupRequest>,
) -> Result<Json<SignupResponse>> {
    let enrollment = state
        .enrollment
        .enroll(request.user_type, client_address.as_deref())
        .await?;

    Ok(Json(SignupResponse {
        auth_token: enrollment.credential.into_string(),
    }))
}

async fn login(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ClientAddress(client_address): ClientAddress,
) -> StatusCode {
    state.visits.record_detached(user.user_id, client_address);
    StatusCode::OK
}

async fn get_content(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ClientAddress(client_address): ClientAddress,
    RawQuery(query): RawQuery,
) -> Result<Json<BatchResponse>> {
    let pending = labels_from_query(query.as_deref());
    state.visits.record_detached(user.user_id, client_address);

    let batch = state.protocol.get_next_batch(user.user_id, &pending).await?;
    Ok(Json(batch.into()))
}

/// Collect the `labels` values of a query string in order.
///
/// Accepts repeated `labels=`, `labels[]=` and indexed `labels[N]=` keys.
/// Indexed values are ordered by their index and follow the unindexed ones.
pub fn labels_from_query(query: Option<&str>) -> Vec<String> {
    let Some(query) = query else {
        return Vec::new();
    };

    let mut labels = Vec::new();
    let mut indexed = BTreeMap::new();

    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        match key.as_ref() {
            "labels" | "labels[]" => labels.push(value.into_owned()),
            other => {
                let index = other
                    .strip_prefix("labels[")
                    .and_then(|rest| rest.strip_suffix(']'))
                    .and_then(|n| n.parse::<usize>().ok());
                if let Some(index) = index {
                    indexed.insert(index, value.into_owned());
                }
            }
        }
    }

    labels.extend(indexed.into_values());
    labels
}
