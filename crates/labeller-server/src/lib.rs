//! # Labeller Server
//!
//! Services and HTTP surface for the anonymous labelling tool.
//!
//! ## Overview
//!
//! A participant enrolls once and receives an opaque credential. Every
//! authenticated request is logged as a visit. Labelling proceeds in batches:
//! the client sends the labels for the previous batch along with its request
//! for the next one, and the server commits them before choosing what to
//! serve. Progress is resumable from the store alone.
//!
//! ## Key Types
//!
//! - [`EnrollmentService`] - Creates users and issues credentials
//! - [`VisitRecorder`] - Appends visit rows, awaited or detached
//! - [`CheckpointProtocol`] - The commit-then-fetch cycle
//! - [`AppState`] / [`router`] - The axum application
//!
//! ## Usage
//!
//! ```rust,no_run
//! use labeller_server::{serve, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     serve(ServerConfig::from_env()?).await
//! }
//! ```

pub mod auth;
pub mod checkpoint;
pub mod config;
pub mod enrollment;
pub mod error;
pub mod routes;
pub mod visits;

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context as _;
use labeller_core::{CredentialIssuer, Keypair};
use labeller_store::{SqliteStore, Store, StoreExt};

pub use auth::{AuthenticatedUser, ClientAddress};
pub use checkpoint::{BatchResponse, CheckpointProtocol, NextBatch};
pub use config::{ConfigError, ProtocolConfig, ServerConfig, DEFAULT_PAGE_SIZE};
pub use enrollment::{Enrollment, EnrollmentService};
pub use error::{Result, ServiceError};
pub use routes::{labels_from_query, router, AppState, SharedStore, SignupRequest, SignupResponse};
pub use visits::VisitRecorder;

/// Read a JSON array of context strings.
pub fn load_contexts(path: &Path) -> anyhow::Result<Vec<String>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading contexts from {}", path.display()))?;
    let contexts: Vec<String> = serde_json::from_str(&raw)
        .with_context(|| format!("parsing contexts in {}", path.display()))?;
    Ok(contexts)
}

/// Build the credential issuer from the configured seed, or a fresh key.
pub fn issuer_from_config(config: &ServerConfig) -> anyhow::Result<CredentialIssuer> {
    let keypair = match &config.signing_seed {
        Some(seed) => Keypair::from_hex_seed(seed).context("LABELLER_SIGNING_SEED")?,
        None => {
            tracing::warn!("no signing seed configured; credentials will not survive a restart");
            Keypair::generate()
        }
    };
    Ok(CredentialIssuer::new(keypair))
}

/// Open the store, seed it, and serve until ctrl-c.
pub async fn serve(config: ServerConfig) -> anyhow::Result<()> {
    let store = SqliteStore::open(&config.database)
        .with_context(|| format!("opening database {}", config.database.display()))?;

    if let Some(path) = &config.contexts_file {
        let contexts = load_contexts(path)?;
        let seeded = store.seed_contexts_if_empty(&contexts).await?;
        if seeded > 0 {
            tracing::info!(seeded, "seeded contexts");
        }
    }

    let total = store.count_contexts().await?;
    if total == 0 {
        tracing::warn!("contexts table is empty; every client will see complete");
    }

    let issuer = issuer_from_config(&config)?;
    let state = AppState::new(Arc::new(store), issuer, config.protocol.clone());
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("binding {}", config.bind_addr))?;
    tracing::info!(addr = %config.bind_addr, contexts = total, "labeller listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("labeller stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
}
