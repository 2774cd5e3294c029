//! Test fixtures and helpers.

use std::net::SocketAddr;
use std::sync::Arc;

use labeller_core::{CredentialIssuer, Keypair, LabelPayload, Polarity};
use labeller_server::{router, AppState, ProtocolConfig, SharedStore};
use labeller_store::{MemoryStore, SqliteStore, StoreExt};
use tokio::task::JoinHandle;

const FIXTURE_SEED: [u8; 32] = [7u8; 32];

/// A store plus the settings needed to build a server around it.
pub struct TestFixture {
    pub store: SharedStore,
    pub seed: [u8; 32],
    pub config: ProtocolConfig,
}

impl TestFixture {
    /// Fixture backed by [`MemoryStore`].
    pub fn memory() -> Self {
        Self::with_store(Arc::new(MemoryStore::new()))
    }

    /// Fixture backed by an in-memory SQLite database.
    pub fn sqlite() -> Self {
        let store = SqliteStore::open_memory().expect("open in-memory sqlite");
        Self::with_store(Arc::new(store))
    }

    pub fn with_store(store: SharedStore) -> Self {
        Self {
            store,
            seed: FIXTURE_SEED,
            config: ProtocolConfig::default(),
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.config = ProtocolConfig::with_page_size(page_size).expect("page size must be non-zero");
        self
    }

    /// Seed `count` contexts and return their contents.
    pub async fn seed_contexts(&self, count: usize) -> Vec<String> {
        let contents = context_strings(count);
        self.store
            .seed_contexts_if_empty(&contents)
            .await
            .expect("seed contexts");
        contents
    }

    /// Issuer built from the fixture seed; every call verifies the others' tokens.
    pub fn issuer(&self) -> CredentialIssuer {
        CredentialIssuer::new(Keypair::from_seed(&self.seed))
    }

    pub fn state(&self) -> AppState {
        AppState::new(Arc::clone(&self.store), self.issuer(), self.config.clone())
    }

    /// Serve the router on `127.0.0.1:0`.
    pub async fn spawn(&self) -> TestServer {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test listener");
        let addr = listener.local_addr().expect("local addr");
        let app = router(self.state());

        let handle = tokio::spawn(async move {
            let _ = axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await;
        });

        TestServer {
            base_url: format!("http://{addr}"),
            addr,
            handle,
        }
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::memory()
    }
}

/// A running server; aborted on drop.
pub struct TestServer {
    pub base_url: String,
    pub addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Distinct context payloads `context-0`, `context-1`, ...
pub fn context_strings(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("context-{i}")).collect()
}

/// `count` undeclared labels in wire form, all with the given polarity.
pub fn label_batch(count: usize, polarity: Polarity) -> Vec<String> {
    (0..count)
        .map(|_| LabelPayload::new(polarity, polarity).to_wire())
        .collect()
}
