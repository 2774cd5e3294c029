//! # Labeller Testkit
//!
//! Testing utilities for Labeller.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: a store seeded with contexts, a deterministic credential
//!   issuer, and a helper that runs the HTTP server on an ephemeral port
//! - **Generators**: proptest strategies for labels and labelling sessions
//!
//! ## Test Fixtures
//!
//! ```rust,no_run
//! use labeller_testkit::fixtures::TestFixture;
//!
//! # async fn example() {
//! let fixture = TestFixture::memory().with_page_size(2);
//! fixture.seed_contexts(5).await;
//! let server = fixture.spawn().await;
//! println!("listening on {}", server.base_url);
//! # }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use labeller_testkit::generators::LabellingSession;
//!
//! proptest! {
//!     #[test]
//!     fn sessions_terminate(session: LabellingSession) {
//!         prop_assert!(session.page_size > 0);
//!     }
//! }
//! ```

pub mod fixtures;
pub mod generators;

pub use fixtures::{context_strings, label_batch, TestFixture, TestServer};
pub use generators::{label_payload, polarity, LabellingSession};
