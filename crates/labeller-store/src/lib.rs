//! # Labeller Store
//!
//! Storage abstraction for Labeller. Provides a trait-based interface over
//! the four tables the service needs (users, visits, contexts, labels) with
//! SQLite and in-memory implementations.
//!
//! ## Overview
//!
//! The store is the single source of truth. Nothing about a user's progress
//! lives in process memory: the checkpoint is derived from the labels table
//! on every call. The primary implementation is [`SqliteStore`], with
//! [`MemoryStore`] for tests.
//!
//! ## Key Types
//!
//! - [`Store`] - The async trait for all storage operations
//! - [`StoreExt`] - Derived helpers such as [`StoreExt::checkpoint`]
//! - [`SqliteStore`] - SQLite-based persistent storage
//! - [`MemoryStore`] - In-memory storage for tests
//! - [`CommitResult`] - Outcome of committing a label batch
//!
//! ## Usage
//!
//! ```rust,no_run
//! use labeller_core::{Checkpoint, Polarity};
//! use labeller_store::{SqliteStore, Store, StoreExt};
//!
//! async fn example() {
//!     let store = SqliteStore::open("labelling.db").unwrap();
//!
//!     let user_id = store.insert_user(Polarity::Positive).await.unwrap();
//!     store.insert_visit(user_id, Some("10.0.0.1")).await.unwrap();
//!
//!     let checkpoint = store.checkpoint(user_id).await.unwrap();
//!     assert_eq!(checkpoint, Checkpoint::NONE);
//!
//!     let page = store.contexts_after(checkpoint, 10).await.unwrap();
//!     # let _ = page;
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Generated keys**: inserts that create a row return its key in the same
//!   operation, never via a "read the latest row" follow-up.
//! - **Guarded commits**: a label batch commits only if the checkpoint still
//!   equals the one it was planned against; otherwise the result is `Stale`.
//! - **Unique positions**: `(user_id, sequence_index)` is unique, so a
//!   conflicting writer fails loudly.

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{CommitResult, Context, LabelRecord, Store, StoreExt, User, Visit};
