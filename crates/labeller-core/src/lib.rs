//! # Labeller Core
//!
//! Pure primitives for Labeller: identifiers, label payloads, batch placement
//! and credentials.
//!
//! This crate contains no I/O, no storage, no networking. Everything here is
//! computation over values the store and server hand it.
//!
//! ## Key Types
//!
//! - [`UserId`], [`VisitId`], [`ContextId`] - Store-generated row identifiers
//! - [`Checkpoint`] - The highest committed label position for a user
//! - [`Polarity`] - The two-valued classifier used for labels and user types
//! - [`LabelPayload`] - One structurally parsed label from a client batch
//! - [`BatchPlan`] - Where each label of a batch lands in the user's stream
//! - [`CredentialIssuer`] - Mints and verifies signed credentials
//!
//! ## Placement
//!
//! A batch is always placed against the checkpoint the caller read. See
//! [`place_batch`] for the rules around declared sequence indexes.

pub mod credential;
pub mod error;
pub mod label;
pub mod placement;
pub mod types;

pub use credential::{Claims, Credential, CredentialIssuer, Keypair};
pub use error::{CredentialError, LabelParseError, PlacementError};
pub use label::{parse_batch, LabelPayload};
pub use placement::{place_batch, BatchPlan, PlacedLabel};
pub use types::{Checkpoint, ContextId, Polarity, UserId, UserType, VisitId};

/// Get current time in milliseconds.
pub fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
