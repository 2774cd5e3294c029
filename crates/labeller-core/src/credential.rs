//! Credentials: opaque signed tokens binding a request to a user.
//!
//! A credential is `hex(cbor(claims)) "." hex(signature)`, where the
//! signature is Ed25519 over a domain tag followed by the claim bytes.
//! Clients never look inside; they replay the string on every request.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CredentialError;
use crate::types::UserId;

/// Domain separation tag for credential signatures.
pub const CREDENTIAL_DOMAIN: &[u8] = b"labeller-credential-v1:";

/// A keypair for signing credentials.
///
/// This wraps ed25519-dalek's SigningKey.
#[derive(Clone)]
pub struct Keypair {
    signing_key: SigningKey,
}

impl Keypair {
    /// Generate a new random keypair.
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        Self {
            signing_key: SigningKey::generate(&mut rng),
        }
    }

    /// Create from a 32-byte seed.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(seed),
        }
    }

    /// Parse a seed from 64 hex characters.
    pub fn from_hex_seed(s: &str) -> Result<Self, CredentialError> {
        let bytes = hex::decode(s.trim()).map_err(|e| CredentialError::Malformed(e.to_string()))?;
        let seed: [u8; 32] = bytes
            .try_into()
            .map_err(|_| CredentialError::Malformed("seed must be 32 bytes".into()))?;
        Ok(Self::from_seed(&seed))
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    pub fn sign(&self, message: &[u8]) -> Signature {
        self.signing_key.sign(message)
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let public = hex::encode(self.verifying_key().to_bytes());
        write!(f, "Keypair({})", &public[..16])
    }
}

/// What a credential asserts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: UserId,
    /// Unix ms at issuance.
    pub issued_at: i64,
}

/// An issued credential string.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(..)")
    }
}

/// Mints and verifies credentials with a single keypair.
#[derive(Debug, Clone)]
pub struct CredentialIssuer {
    keypair: Keypair,
}

impl CredentialIssuer {
    pub fn new(keypair: Keypair) -> Self {
        Self { keypair }
    }

    /// Issue a credential for `user_id`.
    pub fn issue(&self, user_id: UserId, issued_at: i64) -> Result<Credential, CredentialError> {
        let claims = Claims { user_id, issued_at };
        let mut body = Vec::new();
        ciborium::into_writer(&claims, &mut body)
            .map_err(|e| CredentialError::Encoding(e.to_string()))?;

        let signature = self.keypair.sign(&signed_message(&body));
        Ok(Credential(format!(
            "{}.{}",
            hex::encode(&body),
            hex::encode(signature.to_bytes())
        )))
    }

    /// Verify a credential string and return its claims.
    pub fn verify(&self, token: &str) -> Result<Claims, CredentialError> {
        let (body_hex, sig_hex) = token
            .trim()
            .split_once('.')
            .ok_or_else(|| CredentialError::Malformed("missing signature".into()))?;

        let body = hex::decode(body_hex).map_err(|e| CredentialError::Malformed(e.to_string()))?;
        let sig_bytes: [u8; 64] = hex::decode(sig_hex)
            .map_err(|e| CredentialError::Malformed(e.to_string()))?
            .try_into()
            .map_err(|_| CredentialError::Malformed("signature must be 64 bytes".into()))?;

        self.keypair
            .verifying_key()
            .verify(&signed_message(&body), &Signature::from_bytes(&sig_bytes))
            .map_err(|_| CredentialError::InvalidSignature)?;

        ciborium::from_reader(&body[..]).map_err(|e| CredentialError::Malformed(e.to_string()))
    }
}

fn signed_message(body: &[u8]) -> Vec<u8> {
    let mut message = Vec::with_capacity(CREDENTIAL_DOMAIN.len() + body.len());
    message.extend_from_slice(CREDENTIAL_DOMAIN);
    message.extend_from_slice(body);
    message
}
