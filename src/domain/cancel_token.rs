use crate::error::AuthFailure;
use chrono::{DateTime, Utc};
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::fmt;
use subtle::ConstantTimeEq;

const TOKEN_BYTES: usize = 32;

/// A guest's self-service cancellation secret.
///
/// Only the guest ever sees the plaintext, inside the confirmation email. Stores keep
/// the [`CancelTokenHash`] instead.
#[derive(Clone, PartialEq, Eq)]
pub struct CancelToken(String);

impl CancelToken {
    pub fn generate() -> Self {
        let mut bytes = [0u8; TOKEN_BYTES];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self(hex::encode(bytes))
    }

    /// Wraps a token presented by a guest.
    pub fn from_guest(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn hash(&self) -> CancelTokenHash {
        CancelTokenHash(hex::encode(Sha256::digest(self.0.as_bytes())))
    }
}

impl fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CancelToken(<redacted>)")
    }
}

/// Hex encoded SHA-256 digest of a [`CancelToken`].
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct CancelTokenHash(String);

impl CancelTokenHash {
    pub fn from_stored(hex_digest: impl Into<String>) -> Self {
        Self(hex_digest.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Constant-time check that `token` hashes to this digest.
    pub fn matches(&self, token: &CancelToken) -> bool {
        token.hash().0.as_bytes().ct_eq(self.0.as_bytes()).into()
    }
}

/// The persisted half of a cancel token.
///
/// The record outlives its use: a consumed token keeps its row with `consumed_at`
/// set, which is how a redelivered payment webhook tells that a token was issued.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CancelTokenRecord {
    pub hash: CancelTokenHash,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub consumed_at: Option<DateTime<Utc>>,
}

impl CancelTokenRecord {
    pub fn new(hash: CancelTokenHash, expires_at: DateTime<Utc>) -> Self {
        Self {
            hash,
            expires_at,
            consumed_at: None,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Checks `token` against this record and marks the record consumed.
    ///
    /// Expiry is checked before the hash. A consumed record rejects every token.
    pub fn consume(&mut self, token: &CancelToken, now: DateTime<Utc>) -> Result<(), AuthFailure> {
        if self.consumed_at.is_some() {
            return Err(AuthFailure::InvalidToken);
        }
        if self.is_expired(now) {
            return Err(AuthFailure::TokenExpired);
        }
        if !self.hash.matches(token) {
            return Err(AuthFailure::InvalidToken);
        }
        self.consumed_at = Some(now);
        Ok(())
    }
}
