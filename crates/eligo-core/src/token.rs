//! # Token Module
//!
//! Applicant access tokens.
//!
//! An [`AccessToken`] is the secret embedded in the applicant's link. Only
//! its [`TokenDigest`] is ever stored. The same primitives back reviewer
//! session identifiers in the app layer.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use subtle::ConstantTimeEq;

/// Random bytes per token.
pub const TOKEN_BYTES: usize = 32;
/// Encoded length of a token (base64url, no padding).
pub const TOKEN_LEN: usize = 43;

/// A freshly generated secret. Display it once, store only its digest.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    /// Generate from the operating system RNG.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; TOKEN_BYTES];
        OsRng.fill_bytes(&mut bytes);
        Self(URL_SAFE_NO_PAD.encode(bytes))
    }

    /// Wrap a token received from a client, if it is well formed.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        let well_formed = value.len() == TOKEN_LEN
            && value
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
        well_formed.then(|| Self(value.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn digest(&self) -> TokenDigest {
        TokenDigest::of(&self.0)
    }
}

// Keep secrets out of logs.
impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(..)")
    }
}

/// Lowercase hex SHA-256 of a token.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TokenDigest(String);

impl TokenDigest {
    #[must_use]
    pub fn of(secret: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(secret.as_bytes());
        Self(format!("{:x}", hasher.finalize()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Constant-time equality for secrets and digests.
#[must_use]
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    bool::from(a.as_bytes().ct_eq(b.as_bytes()))
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_tokens_are_well_formed_and_distinct() {
        let a = AccessToken::generate();
        let b = AccessToken::generate();
        assert_eq!(a.as_str().len(), TOKEN_LEN);
        assert!(AccessToken::parse(a.as_str()).is_some());
        assert_ne!(a, b);
    }

    #[test]
    fn malformed_tokens_are_rejected() {
        assert!(AccessToken::parse("short").is_none());
        assert!(AccessToken::parse(&"a".repeat(TOKEN_LEN - 1)).is_none());
        assert!(AccessToken::parse(&format!("{}=", "a".repeat(TOKEN_LEN - 1))).is_none());
        assert!(AccessToken::parse(&"a".repeat(TOKEN_LEN)).is_some());
    }

    #[test]
    fn digest_is_stable_hex() {
        let d = TokenDigest::of("secret");
        assert_eq!(d, TokenDigest::of("secret"));
        assert_eq!(d.as_str().len(), 64);
        assert_ne!(d, TokenDigest::of("secret2"));
    }

    #[test]
    fn debug_hides_token() {
        let token = AccessToken::generate();
        assert!(!format!("{token:?}").contains(token.as_str()));
    }

    #[test]
    fn ct_eq() {
        assert!(constant_time_eq("abc", "abc"));
        assert!(!constant_time_eq("abc", "abd"));
        assert!(!constant_time_eq("abc", "abcd"));
    }
}
