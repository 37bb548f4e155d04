//! `Authorization: Bearer <token>` の抽出
//!
//! - scheme keyword is case-insensitive (`bearer`, `Bearer`, `BEARER`)
//! - exactly one space between scheme and token
//! - the token itself must be non-empty and contain no whitespace
//!
//! The raw token is a secret. It is never printed via `Debug`; use
//! [`BearerToken::fingerprint`] when a log line needs to correlate requests.

use std::fmt;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use sha2::{Digest, Sha256};
use thiserror::Error;

const SCHEME: &str = "bearer";

/// Why a header could not be turned into a [`BearerToken`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MissingCredential {
    #[error("authorization header missing")]
    HeaderAbsent,
    #[error("authorization scheme is not bearer")]
    NotBearer,
    #[error("bearer token is empty or malformed")]
    Malformed,
}

/// SHA-256 digest of a token. Used as the key for the cache and the
/// in-flight map so raw tokens never sit in shared state.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TokenKey([u8; 32]);

impl fmt::Debug for TokenKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TokenKey({})", URL_SAFE_NO_PAD.encode(&self.0[..6]))
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct BearerToken {
    raw: String,
    key: TokenKey,
}

impl BearerToken {
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let key = TokenKey(Sha256::digest(raw.as_bytes()).into());
        Self { raw, key }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn key(&self) -> TokenKey {
        self.key
    }

    /// Short, non-reversible identifier for log correlation.
    pub fn fingerprint(&self) -> String {
        URL_SAFE_NO_PAD.encode(&self.key.0[..6])
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Do not print the token
        f.debug_struct("BearerToken")
            .field("fingerprint", &self.fingerprint())
            .finish()
    }
}

/// Parse the raw `Authorization` header value.
pub fn extract_bearer(header: Option<&str>) -> Result<BearerToken, MissingCredential> {
    let header = header.ok_or(MissingCredential::HeaderAbsent)?;

    let (scheme, rest) = header
        .split_once(' ')
        .ok_or(MissingCredential::NotBearer)?;

    if !scheme.eq_ignore_ascii_case(SCHEME) {
        return Err(MissingCredential::NotBearer);
    }

    // "Bearer  abc" (double space) is rejected; trailing whitespace is trimmed.
    if rest.starts_with(char::is_whitespace) {
        return Err(MissingCredential::Malformed);
    }
    let token = rest.trim_end();
    if token.is_empty() || token.contains(char::is_whitespace) {
        return Err(MissingCredential::Malformed);
    }

    Ok(BearerToken::new(token))
}
