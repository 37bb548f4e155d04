use std::collections::BTreeSet;

use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};

/// RFC 7662 introspection response body (wire format).
///
/// `active` is the only REQUIRED member; anything we do not model explicitly
/// is kept in `extra` so downstream code can still reach it.
#[derive(Debug, Clone, Deserialize)]
pub struct IntrospectionResponse {
    pub active: bool,

    #[serde(default)]
    pub exp: Option<i64>,
    #[serde(default)]
    pub sub: Option<String>,
    // space-separated
    #[serde(default)]
    pub scope: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Result of one introspection call. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct IntrospectionResult {
    active: bool,
    expires_at: Option<DateTime<Utc>>,
    subject: Option<String>,
    scopes: BTreeSet<String>,
    claims: Map<String, Value>,
}

impl IntrospectionResult {
    pub fn active() -> Self {
        Self {
            active: true,
            expires_at: None,
            subject: None,
            scopes: BTreeSet::new(),
            claims: Map::new(),
        }
    }

    pub fn inactive() -> Self {
        Self {
            active: false,
            ..Self::active()
        }
    }

    pub fn with_expires_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    pub fn subject(&self) -> Option<&str> {
        self.subject.as_deref()
    }

    pub fn scopes(&self) -> &BTreeSet<String> {
        &self.scopes
    }

    pub fn claims(&self) -> &Map<String, Value> {
        &self.claims
    }

    /// `active=true` but `exp` already passed counts as not usable.
    pub fn is_usable_at(&self, now: DateTime<Utc>) -> bool {
        self.active && self.expires_at.is_none_or(|exp| exp > now)
    }
}

impl From<IntrospectionResponse> for IntrospectionResult {
    fn from(resp: IntrospectionResponse) -> Self {
        // An unrepresentable `exp` is treated as already expired rather than "no expiry".
        let expires_at = resp.exp.map(|exp| {
            Utc.timestamp_opt(exp, 0)
                .single()
                .unwrap_or(DateTime::<Utc>::MIN_UTC)
        });

        let scopes = resp
            .scope
            .as_deref()
            .unwrap_or_default()
            .split_whitespace()
            .map(str::to_string)
            .collect();

        Self {
            active: resp.active,
            expires_at,
            subject: resp.sub.filter(|s| !s.trim().is_empty()),
            scopes,
            claims: resp.extra,
        }
    }
}
