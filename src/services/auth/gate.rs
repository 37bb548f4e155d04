/*
 * Responsibility
 * - extract → cache lookup → introspection (single-flight) → decision
 * - Authorized / Denied / ServiceError の分類
 * - HTTP には依存しない (middleware が decision を response に変換する)
 */
use std::{collections::BTreeSet, fmt, sync::Arc};

use chrono::Utc;

use crate::services::auth::bearer::{BearerToken, TokenKey, extract_bearer};
use crate::services::auth::introspection::{
    IntrospectionError, IntrospectionResult, TokenIntrospector,
};
use crate::services::cache::{CachePolicy, SingleFlight, VerificationCache};

type Outcome = Result<Arc<IntrospectionResult>, IntrospectionError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    MissingCredential,
    InactiveToken,
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DenyReason::MissingCredential => write!(f, "missing or malformed credential"),
            DenyReason::InactiveToken => write!(f, "inactive token"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AuthorizationDecision {
    Authorized {
        subject: Option<String>,
        scopes: BTreeSet<String>,
    },
    Denied {
        reason: DenyReason,
    },
    ServiceError {
        cause: IntrospectionError,
    },
}

impl AuthorizationDecision {
    pub fn is_authorized(&self) -> bool {
        matches!(self, Self::Authorized { .. })
    }
}

pub struct AuthorizationGate {
    introspector: Arc<dyn TokenIntrospector>,
    cache: Arc<VerificationCache>,
    flights: SingleFlight<TokenKey, Outcome>,
}

impl fmt::Debug for AuthorizationGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorizationGate")
            .field("cache", &self.cache)
            .field("flights", &self.flights)
            .finish()
    }
}

impl AuthorizationGate {
    pub fn new(introspector: Arc<dyn TokenIntrospector>, policy: CachePolicy) -> Self {
        Self {
            introspector,
            cache: Arc::new(VerificationCache::new(policy)),
            flights: SingleFlight::new(),
        }
    }

    pub fn cache(&self) -> &VerificationCache {
        &self.cache
    }

    /// Decide for a raw `Authorization` header value.
    pub async fn authorize(&self, authorization: Option<&str>) -> AuthorizationDecision {
        let token = match extract_bearer(authorization) {
            Ok(token) => token,
            Err(err) => {
                tracing::debug!(error = %err, "rejecting request without usable bearer credential");
                return AuthorizationDecision::Denied {
                    reason: DenyReason::MissingCredential,
                };
            }
        };

        self.authorize_token(&token).await
    }

    pub async fn authorize_token(&self, token: &BearerToken) -> AuthorizationDecision {
        if let Some(hit) = self.cache.lookup(&token.key()) {
            tracing::debug!(token = %token.fingerprint(), active = hit.is_active(), "introspection cache hit");
            return decide(token, &hit);
        }

        match self.resolve(token).await {
            Ok(result) => decide(token, &result),
            Err(cause) => {
                match &cause {
                    IntrospectionError::CredentialConfig(_) => tracing::error!(
                        token = %token.fingerprint(),
                        error = %cause,
                        "authorization server rejected the service credential"
                    ),
                    _ => tracing::warn!(
                        token = %token.fingerprint(),
                        error = %cause,
                        "token introspection failed"
                    ),
                }
                AuthorizationDecision::ServiceError { cause }
            }
        }
    }

    /// Cache miss path: one upstream call per token, shared by concurrent callers.
    async fn resolve(&self, token: &BearerToken) -> Outcome {
        let introspector = Arc::clone(&self.introspector);
        let cache = Arc::clone(&self.cache);
        let token = token.clone();

        self.flights
            .run(token.key(), move || introspect_and_store(introspector, cache, token))
            .await
            .unwrap_or_else(|abandoned| Err(IntrospectionError::Server(abandoned.to_string())))
    }
}

async fn introspect_and_store(
    introspector: Arc<dyn TokenIntrospector>,
    cache: Arc<VerificationCache>,
    token: BearerToken,
) -> Outcome {
    // A flight that finished between our lookup and now already filled the cache.
    if let Some(hit) = cache.lookup(&token.key()) {
        return Ok(hit);
    }

    tracing::debug!(token = %token.fingerprint(), "introspection cache miss");
    let result = Arc::new(introspector.introspect(&token).await?);
    cache.store(token.key(), Arc::clone(&result));
    Ok(result)
}

fn decide(token: &BearerToken, result: &IntrospectionResult) -> AuthorizationDecision {
    if !result.is_usable_at(Utc::now()) {
        tracing::debug!(token = %token.fingerprint(), "token is not active");
        return AuthorizationDecision::Denied {
            reason: DenyReason::InactiveToken,
        };
    }

    AuthorizationDecision::Authorized {
        subject: result.subject().map(str::to_string),
        scopes: result.scopes().clone(),
    }
}
