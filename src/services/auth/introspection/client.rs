//! Introspection client interface + reqwest-backed implementation.
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{StatusCode, header};
use thiserror::Error;
use url::Url;

use crate::services::auth::bearer::BearerToken;

use super::credential::{CLIENT_ASSERTION_TYPE, ServiceCredential};
use super::types::{IntrospectionResponse, IntrospectionResult};

/// Introspection failures.
///
/// `Clone` because a single upstream outcome fans out to every single-flight waiter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntrospectionError {
    #[error("introspection transport error: {0}")]
    Transport(String),
    #[error("introspection server error: {0}")]
    Server(String),
    #[error("service credential rejected or invalid: {0}")]
    CredentialConfig(String),
}

/// Exchange a bearer token for an [`IntrospectionResult`].
///
/// A well-formed `active=false` answer is `Ok`, not an error.
#[async_trait]
pub trait TokenIntrospector: Send + Sync + 'static {
    async fn introspect(
        &self,
        token: &BearerToken,
    ) -> Result<IntrospectionResult, IntrospectionError>;
}

pub struct IntrospectionClient {
    http: reqwest::Client,
    endpoint: Url,
    // `aud` of the client assertion
    issuer: String,
    credential: ServiceCredential,
}

impl std::fmt::Debug for IntrospectionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntrospectionClient")
            .field("endpoint", &self.endpoint.as_str())
            .field("issuer", &self.issuer)
            .field("credential", &self.credential)
            .finish()
    }
}

/// Build the HTTP client used for discovery + introspection.
pub fn build_http_client(timeout: Duration) -> Result<reqwest::Client, IntrospectionError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout)
        .build()
        .map_err(|e| IntrospectionError::Transport(format!("cannot build http client: {e}")))
}

impl IntrospectionClient {
    pub fn new(
        http: reqwest::Client,
        endpoint: Url,
        issuer: impl Into<String>,
        credential: ServiceCredential,
    ) -> Self {
        Self {
            http,
            endpoint,
            issuer: issuer.into(),
            credential,
        }
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn client_id(&self) -> &str {
        self.credential.client_id()
    }

    /// Startup check: the credential must be able to produce its
    /// authentication material. Fails with `CredentialConfig`.
    pub fn verify_credential(&self) -> Result<(), IntrospectionError> {
        self.credential.client_assertion(&self.issuer).map(|_| ())
    }

    async fn send(&self, token: &BearerToken) -> Result<reqwest::Response, IntrospectionError> {
        let assertion = self.credential.client_assertion(&self.issuer)?;

        let mut form: Vec<(&str, &str)> = vec![("token", token.as_str())];
        if let Some(assertion) = assertion.as_deref() {
            form.push(("client_assertion_type", CLIENT_ASSERTION_TYPE));
            form.push(("client_assertion", assertion));
        }

        let mut request = self
            .http
            .post(self.endpoint.clone())
            .header(header::ACCEPT, "application/json")
            .form(&form);

        if let ServiceCredential::ClientSecret {
            client_id,
            client_secret,
        } = &self.credential
        {
            request = request.basic_auth(client_id, Some(client_secret));
        }

        request
            .send()
            .await
            .map_err(|e| transport_error("request failed", &e))
    }

    async fn parse(resp: reqwest::Response) -> Result<IntrospectionResult, IntrospectionError> {
        let status = resp.status();

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(IntrospectionError::CredentialConfig(format!(
                "introspection endpoint returned {status}"
            )));
        }
        if !status.is_success() {
            return Err(IntrospectionError::Server(format!(
                "introspection endpoint returned {status}"
            )));
        }

        let body: IntrospectionResponse = resp.json().await.map_err(|e| {
            // The body read can still hit the client timeout.
            if e.is_timeout() {
                transport_error("reading response", &e)
            } else {
                IntrospectionError::Server(format!("malformed response: {e}"))
            }
        })?;

        Ok(body.into())
    }

    async fn attempt(&self, token: &BearerToken) -> Result<IntrospectionResult, IntrospectionError> {
        let resp = self.send(token).await?;
        Self::parse(resp).await
    }
}

fn transport_error(context: &str, e: &reqwest::Error) -> IntrospectionError {
    let kind = if e.is_timeout() { "timeout" } else { context };
    IntrospectionError::Transport(format!("{kind}: {e}"))
}

#[async_trait]
impl TokenIntrospector for IntrospectionClient {
    async fn introspect(
        &self,
        token: &BearerToken,
    ) -> Result<IntrospectionResult, IntrospectionError> {
        // At most one retry, and only on transport failures (connect, timeout).
        match self.attempt(token).await {
            Err(IntrospectionError::Transport(first)) => {
                tracing::warn!(
                    token = %token.fingerprint(),
                    error = %first,
                    "introspection transport failure, retrying once"
                );
                self.attempt(token).await
            }
            other => other,
        }
    }
}
