//! OpenID Provider metadata lookup (`/.well-known/openid-configuration`).
use serde::Deserialize;
use url::Url;

use super::client::IntrospectionError;

const WELL_KNOWN_PATH: &str = ".well-known/openid-configuration";

#[derive(Debug, Deserialize)]
struct ProviderMetadata {
    #[serde(default)]
    introspection_endpoint: Option<Url>,
}

/// `{issuer}/.well-known/openid-configuration`, tolerating a trailing slash on the issuer.
pub fn metadata_url(issuer: &Url) -> Result<Url, IntrospectionError> {
    let mut base = issuer.clone();
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.join(WELL_KNOWN_PATH)
        .map_err(|e| IntrospectionError::CredentialConfig(format!("invalid issuer url: {e}")))
}

/// Resolve the introspection endpoint advertised by the issuer.
pub async fn discover_introspection_endpoint(
    http: &reqwest::Client,
    issuer: &Url,
) -> Result<Url, IntrospectionError> {
    let url = metadata_url(issuer)?;

    let resp = http
        .get(url.clone())
        .send()
        .await
        .map_err(|e| IntrospectionError::Transport(format!("discovery failed: {e}")))?;

    if !resp.status().is_success() {
        return Err(IntrospectionError::Server(format!(
            "discovery endpoint {url} returned {}",
            resp.status()
        )));
    }

    let metadata: ProviderMetadata = resp
        .json()
        .await
        .map_err(|e| IntrospectionError::Server(format!("malformed provider metadata: {e}")))?;

    metadata.introspection_endpoint.ok_or_else(|| {
        IntrospectionError::Server("provider metadata has no introspection_endpoint".into())
    })
}
