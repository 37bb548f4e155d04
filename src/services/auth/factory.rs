/// Factory: build the `AuthorizationGate` from application `Config`.
///
/// Everything that can be checked before serving traffic is checked here
/// (credential material, endpoint discovery), so a misconfigured service
/// credential fails startup instead of surfacing per request.
use std::sync::Arc;

use crate::config::{Config, CredentialSource};
use crate::services::auth::gate::AuthorizationGate;
use crate::services::auth::introspection::{
    IntrospectionClient, IntrospectionError, ServiceCredential, client::build_http_client,
    discovery::discover_introspection_endpoint,
};

pub fn load_credential(source: &CredentialSource) -> Result<ServiceCredential, IntrospectionError> {
    match source {
        CredentialSource::KeyFile(path) => ServiceCredential::from_key_file(path),
        CredentialSource::ClientSecret {
            client_id,
            client_secret,
        } => ServiceCredential::client_secret(client_id.clone(), client_secret.clone()),
    }
}

pub async fn build_introspection_client(
    config: &Config,
) -> Result<IntrospectionClient, IntrospectionError> {
    let credential = load_credential(&config.credential)?;
    let http = build_http_client(config.introspection_timeout)?;

    let endpoint = match &config.introspection_endpoint {
        Some(endpoint) => endpoint.clone(),
        None => discover_introspection_endpoint(&http, &config.issuer).await?,
    };

    let client = IntrospectionClient::new(
        http,
        endpoint,
        config.issuer.as_str().trim_end_matches('/'),
        credential,
    );
    client.verify_credential()?;

    tracing::info!(
        endpoint = %client.endpoint(),
        client_id = %client.client_id(),
        "introspection client ready"
    );

    Ok(client)
}

pub async fn build_gate(config: &Config) -> Result<Arc<AuthorizationGate>, IntrospectionError> {
    let client = build_introspection_client(config).await?;
    Ok(Arc::new(AuthorizationGate::new(
        Arc::new(client),
        config.cache_policy,
    )))
}
