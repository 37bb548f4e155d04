//! Service credential used by the resource server to authenticate itself
//! against the introspection endpoint.
//!
//! Two shapes are supported:
//! - a JSON key file (`keyId`, `key` PEM, `clientId`) → `private_key_jwt`
//!   client assertion (RFC 7523), signed RS256 per request
//! - a client id + secret pair → HTTP Basic
//!
//! Key material is loaded once at startup. A broken key file is a startup
//! error, never something discovered per request.

use std::{fmt, path::Path};

use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::client::IntrospectionError;

pub const CLIENT_ASSERTION_TYPE: &str = "urn:ietf:params:oauth:client-assertion-type:jwt-bearer";

// Lifetime of a signed client assertion, seconds.
const ASSERTION_TTL_SECONDS: i64 = 3600;

/// On-disk key file as downloaded from the authorization server console.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct KeyFile {
    #[serde(rename = "type")]
    #[allow(dead_code)]
    kind: Option<String>,
    key_id: String,
    key: String,
    client_id: String,
    #[allow(dead_code)]
    app_id: Option<String>,
}

#[derive(Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    sub: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
    jti: String,
}

#[derive(Clone)]
pub enum ServiceCredential {
    PrivateKeyJwt {
        client_id: String,
        key_id: String,
        key: EncodingKey,
    },
    ClientSecret {
        client_id: String,
        client_secret: String,
    },
}

impl fmt::Debug for ServiceCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Do not print key material
        match self {
            Self::PrivateKeyJwt {
                client_id, key_id, ..
            } => f
                .debug_struct("PrivateKeyJwt")
                .field("client_id", client_id)
                .field("key_id", key_id)
                .finish(),
            Self::ClientSecret { client_id, .. } => f
                .debug_struct("ClientSecret")
                .field("client_id", client_id)
                .finish(),
        }
    }
}

impl ServiceCredential {
    pub fn from_key_file(path: impl AsRef<Path>) -> Result<Self, IntrospectionError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            IntrospectionError::CredentialConfig(format!(
                "cannot read key file {}: {e}",
                path.display()
            ))
        })?;
        Self::from_key_json(&raw)
    }

    pub fn from_key_json(raw: &str) -> Result<Self, IntrospectionError> {
        let file: KeyFile = serde_json::from_str(raw)
            .map_err(|e| IntrospectionError::CredentialConfig(format!("invalid key file: {e}")))?;

        if file.client_id.trim().is_empty() || file.key_id.trim().is_empty() {
            return Err(IntrospectionError::CredentialConfig(
                "key file is missing clientId or keyId".into(),
            ));
        }

        let key = EncodingKey::from_rsa_pem(file.key.as_bytes()).map_err(|e| {
            IntrospectionError::CredentialConfig(format!("invalid RSA private key: {e}"))
        })?;

        Ok(Self::PrivateKeyJwt {
            client_id: file.client_id,
            key_id: file.key_id,
            key,
        })
    }

    pub fn client_secret(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Result<Self, IntrospectionError> {
        let client_id = client_id.into();
        let client_secret = client_secret.into();
        if client_id.trim().is_empty() || client_secret.is_empty() {
            return Err(IntrospectionError::CredentialConfig(
                "client id and client secret must not be empty".into(),
            ));
        }
        Ok(Self::ClientSecret {
            client_id,
            client_secret,
        })
    }

    pub fn client_id(&self) -> &str {
        match self {
            Self::PrivateKeyJwt { client_id, .. } | Self::ClientSecret { client_id, .. } => {
                client_id
            }
        }
    }

    /// Sign a fresh client assertion for `audience` (the issuer).
    ///
    /// Returns `None` for credentials that authenticate with HTTP Basic.
    pub fn client_assertion(&self, audience: &str) -> Result<Option<String>, IntrospectionError> {
        let Self::PrivateKeyJwt {
            client_id,
            key_id,
            key,
        } = self
        else {
            return Ok(None);
        };

        let iat = Utc::now().timestamp();
        let claims = AssertionClaims {
            iss: client_id,
            sub: client_id,
            aud: audience,
            iat,
            exp: iat + ASSERTION_TTL_SECONDS,
            jti: Uuid::new_v4().to_string(),
        };

        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(key_id.clone());

        jsonwebtoken::encode(&header, &claims, key)
            .map(Some)
            .map_err(|e| IntrospectionError::CredentialConfig(format!("cannot sign assertion: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY_FILE: &str = include_str!("../../../../tests/fixtures/service-key.json");

    #[test]
    fn loads_key_file_and_signs_assertion() {
        let credential = ServiceCredential::from_key_json(KEY_FILE).unwrap();
        assert_eq!(credential.client_id(), "resource-server@demo");

        let assertion = credential
            .client_assertion("https://issuer.example.com")
            .unwrap()
            .unwrap();
        let header = jsonwebtoken::decode_header(&assertion).unwrap();
        assert_eq!(header.alg, Algorithm::RS256);
        assert_eq!(header.kid.as_deref(), Some("key-1"));
    }

    #[test]
    fn rejects_broken_key_material() {
        let err = ServiceCredential::from_key_json(
            r#"{"type":"application","keyId":"k","key":"not a pem","clientId":"c"}"#,
        )
        .unwrap_err();
        assert!(matches!(err, IntrospectionError::CredentialConfig(_)));

        let err = ServiceCredential::from_key_json("{").unwrap_err();
        assert!(matches!(err, IntrospectionError::CredentialConfig(_)));
    }

    #[test]
    fn missing_key_file_is_a_config_error() {
        let err = ServiceCredential::from_key_file("/nonexistent/key.json").unwrap_err();
        assert!(matches!(err, IntrospectionError::CredentialConfig(_)));
    }

    #[test]
    fn secret_credential_has_no_assertion_and_hides_secret() {
        let credential = ServiceCredential::client_secret("rs", "s3cr3t").unwrap();
        assert!(credential.client_assertion("aud").unwrap().is_none());
        assert!(!format!("{credential:?}").contains("s3cr3t"));
        assert!(ServiceCredential::client_secret("rs", "").is_err());
    }
}
