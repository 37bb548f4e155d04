/*
 * Responsibility
 * - 環境変数から設定を読み込む (issuer, service credential, cache policy など)
 * - 設定値のバリデーション (不足・不正なら起動失敗)
 */
use std::fmt;
use std::net::SocketAddr;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use url::Url;

use crate::response::ResponseFormat;
use crate::services::cache::CachePolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    fn parse(raw: Option<String>) -> Self {
        match raw
            .unwrap_or_else(|| "development".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "production" | "prod" => Self::Production,
            _ => Self::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid(&'static str),
    Conflict(&'static str, &'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "missing configuration: {}", key),
            ConfigError::Invalid(key) => write!(f, "invalid configuration: {}", key),
            ConfigError::Conflict(a, b) => {
                write!(f, "conflicting configuration: {} and {} are both set", a, b)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Where the service credential comes from.
#[derive(Clone, PartialEq, Eq)]
pub enum CredentialSource {
    KeyFile(PathBuf),
    ClientSecret {
        client_id: String,
        client_secret: String,
    },
}

impl fmt::Debug for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Do not print secrets
        match self {
            Self::KeyFile(path) => f.debug_tuple("KeyFile").field(path).finish(),
            Self::ClientSecret { client_id, .. } => f
                .debug_struct("ClientSecret")
                .field("client_id", client_id)
                .finish_non_exhaustive(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub app_env: AppEnv,

    pub issuer: Url,
    // Skips discovery when set
    pub introspection_endpoint: Option<Url>,
    pub credential: CredentialSource,
    pub introspection_timeout: Duration,

    pub cache_policy: CachePolicy,
    pub response_format: ResponseFormat,

    pub http_request_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key → value source (env vars, a map in tests).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let port: u16 = parse_or(get("PORT"), "PORT", 3000)?;
        let addr: SocketAddr = SocketAddr::from_str(&format!("0.0.0.0:{}", port))
            .map_err(|_| ConfigError::Invalid("PORT"))?;

        let app_env = AppEnv::parse(get("APP_ENV"));

        let issuer = get("INTROSPECTION_ISSUER")
            .ok_or(ConfigError::Missing("INTROSPECTION_ISSUER"))?;
        let issuer = Url::parse(&issuer).map_err(|_| ConfigError::Invalid("INTROSPECTION_ISSUER"))?;

        let introspection_endpoint = get("INTROSPECTION_ENDPOINT")
            .map(|v| Url::parse(&v).map_err(|_| ConfigError::Invalid("INTROSPECTION_ENDPOINT")))
            .transpose()?;

        let credential = match (
            get("INTROSPECTION_KEY_PATH"),
            get("INTROSPECTION_CLIENT_ID"),
            get("INTROSPECTION_CLIENT_SECRET"),
        ) {
            (Some(_), Some(_), _) => {
                return Err(ConfigError::Conflict(
                    "INTROSPECTION_KEY_PATH",
                    "INTROSPECTION_CLIENT_ID",
                ));
            }
            (Some(path), None, _) => CredentialSource::KeyFile(PathBuf::from(path)),
            (None, Some(client_id), Some(client_secret)) => CredentialSource::ClientSecret {
                client_id,
                client_secret,
            },
            (None, Some(_), None) => return Err(ConfigError::Missing("INTROSPECTION_CLIENT_SECRET")),
            (None, None, _) => return Err(ConfigError::Missing("INTROSPECTION_KEY_PATH")),
        };

        let introspection_timeout = Duration::from_millis(parse_or(
            get("INTROSPECTION_TIMEOUT_MS"),
            "INTROSPECTION_TIMEOUT_MS",
            3_000u64,
        )?);
        if introspection_timeout.is_zero() {
            return Err(ConfigError::Invalid("INTROSPECTION_TIMEOUT_MS"));
        }

        let max_staleness = Duration::from_secs(parse_or(
            get("CACHE_MAX_STALENESS_SECONDS"),
            "CACHE_MAX_STALENESS_SECONDS",
            60u64,
        )?);
        let negative_ttl = Duration::from_secs(parse_or(
            get("CACHE_NEGATIVE_TTL_SECONDS"),
            "CACHE_NEGATIVE_TTL_SECONDS",
            5u64,
        )?);
        // Negative entries must stay short-lived.
        if negative_ttl > max_staleness {
            return Err(ConfigError::Invalid("CACHE_NEGATIVE_TTL_SECONDS"));
        }
        let capacity = NonZeroUsize::new(parse_or(get("CACHE_CAPACITY"), "CACHE_CAPACITY", 10_000usize)?)
            .ok_or(ConfigError::Invalid("CACHE_CAPACITY"))?;

        let response_format = match get("RESPONSE_FORMAT") {
            Some(v) => v
                .parse::<ResponseFormat>()
                .map_err(|_| ConfigError::Invalid("RESPONSE_FORMAT"))?,
            None => ResponseFormat::default(),
        };

        let http_request_timeout = Duration::from_secs(parse_or(
            get("HTTP_REQUEST_TIMEOUT_SECONDS"),
            "HTTP_REQUEST_TIMEOUT_SECONDS",
            30u64,
        )?);
        // One introspection may take two attempts; the outer request timeout
        // must leave room for both so a slow upstream still answers 503.
        if http_request_timeout.is_zero() || http_request_timeout <= introspection_timeout * 2 {
            return Err(ConfigError::Invalid("HTTP_REQUEST_TIMEOUT_SECONDS"));
        }

        Ok(Self {
            addr,
            app_env,
            issuer,
            introspection_endpoint,
            credential,
            introspection_timeout,
            cache_policy: CachePolicy {
                max_staleness,
                negative_ttl,
                capacity,
            },
            response_format,
            http_request_timeout,
        })
    }
}

fn parse_or<T: FromStr>(raw: Option<String>, key: &'static str, default: T) -> Result<T, ConfigError> {
    match raw {
        Some(v) => v.parse().map_err(|_| ConfigError::Invalid(key)),
        None => Ok(default),
    }
}
