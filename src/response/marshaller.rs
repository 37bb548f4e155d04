//! Error-body encodings. Bytes and content type travel together so the
//! writer never pairs a body with the wrong header.
use std::{fmt, str::FromStr, sync::Arc};

use axum::http::HeaderValue;
use thiserror::Error;

use crate::error::ErrorResponse;

#[derive(Debug, Clone)]
pub struct Marshalled {
    pub bytes: Vec<u8>,
    pub content_type: HeaderValue,
}

#[derive(Debug, Error)]
#[error("cannot marshal error response: {0}")]
pub struct MarshalError(pub String);

pub trait Marshaller: Send + Sync + 'static {
    fn marshal(&self, body: &ErrorResponse) -> Result<Marshalled, MarshalError>;
}

/// `application/json`: `{"error":{"code":"...","message":"..."}}`
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonMarshaller;

impl Marshaller for JsonMarshaller {
    fn marshal(&self, body: &ErrorResponse) -> Result<Marshalled, MarshalError> {
        let bytes = serde_json::to_vec(body).map_err(|e| MarshalError(e.to_string()))?;
        Ok(Marshalled {
            bytes,
            content_type: HeaderValue::from_static("application/json"),
        })
    }
}

/// `text/plain`: `CODE: message`
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextMarshaller;

impl Marshaller for PlainTextMarshaller {
    fn marshal(&self, body: &ErrorResponse) -> Result<Marshalled, MarshalError> {
        let text = format!("{}: {}", body.error.code, body.error.message);
        Ok(Marshalled {
            bytes: text.into_bytes(),
            content_type: HeaderValue::from_static("text/plain; charset=utf-8"),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseFormat {
    #[default]
    Json,
    Text,
}

impl ResponseFormat {
    pub fn marshaller(self) -> Arc<dyn Marshaller> {
        match self {
            ResponseFormat::Json => Arc::new(JsonMarshaller),
            ResponseFormat::Text => Arc::new(PlainTextMarshaller),
        }
    }
}

impl FromStr for ResponseFormat {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "text" | "plain" => Ok(Self::Text),
            _ => Err(()),
        }
    }
}

impl fmt::Display for ResponseFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseFormat::Json => write!(f, "json"),
            ResponseFormat::Text => write!(f, "text"),
        }
    }
}
