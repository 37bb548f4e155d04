use std::sync::Arc;

use axum::{
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};

use super::marshaller::{JsonMarshaller, Marshaller};
use crate::error::AuthError;

/// Turns a rejected request into a response (401 / 503), using the
/// configured [`Marshaller`] for the body.
#[derive(Clone)]
pub struct ResponseWriter {
    marshaller: Arc<dyn Marshaller>,
}

impl std::fmt::Debug for ResponseWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseWriter").finish_non_exhaustive()
    }
}

impl Default for ResponseWriter {
    fn default() -> Self {
        Self::new(Arc::new(JsonMarshaller))
    }
}

impl ResponseWriter {
    pub fn new(marshaller: Arc<dyn Marshaller>) -> Self {
        Self { marshaller }
    }

    pub fn write(&self, err: &AuthError) -> Response {
        let status = err.status();

        let marshalled = match self.marshaller.marshal(&err.to_response()) {
            Ok(m) => m,
            Err(e) => {
                tracing::error!(error = %e, "failed to marshal error response");
                return fallback();
            }
        };

        let mut resp = (status, marshalled.bytes).into_response();
        let headers = resp.headers_mut();
        headers.insert(header::CONTENT_TYPE, marshalled.content_type);

        // RFC 6750 §3: no error code when the request carried no usable credential.
        match err {
            AuthError::ClientCredential => {
                headers.insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
            }
            AuthError::TokenInactive => {
                headers.insert(
                    header::WWW_AUTHENTICATE,
                    HeaderValue::from_static(r#"Bearer error="invalid_token""#),
                );
            }
            _ => {}
        }

        resp
    }
}

fn fallback() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        "internal server error",
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorResponse;
    use crate::response::marshaller::{MarshalError, Marshalled, PlainTextMarshaller};

    struct Broken;

    impl Marshaller for Broken {
        fn marshal(&self, _body: &ErrorResponse) -> Result<Marshalled, MarshalError> {
            Err(MarshalError("broken".into()))
        }
    }

    #[test]
    fn denied_is_401_with_challenge() {
        let resp = ResponseWriter::default().write(&AuthError::TokenInactive);
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(resp.headers()[header::CONTENT_TYPE], "application/json");
        assert_eq!(
            resp.headers()[header::WWW_AUTHENTICATE],
            r#"Bearer error="invalid_token""#
        );
    }

    #[test]
    fn service_error_is_503_without_challenge() {
        let resp = ResponseWriter::default().write(&AuthError::UpstreamTransport("t".into()));
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(resp.headers().get(header::WWW_AUTHENTICATE).is_none());
    }

    #[test]
    fn marshaller_is_swappable() {
        let resp = ResponseWriter::new(Arc::new(PlainTextMarshaller)).write(&AuthError::ClientCredential);
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            resp.headers()[header::CONTENT_TYPE],
            "text/plain; charset=utf-8"
        );
        assert_eq!(resp.headers()[header::WWW_AUTHENTICATE], "Bearer");
    }

    #[test]
    fn marshal_failure_falls_back_to_500() {
        let resp = ResponseWriter::new(Arc::new(Broken)).write(&AuthError::ClientCredential);
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            resp.headers()[header::CONTENT_TYPE],
            "text/plain; charset=utf-8"
        );
    }
}
