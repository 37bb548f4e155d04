//! bearer token → introspection gate → AuthCtx を extensions に入れる
//!
//! - Authorized: `AuthCtx { subject, scopes }` を request extensions に格納して次へ
//! - Denied: 401 (ResponseWriter)
//! - ServiceError: 503 (ResponseWriter)。wrapped handler は呼ばれない

use axum::{
    Router,
    body::Body,
    extract::State,
    http::{Request, header},
    middleware::{self, Next},
    response::Response,
};

use crate::api::v1::extractors::AuthCtx;
use crate::error::AuthError;
use crate::services::auth::AuthorizationDecision;
use crate::state::AppState;

/// Protect every route of `router` with the introspection gate.
///
/// 例：
/// ```ignore
/// let protected = Router::new().route("/me", get(me));
/// let protected = middleware::auth::introspection::apply(protected, state.clone());
/// ```
pub fn apply(router: Router<AppState>, state: AppState) -> Router<AppState> {
    // axum 0.8 の from_fn は State extractor を受け取れないため、`from_fn_with_state` で明示的に state を渡す
    router.route_layer(middleware::from_fn_with_state(state, introspection_middleware))
}

async fn introspection_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    // Non-ASCII header values are treated like a malformed credential.
    let authorization = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    let decision = state.gate.authorize(authorization).await;

    match decision {
        AuthorizationDecision::Authorized { subject, scopes } => {
            // middleware → extractor への受け渡し
            req.extensions_mut().insert(AuthCtx::new(subject, scopes));
            next.run(req).await
        }
        denied => match AuthError::from_decision(denied) {
            Some(err) => state.writer.write(&err),
            None => next.run(req).await,
        },
    }
}
