/*
 * Responsibility
 * - v1 の URL 構造を定義
 * - /health は公開、それ以外は introspection gate の内側に置く
 */
use axum::{Router, routing::get};

use crate::api::v1::handlers::{health::health, me::me};
use crate::middleware;
use crate::state::AppState;

pub fn routes(state: AppState) -> Router<AppState> {
    let public = Router::new().route("/health", get(health));

    let protected = Router::new().route("/me", get(me));
    let protected = middleware::auth::introspection::apply(protected, state);

    public.merge(protected)
}
