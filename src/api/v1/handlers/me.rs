/*
 * Responsibility
 * - GET /me (保護ルート)
 * - gate が認可した subject / scopes をそのまま返す
 */
use axum::Json;

use crate::api::v1::extractors::{AuthCtx, AuthCtxExtractor};

pub async fn me(AuthCtxExtractor(ctx): AuthCtxExtractor) -> Json<AuthCtx> {
    Json(ctx)
}
