/*
 * Responsibility
 * - Router に紐づける共有コンテキスト (AppState)
 *   - gate: introspection + cache, writer: 拒否レスポンスの生成
 * - Clone 前提で持つ (内部は Arc/Clone cheap)
 */
use std::sync::Arc;

use crate::response::ResponseWriter;
use crate::services::auth::AuthorizationGate;

#[derive(Clone, Debug)]
pub struct AppState {
    pub gate: Arc<AuthorizationGate>,
    pub writer: ResponseWriter,
}

impl AppState {
    pub fn new(gate: Arc<AuthorizationGate>, writer: ResponseWriter) -> Self {
        Self { gate, writer }
    }
}
