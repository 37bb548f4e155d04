/*
 * Responsibility
 * - Handler から見える「認証済みコンテキスト」の型
 * - middleware が introspection 結果から組み立てて request extensions に格納し、handler はこの型だけを受け取る
 *
 * Notes
 * - introspection / cache の詳細は services 側の責務
 */
use std::collections::BTreeSet;

use serde::Serialize;

/// 認証済みのリクエストに付与されるコンテキスト
///
/// - `subject` は authorization server が返した `sub` (無い場合もある)
/// - `scopes` は `scope` を空白で分割したもの
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthCtx {
    pub subject: Option<String>,
    pub scopes: BTreeSet<String>,
}

impl AuthCtx {
    pub fn new(subject: Option<String>, scopes: BTreeSet<String>) -> Self {
        Self { subject, scopes }
    }
}
