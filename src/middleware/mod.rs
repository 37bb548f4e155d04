/*
 * Responsibility
 * - middleware の公開インターフェース
 * - http: 全ルート共通の transport 層, auth: 保護ルート用の gate
 */
pub mod auth;
pub mod http;
