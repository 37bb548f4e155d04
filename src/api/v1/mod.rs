/*
 * Responsibility
 * - v1 の公開面 (routes() の re-export など)
 */
pub mod extractors;
pub mod handlers;
mod routes;

pub use routes::routes;
