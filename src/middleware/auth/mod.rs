/*
 * Responsibility
 * - 認可系 middleware (introspection gate) の公開
 */
pub mod introspection;
