/*
 * Responsibility
 * - crate のモジュール構成 (binary と integration test の両方から使う)
 */
pub mod api;
pub mod app;
pub mod config;
pub mod error;
pub mod middleware;
pub mod response;
pub mod services;
pub mod state;
