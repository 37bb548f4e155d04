/*
 * Responsibility
 * - tracing / panic hook の初期化
 * - Config読み込み → gate 生成 (discovery, credential 検証) → Router 組み立て
 * - axum::serve() で起動
 *
 * Notes
 * - service credential や introspection endpoint の問題は起動時に失敗させる
 */
use std::{panic, process, time::Duration};

use anyhow::{Context, Result};
use axum::Router;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::response::ResponseWriter;
use crate::services::auth::build_gate;
use crate::state::AppState;
use crate::{api, middleware};

fn init_tracing() {
    // RUST_LOG があればそれを優先
    // 例: RUST_LOG=info,introspection_gate=debug,tower_http=debug cargo run
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,tower_http=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn init_panic_hook(abort_on_panic: bool) {
    let default_hook = panic::take_hook();

    panic::set_hook(Box::new(move |info| {
        // stderr が見えない起動方法でも panic を残す
        tracing::error!(?info, "panic");

        // development: 即座にプロセスを落とす / production: default hook に任せて継続
        if abort_on_panic {
            process::abort();
        } else {
            default_hook(info);
        }
    }))
}

pub async fn run() -> Result<()> {
    init_tracing();
    let config = Config::from_env().context("failed to load configuration")?;
    init_panic_hook(!config.app_env.is_production());

    tracing::info!(
        "starting introspection gate in {:?} mode on {}",
        config.app_env,
        config.addr
    );

    let state = build_state(&config).await?;
    let app = build_router(state, config.http_request_timeout);

    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("failed to bind {}", config.addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    Ok(())
}

async fn build_state(config: &Config) -> Result<AppState> {
    let gate = build_gate(config)
        .await
        .context("failed to initialize the authorization gate")?;
    let writer = ResponseWriter::new(config.response_format.marshaller());

    tracing::info!(
        response_format = %config.response_format,
        max_staleness = ?config.cache_policy.max_staleness,
        negative_ttl = ?config.cache_policy.negative_ttl,
        capacity = config.cache_policy.capacity.get(),
        "authorization gate ready"
    );

    Ok(AppState::new(gate, writer))
}

pub fn build_router(state: AppState, request_timeout: Duration) -> Router {
    let router = Router::new()
        .nest("/api/v1", api::v1::routes(state.clone()))
        .with_state(state);

    middleware::http::apply(router, request_timeout)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        return;
    }
    tracing::info!("shutdown signal received");
}
