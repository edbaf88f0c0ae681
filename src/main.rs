//! リプレイ閲覧APIサーバーのエントリポイント
//! 設定読み込み、リプレイ取り込み、監視タスク起動、HTTPサーバー起動を行う。

use std::sync::Arc;
use std::time::Duration;

use reversi_replay::{
    api::{create_configured_router, AppState},
    config::Config,
    monitor::spawn_sampler,
    source::{ReplayCatalog, ReplaySourceFactory},
};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("設定読み込み失敗: {}", e);
            std::process::exit(1);
        }
    };
    if let Err(e) = config.validate() {
        tracing::error!("設定エラー: {}", e);
        std::process::exit(1);
    }

    tracing::info!(
        host = %config.server.host,
        port = config.server.port,
        initial_board = ?config.replay.initial_board,
        tracked_player = ?config.replay.tracked_player,
        source = ?config.source.source_type,
        "設定読み込み完了"
    );

    let source = match ReplaySourceFactory::create_source(&config.source) {
        Ok(source) => source,
        Err(e) => {
            tracing::error!("リプレイ供給元の作成失敗: {}", e);
            std::process::exit(1);
        }
    };
    let catalog = match ReplayCatalog::load(source.as_ref()).await {
        Ok(catalog) => catalog,
        Err(e) => {
            tracing::error!("リプレイ読み込み失敗 ({}): {}", source.name(), e);
            std::process::exit(1);
        }
    };
    if !catalog.rejected().is_empty() {
        tracing::warn!(rejected = catalog.rejected().len(), "取り込めなかったリプレイを除外しました");
    }

    let state = AppState::from_config(&config, catalog);

    let sampler = config
        .monitor
        .enabled
        .then(|| spawn_sampler(Arc::clone(&state.monitor), config.monitor.sample_interval));

    let cleanup = config.viewer.enable_session_cleanup.then(|| {
        let period = Duration::from_secs(config.viewer.cleanup_interval_minutes.max(1).saturating_mul(60));
        state.sessions.spawn_cleanup(period)
    });

    let app = create_configured_router(state, &config.server);

    let bind_address = format!("{}:{}", config.server.host, config.server.port);
    let listener = match TcpListener::bind(&bind_address).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("アドレスバインド失敗 {}: {}", bind_address, e);
            std::process::exit(1);
        }
    };

    tracing::info!("リプレイ閲覧APIサーバー開始: {}", bind_address);

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!("シグナル待機失敗: {}", e);
            }
        })
        .await;

    if let Some(sampler) = sampler {
        sampler.stop();
    }
    if let Some(cleanup) = cleanup {
        cleanup.stop();
    }

    match served {
        Ok(()) => tracing::info!("サーバー停止"),
        Err(e) => {
            tracing::error!("サーバーエラー: {}", e);
            std::process::exit(1);
        }
    }
}
