use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};
use tower::ServiceBuilder;

use super::{
    handlers::{
        create_viewer, delete_viewer, get_performance, get_statistics, get_timeline, health_check,
        list_replays, AppState,
    },
    middleware::{cors, logging},
};
use crate::config::ServerConfig;

fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/replays", get(list_replays))
        .route("/api/replays/statistics", get(get_statistics))
        .route("/api/viewers", post(create_viewer))
        .route("/api/viewers/:viewer_id", delete(delete_viewer))
        .route("/api/viewers/:viewer_id/replays/:replay_id/timeline", get(get_timeline))
        .route("/api/performance", get(get_performance))
}

/// ログとCORSを常に有効にしたルーター
pub fn create_router(state: AppState) -> Router {
    routes()
        .layer(
            ServiceBuilder::new()
                .layer(middleware::from_fn(logging))
                .layer(middleware::from_fn(cors)),
        )
        .with_state(state)
}

/// サーバー設定に従ってミドルウェアを選ぶルーター
pub fn create_configured_router(state: AppState, server: &ServerConfig) -> Router {
    let mut router = routes();
    if server.enable_cors {
        router = router.layer(middleware::from_fn(cors));
    }
    if server.enable_logging {
        router = router.layer(middleware::from_fn(logging));
    }
    router.with_state(state)
}
