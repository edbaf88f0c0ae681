//! リプレイ閲覧HTTP API
//! 一覧・統計・閲覧セッション・再生データ・パフォーマンス情報を公開する。

pub mod dto;
pub mod handlers;
pub mod middleware;
pub mod routes;

pub use dto::*;
pub use handlers::AppState;
pub use routes::{create_configured_router, create_router};
