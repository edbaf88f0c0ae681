//! リプレイ閲覧APIハンドラー

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::dto::{
    CreateViewerResponse, ErrorResponse, HealthResponse, PerformanceResponse, ReplayListQuery,
    ReplayListResponse, ReplaySummary, StatisticsResponse, TimelineResponse, ViewerApiError,
};
use crate::analytics::{Paginator, ReplayQuery, StatisticsAggregator};
use crate::config::Config;
use crate::game::Player;
use crate::monitor::{PerformanceMonitor, SharedMonitor};
use crate::session::ViewerSessionManager;
use crate::source::ReplayCatalog;

type ApiError = (StatusCode, Json<ErrorResponse>);

/// ハンドラー間で共有する状態
#[derive(Debug, Clone)]
pub struct AppState {
    pub catalog: Arc<ReplayCatalog>,
    pub sessions: ViewerSessionManager,
    pub monitor: SharedMonitor,
    pub tracked_player: Player,
}

impl AppState {
    pub fn new(catalog: ReplayCatalog, sessions: ViewerSessionManager, monitor: SharedMonitor, tracked_player: Player) -> Self {
        Self {
            catalog: Arc::new(catalog),
            sessions,
            monitor,
            tracked_player,
        }
    }

    /// 設定に従って状態を組み立てる
    /// 初期盤面はカタログ（供給元）が申告したものを設定値より優先する
    pub fn from_config(config: &Config, catalog: ReplayCatalog) -> Self {
        let mut settings = config.viewer_settings();
        if let Some(initial_board) = catalog.initial_board() {
            if initial_board != settings.initial_board {
                tracing::info!(
                    configured = ?settings.initial_board,
                    source = ?initial_board,
                    "using the initial board declared by the replay source"
                );
            }
            settings.initial_board = initial_board;
        }

        let sessions = ViewerSessionManager::with_settings(
            config.viewer.max_sessions,
            config.viewer.session_timeout_minutes,
            settings,
        );
        let monitor = Arc::new(Mutex::new(PerformanceMonitor::new(
            config.monitor.thresholds(),
            config.monitor.memory_probe(),
        )));

        Self::new(catalog, sessions, monitor, config.replay.tracked_player)
    }

    async fn record_render_time(&self, started: Instant) {
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        self.monitor.lock().await.record_sample(elapsed_ms);
    }
}

pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        replays: state.catalog.len(),
        viewer_sessions: state.sessions.session_count(),
    })
}

pub async fn list_replays(
    State(state): State<AppState>,
    Query(query): Query<ReplayListQuery>,
) -> Result<Json<ReplayListResponse>, ApiError> {
    let started = Instant::now();
    let parsed = query.parse()?;

    let matched = ReplayQuery::new(state.tracked_player).apply(
        state.catalog.replays(),
        &parsed.filter,
        &parsed.sort,
        None,
    );

    let mut paginator = Paginator::new(matched.len(), parsed.page_size);
    let replays = if matched.is_empty() && parsed.page == 0 {
        Vec::new()
    } else {
        paginator
            .load_page(parsed.page)
            .map_err(ViewerApiError::from)?;
        paginator
            .page_items(&matched, parsed.page)
            .iter()
            .map(|replay| ReplaySummary::from_replay(replay))
            .collect()
    };

    state.record_render_time(started).await;

    Ok(Json(ReplayListResponse {
        replays,
        total_count: matched.len(),
        page: parsed.page,
        page_size: paginator.page_size(),
        total_pages: paginator.total_pages(),
    }))
}

pub async fn get_statistics(State(state): State<AppState>) -> Json<StatisticsResponse> {
    let statistics = StatisticsAggregator::new(state.tracked_player).statistics(state.catalog.replays());

    Json(StatisticsResponse {
        statistics,
        rejected_replays: state.catalog.rejected().len(),
    })
}

pub async fn create_viewer(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<CreateViewerResponse>), ApiError> {
    match state.sessions.create_session() {
        Ok((viewer_id, created_at)) => Ok((StatusCode::CREATED, Json(CreateViewerResponse { viewer_id, created_at }))),
        Err(err) => Err(err.into()),
    }
}

pub async fn delete_viewer(
    State(state): State<AppState>,
    Path(viewer_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    match state.sessions.remove_session(&viewer_id) {
        Ok(()) => Ok(StatusCode::NO_CONTENT),
        Err(err) => Err(err.into()),
    }
}

pub async fn get_timeline(
    State(state): State<AppState>,
    Path((viewer_id, replay_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<TimelineResponse>, ApiError> {
    let started = Instant::now();

    let replay = state
        .catalog
        .get(&replay_id)
        .ok_or(ViewerApiError::ReplayNotFound { replay_id })?;
    let timeline = state.sessions.build_timeline(&viewer_id, replay)?;
    let response = TimelineResponse::from_timeline(replay_id, &timeline);

    state.record_render_time(started).await;
    Ok(Json(response))
}

pub async fn get_performance(State(state): State<AppState>) -> Json<PerformanceResponse> {
    let monitor = state.monitor.lock().await;

    Json(PerformanceResponse {
        metrics: monitor.metrics(),
        suggestions: monitor.suggestions(),
    })
}
