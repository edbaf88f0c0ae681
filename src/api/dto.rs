//! リプレイ閲覧API データ転送オブジェクト (DTO)

use axum::{http::StatusCode, response::Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

use crate::analytics::{
    DateRange, FilterSpec, OpponentFilter, RatingRange, ResultFilter, SortDirection, SortField,
    SortSpec, Statistics,
};
use crate::engine::EnrichedMove;
use crate::error::{ReplayError, SourceError};
use crate::game::{Analysis, BoardState, GameMode, Replay, Winner};
use crate::monitor::PerformanceMetrics;
use crate::session::ReplayTimeline;

/// 一覧取得のデフォルトページサイズ
pub const DEFAULT_PAGE_SIZE: usize = 20;
/// 一覧取得のページサイズ上限
pub const MAX_PAGE_SIZE: usize = 100;

/// リプレイ一覧のクエリパラメータ
/// 複数値はカンマ区切りで受け取る
#[derive(Debug, Default, Deserialize)]
pub struct ReplayListQuery {
    pub modes: Option<String>,
    pub opponent: Option<String>,
    pub result: Option<String>,
    pub q: Option<String>,
    pub tags: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub min_duration: Option<u64>,
    pub max_duration: Option<u64>,
    pub min_rating: Option<i32>,
    pub max_rating: Option<i32>,
    pub sort: Option<String>,
    pub direction: Option<String>,
    pub page: Option<usize>,
    pub page_size: Option<usize>,
}

/// 解釈済みの一覧クエリ
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedReplayQuery {
    pub filter: FilterSpec,
    pub sort: SortSpec,
    pub page: usize,
    pub page_size: usize,
}

impl ReplayListQuery {
    pub fn parse(self) -> ViewerResult<ParsedReplayQuery> {
        let modes = split_list(self.modes.as_deref())
            .map(|mode| mode.parse::<GameMode>())
            .collect::<Result<BTreeSet<_>, _>>()
            .map_err(|details| ViewerApiError::BadRequest { details })?;

        let opponent = match self.opponent.as_deref().map(str::to_lowercase).as_deref() {
            None | Some("any") => OpponentFilter::Any,
            Some("human") => OpponentFilter::Human,
            Some("ai") => OpponentFilter::Ai,
            Some(other) => {
                return Err(ViewerApiError::BadRequest {
                    details: format!("Invalid opponent: {}. Valid options: any, human, ai", other),
                })
            }
        };

        let result = match self.result.as_deref().map(str::to_lowercase).as_deref() {
            None | Some("any") => ResultFilter::Any,
            Some("win") => ResultFilter::Win,
            Some("loss") => ResultFilter::Loss,
            Some("draw") => ResultFilter::Draw,
            Some(other) => {
                return Err(ViewerApiError::BadRequest {
                    details: format!("Invalid result: {}. Valid options: any, win, loss, draw", other),
                })
            }
        };

        let date_range = match (self.from, self.to) {
            (None, None) => None,
            (from, to) => Some(DateRange {
                from: from.unwrap_or(DateTime::<Utc>::MIN_UTC),
                to: to.unwrap_or(DateTime::<Utc>::MAX_UTC),
            }),
        };

        let rating_range = match (self.min_rating, self.max_rating) {
            (None, None) => None,
            (min, max) => Some(RatingRange {
                min: min.unwrap_or(i32::MIN),
                max: max.unwrap_or(i32::MAX),
            }),
        };

        let field = match self.sort.as_deref() {
            Some(field) => field.parse::<SortField>()?,
            None => SortField::default(),
        };
        let direction = match self.direction.as_deref() {
            Some(direction) => direction
                .parse::<SortDirection>()
                .map_err(|details| ViewerApiError::BadRequest { details })?,
            None => SortDirection::default(),
        };

        Ok(ParsedReplayQuery {
            filter: FilterSpec {
                modes,
                opponent,
                result,
                date_range,
                min_duration_secs: self.min_duration,
                max_duration_secs: self.max_duration,
                rating_range,
                tags: split_list(self.tags.as_deref()).map(str::to_string).collect(),
                query: self.q.filter(|q| !q.trim().is_empty()),
            },
            sort: SortSpec::new(field, direction),
            page: self.page.unwrap_or(0),
            page_size: self.page_size.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
        })
    }
}

fn split_list(value: Option<&str>) -> impl Iterator<Item = &str> {
    value
        .into_iter()
        .flat_map(|list| list.split(','))
        .map(str::trim)
        .filter(|item| !item.is_empty())
}

/// 一覧表示用のリプレイ要約
#[derive(Debug, Clone, Serialize)]
pub struct ReplaySummary {
    pub id: Uuid,
    pub mode: GameMode,
    pub player_black: String,
    pub player_white: String,
    pub winner: Winner,
    pub score: (u8, u8),
    pub start_time: DateTime<Utc>,
    pub duration_secs: u64,
    pub total_moves: usize,
    pub rating: Option<i32>,
    pub tags: Vec<String>,
}

impl ReplaySummary {
    pub fn from_replay(replay: &Replay) -> Self {
        Self {
            id: replay.id,
            mode: replay.mode,
            player_black: replay.player_black.name.clone(),
            player_white: replay.player_white.name.clone(),
            winner: replay.result.winner,
            score: (replay.result.final_score.black, replay.result.final_score.white),
            start_time: replay.game_info.start_time,
            duration_secs: replay.game_info.duration_secs,
            total_moves: replay.game_info.total_moves,
            rating: replay.metadata.rating,
            tags: replay.metadata.tags.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ReplayListResponse {
    pub replays: Vec<ReplaySummary>,
    pub total_count: usize,
    pub page: usize,
    pub page_size: usize,
    pub total_pages: usize,
}

#[derive(Debug, Serialize)]
pub struct StatisticsResponse {
    #[serde(flatten)]
    pub statistics: Statistics,
    pub rejected_replays: usize,
}

#[derive(Debug, Serialize)]
pub struct CreateViewerResponse {
    pub viewer_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// 1局分の再生用データ
#[derive(Debug, Serialize)]
pub struct TimelineResponse {
    pub replay_id: Uuid,
    pub has_initial_state: bool,
    pub board_states: Vec<Vec<Vec<u8>>>,
    pub moves: Vec<EnrichedMove>,
    pub turning_points: Vec<usize>,
    pub analysis: Analysis,
}

impl TimelineResponse {
    pub fn from_timeline(replay_id: Uuid, timeline: &ReplayTimeline) -> Self {
        Self {
            replay_id,
            has_initial_state: timeline.board.offset.has_initial_state,
            board_states: timeline.board.board_states.iter().map(encode_board).collect(),
            moves: timeline.moves.to_vec(),
            turning_points: timeline.board.turning_points.clone(),
            analysis: timeline.analysis.clone(),
        }
    }
}

/// 盤面を 0: 空, 1: 黒, 2: 白 の行列に変換する
fn encode_board(board: &BoardState) -> Vec<Vec<u8>> {
    board
        .rows()
        .iter()
        .map(|row| {
            row.iter()
                .map(|cell| match cell {
                    crate::game::Cell::Empty => 0,
                    crate::game::Cell::Black => 1,
                    crate::game::Cell::White => 2,
                })
                .collect()
        })
        .collect()
}

#[derive(Debug, Serialize)]
pub struct PerformanceResponse {
    pub metrics: PerformanceMetrics,
    pub suggestions: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub replays: usize,
    pub viewer_sessions: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub error_code: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            timestamp: Utc::now(),
            error_code: None,
        }
    }

    pub fn with_code(error: impl Into<String>, message: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            timestamp: Utc::now(),
            error_code: Some(code.into()),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ViewerApiError {
    #[error("閲覧セッションが見つかりません: {viewer_id}")]
    ViewerNotFound { viewer_id: Uuid },

    #[error("リプレイが見つかりません: {replay_id}")]
    ReplayNotFound { replay_id: Uuid },

    #[error("セッション制限に達しています (最大: {max})")]
    MaxSessionsReached { max: usize },

    #[error("無効なリクエストです: {details}")]
    BadRequest { details: String },

    #[error("リプレイ処理エラー: {0}")]
    Replay(#[from] ReplayError),

    #[error("リプレイ供給元エラー: {0}")]
    Source(#[from] SourceError),
}

impl ViewerApiError {
    pub fn error_code(&self) -> &'static str {
        match self {
            ViewerApiError::ViewerNotFound { .. } => "VIEWER_NOT_FOUND",
            ViewerApiError::ReplayNotFound { .. } => "REPLAY_NOT_FOUND",
            ViewerApiError::MaxSessionsReached { .. } => "MAX_SESSIONS_REACHED",
            ViewerApiError::BadRequest { .. } => "BAD_REQUEST",
            ViewerApiError::Replay(ReplayError::UnknownSortField { .. }) => "UNKNOWN_SORT_FIELD",
            ViewerApiError::Replay(ReplayError::PageOutOfRange { .. }) => "PAGE_OUT_OF_RANGE",
            ViewerApiError::Replay(_) => "REPLAY_ERROR",
            ViewerApiError::Source(_) => "SOURCE_ERROR",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ViewerApiError::ViewerNotFound { .. } => StatusCode::NOT_FOUND,
            ViewerApiError::ReplayNotFound { .. } => StatusCode::NOT_FOUND,
            ViewerApiError::MaxSessionsReached { .. } => StatusCode::TOO_MANY_REQUESTS,
            ViewerApiError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            ViewerApiError::Replay(ReplayError::CoordinateOutOfRange { .. }) => StatusCode::UNPROCESSABLE_ENTITY,
            ViewerApiError::Replay(ReplayError::Validation { .. }) => StatusCode::UNPROCESSABLE_ENTITY,
            ViewerApiError::Replay(_) => StatusCode::BAD_REQUEST,
            ViewerApiError::Source(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl From<ViewerApiError> for (StatusCode, Json<ErrorResponse>) {
    fn from(err: ViewerApiError) -> Self {
        let status_code = err.status_code();
        let error_response = ErrorResponse::with_code(err.error_code(), err.to_string(), err.error_code());

        (status_code, Json(error_response))
    }
}

pub type ViewerResult<T> = Result<T, ViewerApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_query_is_unconstrained() {
        let parsed = ReplayListQuery::default().parse().unwrap();

        assert!(parsed.filter.is_unconstrained());
        assert_eq!(parsed.sort, SortSpec::default());
        assert_eq!(parsed.page, 0);
        assert_eq!(parsed.page_size, DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn test_query_parsing() {
        let query = ReplayListQuery {
            modes: Some("ai, Quest".to_string()),
            opponent: Some("AI".to_string()),
            result: Some("win".to_string()),
            q: Some("  ".to_string()),
            tags: Some("endgame,,blitz".to_string()),
            min_rating: Some(1400),
            sort: Some("duration".to_string()),
            direction: Some("asc".to_string()),
            page_size: Some(1_000),
            ..ReplayListQuery::default()
        };
        let parsed = query.parse().unwrap();

        assert_eq!(parsed.filter.modes, BTreeSet::from([GameMode::Ai, GameMode::Quest]));
        assert_eq!(parsed.filter.opponent, OpponentFilter::Ai);
        assert_eq!(parsed.filter.result, ResultFilter::Win);
        assert_eq!(parsed.filter.query, None);
        assert_eq!(parsed.filter.tags.len(), 2);
        assert_eq!(parsed.filter.rating_range, Some(RatingRange { min: 1400, max: i32::MAX }));
        assert_eq!(parsed.sort, SortSpec::new(SortField::Duration, SortDirection::Ascending));
        assert_eq!(parsed.page_size, MAX_PAGE_SIZE);
    }

    #[test]
    fn test_invalid_query_values() {
        let unknown_sort = ReplayListQuery {
            sort: Some("elo".to_string()),
            ..ReplayListQuery::default()
        }
        .parse()
        .unwrap_err();
        assert_eq!(unknown_sort.error_code(), "UNKNOWN_SORT_FIELD");
        assert_eq!(unknown_sort.status_code(), StatusCode::BAD_REQUEST);

        let bad_mode = ReplayListQuery {
            modes: Some("ranked".to_string()),
            ..ReplayListQuery::default()
        }
        .parse()
        .unwrap_err();
        assert_eq!(bad_mode.error_code(), "BAD_REQUEST");
    }

    #[test]
    fn test_error_http_conversion() {
        let error = ViewerApiError::ViewerNotFound { viewer_id: Uuid::nil() };
        let (status, json_response): (StatusCode, Json<ErrorResponse>) = error.into();

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json_response.error, "VIEWER_NOT_FOUND");
        assert_eq!(json_response.error_code, Some("VIEWER_NOT_FOUND".to_string()));
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(ViewerApiError::MaxSessionsReached { max: 1 }.status_code(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            ViewerApiError::from(ReplayError::PageOutOfRange { page: 4, total_pages: 2 }).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ViewerApiError::from(SourceError::ConfigurationError { message: "x".to_string() }).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
