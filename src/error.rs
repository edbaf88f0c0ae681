//! アプリケーション全体のエラー定義モジュール
//! 盤面再構築、分析、ウィンドウ処理、リプレイ取り込みのエラーを統一管理。

use thiserror::Error;
use uuid::Uuid;

/// リプレイエンジンの呼び出し規約違反を表すエラー
/// データ不足ではなく呼び出し側のバグを示すものだけをここに置く
#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("Coordinate out of range at move {move_number}: ({x}, {y})")]
    CoordinateOutOfRange { move_number: u32, x: u8, y: u8 },

    #[error("Unknown sort field: {field}")]
    UnknownSortField { field: String },

    #[error("Page {page} is out of range (total pages: {total_pages})")]
    PageOutOfRange { page: usize, total_pages: usize },

    #[error("Invalid window geometry: {reason}")]
    InvalidWindow { reason: String },

    #[error("Replay validation failed: {source}")]
    Validation {
        #[from]
        source: ValidationError,
    },
}

/// 取り込み時の検証で見つかった問題の一覧
/// 呼び出し側がすべての問題を一度に報告できるよう、理由を全件保持する
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("replay {replay_id}: {}", reasons.join("; "))]
pub struct ValidationError {
    pub replay_id: Uuid,
    pub reasons: Vec<String>,
}

/// リプレイ供給元に関連するエラー
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("File I/O error: {source}")]
    IoError {
        #[from]
        source: std::io::Error,
    },

    #[error("Replay data parse error: {source}")]
    ParseError {
        #[from]
        source: serde_json::Error,
    },

    #[error("Replay source unavailable: {source_name} - {reason}")]
    Unavailable { source_name: String, reason: String },

    #[error("Replay source configuration error: {message}")]
    ConfigurationError { message: String },
}

/// リプレイエラーをベースとした結果型
pub type Result<T> = std::result::Result<T, ReplayError>;
