//! アプリケーション設定管理モジュール
//! サーバー、キャッシュ、再構築、閲覧セッション、監視、リプレイ供給元の設定を
//! 設定ファイルと環境変数から読み込んで管理する。

use serde::{Deserialize, Serialize};
use std::{env, fs, path::Path, path::PathBuf, str::FromStr, time::Duration};

use crate::game::{InitialBoard, Player};
use crate::monitor::{MemoryProbe, NoMemoryProbe, PerformanceThresholds, ProcessMemoryProbe};
use crate::session::ViewerCacheSettings;
use crate::source::{ReplaySourceType, SourceConfig};

/// 設定ファイルの探索順
const CONFIG_SEARCH_PATHS: [&str; 3] = ["config.json", "config/app.json", "/etc/reversi-replay/config.json"];

const BYTES_PER_MB: u64 = 1024 * 1024;

/// Duration型をJSONでシリアライズするためのモジュール
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    /// Durationを(secs, nanos)のタプルとしてシリアライズ
    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_secs(), duration.subsec_nanos()).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let (secs, nanos) = <(u64, u32)>::deserialize(deserializer)?;
        Ok(Duration::new(secs, nanos))
    }
}

/// サーバーの設定
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    pub enable_cors: bool,
    pub enable_logging: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            host: "0.0.0.0".to_string(),
            enable_cors: true,
            enable_logging: true,
        }
    }
}

/// セッションごとのキャッシュ容量
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    pub enrichment_capacity: usize,
    pub board_state_capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enrichment_capacity: 10,
            board_state_capacity: 5,
        }
    }
}

/// 再構築と集計の設定
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayConfig {
    /// 再構築の起点となる盤面
    pub initial_board: InitialBoard,
    /// 勝敗を判定する側
    pub tracked_player: Player,
    pub turning_point_threshold: i32,
    pub fill_missing_evaluations: bool,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            initial_board: InitialBoard::Empty,
            tracked_player: Player::Black,
            turning_point_threshold: 20,
            fill_missing_evaluations: false,
        }
    }
}

/// 閲覧セッションの設定
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewerConfig {
    pub max_sessions: usize,
    pub session_timeout_minutes: i64,
    pub enable_session_cleanup: bool,
    pub cleanup_interval_minutes: u64,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            max_sessions: 100,
            session_timeout_minutes: 30,
            enable_session_cleanup: true,
            cleanup_interval_minutes: 5,
        }
    }
}

/// パフォーマンス監視の設定
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorConfig {
    pub enabled: bool,
    #[serde(with = "duration_serde")]
    pub sample_interval: Duration,
    pub sample_window: usize,
    pub frame_budget_ms: f64,
    pub slow_render_ms: f64,
    pub max_frame_drops: usize,
    pub memory_usage_ratio: f64,
    /// メモリ上限（MB）。0ならメモリは計測しない
    pub memory_limit_mb: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        let thresholds = PerformanceThresholds::default();
        Self {
            enabled: true,
            sample_interval: Duration::from_secs(5),
            sample_window: thresholds.sample_window,
            frame_budget_ms: thresholds.frame_budget_ms,
            slow_render_ms: thresholds.slow_render_ms,
            max_frame_drops: thresholds.max_frame_drops,
            memory_usage_ratio: thresholds.memory_usage_ratio,
            memory_limit_mb: 512,
        }
    }
}

impl MonitorConfig {
    pub fn thresholds(&self) -> PerformanceThresholds {
        PerformanceThresholds {
            sample_window: self.sample_window,
            frame_budget_ms: self.frame_budget_ms,
            slow_render_ms: self.slow_render_ms,
            max_frame_drops: self.max_frame_drops,
            memory_usage_ratio: self.memory_usage_ratio,
        }
    }

    /// メモリ上限（バイト）。桁あふれする値は上限で止める
    pub fn memory_limit_bytes(&self) -> u64 {
        self.memory_limit_mb.saturating_mul(BYTES_PER_MB)
    }

    pub fn memory_probe(&self) -> Box<dyn MemoryProbe> {
        if self.memory_limit_mb == 0 {
            Box::new(NoMemoryProbe)
        } else {
            Box::new(ProcessMemoryProbe::new(self.memory_limit_bytes()))
        }
    }
}

/// アプリケーションの全設定
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub cache: CacheConfig,
    pub replay: ReplayConfig,
    pub viewer: ViewerConfig,
    pub monitor: MonitorConfig,
    pub source: SourceConfig,
}

/// 設定関連のエラー
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("設定ファイル読み込みエラー: {0}")]
    FileReadError(#[from] std::io::Error),

    #[error("設定ファイル解析エラー: {0}")]
    ParseError(#[from] serde_json::Error),

    #[error("環境変数エラー: {name} = {value}")]
    EnvVarError { name: String, value: String },

    #[error("設定値が無効です: {field} = {value}")]
    InvalidValue { field: String, value: String },
}

/// 環境変数を読み、設定されていれば解釈する
fn env_value<T: FromStr>(name: &str) -> Result<Option<T>, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::EnvVarError {
                name: name.to_string(),
                value,
            }),
        Err(_) => Ok(None),
    }
}

impl Config {
    /// 指定したファイルパスから設定を読み込む
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// デフォルト値を環境変数で上書きした設定
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Config::default();
        config.apply_env()?;
        Ok(config)
    }

    /// 設定されている環境変数だけを上書きする
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Some(port) = env_value("SERVER_PORT")? {
            self.server.port = port;
        }
        if let Ok(host) = env::var("SERVER_HOST") {
            self.server.host = host;
        }
        if let Some(initial_board) = env_value::<InitialBoard>("REPLAY_INITIAL_BOARD")? {
            self.replay.initial_board = initial_board;
        }
        if let Some(tracked_player) = env_value::<Player>("REPLAY_TRACKED_PLAYER")? {
            self.replay.tracked_player = tracked_player;
        }
        if let Some(threshold) = env_value("REPLAY_TURNING_POINT_THRESHOLD")? {
            self.replay.turning_point_threshold = threshold;
        }
        if let Some(max_sessions) = env_value("VIEWER_MAX_SESSIONS")? {
            self.viewer.max_sessions = max_sessions;
        }
        if let Some(timeout) = env_value("VIEWER_SESSION_TIMEOUT_MINUTES")? {
            self.viewer.session_timeout_minutes = timeout;
        }
        if let Some(source_type) = env_value::<ReplaySourceType>("REPLAY_SOURCE")? {
            self.source.source_type = source_type;
        }
        if let Ok(path) = env::var("REPLAY_SOURCE_PATH") {
            self.source.path = Some(PathBuf::from(path));
        }

        Ok(())
    }

    /// 設定ファイルと環境変数を結合して設定を読み込む
    /// 設定ファイルがなくてもデフォルト値で動作する
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = CONFIG_SEARCH_PATHS
            .iter()
            .find_map(|path| match Self::from_file(path) {
                Ok(config) => {
                    tracing::info!(path, "configuration file loaded");
                    Some(config)
                }
                Err(ConfigError::FileReadError(_)) => None,
                Err(error) => {
                    tracing::warn!(path, %error, "configuration file ignored");
                    None
                }
            })
            .unwrap_or_default();

        config.apply_env()?;
        Ok(config)
    }

    /// 現在の設定を指定したファイルに保存する
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// 設定値の妥当性をチェックする
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |field: &str, value: String| ConfigError::InvalidValue {
            field: field.to_string(),
            value,
        };

        if self.server.port == 0 {
            return Err(invalid("server.port", self.server.port.to_string()));
        }
        if self.viewer.max_sessions == 0 {
            return Err(invalid("viewer.max_sessions", self.viewer.max_sessions.to_string()));
        }
        if self.cache.enrichment_capacity == 0 {
            return Err(invalid("cache.enrichment_capacity", "0".to_string()));
        }
        if self.cache.board_state_capacity == 0 {
            return Err(invalid("cache.board_state_capacity", "0".to_string()));
        }
        if self.replay.turning_point_threshold < 0 {
            return Err(invalid(
                "replay.turning_point_threshold",
                self.replay.turning_point_threshold.to_string(),
            ));
        }
        if self.monitor.sample_window == 0 {
            return Err(invalid("monitor.sample_window", "0".to_string()));
        }
        if self.monitor.memory_limit_mb.checked_mul(BYTES_PER_MB).is_none() {
            return Err(invalid(
                "monitor.memory_limit_mb",
                self.monitor.memory_limit_mb.to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.monitor.memory_usage_ratio) {
            return Err(invalid(
                "monitor.memory_usage_ratio",
                self.monitor.memory_usage_ratio.to_string(),
            ));
        }
        if self.source.source_type == ReplaySourceType::File && self.source.path.is_none() {
            return Err(invalid("source.path", "<unset>".to_string()));
        }

        Ok(())
    }

    /// 閲覧セッションに渡すキャッシュ設定
    pub fn viewer_settings(&self) -> ViewerCacheSettings {
        ViewerCacheSettings {
            enrichment_capacity: self.cache.enrichment_capacity,
            board_state_capacity: self.cache.board_state_capacity,
            initial_board: self.replay.initial_board,
            turning_point_threshold: self.replay.turning_point_threshold,
            fill_missing_evaluations: self.replay.fill_missing_evaluations,
        }
    }
}
