//! リプレイ供給元の抽象化層モジュール
//! モック生成、JSONファイル、メモリ上の集合など、異なる供給元を
//! 統一したインターフェースで扱い、設定に応じて生成する。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::SourceError;
use crate::game::{InitialBoard, Replay};

use super::memory_source::InMemoryReplaySource;
use super::mock_source::{MockReplaySource, MockSourceConfig};

/// 供給元の種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReplaySourceType {
    /// 決定的に生成したリプレイ
    Mock,
    /// JSONファイルから読み込んだリプレイ
    File,
    /// 呼び出し側が渡したリプレイ
    Memory,
}

impl FromStr for ReplaySourceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mock" => Ok(ReplaySourceType::Mock),
            "file" => Ok(ReplaySourceType::File),
            "memory" => Ok(ReplaySourceType::Memory),
            _ => Err(format!("Invalid replay source: {}. Valid options: mock, file, memory", s)),
        }
    }
}

/// リプレイ供給元の統一インターフェース
#[async_trait]
pub trait ReplaySource: Send + Sync {
    /// 供給元が持つリプレイをすべて読み込む（未検証）
    async fn load_replays(&self) -> Result<Vec<Replay>, SourceError>;

    fn name(&self) -> &'static str;

    fn source_type(&self) -> ReplaySourceType;

    /// 棋譜が前提とする初期盤面。供給元が知らなければNone
    fn initial_board(&self) -> Option<InitialBoard> {
        None
    }

    async fn is_available(&self) -> bool {
        true
    }
}

/// 供給元の設定
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub source_type: ReplaySourceType,
    /// `File`の場合の読み込み先
    pub path: Option<PathBuf>,
    /// `Mock`の場合の生成数
    pub mock_game_count: usize,
    /// `Mock`の場合の乱数シード
    pub mock_seed: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            source_type: ReplaySourceType::Mock,
            path: None,
            mock_game_count: 40,
            mock_seed: 2024,
        }
    }
}

/// 設定から供給元を生成するファクトリ
pub struct ReplaySourceFactory;

impl ReplaySourceFactory {
    pub fn create_source(config: &SourceConfig) -> Result<Box<dyn ReplaySource>, SourceError> {
        match config.source_type {
            ReplaySourceType::Mock => Ok(Box::new(MockReplaySource::new(MockSourceConfig {
                game_count: config.mock_game_count,
                seed: config.mock_seed,
                ..MockSourceConfig::default()
            }))),
            ReplaySourceType::File => {
                let path = config.path.as_ref().ok_or_else(|| SourceError::ConfigurationError {
                    message: "source.path is required for the file source".to_string(),
                })?;
                Ok(Box::new(InMemoryReplaySource::from_json_file(path)?))
            }
            ReplaySourceType::Memory => Ok(Box::new(InMemoryReplaySource::new(Vec::new()))),
        }
    }
}
