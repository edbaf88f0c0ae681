//! 検証済みリプレイの集合
//! 取り込み時に一度だけ検証し、規約違反のリプレイは理由を記録して除外する。

use std::collections::HashMap;
use uuid::Uuid;

use crate::error::{SourceError, ValidationError};
use crate::game::{validate_replay, InitialBoard, Replay};

use super::service::ReplaySource;

#[derive(Debug, Clone, Default)]
pub struct ReplayCatalog {
    replays: Vec<Replay>,
    index: HashMap<Uuid, usize>,
    rejected: Vec<ValidationError>,
    /// 供給元が申告した初期盤面
    initial_board: Option<InitialBoard>,
}

impl ReplayCatalog {
    /// 供給元から読み込んで検証する
    pub async fn load(source: &dyn ReplaySource) -> Result<Self, SourceError> {
        let replays = source.load_replays().await?;
        let mut catalog = Self::from_replays(replays);
        catalog.initial_board = source.initial_board();

        tracing::info!(
            source = source.name(),
            accepted = catalog.len(),
            rejected = catalog.rejected.len(),
            "replay catalog loaded"
        );
        Ok(catalog)
    }

    /// 検証に通ったものだけを保持する（同じIDは先勝ちで、後のものは除外一覧に入る）
    pub fn from_replays(replays: Vec<Replay>) -> Self {
        let mut catalog = Self::default();

        for replay in replays {
            if let Err(error) = validate_replay(&replay) {
                tracing::warn!(replay_id = %error.replay_id, reasons = ?error.reasons, "replay rejected");
                catalog.rejected.push(error);
                continue;
            }
            if catalog.index.contains_key(&replay.id) {
                tracing::warn!(replay_id = %replay.id, "duplicate replay id rejected");
                catalog.rejected.push(ValidationError {
                    replay_id: replay.id,
                    reasons: vec![format!("duplicate replay id {}", replay.id)],
                });
                continue;
            }

            catalog.index.insert(replay.id, catalog.replays.len());
            catalog.replays.push(replay);
        }

        catalog
    }

    /// 棋譜の初期盤面を明示する
    pub fn with_initial_board(mut self, initial_board: InitialBoard) -> Self {
        self.initial_board = Some(initial_board);
        self
    }

    pub fn initial_board(&self) -> Option<InitialBoard> {
        self.initial_board
    }

    pub fn replays(&self) -> &[Replay] {
        &self.replays
    }

    pub fn get(&self, replay_id: &Uuid) -> Option<&Replay> {
        self.index.get(replay_id).map(|&position| &self.replays[position])
    }

    pub fn rejected(&self) -> &[ValidationError] {
        &self.rejected
    }

    pub fn len(&self) -> usize {
        self.replays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.replays.is_empty()
    }
}
