//! リプレイ記録の型定義モジュール
//! 対局者、結果、対局情報、分析結果など、読み込み済みリプレイの構造を定義する。
//! 読み込んだリプレイは不変として扱い、派生データはすべてエンジン側で計算する。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::types::{Move, Player};

/// 対局モード
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum GameMode {
    Ai,
    Quest,
    Battle,
    Tournament,
}

impl GameMode {
    pub fn all() -> Vec<GameMode> {
        vec![GameMode::Ai, GameMode::Quest, GameMode::Battle, GameMode::Tournament]
    }

    /// 検索・クエリで使う小文字ラベル
    pub fn label(&self) -> &'static str {
        match self {
            GameMode::Ai => "ai",
            GameMode::Quest => "quest",
            GameMode::Battle => "battle",
            GameMode::Tournament => "tournament",
        }
    }
}

impl fmt::Display for GameMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for GameMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ai" => Ok(GameMode::Ai),
            "quest" => Ok(GameMode::Quest),
            "battle" => Ok(GameMode::Battle),
            "tournament" => Ok(GameMode::Tournament),
            _ => Err(format!(
                "Invalid game mode: {}. Valid options: ai, quest, battle, tournament",
                s
            )),
        }
    }
}

/// 対局者の種別
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlayerKind {
    Human,
    Ai,
}

/// 対局者情報
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerInfo {
    pub name: String,
    pub kind: PlayerKind,
    #[serde(default)]
    pub rating: Option<i32>,
}

impl PlayerInfo {
    pub fn human(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: PlayerKind::Human,
            rating: None,
        }
    }

    pub fn ai(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: PlayerKind::Ai,
            rating: None,
        }
    }
}

/// 勝者（引き分けを含む）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Winner {
    Black,
    White,
    Draw,
}

impl Winner {
    /// 指定プレイヤーの勝利かどうか
    pub fn is_win_for(self, player: Player) -> bool {
        matches!(
            (self, player),
            (Winner::Black, Player::Black) | (Winner::White, Player::White)
        )
    }

    /// 指定プレイヤーの敗北かどうか
    pub fn is_loss_for(self, player: Player) -> bool {
        matches!(
            (self, player),
            (Winner::White, Player::Black) | (Winner::Black, Player::White)
        )
    }
}

/// 終局理由
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EndReason {
    BoardFull,
    NoValidMoves,
    Resignation,
    Timeout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalScore {
    pub black: u8,
    pub white: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameResult {
    pub winner: Winner,
    pub final_score: FinalScore,
    pub end_reason: EndReason,
}

/// 対局の時間情報
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameInfo {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// 対局時間（秒）
    pub duration_secs: u64,
    pub total_moves: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayMetadata {
    #[serde(default)]
    pub tags: Vec<String>,
    /// 追跡対象プレイヤーのこの対局時点のレーティング
    #[serde(default)]
    pub rating: Option<i32>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub version: u32,
}

/// 手番側ごとの精度（0-100）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SideAccuracy {
    pub black: f64,
    pub white: f64,
}

impl SideAccuracy {
    pub fn for_player(&self, player: Player) -> f64 {
        match player {
            Player::Black => self.black,
            Player::White => self.white,
        }
    }
}

/// 評価値が大きく振れた手
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurningPoint {
    /// 棋譜配列上のインデックス（0始まり）
    pub move_index: usize,
    pub move_number: u32,
    /// 直前の手からの評価値の変化量
    pub swing: i32,
}

/// 局面区分の手数範囲（両端を含む、1始まり）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseRange {
    pub start: u32,
    pub end: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseBreakdown {
    pub opening: Option<PhaseRange>,
    pub midgame: Option<PhaseRange>,
    pub endgame: Option<PhaseRange>,
}

/// 手番側ごとの消費時間
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SideTimeUsage {
    pub total_ms: i64,
    pub average_ms: f64,
    pub longest_think_move: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeUsage {
    pub black: SideTimeUsage,
    pub white: SideTimeUsage,
}

/// 対局の分析結果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    pub accuracy: SideAccuracy,
    pub turning_points: Vec<TurningPoint>,
    pub opening: String,
    pub phases: PhaseBreakdown,
    pub best_moves: Vec<u32>,
    pub blunders: Vec<u32>,
    #[serde(default)]
    pub time_usage: Option<TimeUsage>,
}

/// 読み込み済みのリプレイ
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Replay {
    pub id: Uuid,
    pub mode: GameMode,
    pub player_black: PlayerInfo,
    pub player_white: PlayerInfo,
    pub result: GameResult,
    pub game_info: GameInfo,
    pub moves: Vec<Move>,
    #[serde(default)]
    pub analysis: Option<Analysis>,
    #[serde(default)]
    pub metadata: ReplayMetadata,
}

impl Replay {
    /// 指定した手番側の対局者情報
    pub fn player(&self, side: Player) -> &PlayerInfo {
        match side {
            Player::Black => &self.player_black,
            Player::White => &self.player_white,
        }
    }

    /// 追跡対象から見た相手の対局者情報
    pub fn opponent_of(&self, side: Player) -> &PlayerInfo {
        self.player(side.opposite())
    }

    /// 対局開始時刻（エポックミリ秒）
    pub fn start_millis(&self) -> i64 {
        self.game_info.start_time.timestamp_millis()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_game_mode_labels_round_trip() {
        for mode in GameMode::all() {
            assert_eq!(mode.label().parse::<GameMode>().unwrap(), mode);
        }
        assert!("blitz".parse::<GameMode>().is_err());
    }

    #[test]
    fn test_winner_relative_to_player() {
        assert!(Winner::Black.is_win_for(Player::Black));
        assert!(Winner::Black.is_loss_for(Player::White));
        assert!(!Winner::Draw.is_win_for(Player::Black));
        assert!(!Winner::Draw.is_loss_for(Player::White));
    }

    #[test]
    fn test_side_accuracy_for_player() {
        let accuracy = SideAccuracy { black: 80.0, white: 65.5 };
        assert_eq!(accuracy.for_player(Player::Black), 80.0);
        assert_eq!(accuracy.for_player(Player::White), 65.5);
    }

    #[test]
    fn test_player_info_constructors() {
        assert_eq!(PlayerInfo::human("Alice").kind, PlayerKind::Human);
        assert_eq!(PlayerInfo::ai("Bot").kind, PlayerKind::Ai);
    }
}
