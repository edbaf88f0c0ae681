//! ゲームの基本型定義モジュール
//! リプレイで使用される基本的な型とenum、着手記録を定義する。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 盤面の一辺のマス数
pub const BOARD_SIZE: u8 = 8;

/// 盤面の各マスの状態を表現するenum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Cell {
    Empty,
    Black,
    White,
}

/// ゲームのプレイヤーを表すenum
/// 先手は黒、後手は白
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Player {
    Black,
    White,
}

impl Player {
    /// 相手プレイヤーを返す
    pub fn opposite(self) -> Player {
        match self {
            Player::Black => Player::White,
            Player::White => Player::Black,
        }
    }

    /// プレイヤーを対応するセル状態に変換する
    pub fn to_cell(self) -> Cell {
        match self {
            Player::Black => Cell::Black,
            Player::White => Cell::White,
        }
    }
}

impl FromStr for Player {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "black" => Ok(Player::Black),
            "white" => Ok(Player::White),
            _ => Err(format!("Invalid player: {}. Valid options: black, white", s)),
        }
    }
}

/// 8x8盤面上の座標を表す構造体
/// xは列、yは行。ともに0-7の範囲で有効
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub x: u8,
    pub y: u8,
}

impl Position {
    /// 範囲チェック付きのコンストラクタ
    /// 8x8盤面の範囲外の座標の場合はNoneを返す
    pub fn new(x: u8, y: u8) -> Option<Position> {
        if x < BOARD_SIZE && y < BOARD_SIZE {
            Some(Position { x, y })
        } else {
            None
        }
    }

    /// 座標が有効範囲内かチェックする
    pub fn is_valid(&self) -> bool {
        self.x < BOARD_SIZE && self.y < BOARD_SIZE
    }

    /// 座標の正規化キー（"x,y"）
    pub fn key(&self) -> String {
        format!("{},{}", self.x, self.y)
    }

    /// 棋譜表記（列A-H、行1-8）
    pub fn notation(&self) -> String {
        let column = char::from(b'A' + self.x.min(BOARD_SIZE - 1));
        format!("{}{}", column, u32::from(self.y) + 1)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// 着手候補とその評価値
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlternativeMove {
    pub x: u8,
    pub y: u8,
    pub score: i32,
}

/// 棋譜の1手を表現する構造体
/// ひっくり返る石はルールエンジン側で解決済みの状態で受け取る
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Move {
    pub x: u8,
    pub y: u8,
    pub player: Player,
    /// エポックミリ秒
    pub timestamp: i64,
    #[serde(default)]
    pub flipped_cells: Vec<Position>,
    /// 1始まりの手数
    pub move_number: u32,
    #[serde(default)]
    pub evaluation_score: Option<i32>,
    #[serde(default)]
    pub is_optimal: Option<bool>,
    #[serde(default)]
    pub alternative_moves: Vec<AlternativeMove>,
}

impl Move {
    /// 評価情報なしの手を作成する
    pub fn new(move_number: u32, x: u8, y: u8, player: Player, timestamp: i64) -> Self {
        Self {
            x,
            y,
            player,
            timestamp,
            flipped_cells: Vec::new(),
            move_number,
            evaluation_score: None,
            is_optimal: None,
            alternative_moves: Vec::new(),
        }
    }

    pub fn with_flips(mut self, flipped_cells: Vec<Position>) -> Self {
        self.flipped_cells = flipped_cells;
        self
    }

    pub fn with_evaluation(mut self, score: i32) -> Self {
        self.evaluation_score = Some(score);
        self
    }

    pub fn with_optimal(mut self, is_optimal: bool) -> Self {
        self.is_optimal = Some(is_optimal);
        self
    }

    pub fn with_alternatives(mut self, alternatives: Vec<AlternativeMove>) -> Self {
        self.alternative_moves = alternatives;
        self
    }

    /// 着手位置を座標として返す（範囲外でもそのまま保持する）
    pub fn position(&self) -> Position {
        Position { x: self.x, y: self.y }
    }

    pub fn is_optimal(&self) -> bool {
        self.is_optimal.unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_player_opposite() {
        assert_eq!(Player::Black.opposite(), Player::White);
        assert_eq!(Player::White.opposite(), Player::Black);
    }

    #[test]
    fn test_player_to_cell() {
        assert_eq!(Player::Black.to_cell(), Cell::Black);
        assert_eq!(Player::White.to_cell(), Cell::White);
    }

    #[test]
    fn test_player_from_str() {
        assert_eq!("BLACK".parse::<Player>().unwrap(), Player::Black);
        assert_eq!("white".parse::<Player>().unwrap(), Player::White);
        assert!("red".parse::<Player>().is_err());
    }

    #[test]
    fn test_position_new_valid() {
        let pos = Position::new(3, 4);
        assert_eq!(pos, Some(Position { x: 3, y: 4 }));
    }

    #[test]
    fn test_position_new_invalid() {
        assert!(Position::new(8, 4).is_none());
        assert!(Position::new(3, 8).is_none());
        assert!(Position::new(10, 10).is_none());
    }

    #[test]
    fn test_position_key_and_notation() {
        let corner = Position::new(0, 0).unwrap();
        assert_eq!(corner.key(), "0,0");
        assert_eq!(corner.notation(), "A1");

        let pos = Position::new(7, 2).unwrap();
        assert_eq!(pos.key(), "7,2");
        assert_eq!(pos.notation(), "H3");
    }

    #[test]
    fn test_move_builder() {
        let flipped = vec![Position::new(3, 3).unwrap()];
        let game_move = Move::new(1, 2, 3, Player::Black, 1_000)
            .with_flips(flipped.clone())
            .with_evaluation(12)
            .with_optimal(true);

        assert_eq!(game_move.position(), Position { x: 2, y: 3 });
        assert_eq!(game_move.flipped_cells, flipped);
        assert_eq!(game_move.evaluation_score, Some(12));
        assert!(game_move.is_optimal());
    }

    #[test]
    fn test_move_deserialize_defaults_optional_fields() {
        let json = r#"{"x":1,"y":2,"player":"White","timestamp":5,"move_number":1}"#;
        let game_move: Move = serde_json::from_str(json).unwrap();

        assert!(game_move.flipped_cells.is_empty());
        assert!(game_move.evaluation_score.is_none());
        assert!(!game_move.is_optimal());
        assert!(game_move.alternative_moves.is_empty());
    }
}
