//! リプレイの盤面スナップショットを管理するモジュール
//! 8x8グリッドの石の配置と、再構築の起点となる初期配置を担当する。

use super::types::{Cell, Position, BOARD_SIZE};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// 再構築の起点となる盤面
/// 棋譜が中央4石の配置を含むかどうかは供給元次第なので、設定で選べるようにする
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum InitialBoard {
    /// 石のない盤面から始める
    #[default]
    Empty,
    /// 中央4マスに標準の初期配置を置く
    Standard,
}

impl FromStr for InitialBoard {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "empty" => Ok(InitialBoard::Empty),
            "standard" => Ok(InitialBoard::Standard),
            _ => Err(format!("Invalid initial board: {}. Valid options: empty, standard", s)),
        }
    }
}

/// 8x8盤面のスナップショット
/// `cells[y][x]` の順で保持する
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoardState {
    cells: [[Cell; 8]; 8],
}

impl BoardState {
    /// 空の盤面を作成する
    pub fn empty() -> Self {
        Self {
            cells: [[Cell::Empty; 8]; 8],
        }
    }

    /// 初期配置を指定して盤面を作成する
    pub fn from_initial(initial: InitialBoard) -> Self {
        let mut board = Self::empty();

        if initial == InitialBoard::Standard {
            board.cells[3][3] = Cell::White;
            board.cells[3][4] = Cell::Black;
            board.cells[4][3] = Cell::Black;
            board.cells[4][4] = Cell::White;
        }

        board
    }

    /// 指定した位置のセル状態を取得する
    /// 範囲外の場合はNoneを返す
    pub fn get_cell(&self, position: Position) -> Option<Cell> {
        if position.is_valid() {
            Some(self.cells[usize::from(position.y)][usize::from(position.x)])
        } else {
            None
        }
    }

    /// 指定した位置にセル状態を設定する
    /// 範囲外の場合はfalseを返す
    pub fn set_cell(&mut self, position: Position, cell: Cell) -> bool {
        if position.is_valid() {
            self.cells[usize::from(position.y)][usize::from(position.x)] = cell;
            true
        } else {
            false
        }
    }

    /// 盤面上の黒石と白石の数を数える
    /// 戻り値: (黒石数, 白石数)
    pub fn count_pieces(&self) -> (u8, u8) {
        let mut black_count = 0;
        let mut white_count = 0;

        for row in &self.cells {
            for &cell in row {
                match cell {
                    Cell::Black => black_count += 1,
                    Cell::White => white_count += 1,
                    Cell::Empty => {}
                }
            }
        }

        (black_count, white_count)
    }

    /// 石の置かれたマスの数
    pub fn occupied_count(&self) -> usize {
        let (black, white) = self.count_pieces();
        usize::from(black) + usize::from(white)
    }

    /// 行ごとのセル配列（描画層向け）
    pub fn rows(&self) -> &[[Cell; 8]; 8] {
        &self.cells
    }

    /// デバッグ用の盤面表示文字列を生成する
    /// ●で黒、○で白、.で空マスを表現
    pub fn display(&self) -> String {
        let mut result = String::new();
        result.push_str("  A B C D E F G H\n");

        for (row_idx, row) in self.cells.iter().enumerate() {
            result.push_str(&format!("{} ", row_idx + 1));
            for &cell in row {
                let symbol = match cell {
                    Cell::Empty => ".",
                    Cell::Black => "●",
                    Cell::White => "○",
                };
                result.push_str(&format!("{} ", symbol));
            }
            result.push('\n');
        }

        result
    }
}

impl Default for BoardState {
    fn default() -> Self {
        Self::empty()
    }
}

/// 盤面の全座標を行優先で列挙する
pub fn all_positions() -> impl Iterator<Item = Position> {
    (0..BOARD_SIZE).flat_map(|y| (0..BOARD_SIZE).map(move |x| Position { x, y }))
}
