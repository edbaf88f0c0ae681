//! 棋譜からの盤面再構築モジュール
//! 解決済みのフリップ情報を持つ棋譜を順に適用し、各手の後の盤面スナップショットを作る。
//! ルール判定は行わない（合法性は棋譜の供給元が保証する）。

use serde::{Deserialize, Serialize};

use crate::error::{ReplayError, Result};
use crate::game::{BoardState, InitialBoard, Move, Position};

/// 空の盤面から棋譜を再構築する
/// 戻り値は手数と同じ長さ（初期スナップショットは含まない）
pub fn reconstruct(moves: &[Move]) -> Result<Vec<BoardState>> {
    BoardReconstructor::default().reconstruct(moves)
}

/// 初期配置を指定できる盤面再構築器
#[derive(Debug, Clone, Copy, Default)]
pub struct BoardReconstructor {
    initial: InitialBoard,
}

impl BoardReconstructor {
    pub fn new(initial: InitialBoard) -> Self {
        Self { initial }
    }

    pub fn initial(&self) -> InitialBoard {
        self.initial
    }

    /// 各手を適用した後の盤面を手数分返す
    pub fn reconstruct(&self, moves: &[Move]) -> Result<Vec<BoardState>> {
        let mut board = BoardState::from_initial(self.initial);
        let mut states = Vec::with_capacity(moves.len());

        for game_move in moves {
            apply_move(&mut board, game_move)?;
            states.push(board.clone());
        }

        Ok(states)
    }

    /// 初期盤面を先頭に付けたN+1件のスナップショットを返す
    pub fn reconstruct_with_initial(&self, moves: &[Move]) -> Result<Vec<BoardState>> {
        let mut states = Vec::with_capacity(moves.len() + 1);
        states.push(BoardState::from_initial(self.initial));
        states.extend(self.reconstruct(moves)?);
        Ok(states)
    }
}

/// 1手を盤面に適用する
/// 着手位置とフリップ対象のどちらかが範囲外なら盤面を変更せずにエラーを返す
pub fn apply_move(board: &mut BoardState, game_move: &Move) -> Result<()> {
    let out_of_range = |position: Position| ReplayError::CoordinateOutOfRange {
        move_number: game_move.move_number,
        x: position.x,
        y: position.y,
    };

    let placed = game_move.position();
    if !placed.is_valid() {
        return Err(out_of_range(placed));
    }
    if let Some(flipped) = game_move.flipped_cells.iter().find(|p| !p.is_valid()) {
        return Err(out_of_range(*flipped));
    }

    let cell = game_move.player.to_cell();
    board.set_cell(placed, cell);
    for &flipped in &game_move.flipped_cells {
        board.set_cell(flipped, cell);
    }

    Ok(())
}

/// スナップショット列に初期盤面が含まれるかどうかの対応付け
///
/// スナップショット数が「手数+1」なら先頭が初期盤面。
/// 呼び出し側はこの型を通してのみ手のインデックスを盤面のインデックスへ変換する。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotOffset {
    pub has_initial_state: bool,
}

impl SnapshotOffset {
    /// スナップショット数と手数から判定する
    pub fn detect(states_len: usize, moves_len: usize) -> Self {
        Self {
            has_initial_state: states_len == moves_len + 1,
        }
    }

    /// `move_index`番目（0始まり）の手を適用した後の盤面のインデックス
    pub fn index_of(&self, move_index: usize) -> usize {
        if self.has_initial_state {
            move_index + 1
        } else {
            move_index
        }
    }

    /// 初期盤面のインデックス（含まれない場合はNone）
    pub fn initial_index(&self) -> Option<usize> {
        self.has_initial_state.then_some(0)
    }

    /// 盤面のインデックスから、その盤面を作った手のインデックスへ戻す
    pub fn move_index_of(&self, state_index: usize) -> Option<usize> {
        if self.has_initial_state {
            state_index.checked_sub(1)
        } else {
            Some(state_index)
        }
    }
}
