//! リプレイ取り込み時の検証モジュール
//! 座標範囲、手数の整合性、時刻の単調性、スコア上限などを一括で検査し、
//! 見つかった問題をすべて理由付きで返す。

use super::record::Replay;
use crate::error::ValidationError;

/// 盤面のマス数（スコア合計の上限）
const BOARD_CAPACITY: u32 = 64;

/// リプレイの入力規約を検証する
/// 問題が一つでもあれば全理由をまとめた`ValidationError`を返す
pub fn validate_replay(replay: &Replay) -> Result<(), ValidationError> {
    let mut reasons = Vec::new();

    if replay.game_info.total_moves != replay.moves.len() {
        reasons.push(format!(
            "total_moves is {} but the log contains {} moves",
            replay.game_info.total_moves,
            replay.moves.len()
        ));
    }

    if replay.game_info.start_time >= replay.game_info.end_time {
        reasons.push(format!(
            "start_time {} is not before end_time {}",
            replay.game_info.start_time, replay.game_info.end_time
        ));
    }

    let score = replay.result.final_score;
    if u32::from(score.black) + u32::from(score.white) > BOARD_CAPACITY {
        reasons.push(format!(
            "final score {}-{} exceeds board capacity of {}",
            score.black, score.white, BOARD_CAPACITY
        ));
    }

    for (index, game_move) in replay.moves.iter().enumerate() {
        if !game_move.position().is_valid() {
            reasons.push(format!(
                "move {} is out of range: ({}, {})",
                game_move.move_number, game_move.x, game_move.y
            ));
        }

        for flipped in &game_move.flipped_cells {
            if !flipped.is_valid() {
                reasons.push(format!(
                    "move {} flips an out-of-range cell {}",
                    game_move.move_number, flipped
                ));
            }
        }

        if index == 0 {
            continue;
        }

        let previous = &replay.moves[index - 1];
        if game_move.move_number <= previous.move_number {
            reasons.push(format!(
                "move_number {} does not increase after {}",
                game_move.move_number, previous.move_number
            ));
        }
        if game_move.timestamp < previous.timestamp {
            reasons.push(format!(
                "timestamp of move {} goes backwards ({} < {})",
                game_move.move_number, game_move.timestamp, previous.timestamp
            ));
        }
    }

    if reasons.is_empty() {
        Ok(())
    } else {
        Err(ValidationError {
            replay_id: replay.id,
            reasons,
        })
    }
}
