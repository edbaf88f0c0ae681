//! リプレイ分析モジュール
//! 付加済みの手と盤面タイムラインから、精度、ターニングポイント、序盤の型、
//! 局面区分、好手・悪手、消費時間をまとめた分析結果を作る。

use super::board_cache::BoardTimeline;
use super::enrichment::EnrichedMove;
use crate::game::{
    Analysis, PhaseBreakdown, PhaseRange, Player, Position, Replay, SideAccuracy,
    SideTimeUsage, TimeUsage, TurningPoint,
};

/// 序盤の終わりの手数
const OPENING_END: u32 = 20;
/// 中盤の終わりの手数
const MIDGAME_END: u32 = 40;
/// 好手とみなす品質スコアの下限
const BEST_MOVE_QUALITY: u8 = 90;
/// 悪手とみなす品質スコアの上限
const BLUNDER_QUALITY: u8 = 20;

/// 分析結果の生成を行うスタティックメソッド集
pub struct ReplayAnalyzer;

impl ReplayAnalyzer {
    /// リプレイに保存済みの分析があればそれを、なければ計算した結果を返す
    pub fn analysis_for(replay: &Replay, enriched: &[EnrichedMove], timeline: &BoardTimeline) -> Analysis {
        match &replay.analysis {
            Some(stored) => stored.clone(),
            None => Self::analyze(enriched, timeline),
        }
    }

    pub fn analyze(enriched: &[EnrichedMove], timeline: &BoardTimeline) -> Analysis {
        let turning_points = timeline
            .turning_points
            .iter()
            .filter_map(|&index| {
                let game_move = enriched.get(index)?;
                Some(TurningPoint {
                    move_index: index,
                    move_number: game_move.base.move_number,
                    swing: timeline.swing_at(index).unwrap_or(0),
                })
            })
            .collect();

        let best_moves = enriched
            .iter()
            .filter(|m| m.base.is_optimal() || m.quality_score >= BEST_MOVE_QUALITY)
            .map(|m| m.base.move_number)
            .collect();

        let blunders = enriched
            .iter()
            .filter(|m| m.quality_score <= BLUNDER_QUALITY)
            .map(|m| m.base.move_number)
            .collect();

        Analysis {
            accuracy: SideAccuracy {
                black: Self::side_accuracy(enriched, Player::Black),
                white: Self::side_accuracy(enriched, Player::White),
            },
            turning_points,
            opening: Self::classify_opening(enriched).to_string(),
            phases: Self::phases(enriched.len()),
            best_moves,
            blunders,
            time_usage: Self::time_usage(enriched),
        }
    }

    /// 手番側の品質スコアの平均（手がなければ0）
    pub fn side_accuracy(enriched: &[EnrichedMove], side: Player) -> f64 {
        let scores: Vec<f64> = enriched
            .iter()
            .filter(|m| m.base.player == side)
            .map(|m| f64::from(m.quality_score))
            .collect();

        if scores.is_empty() {
            0.0
        } else {
            scores.iter().sum::<f64>() / scores.len() as f64
        }
    }

    /// 2手目と1手目の位置関係から序盤の型を判定する
    pub fn classify_opening(enriched: &[EnrichedMove]) -> &'static str {
        let (Some(first), Some(second)) = (enriched.first(), enriched.get(1)) else {
            return "Unclassified";
        };

        let a: Position = first.base.position();
        let b: Position = second.base.position();
        let dx = a.x.abs_diff(b.x);
        let dy = a.y.abs_diff(b.y);
        let on_center_diagonal = b.x == b.y || u16::from(b.x) + u16::from(b.y) == 7;

        match (dx, dy) {
            (1, 2) | (2, 1) => "Perpendicular Opening",
            (0, 1) | (1, 0) if on_center_diagonal => "Diagonal Opening",
            (0, 1) | (1, 0) => "Parallel Opening",
            _ => "Unclassified",
        }
    }

    /// 手数から序盤・中盤・終盤の範囲を求める
    /// 到達していない局面はNone
    pub fn phases(total_moves: usize) -> PhaseBreakdown {
        let total = u32::try_from(total_moves).unwrap_or(u32::MAX);
        let range = |start: u32, end: u32| (total >= start).then(|| PhaseRange { start, end: end.min(total) });

        PhaseBreakdown {
            opening: range(1, OPENING_END),
            midgame: range(OPENING_END + 1, MIDGAME_END),
            endgame: range(MIDGAME_END + 1, u32::MAX),
        }
    }

    pub fn time_usage(enriched: &[EnrichedMove]) -> Option<TimeUsage> {
        if enriched.is_empty() {
            return None;
        }

        Some(TimeUsage {
            black: Self::side_time_usage(enriched, Player::Black),
            white: Self::side_time_usage(enriched, Player::White),
        })
    }

    fn side_time_usage(enriched: &[EnrichedMove], side: Player) -> SideTimeUsage {
        let moves: Vec<&EnrichedMove> = enriched.iter().filter(|m| m.base.player == side).collect();
        let total_ms = moves.iter().fold(0i64, |total, m| total.saturating_add(m.time_diff));
        let average_ms = if moves.is_empty() {
            0.0
        } else {
            total_ms as f64 / moves.len() as f64
        };
        let longest_think_move = moves
            .iter()
            .filter(|m| m.time_diff > 0)
            .max_by_key(|m| m.time_diff)
            .map(|m| m.base.move_number);

        SideTimeUsage {
            total_ms,
            average_ms,
            longest_think_move,
        }
    }
}
