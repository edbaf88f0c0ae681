//! 着手情報の付加とキャッシュ
//! 棋譜の各手に表示用の派生フィールド（座標キー、棋譜表記、品質スコア、手間の経過時間）を付け、
//! 棋譜の同一性ごとに結果をキャッシュする。

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::fifo_cache::FifoCache;
use crate::game::Move;

/// 付加キャッシュのデフォルト容量
pub const DEFAULT_ENRICHMENT_CAPACITY: usize = 10;

/// 評価値がない手の品質スコア
pub const NEUTRAL_QUALITY: u8 = 50;

/// 派生フィールド付きの手
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedMove {
    #[serde(flatten)]
    pub base: Move,
    pub position_key: String,
    pub display_position: String,
    pub is_first_move: bool,
    pub is_last_move: bool,
    pub quality_score: u8,
    /// 直前の手からの経過ミリ秒（最初の手は0）
    pub time_diff: i64,
}

/// 手の品質スコア（0-100）
///
/// 最善手なら100。評価値があれば50を中心に0-99へ丸め、なければ50。
/// 100は最善手だけに割り当てる。
pub fn quality_score(game_move: &Move) -> u8 {
    if game_move.is_optimal() {
        return 100;
    }

    match game_move.evaluation_score {
        Some(score) => {
            let centered = i64::from(NEUTRAL_QUALITY) + i64::from(score);
            centered.clamp(0, 99) as u8
        }
        None => NEUTRAL_QUALITY,
    }
}

/// 棋譜を付加情報付きの手の列に変換する（キャッシュなし）
pub fn enrich_moves(moves: &[Move]) -> Vec<EnrichedMove> {
    let last_index = moves.len().saturating_sub(1);

    moves
        .iter()
        .enumerate()
        .map(|(index, game_move)| {
            let position = game_move.position();
            let time_diff = match index {
                0 => 0,
                _ => game_move.timestamp.saturating_sub(moves[index - 1].timestamp).max(0),
            };

            EnrichedMove {
                base: game_move.clone(),
                position_key: position.key(),
                display_position: position.notation(),
                is_first_move: index == 0,
                is_last_move: index == last_index,
                quality_score: quality_score(game_move),
                time_diff,
            }
        })
        .collect()
}

/// 付加キャッシュのキー
/// 手数と最初・最後のタイムスタンプで棋譜を識別する
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EnrichmentKey {
    pub len: usize,
    pub first_timestamp: Option<i64>,
    pub last_timestamp: Option<i64>,
}

impl EnrichmentKey {
    pub fn of(moves: &[Move]) -> Self {
        Self {
            len: moves.len(),
            first_timestamp: moves.first().map(|m| m.timestamp),
            last_timestamp: moves.last().map(|m| m.timestamp),
        }
    }
}

/// 棋譜ごとの付加結果をキャッシュする
/// 同じキーに対しては同じ`Arc`を返すので、呼び出し側はポインタ比較で変化を検出できる
#[derive(Debug, Clone)]
pub struct MoveEnricher {
    cache: FifoCache<EnrichmentKey, Arc<[EnrichedMove]>>,
}

impl MoveEnricher {
    pub fn new(capacity: usize) -> Self {
        Self {
            cache: FifoCache::new(capacity),
        }
    }

    pub fn enrich(&mut self, moves: &[Move]) -> Arc<[EnrichedMove]> {
        let key = EnrichmentKey::of(moves);

        if let Some(cached) = self.cache.get(&key) {
            return Arc::clone(cached);
        }

        let enriched: Arc<[EnrichedMove]> = enrich_moves(moves).into();
        if let Some((evicted, _)) = self.cache.insert(key, Arc::clone(&enriched)) {
            tracing::debug!(?evicted, "enrichment cache evicted oldest entry");
        }

        enriched
    }

    pub fn is_cached(&self, moves: &[Move]) -> bool {
        self.cache.contains_key(&EnrichmentKey::of(moves))
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// セッション終了時のキャッシュ破棄
    pub fn clear(&mut self) {
        self.cache.clear();
    }
}

impl Default for MoveEnricher {
    fn default() -> Self {
        Self::new(DEFAULT_ENRICHMENT_CAPACITY)
    }
}

/// 評価値のない手に表示用の仮評価値を与える
///
/// 座標と手のインデックスのハッシュから-30..=30の値を作る。
/// 対局エンジンの評価ではなく、見た目を整えるための決定的な埋め草。
pub fn placeholder_evaluation(x: u8, y: u8, index: usize) -> i32 {
    const FNV_OFFSET: u32 = 0x811c_9dc5;
    const FNV_PRIME: u32 = 0x0100_0193;

    let index_bytes = (index as u32).to_le_bytes();
    let hash = [x, y]
        .iter()
        .chain(index_bytes.iter())
        .fold(FNV_OFFSET, |hash, &byte| (hash ^ u32::from(byte)).wrapping_mul(FNV_PRIME));

    (hash % 61) as i32 - 30
}

/// 評価値が欠けている手だけを仮評価値で埋めた棋譜を返す
pub fn with_placeholder_evaluations(moves: &[Move]) -> Vec<Move> {
    moves
        .iter()
        .enumerate()
        .map(|(index, game_move)| {
            let mut filled = game_move.clone();
            if filled.evaluation_score.is_none() {
                filled.evaluation_score = Some(placeholder_evaluation(filled.x, filled.y, index));
            }
            filled
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::Player;

    fn log(len: usize, start: i64) -> Vec<Move> {
        (0..len)
            .map(|i| {
                Move::new(i as u32 + 1, (i % 8) as u8, (i / 8) as u8, Player::Black, start + i as i64 * 1_000)
            })
            .collect()
    }

    #[test]
    fn test_quality_score_rules() {
        let base = Move::new(1, 0, 0, Player::Black, 0);

        assert_eq!(quality_score(&base), 50);
        assert_eq!(quality_score(&base.clone().with_optimal(true)), 100);
        assert_eq!(quality_score(&base.clone().with_optimal(true).with_evaluation(-80)), 100);
        assert_eq!(quality_score(&base.clone().with_evaluation(12)), 62);
        assert_eq!(quality_score(&base.clone().with_evaluation(-70)), 0);
        assert_eq!(quality_score(&base.clone().with_evaluation(80)), 99);
        assert_eq!(quality_score(&base.clone().with_optimal(false).with_evaluation(i32::MAX)), 99);
        assert_eq!(quality_score(&base.with_evaluation(i32::MIN)), 0);
    }

    #[test]
    fn test_enrich_moves_derived_fields() {
        let moves = vec![
            Move::new(1, 0, 0, Player::Black, 1_000),
            Move::new(2, 7, 2, Player::White, 3_500),
            Move::new(3, 3, 7, Player::Black, 4_000),
        ];
        let enriched = enrich_moves(&moves);

        assert_eq!(enriched[0].position_key, "0,0");
        assert_eq!(enriched[0].display_position, "A1");
        assert_eq!(enriched[1].display_position, "H3");
        assert_eq!(enriched[2].display_position, "D8");

        assert!(enriched[0].is_first_move && !enriched[0].is_last_move);
        assert!(enriched[2].is_last_move && !enriched[2].is_first_move);

        let diffs: Vec<i64> = enriched.iter().map(|m| m.time_diff).collect();
        assert_eq!(diffs, vec![0, 2_500, 500]);
    }

    #[test]
    fn test_time_diff_saturates_on_extreme_timestamps() {
        let moves = vec![
            Move::new(1, 0, 0, Player::Black, i64::MIN),
            Move::new(2, 1, 0, Player::White, i64::MAX),
            Move::new(3, 2, 0, Player::Black, i64::MIN),
        ];
        let diffs: Vec<i64> = enrich_moves(&moves).iter().map(|m| m.time_diff).collect();
        assert_eq!(diffs, vec![0, i64::MAX, 0]);
    }

    #[test]
    fn test_single_move_is_first_and_last() {
        let enriched = enrich_moves(&log(1, 0));
        assert!(enriched[0].is_first_move);
        assert!(enriched[0].is_last_move);
    }

    #[test]
    fn test_cache_returns_same_instance() {
        let mut enricher = MoveEnricher::default();
        let moves = log(5, 0);

        let first = enricher.enrich(&moves);
        let second = enricher.enrich(&moves);

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(enricher.len(), 1);
    }

    #[test]
    fn test_cache_key_components_each_cause_a_miss() {
        let mut enricher = MoveEnricher::default();
        let moves = log(5, 0);
        let original = enricher.enrich(&moves);

        let longer = log(6, 0);
        assert!(!Arc::ptr_eq(&original, &enricher.enrich(&longer)));

        let mut shifted_first = moves.clone();
        shifted_first[0].timestamp = -1;
        assert!(!Arc::ptr_eq(&original, &enricher.enrich(&shifted_first)));

        let mut shifted_last = moves.clone();
        shifted_last[4].timestamp += 1;
        assert!(!Arc::ptr_eq(&original, &enricher.enrich(&shifted_last)));

        assert_eq!(enricher.len(), 4);
    }

    #[test]
    fn test_eleventh_key_evicts_first_inserted() {
        let mut enricher = MoveEnricher::new(10);
        let logs: Vec<Vec<Move>> = (1..=11).map(|len| log(len, 0)).collect();

        for moves in &logs[..10] {
            enricher.enrich(moves);
        }
        // 最初のキーを読んでもFIFO順は変わらない
        enricher.enrich(&logs[0]);
        enricher.enrich(&logs[10]);

        assert_eq!(enricher.len(), 10);
        assert!(!enricher.is_cached(&logs[0]));
        assert!(enricher.is_cached(&logs[1]));
        assert!(enricher.is_cached(&logs[10]));
    }

    #[test]
    fn test_clear_drops_entries() {
        let mut enricher = MoveEnricher::default();
        enricher.enrich(&log(3, 0));
        enricher.clear();
        assert!(enricher.is_empty());
    }

    #[test]
    fn test_placeholder_evaluation_is_stable_and_bounded() {
        for index in 0..60 {
            let score = placeholder_evaluation((index % 8) as u8, (index / 8) as u8, index);
            assert!((-30..=30).contains(&score));
            assert_eq!(score, placeholder_evaluation((index % 8) as u8, (index / 8) as u8, index));
        }
    }

    #[test]
    fn test_placeholder_fills_only_missing_scores() {
        let moves = vec![
            Move::new(1, 2, 3, Player::Black, 0).with_evaluation(7),
            Move::new(2, 4, 5, Player::White, 10),
        ];
        let filled = with_placeholder_evaluations(&moves);

        assert_eq!(filled[0].evaluation_score, Some(7));
        assert_eq!(filled[1].evaluation_score, Some(placeholder_evaluation(4, 5, 1)));
    }
}
