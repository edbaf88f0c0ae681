//! プロパティベーステストモジュール
//! ランダムな棋譜・リプレイ集合で再構築、付加情報、キャッシュ、統計、
//! 絞り込み、ウィンドウ処理の不変条件を検証する。

use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

use reversi_replay::{
    analytics::{FilterSpec, SortDirection, SortField, SortSpec, StatisticsAggregator, VirtualScroll, ReplayQuery},
    engine::{quality_score, reconstruct, BoardReconstructor, BoardTimeline, MoveEnricher},
    game::{Cell, Move, Player, Position, Replay},
    source::{MockReplaySource, MockSourceConfig},
};

fn anchor() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 30, 12, 0, 0).unwrap()
}

/// 空の盤面から始まる整合した棋譜を作る
/// 着手位置は重複せず、フリップは既に置かれた石だけを対象にする
fn build_log(order: &[Position], flip_masks: &[u64]) -> Vec<Move> {
    let mut placed: Vec<Position> = Vec::new();
    let mut moves = Vec::with_capacity(order.len());

    for (index, (&position, &mask)) in order.iter().zip(flip_masks).enumerate() {
        let flips: Vec<Position> = placed
            .iter()
            .enumerate()
            .filter(|(j, _)| mask & (1u64 << (j % 64)) != 0)
            .map(|(_, p)| *p)
            .collect();
        let player = if index % 2 == 0 { Player::Black } else { Player::White };

        moves.push(
            Move::new(index as u32 + 1, position.x, position.y, player, index as i64 * 1_500)
                .with_flips(flips),
        );
        placed.push(position);
    }

    moves
}

/// 重複しない着手順と各手のフリップ指定を生成する戦略
fn move_log_strategy() -> impl Strategy<Value = Vec<Move>> {
    let all: Vec<Position> = (0..64u8).map(|i| Position { x: i % 8, y: i / 8 }).collect();
    (Just(all).prop_shuffle(), 0usize..=64, prop::collection::vec(any::<u64>(), 64))
        .prop_map(|(order, len, masks)| build_log(&order[..len], &masks))
}

/// 指定した長さ・開始時刻・間隔の単純な棋譜
fn timed_log(len: usize, first_timestamp: i64, step: i64) -> Vec<Move> {
    (0..len)
        .map(|i| {
            Move::new(
                i as u32 + 1,
                (i % 8) as u8,
                (i / 8 % 8) as u8,
                Player::Black,
                first_timestamp + i as i64 * step,
            )
        })
        .collect()
}

fn scored_log(scores: &[i32]) -> Vec<Move> {
    timed_log(scores.len(), 0, 1_000)
        .into_iter()
        .zip(scores)
        .map(|(game_move, score)| game_move.with_evaluation(*score))
        .collect()
}

fn generated_replays(game_count: usize, seed: u64, spacing_hours: i64) -> Vec<Replay> {
    MockReplaySource::new(MockSourceConfig {
        game_count,
        seed,
        anchor: Some(anchor()),
        spacing: Duration::hours(spacing_hours),
        available: true,
    })
    .generate()
}

fn sort_strategy() -> impl Strategy<Value = SortSpec> {
    let field = prop_oneof![
        Just(SortField::Date),
        Just(SortField::Duration),
        Just(SortField::Rating),
        Just(SortField::Accuracy),
        Just(SortField::MoveCount),
    ];
    let direction = prop_oneof![Just(SortDirection::Ascending), Just(SortDirection::Descending)];
    (field, direction).prop_map(|(field, direction)| SortSpec::new(field, direction))
}

proptest! {
    /// プロパティ: k手目の後の盤面にはちょうどk個の石がある
    #[test]
    fn test_disc_count_matches_moves_applied(moves in move_log_strategy()) {
        let states = reconstruct(&moves).unwrap();
        prop_assert_eq!(states.len(), moves.len());

        for (index, state) in states.iter().enumerate() {
            prop_assert_eq!(state.occupied_count(), index + 1);
        }
    }

    /// プロパティ: 同じ棋譜からは常に同じ盤面列が得られる
    #[test]
    fn test_reconstruction_is_deterministic(moves in move_log_strategy()) {
        let first = reconstruct(&moves).unwrap();
        let second = reconstruct(&moves).unwrap();
        prop_assert_eq!(first, second);
    }

    /// プロパティ: 最後の手の石は必ずその手の色になる
    #[test]
    fn test_last_placed_disc_has_mover_color(moves in move_log_strategy()) {
        prop_assume!(!moves.is_empty());
        let states = reconstruct(&moves).unwrap();
        let last = moves.last().unwrap();
        let final_board = states.last().unwrap();

        prop_assert_eq!(final_board.get_cell(last.position()), Some(last.player.to_cell()));
        for flipped in &last.flipped_cells {
            prop_assert_eq!(final_board.get_cell(*flipped), Some(last.player.to_cell()));
        }
    }

    /// プロパティ: 品質スコアは0-100で、100になるのは最善手だけ
    #[test]
    fn test_quality_score_bounds(score in proptest::option::of(any::<i32>()), optimal in proptest::option::of(any::<bool>())) {
        let mut game_move = Move::new(1, 0, 0, Player::Black, 0);
        game_move.evaluation_score = score;
        game_move.is_optimal = optimal;

        let quality = quality_score(&game_move);
        prop_assert!(quality <= 100);
        prop_assert_eq!(quality == 100, optimal == Some(true));
    }

    /// プロパティ: 同じキーなら同じインスタンス、キーの一要素でも違えばキャッシュミス
    #[test]
    fn test_enrichment_cache_identity(len in 1usize..40, first in -10_000i64..10_000, step in 1i64..5_000) {
        let mut enricher = MoveEnricher::default();
        let moves = timed_log(len, first, step);

        let original = enricher.enrich(&moves);
        prop_assert!(Arc::ptr_eq(&original, &enricher.enrich(&moves)));

        let mut same_key = moves.clone();
        if len > 2 {
            same_key[1].x = (same_key[1].x + 1) % 8;
        }
        prop_assert!(Arc::ptr_eq(&original, &enricher.enrich(&same_key)));

        let longer = timed_log(len + 1, first, step);
        prop_assert!(!Arc::ptr_eq(&original, &enricher.enrich(&longer)));

        let mut earlier_start = moves.clone();
        earlier_start[0].timestamp -= 1;
        prop_assert!(!Arc::ptr_eq(&original, &enricher.enrich(&earlier_start)));

        let mut later_end = moves.clone();
        later_end[len - 1].timestamp += 1;
        prop_assert!(!Arc::ptr_eq(&original, &enricher.enrich(&later_end)));
    }

    /// プロパティ: 容量を超えると最初に入れたキーが追い出される（読み出し順は無関係）
    #[test]
    fn test_enrichment_cache_evicts_first_inserted(capacity in 1usize..12, reads in prop::collection::vec(0usize..12, 0..20)) {
        let mut enricher = MoveEnricher::new(capacity);
        let logs: Vec<Vec<Move>> = (1..=capacity + 1).map(|len| timed_log(len, 0, 1_000)).collect();

        for moves in &logs[..capacity] {
            enricher.enrich(moves);
        }
        for read in reads {
            enricher.enrich(&logs[read % capacity]);
        }
        enricher.enrich(&logs[capacity]);

        prop_assert_eq!(enricher.len(), capacity);
        prop_assert!(!enricher.is_cached(&logs[0]));
        for moves in &logs[1..] {
            prop_assert!(enricher.is_cached(moves));
        }
    }

    /// プロパティ: 評価値の差がしきい値を超えた場合だけターニングポイントになる
    #[test]
    fn test_turning_points_exceed_threshold(scores in prop::collection::vec(-200i32..200, 0..40), threshold in 0i32..60) {
        let moves = scored_log(&scores);
        let timeline = BoardTimeline::build(&BoardReconstructor::default(), &moves, threshold).unwrap();

        let expected: Vec<usize> = (1..scores.len())
            .filter(|&i| (scores[i] - scores[i - 1]).abs() > threshold)
            .collect();
        prop_assert_eq!(&timeline.turning_points, &expected);
    }

    /// プロパティ: 表示範囲の両端は常に[0, item_count - 1]に収まる
    #[test]
    fn test_visible_range_within_bounds(
        item_count in 0usize..5_000,
        item_height in 0.5f64..200.0,
        container_height in 0.0f64..5_000.0,
        overscan in 0usize..50,
        scroll_top in -1_000.0f64..1_000_000.0,
    ) {
        let scroll = VirtualScroll::new(item_height, container_height, overscan).unwrap();

        match scroll.visible_range(item_count, scroll_top) {
            None => prop_assert_eq!(item_count, 0),
            Some(range) => {
                prop_assert!(range.start <= range.end);
                prop_assert!(range.end < item_count);
            }
        }
    }

    /// プロパティ: 直近7日 ⊆ 30日 ⊆ 90日
    #[test]
    fn test_recent_windows_are_nested(game_count in 0usize..25, seed in any::<u64>(), spacing_hours in 1i64..400, days_later in 0i64..120) {
        let replays = generated_replays(game_count, seed, spacing_hours);
        let now = anchor() + Duration::days(days_later);
        let trends = StatisticsAggregator::new(Player::Black).statistics_at(&replays, now).recent_trends;

        prop_assert!(trends.last_7_days.games <= trends.last_30_days.games);
        prop_assert!(trends.last_30_days.games <= trends.last_90_days.games);
        prop_assert!(trends.last_90_days.games <= replays.len());
    }

    /// プロパティ: 制約なしの絞り込みは全要素をちょうど1回ずつ含む並び替えを返す
    #[test]
    fn test_unconstrained_filter_is_permutation(game_count in 0usize..20, seed in any::<u64>(), sort in sort_strategy()) {
        let replays = generated_replays(game_count, seed, 19);
        let result = ReplayQuery::new(Player::Black).apply(&replays, &FilterSpec::default(), &sort, Some(""));

        prop_assert_eq!(result.len(), replays.len());
        let ids: HashSet<Uuid> = result.iter().map(|r| r.id).collect();
        prop_assert_eq!(ids.len(), replays.len());
        prop_assert!(replays.iter().all(|r| ids.contains(&r.id)));
    }
}

#[test]
fn test_statistics_on_empty_input() {
    let stats = StatisticsAggregator::new(Player::Black).statistics_at(&[], anchor());

    assert_eq!(stats.total_games, 0);
    assert_eq!(stats.win_rate, 0.0);
    assert_eq!(stats.average_duration, 0);
    assert_eq!(stats.average_moves, 0);
    assert!(stats.performance_by_mode.values().all(|m| m.games == 0 && m.win_rate == 0.0));
    assert_eq!(stats.recent_trends.last_7_days.win_rate, 0.0);
    assert_eq!(stats.recent_trends.last_90_days.games, 0);
}

#[test]
fn test_three_move_scenario() {
    let moves = vec![
        Move::new(1, 1, 3, Player::Black, 0),
        Move::new(2, 2, 2, Player::White, 1_000).with_flips(vec![Position { x: 1, y: 3 }]),
        Move::new(3, 2, 1, Player::Black, 2_000).with_flips(vec![Position { x: 2, y: 2 }]),
    ];

    let states = reconstruct(&moves).unwrap();
    let counts: Vec<usize> = states.iter().map(|s| s.occupied_count()).collect();
    assert_eq!(counts, vec![1, 2, 3]);

    let last = &states[2];
    assert_eq!(last.get_cell(Position { x: 2, y: 1 }), Some(Cell::Black));
    assert_eq!(last.get_cell(Position { x: 2, y: 2 }), Some(Cell::Black));
    assert_eq!(last.get_cell(Position { x: 1, y: 3 }), Some(Cell::White));
}

#[test]
fn test_turning_point_boundary() {
    let moves = scored_log(&[10, 30, 51]);
    let timeline = BoardTimeline::build(&BoardReconstructor::default(), &moves, 20).unwrap();
    assert_eq!(timeline.turning_points, vec![2]);
}

#[test]
fn test_accuracy_sort_on_generated_replays() {
    let replays = generated_replays(12, 3, 19);
    assert!(replays.iter().all(|r| r.analysis.is_none()));

    let query = ReplayQuery::new(Player::Black);
    let accuracies = |direction| -> Vec<f64> {
        query
            .apply(&replays, &FilterSpec::default(), &SortSpec::new(SortField::Accuracy, direction), None)
            .iter()
            .map(|r| query.accuracy_of(r))
            .collect()
    };

    let ascending = accuracies(SortDirection::Ascending);
    let descending = accuracies(SortDirection::Descending);

    assert_eq!(ascending.len(), replays.len());
    assert!(ascending.windows(2).all(|w| w[0] <= w[1]));
    assert!(descending.windows(2).all(|w| w[0] >= w[1]));
    assert!(ascending[0] < ascending[ascending.len() - 1]);
}
