//! リプレイ集合の統計集計モジュール
//! 勝率、平均対局時間、平均手数、モード別成績、直近期間の傾向を計算する。
//! 増分更新はせず、呼び出しごとに集合全体から計算し直す。

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::engine::BoardTimeline;
use crate::game::{GameMode, Player, Replay};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModePerformance {
    pub games: usize,
    pub win_rate: f64,
}

/// 直近期間の集計
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrendBucket {
    pub games: usize,
    pub win_rate: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RecentTrends {
    pub last_7_days: TrendBucket,
    pub last_30_days: TrendBucket,
    pub last_90_days: TrendBucket,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    pub total_games: usize,
    /// 追跡対象プレイヤーの勝率（%）
    pub win_rate: f64,
    /// 平均対局時間（秒、四捨五入）
    pub average_duration: u64,
    /// 平均手数（四捨五入）
    pub average_moves: u64,
    pub performance_by_mode: BTreeMap<GameMode, ModePerformance>,
    pub recent_trends: RecentTrends,
}

/// 統計の集計器
/// 勝敗は追跡対象プレイヤーから見て判定する
#[derive(Debug, Clone, Copy)]
pub struct StatisticsAggregator {
    tracked: Player,
}

impl StatisticsAggregator {
    pub fn new(tracked: Player) -> Self {
        Self { tracked }
    }

    pub fn tracked(&self) -> Player {
        self.tracked
    }

    /// 現在時刻を基準に統計を計算する
    pub fn statistics(&self, replays: &[Replay]) -> Statistics {
        self.statistics_at(replays, Utc::now())
    }

    /// 指定時刻を基準に統計を計算する
    pub fn statistics_at(&self, replays: &[Replay], now: DateTime<Utc>) -> Statistics {
        let all: Vec<&Replay> = replays.iter().collect();
        let total = all.len();

        let performance_by_mode = GameMode::all()
            .into_iter()
            .map(|mode| {
                let games: Vec<&Replay> = all.iter().copied().filter(|r| r.mode == mode).collect();
                let performance = ModePerformance {
                    games: games.len(),
                    win_rate: self.win_rate(&games),
                };
                (mode, performance)
            })
            .collect();

        Statistics {
            total_games: total,
            win_rate: self.win_rate(&all),
            average_duration: rounded_average(all.iter().map(|r| r.game_info.duration_secs), total),
            average_moves: rounded_average(all.iter().map(|r| r.game_info.total_moves as u64), total),
            performance_by_mode,
            recent_trends: RecentTrends {
                last_7_days: self.trend(&all, now, 7),
                last_30_days: self.trend(&all, now, 30),
                last_90_days: self.trend(&all, now, 90),
            },
        }
    }

    /// 勝率（%）。空集合は0
    pub fn win_rate(&self, replays: &[&Replay]) -> f64 {
        if replays.is_empty() {
            return 0.0;
        }

        let wins = replays
            .iter()
            .filter(|r| r.result.winner.is_win_for(self.tracked))
            .count();
        100.0 * wins as f64 / replays.len() as f64
    }

    fn trend(&self, replays: &[&Replay], now: DateTime<Utc>, days: i64) -> TrendBucket {
        let window = Duration::days(days);
        let recent: Vec<&Replay> = replays
            .iter()
            .copied()
            .filter(|r| now - r.game_info.start_time <= window)
            .collect();

        TrendBucket {
            games: recent.len(),
            win_rate: self.win_rate(&recent),
        }
    }
}

impl Default for StatisticsAggregator {
    fn default() -> Self {
        Self::new(Player::Black)
    }
}

fn rounded_average(values: impl Iterator<Item = u64>, count: usize) -> u64 {
    if count == 0 {
        return 0;
    }
    let sum: u64 = values.sum();
    (sum as f64 / count as f64).round() as u64
}

/// 複数リプレイにまたがるターニングポイントの集計
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurningPointSummary {
    pub total: usize,
    /// リプレイごとのターニングポイント数
    pub per_replay: Vec<(Uuid, usize)>,
    pub largest_swing: Option<LargestSwing>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LargestSwing {
    pub replay_id: Uuid,
    pub move_index: usize,
    pub swing: i32,
}

pub fn aggregate_turning_points<'a, I>(timelines: I) -> TurningPointSummary
where
    I: IntoIterator<Item = (Uuid, &'a BoardTimeline)>,
{
    let mut per_replay = Vec::new();
    let mut largest_swing: Option<LargestSwing> = None;

    for (replay_id, timeline) in timelines {
        per_replay.push((replay_id, timeline.turning_points.len()));

        for &move_index in &timeline.turning_points {
            let Some(swing) = timeline.swing_at(move_index) else {
                continue;
            };
            let is_larger = largest_swing
                .map_or(true, |current| swing.unsigned_abs() > current.swing.unsigned_abs());
            if is_larger {
                largest_swing = Some(LargestSwing { replay_id, move_index, swing });
            }
        }
    }

    TurningPointSummary {
        total: per_replay.iter().map(|(_, count)| count).sum(),
        per_replay,
        largest_swing,
    }
}
