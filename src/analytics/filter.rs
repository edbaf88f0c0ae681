//! リプレイ集合の絞り込み・並び替えパイプライン
//! すべての条件を満たすリプレイだけを残し（AND条件）、指定フィールドで安定ソートする。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::str::FromStr;

use crate::engine::{enrich_moves, ReplayAnalyzer};
use crate::error::ReplayError;
use crate::game::{GameMode, Player, PlayerKind, Replay, Winner};

/// 相手の種別による絞り込み
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OpponentFilter {
    #[default]
    Any,
    Human,
    Ai,
}

/// 追跡対象プレイヤーから見た結果による絞り込み
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ResultFilter {
    #[default]
    Any,
    Win,
    Loss,
    Draw,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingRange {
    pub min: i32,
    pub max: i32,
}

/// 絞り込み条件
/// 未指定・空集合・Anyは「制約なし」を意味する
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterSpec {
    #[serde(default)]
    pub modes: BTreeSet<GameMode>,
    #[serde(default)]
    pub opponent: OpponentFilter,
    #[serde(default)]
    pub result: ResultFilter,
    #[serde(default)]
    pub date_range: Option<DateRange>,
    #[serde(default)]
    pub min_duration_secs: Option<u64>,
    #[serde(default)]
    pub max_duration_secs: Option<u64>,
    #[serde(default)]
    pub rating_range: Option<RatingRange>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub query: Option<String>,
}

impl FilterSpec {
    /// 制約が一つもないかどうか
    pub fn is_unconstrained(&self) -> bool {
        self.modes.is_empty()
            && self.opponent == OpponentFilter::Any
            && self.result == ResultFilter::Any
            && self.date_range.is_none()
            && self.min_duration_secs.is_none()
            && self.max_duration_secs.is_none()
            && self.rating_range.is_none()
            && self.tags.is_empty()
            && self.query.as_deref().map_or(true, |q| q.trim().is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SortField {
    #[default]
    Date,
    Duration,
    Rating,
    Accuracy,
    MoveCount,
}

impl FromStr for SortField {
    type Err = ReplayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "date" => Ok(SortField::Date),
            "duration" => Ok(SortField::Duration),
            "rating" => Ok(SortField::Rating),
            "accuracy" => Ok(SortField::Accuracy),
            "movecount" | "move_count" | "moves" => Ok(SortField::MoveCount),
            _ => Err(ReplayError::UnknownSortField { field: s.to_string() }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SortDirection {
    Ascending,
    #[default]
    Descending,
}

impl FromStr for SortDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "asc" | "ascending" => Ok(SortDirection::Ascending),
            "desc" | "descending" => Ok(SortDirection::Descending),
            _ => Err(format!("Invalid sort direction: {}. Valid options: asc, desc", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: SortField,
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn new(field: SortField, direction: SortDirection) -> Self {
        Self { field, direction }
    }
}

/// 絞り込みと並び替えの実行器
#[derive(Debug, Clone, Copy)]
pub struct ReplayQuery {
    tracked: Player,
}

impl ReplayQuery {
    pub fn new(tracked: Player) -> Self {
        Self { tracked }
    }

    /// 条件を満たすリプレイを並び替えて返す
    /// `search_text`は`filter.query`とは別のAND条件として扱う
    pub fn apply<'a>(
        &self,
        replays: &'a [Replay],
        filter: &FilterSpec,
        sort: &SortSpec,
        search_text: Option<&str>,
    ) -> Vec<&'a Replay> {
        let matched: Vec<&Replay> = replays
            .iter()
            .filter(|replay| self.matches(replay, filter))
            .filter(|replay| search_text.map_or(true, |text| matches_search(replay, text)))
            .collect();

        let mut keyed: Vec<(SortValue, &Replay)> = matched
            .into_iter()
            .map(|replay| (self.sort_value(replay, sort.field), replay))
            .collect();

        keyed.sort_by(|(a, _), (b, _)| {
            let ordering = a.compare(b);
            match sort.direction {
                SortDirection::Ascending => ordering,
                SortDirection::Descending => ordering.reverse(),
            }
        });

        keyed.into_iter().map(|(_, replay)| replay).collect()
    }

    /// 所有権付きの結果が必要な場合
    pub fn apply_owned(
        &self,
        replays: &[Replay],
        filter: &FilterSpec,
        sort: &SortSpec,
        search_text: Option<&str>,
    ) -> Vec<Replay> {
        self.apply(replays, filter, sort, search_text)
            .into_iter()
            .cloned()
            .collect()
    }

    /// リプレイが全条件を満たすかどうか
    pub fn matches(&self, replay: &Replay, filter: &FilterSpec) -> bool {
        if !filter.modes.is_empty() && !filter.modes.contains(&replay.mode) {
            return false;
        }

        let opponent_kind = replay.opponent_of(self.tracked).kind;
        let opponent_ok = match filter.opponent {
            OpponentFilter::Any => true,
            OpponentFilter::Human => opponent_kind == PlayerKind::Human,
            OpponentFilter::Ai => opponent_kind == PlayerKind::Ai,
        };
        if !opponent_ok {
            return false;
        }

        let winner = replay.result.winner;
        let result_ok = match filter.result {
            ResultFilter::Any => true,
            ResultFilter::Win => winner.is_win_for(self.tracked),
            ResultFilter::Loss => winner.is_loss_for(self.tracked),
            ResultFilter::Draw => winner == Winner::Draw,
        };
        if !result_ok {
            return false;
        }

        if let Some(range) = filter.date_range {
            let start = replay.game_info.start_time;
            if start < range.from || start > range.to {
                return false;
            }
        }

        let duration = replay.game_info.duration_secs;
        if filter.min_duration_secs.is_some_and(|min| duration < min) {
            return false;
        }
        if filter.max_duration_secs.is_some_and(|max| duration > max) {
            return false;
        }

        if let Some(range) = filter.rating_range {
            match replay.metadata.rating {
                Some(rating) if rating >= range.min && rating <= range.max => {}
                _ => return false,
            }
        }

        if !filter.tags.is_empty() {
            let wanted: Vec<String> = filter.tags.iter().map(|tag| tag.to_lowercase()).collect();
            let has_tag = replay
                .metadata
                .tags
                .iter()
                .any(|tag| wanted.contains(&tag.to_lowercase()));
            if !has_tag {
                return false;
            }
        }

        match filter.query.as_deref() {
            Some(query) => matches_search(replay, query),
            None => true,
        }
    }

    /// 追跡対象プレイヤーの精度
    /// 保存済みの分析があればその値、なければ棋譜の品質スコアから求める
    pub fn accuracy_of(&self, replay: &Replay) -> f64 {
        match &replay.analysis {
            Some(analysis) => analysis.accuracy.for_player(self.tracked),
            None => ReplayAnalyzer::side_accuracy(&enrich_moves(&replay.moves), self.tracked),
        }
    }

    fn sort_value(&self, replay: &Replay, field: SortField) -> SortValue {
        match field {
            SortField::Date => SortValue::Time(replay.game_info.start_time),
            SortField::Duration => SortValue::Count(replay.game_info.duration_secs),
            SortField::Rating => SortValue::Rating(replay.metadata.rating),
            SortField::Accuracy => SortValue::Accuracy(self.accuracy_of(replay)),
            SortField::MoveCount => SortValue::Count(replay.game_info.total_moves as u64),
        }
    }
}

/// 並び替えキー。精度は並び替えの前に一度だけ計算する
#[derive(Debug, Clone, Copy)]
enum SortValue {
    Time(DateTime<Utc>),
    Count(u64),
    Rating(Option<i32>),
    Accuracy(f64),
}

impl SortValue {
    fn compare(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Time(a), Self::Time(b)) => a.cmp(b),
            (Self::Count(a), Self::Count(b)) => a.cmp(b),
            // 欠損値は最小として扱う（Noneは常にSomeより小さい）
            (Self::Rating(a), Self::Rating(b)) => a.cmp(b),
            (Self::Accuracy(a), Self::Accuracy(b)) => a.total_cmp(b),
            _ => Ordering::Equal,
        }
    }
}

impl Default for ReplayQuery {
    fn default() -> Self {
        Self::new(Player::Black)
    }
}

/// 大文字小文字を区別せず、対局者名・モード名・タグのいずれかに部分一致するか
/// 空白のみの検索文字列は制約なし
pub fn matches_search(replay: &Replay, text: &str) -> bool {
    let needle = text.trim().to_lowercase();
    if needle.is_empty() {
        return true;
    }

    replay.player_black.name.to_lowercase().contains(&needle)
        || replay.player_white.name.to_lowercase().contains(&needle)
        || replay.mode.label().contains(&needle)
        || replay
            .metadata
            .tags
            .iter()
            .any(|tag| tag.to_lowercase().contains(&needle))
}
