//! リプレイ閲覧セッション管理モジュール
//! 閲覧者ごとに付加情報キャッシュと盤面キャッシュを持たせ、
//! セッション数制限、タイムアウト処理、クリーンアップを担当する。

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::api::dto::{ViewerApiError, ViewerResult};
use crate::engine::{
    with_placeholder_evaluations, BoardStateCache, BoardTimeline, EnrichedMove, MoveEnricher,
    ReplayAnalyzer, DEFAULT_BOARD_STATE_CAPACITY, DEFAULT_ENRICHMENT_CAPACITY,
    DEFAULT_TURNING_POINT_THRESHOLD,
};
use crate::game::{Analysis, InitialBoard, Replay};

/// セッションごとのキャッシュ設定
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewerCacheSettings {
    pub enrichment_capacity: usize,
    pub board_state_capacity: usize,
    pub initial_board: InitialBoard,
    pub turning_point_threshold: i32,
    /// 評価値のない手に仮評価値を入れてから処理する
    pub fill_missing_evaluations: bool,
}

impl Default for ViewerCacheSettings {
    fn default() -> Self {
        Self {
            enrichment_capacity: DEFAULT_ENRICHMENT_CAPACITY,
            board_state_capacity: DEFAULT_BOARD_STATE_CAPACITY,
            initial_board: InitialBoard::default(),
            turning_point_threshold: DEFAULT_TURNING_POINT_THRESHOLD,
            fill_missing_evaluations: false,
        }
    }
}

/// 1人の閲覧者が持つキャッシュ一式
#[derive(Debug)]
pub struct ViewerSession {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub last_access_at: DateTime<Utc>,
    enricher: MoveEnricher,
    board_cache: BoardStateCache,
    fill_missing_evaluations: bool,
}

impl ViewerSession {
    pub fn new(settings: ViewerCacheSettings) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            created_at: now,
            last_access_at: now,
            enricher: MoveEnricher::new(settings.enrichment_capacity),
            board_cache: BoardStateCache::new(
                settings.board_state_capacity,
                settings.initial_board,
                settings.turning_point_threshold,
            ),
            fill_missing_evaluations: settings.fill_missing_evaluations,
        }
    }

    /// 盤面列、付加済みの手、分析結果をまとめて作る
    /// キャッシュ済みのものは再利用する
    pub fn build_timeline(&mut self, replay: &Replay) -> ViewerResult<ReplayTimeline> {
        self.last_access_at = Utc::now();

        let filled;
        let moves = if self.fill_missing_evaluations {
            filled = with_placeholder_evaluations(&replay.moves);
            &filled[..]
        } else {
            &replay.moves[..]
        };

        let board = self.board_cache.get_or_build(replay.id, moves)?;
        let enriched = self.enricher.enrich(moves);
        let analysis = ReplayAnalyzer::analysis_for(replay, &enriched, &board);

        Ok(ReplayTimeline {
            board,
            moves: enriched,
            analysis,
        })
    }

    pub fn cached_timelines(&self) -> usize {
        self.board_cache.len()
    }

    pub fn cached_enrichments(&self) -> usize {
        self.enricher.len()
    }

    /// キャッシュをすべて破棄する
    pub fn clear_caches(&mut self) {
        self.enricher.clear();
        self.board_cache.clear();
    }
}

/// `build_timeline`の結果
/// キャッシュと同じ`Arc`を共有するので、同じ入力なら同じポインタになる
#[derive(Debug, Clone)]
pub struct ReplayTimeline {
    pub board: Arc<BoardTimeline>,
    pub moves: Arc<[EnrichedMove]>,
    pub analysis: Analysis,
}

/// 閲覧セッションの管理を行うメイン構造体
#[derive(Debug, Clone)]
pub struct ViewerSessionManager {
    sessions: Arc<DashMap<Uuid, ViewerSession>>,
    max_sessions: usize,
    session_timeout_minutes: i64,
    settings: ViewerCacheSettings,
}

impl ViewerSessionManager {
    /// デフォルトタイムアウト（30分）で作成
    pub fn new(max_sessions: usize) -> Self {
        Self::with_settings(max_sessions, 30, ViewerCacheSettings::default())
    }

    pub fn with_settings(max_sessions: usize, timeout_minutes: i64, settings: ViewerCacheSettings) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            max_sessions,
            session_timeout_minutes: timeout_minutes,
            settings,
        }
    }

    pub fn settings(&self) -> &ViewerCacheSettings {
        &self.settings
    }

    /// 新しい閲覧セッションを作成する
    /// 最大セッション数に達している場合はエラーを返す
    pub fn create_session(&self) -> ViewerResult<(Uuid, DateTime<Utc>)> {
        if self.sessions.len() >= self.max_sessions {
            return Err(ViewerApiError::MaxSessionsReached { max: self.max_sessions });
        }

        let session = ViewerSession::new(self.settings);
        let created = (session.id, session.created_at);
        self.sessions.insert(session.id, session);

        tracing::debug!(viewer_id = %created.0, "viewer session created");
        Ok(created)
    }

    /// セッションを削除し、そのキャッシュを破棄する
    pub fn remove_session(&self, viewer_id: &Uuid) -> ViewerResult<()> {
        match self.sessions.remove(viewer_id) {
            Some((_, mut session)) => {
                session.clear_caches();
                tracing::debug!(%viewer_id, "viewer session removed");
                Ok(())
            }
            None => Err(ViewerApiError::ViewerNotFound { viewer_id: *viewer_id }),
        }
    }

    /// セッションのロックを保持したまま再生用データを作る
    /// キャッシュの挿入と追い出しが途中の状態で他から見えることはない
    pub fn build_timeline(&self, viewer_id: &Uuid, replay: &Replay) -> ViewerResult<ReplayTimeline> {
        match self.sessions.get_mut(viewer_id) {
            Some(mut session) => session.build_timeline(replay),
            None => Err(ViewerApiError::ViewerNotFound { viewer_id: *viewer_id }),
        }
    }

    pub fn session_exists(&self, viewer_id: &Uuid) -> bool {
        self.sessions.contains_key(viewer_id)
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// 一定時間アクセスのないセッションを削除する
    pub fn cleanup_inactive_sessions(&self) -> usize {
        let cutoff_time = Utc::now() - Duration::minutes(self.session_timeout_minutes);

        let expired_ids: Vec<Uuid> = self
            .sessions
            .iter()
            .filter(|entry| entry.value().last_access_at < cutoff_time)
            .map(|entry| *entry.key())
            .collect();

        let removed_count = expired_ids
            .iter()
            .filter(|viewer_id| self.remove_session(viewer_id).is_ok())
            .count();

        if removed_count > 0 {
            tracing::info!(removed_count, "inactive viewer sessions cleaned up");
        }
        removed_count
    }

    /// 一定間隔でクリーンアップを実行するタスクを起動する
    pub fn spawn_cleanup(&self, interval: StdDuration) -> CleanupHandle {
        let manager = self.clone();
        let period = interval.max(StdDuration::from_millis(1));
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                manager.cleanup_inactive_sessions();
            }
        });

        tracing::debug!(interval_ms = period.as_millis() as u64, "session cleanup started");
        CleanupHandle { task }
    }

    pub fn get_stats(&self) -> SessionStats {
        let (cached_timelines, cached_enrichments) = self
            .sessions
            .iter()
            .fold((0, 0), |(timelines, enrichments), entry| {
                (
                    timelines + entry.value().cached_timelines(),
                    enrichments + entry.value().cached_enrichments(),
                )
            });

        SessionStats {
            total_sessions: self.sessions.len(),
            max_sessions: self.max_sessions,
            cached_timelines,
            cached_enrichments,
        }
    }
}

impl Default for ViewerSessionManager {
    fn default() -> Self {
        Self::new(100)
    }
}

/// クリーンアップタスクのハンドル。破棄するとタスクも止まる
#[derive(Debug)]
pub struct CleanupHandle {
    task: JoinHandle<()>,
}

impl CleanupHandle {
    pub fn stop(self) {
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for CleanupHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    pub total_sessions: usize,
    pub max_sessions: usize,
    pub cached_timelines: usize,
    pub cached_enrichments: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{MockReplaySource, MockSourceConfig};

    fn replays(count: usize) -> Vec<Replay> {
        MockReplaySource::new(MockSourceConfig {
            game_count: count,
            ..MockSourceConfig::default()
        })
        .generate()
    }

    fn standard_manager(max_sessions: usize) -> ViewerSessionManager {
        ViewerSessionManager::with_settings(
            max_sessions,
            30,
            ViewerCacheSettings {
                initial_board: InitialBoard::Standard,
                ..ViewerCacheSettings::default()
            },
        )
    }

    #[test]
    fn test_create_session() {
        let manager = ViewerSessionManager::new(10);
        let (viewer_id, _) = manager.create_session().unwrap();

        assert!(manager.session_exists(&viewer_id));
        assert_eq!(manager.session_count(), 1);
    }

    #[test]
    fn test_max_sessions_limit() {
        let manager = ViewerSessionManager::new(2);
        manager.create_session().unwrap();
        manager.create_session().unwrap();

        let result = manager.create_session();
        assert!(matches!(result, Err(ViewerApiError::MaxSessionsReached { max: 2 })));
    }

    #[test]
    fn test_build_timeline_reuses_cached_results() {
        let manager = standard_manager(10);
        let (viewer_id, _) = manager.create_session().unwrap();
        let replays = replays(1);
        let replay = &replays[0];

        let first = manager.build_timeline(&viewer_id, replay).unwrap();
        let second = manager.build_timeline(&viewer_id, replay).unwrap();

        assert!(Arc::ptr_eq(&first.board, &second.board));
        assert!(Arc::ptr_eq(&first.moves, &second.moves));
        assert_eq!(first.board.board_states.len(), replay.moves.len() + 1);
        assert_eq!(first.moves.len(), replay.moves.len());
    }

    #[test]
    fn test_sessions_have_separate_caches() {
        let manager = standard_manager(10);
        let (first_viewer, _) = manager.create_session().unwrap();
        let (second_viewer, _) = manager.create_session().unwrap();
        let replays = replays(1);
        let replay = &replays[0];

        let first = manager.build_timeline(&first_viewer, replay).unwrap();
        let second = manager.build_timeline(&second_viewer, replay).unwrap();

        assert!(!Arc::ptr_eq(&first.board, &second.board));
        assert_eq!(first.board, second.board);
        assert_eq!(manager.get_stats().cached_timelines, 2);
    }

    #[test]
    fn test_remove_session_clears_caches() {
        let manager = standard_manager(10);
        let (viewer_id, _) = manager.create_session().unwrap();
        manager.build_timeline(&viewer_id, &replays(1)[0]).unwrap();
        assert_eq!(manager.get_stats().cached_enrichments, 1);

        manager.remove_session(&viewer_id).unwrap();

        assert!(!manager.session_exists(&viewer_id));
        assert_eq!(manager.get_stats().cached_timelines, 0);
        assert!(matches!(
            manager.remove_session(&viewer_id),
            Err(ViewerApiError::ViewerNotFound { .. })
        ));
    }

    #[test]
    fn test_unknown_viewer() {
        let manager = ViewerSessionManager::new(10);
        let result = manager.build_timeline(&Uuid::new_v4(), &replays(1)[0]);
        assert!(matches!(result, Err(ViewerApiError::ViewerNotFound { .. })));
    }

    #[test]
    fn test_placeholder_evaluations_fill_every_move() {
        let manager = ViewerSessionManager::with_settings(
            10,
            30,
            ViewerCacheSettings {
                initial_board: InitialBoard::Standard,
                fill_missing_evaluations: true,
                ..ViewerCacheSettings::default()
            },
        );
        let (viewer_id, _) = manager.create_session().unwrap();

        let timeline = manager.build_timeline(&viewer_id, &replays(1)[0]).unwrap();
        assert!(timeline.moves.iter().all(|m| m.base.evaluation_score.is_some()));
        assert_eq!(timeline.board.evaluation_by_index.len(), timeline.moves.len());
    }

    #[test]
    fn test_stored_analysis_wins() {
        let manager = standard_manager(10);
        let (viewer_id, _) = manager.create_session().unwrap();
        let mut replay = replays(1).remove(0);

        let computed = manager.build_timeline(&viewer_id, &replay).unwrap().analysis;
        let mut stored = computed.clone();
        stored.opening = "Custom".to_string();
        replay.analysis = Some(stored.clone());

        assert_eq!(manager.build_timeline(&viewer_id, &replay).unwrap().analysis, stored);
    }

    #[tokio::test]
    async fn test_cleanup_inactive_sessions() {
        let manager = ViewerSessionManager::with_settings(10, 0, ViewerCacheSettings::default());
        manager.create_session().unwrap();
        assert_eq!(manager.session_count(), 1);

        tokio::time::sleep(tokio::time::Duration::from_millis(10)).await;
        let removed_count = manager.cleanup_inactive_sessions();

        assert_eq!(removed_count, 1);
        assert_eq!(manager.session_count(), 0);
    }

    #[test]
    fn test_session_stats() {
        let manager = ViewerSessionManager::new(10);
        let stats = manager.get_stats();

        assert_eq!(stats.total_sessions, 0);
        assert_eq!(stats.max_sessions, 10);
        assert_eq!(stats.cached_timelines, 0);
    }

    #[tokio::test]
    async fn test_cleanup_task_runs_until_stopped() {
        // タイムアウト0分なので作成直後のセッションも期限切れになる
        let manager = ViewerSessionManager::with_settings(10, 0, ViewerCacheSettings::default());
        manager.create_session().unwrap();

        let handle = manager.spawn_cleanup(StdDuration::from_millis(5));
        tokio::time::sleep(StdDuration::from_millis(50)).await;
        assert_eq!(manager.session_count(), 0);
        assert!(!handle.is_finished());

        handle.stop();
        tokio::task::yield_now().await;
        manager.create_session().unwrap();
        tokio::time::sleep(StdDuration::from_millis(50)).await;
        assert_eq!(manager.session_count(), 1);
    }
}
