//! 盤面スナップショットのキャッシュ
//! 再構築した盤面列と、座標→手のインデックス、評価値、ターニングポイントの索引を
//! リプレイごとにまとめて保持する。

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use uuid::Uuid;

use super::fifo_cache::FifoCache;
use super::reconstruction::{BoardReconstructor, SnapshotOffset};
use crate::error::Result;
use crate::game::{BoardState, InitialBoard, Move};

/// 盤面キャッシュのデフォルト容量
pub const DEFAULT_BOARD_STATE_CAPACITY: usize = 5;

/// ターニングポイントとみなす評価値の変化量（これを超えた場合のみ）
pub const DEFAULT_TURNING_POINT_THRESHOLD: i32 = 20;

/// 1局分の再構築結果と索引
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoardTimeline {
    pub board_states: Vec<BoardState>,
    /// 座標キー → 手のインデックス
    pub move_index: HashMap<String, usize>,
    /// 手のインデックス → 評価値（評価値のある手のみ）
    pub evaluation_by_index: BTreeMap<usize, i32>,
    /// ターニングポイントとなる手のインデックス
    pub turning_points: Vec<usize>,
    pub offset: SnapshotOffset,
}

impl BoardTimeline {
    /// 棋譜から索引付きの盤面列を構築する
    pub fn build(
        reconstructor: &BoardReconstructor,
        moves: &[Move],
        turning_point_threshold: i32,
    ) -> Result<Self> {
        let board_states = match reconstructor.initial() {
            InitialBoard::Empty => reconstructor.reconstruct(moves)?,
            InitialBoard::Standard => reconstructor.reconstruct_with_initial(moves)?,
        };
        let offset = SnapshotOffset::detect(board_states.len(), moves.len());

        let mut move_index = HashMap::with_capacity(moves.len());
        let mut evaluation_by_index = BTreeMap::new();
        let mut turning_points = Vec::new();

        for (index, game_move) in moves.iter().enumerate() {
            move_index.insert(game_move.position().key(), index);

            let Some(score) = game_move.evaluation_score else {
                continue;
            };
            evaluation_by_index.insert(index, score);

            let previous = index
                .checked_sub(1)
                .and_then(|prev| moves[prev].evaluation_score);
            if let Some(previous) = previous {
                let swing = (i64::from(score) - i64::from(previous)).abs();
                if swing > i64::from(turning_point_threshold) {
                    turning_points.push(index);
                }
            }
        }

        Ok(Self {
            board_states,
            move_index,
            evaluation_by_index,
            turning_points,
            offset,
        })
    }

    /// `move_index`番目の手を適用した後の盤面
    pub fn board_after(&self, move_index: usize) -> Option<&BoardState> {
        self.board_states.get(self.offset.index_of(move_index))
    }

    /// 初期盤面（スナップショット列に含まれる場合のみ）
    pub fn initial_board(&self) -> Option<&BoardState> {
        self.offset
            .initial_index()
            .and_then(|index| self.board_states.get(index))
    }

    /// 指定座標に置かれた手のインデックス
    pub fn move_at(&self, position_key: &str) -> Option<usize> {
        self.move_index.get(position_key).copied()
    }

    /// 評価値の変化量（直前の手との差）
    pub fn swing_at(&self, move_index: usize) -> Option<i32> {
        let current = self.evaluation_by_index.get(&move_index)?;
        let previous = self.evaluation_by_index.get(&move_index.checked_sub(1)?)?;
        Some(current.saturating_sub(*previous))
    }
}

/// リプレイ単位の盤面キャッシュ
/// キーは(リプレイID, 手数)
#[derive(Debug, Clone)]
pub struct BoardStateCache {
    cache: FifoCache<(Uuid, usize), Arc<BoardTimeline>>,
    reconstructor: BoardReconstructor,
    turning_point_threshold: i32,
}

impl BoardStateCache {
    pub fn new(capacity: usize, initial: InitialBoard, turning_point_threshold: i32) -> Self {
        Self {
            cache: FifoCache::new(capacity),
            reconstructor: BoardReconstructor::new(initial),
            turning_point_threshold,
        }
    }

    /// キャッシュ済みならそれを返し、なければ構築して保存する
    /// 再構築に失敗した場合はエラーを返し、キャッシュには何も残さない
    pub fn get_or_build(&mut self, replay_id: Uuid, moves: &[Move]) -> Result<Arc<BoardTimeline>> {
        let key = (replay_id, moves.len());

        if let Some(cached) = self.cache.get(&key) {
            return Ok(Arc::clone(cached));
        }

        let timeline = Arc::new(BoardTimeline::build(
            &self.reconstructor,
            moves,
            self.turning_point_threshold,
        )?);
        tracing::debug!(%replay_id, moves = moves.len(), "built board timeline");

        if let Some(((evicted_id, _), _)) = self.cache.insert(key, Arc::clone(&timeline)) {
            tracing::debug!(%evicted_id, "board state cache evicted oldest entry");
        }

        Ok(timeline)
    }

    pub fn is_cached(&self, replay_id: Uuid, move_count: usize) -> bool {
        self.cache.contains_key(&(replay_id, move_count))
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    pub fn clear(&mut self) {
        self.cache.clear();
    }
}

impl Default for BoardStateCache {
    fn default() -> Self {
        Self::new(
            DEFAULT_BOARD_STATE_CAPACITY,
            InitialBoard::Empty,
            DEFAULT_TURNING_POINT_THRESHOLD,
        )
    }
}
