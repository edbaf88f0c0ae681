use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::error::SourceError;
use crate::game::{
    all_positions, AlternativeMove, BoardState, Cell, EndReason, FinalScore, GameInfo, GameMode,
    GameResult, InitialBoard, Move, Player, PlayerInfo, Position, Replay, ReplayMetadata, Winner,
    BOARD_SIZE,
};

use super::service::{ReplaySource, ReplaySourceType};

const DIRECTIONS: [(i8, i8); 8] = [
    (-1, -1), (-1, 0), (-1, 1),
    (0, -1),           (0, 1),
    (1, -1),  (1, 0),  (1, 1),
];

const OPPONENT_NAMES: [&str; 4] = ["Hana", "Kenji", "Mio", "Sora"];
const TAGS: [&str; 5] = ["opening-study", "comeback", "blitz", "endgame", "review"];

/// モック供給元の設定
#[derive(Debug, Clone)]
pub struct MockSourceConfig {
    pub game_count: usize,
    pub seed: u64,
    /// 最新の対局の開始時刻。Noneなら生成時の現在時刻
    pub anchor: Option<DateTime<Utc>>,
    /// 対局間の間隔
    pub spacing: Duration,
    pub available: bool,
}

impl Default for MockSourceConfig {
    fn default() -> Self {
        Self {
            game_count: 40,
            seed: 2024,
            anchor: None,
            spacing: Duration::hours(19),
            available: true,
        }
    }
}

/// 標準初期配置から合法手だけで進めた対局を決定的に生成する
#[derive(Debug, Clone)]
pub struct MockReplaySource {
    config: MockSourceConfig,
    anchor: DateTime<Utc>,
}

impl MockReplaySource {
    pub fn new(config: MockSourceConfig) -> Self {
        let anchor = config.anchor.unwrap_or_else(Utc::now);
        Self { config, anchor }
    }

    pub fn new_default() -> Self {
        Self::new(MockSourceConfig::default())
    }

    pub fn new_unavailable() -> Self {
        Self::new(MockSourceConfig {
            available: false,
            ..MockSourceConfig::default()
        })
    }

    pub fn get_config(&self) -> &MockSourceConfig {
        &self.config
    }

    /// 設定に従って全リプレイを生成する
    pub fn generate(&self) -> Vec<Replay> {
        (0..self.config.game_count)
            .map(|index| self.generate_game(index))
            .collect()
    }

    fn generate_game(&self, index: usize) -> Replay {
        let mut rng = SplitMix::new(self.config.seed ^ (index as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15));
        let start_time = self.anchor - self.config.spacing * index as i32;
        let mode = GameMode::all()[rng.below(4) as usize];

        let moves = play_out(&mut rng, start_time.timestamp_millis());
        let board = final_board(&moves);
        let (black, white) = board.count_pieces();

        let start_millis = start_time.timestamp_millis();
        let last_timestamp = moves.last().map_or(start_millis, |m| m.timestamp);
        let end_time = start_time + Duration::milliseconds(last_timestamp - start_millis + 1_000);
        let duration_secs = (end_time - start_time).num_seconds().max(1) as u64;

        let winner = match black.cmp(&white) {
            std::cmp::Ordering::Greater => Winner::Black,
            std::cmp::Ordering::Less => Winner::White,
            std::cmp::Ordering::Equal => Winner::Draw,
        };
        let end_reason = if board.occupied_count() == usize::from(BOARD_SIZE) * usize::from(BOARD_SIZE) {
            EndReason::BoardFull
        } else {
            EndReason::NoValidMoves
        };

        let rating = 1_200 + rng.below(600) as i32;
        let player_white = match mode {
            GameMode::Ai | GameMode::Quest => PlayerInfo {
                rating: Some(1_000 + 100 * rng.below(10) as i32),
                ..PlayerInfo::ai(format!("Engine Lv{}", 1 + rng.below(8)))
            },
            GameMode::Battle | GameMode::Tournament => PlayerInfo {
                rating: Some(1_100 + rng.below(700) as i32),
                ..PlayerInfo::human(OPPONENT_NAMES[rng.below(OPPONENT_NAMES.len() as u64) as usize])
            },
        };

        let tags = (0..rng.below(3))
            .map(|_| TAGS[rng.below(TAGS.len() as u64) as usize].to_string())
            .fold(Vec::new(), |mut tags, tag| {
                if !tags.contains(&tag) {
                    tags.push(tag);
                }
                tags
            });

        Replay {
            id: Uuid::from_u128((u128::from(self.config.seed) << 64) | index as u128),
            mode,
            player_black: PlayerInfo {
                rating: Some(rating),
                ..PlayerInfo::human("Player")
            },
            player_white,
            result: GameResult {
                winner,
                final_score: FinalScore { black, white },
                end_reason,
            },
            game_info: GameInfo {
                start_time,
                end_time,
                duration_secs,
                total_moves: moves.len(),
            },
            moves,
            analysis: None,
            metadata: ReplayMetadata {
                tags,
                rating: Some(rating),
                notes: None,
                version: 1,
            },
        }
    }
}

#[async_trait]
impl ReplaySource for MockReplaySource {
    async fn load_replays(&self) -> Result<Vec<Replay>, SourceError> {
        if !self.config.available {
            return Err(SourceError::Unavailable {
                source_name: self.name().to_string(),
                reason: "Mock replay source is configured as unavailable".to_string(),
            });
        }
        Ok(self.generate())
    }

    fn name(&self) -> &'static str {
        "MockReplaySource"
    }

    fn source_type(&self) -> ReplaySourceType {
        ReplaySourceType::Mock
    }

    fn initial_board(&self) -> Option<InitialBoard> {
        Some(InitialBoard::Standard)
    }

    async fn is_available(&self) -> bool {
        self.config.available
    }
}

/// 合法手を選び続けて棋譜を作る。両者とも打てなくなったら終局
fn play_out(rng: &mut SplitMix, start_millis: i64) -> Vec<Move> {
    let mut board = BoardState::from_initial(InitialBoard::Standard);
    let mut player = Player::Black;
    let mut timestamp = start_millis;
    let mut moves = Vec::new();

    loop {
        let candidates = valid_moves(&board, player);
        if candidates.is_empty() {
            if valid_moves(&board, player.opposite()).is_empty() {
                break;
            }
            player = player.opposite();
            continue;
        }

        let choice = rng.below(candidates.len() as u64) as usize;
        let (position, flips) = candidates[choice].clone();
        let move_number = moves.len() as u32 + 1;
        timestamp += 500 + rng.below(7_500) as i64;

        board.set_cell(position, player.to_cell());
        for &flipped in &flips {
            board.set_cell(flipped, player.to_cell());
        }

        let mut game_move = Move::new(move_number, position.x, position.y, player, timestamp).with_flips(flips);

        // 一部の手だけ評価値付きにして、評価値のない手も混ぜる
        if move_number % 3 != 0 {
            let evaluation = rng.below(81) as i32 - 40;
            let alternatives = candidates
                .iter()
                .enumerate()
                .filter(|&(index, _)| index != choice)
                .take(2)
                .map(|(_, (alternative, _))| AlternativeMove {
                    x: alternative.x,
                    y: alternative.y,
                    score: evaluation - 1 - rng.below(10) as i32,
                })
                .collect();
            game_move = game_move
                .with_evaluation(evaluation)
                .with_optimal(evaluation >= 30)
                .with_alternatives(alternatives);
        }

        moves.push(game_move);
        player = player.opposite();
    }

    moves
}

fn final_board(moves: &[Move]) -> BoardState {
    let mut board = BoardState::from_initial(InitialBoard::Standard);
    for game_move in moves {
        board.set_cell(game_move.position(), game_move.player.to_cell());
        for &flipped in &game_move.flipped_cells {
            board.set_cell(flipped, game_move.player.to_cell());
        }
    }
    board
}

fn valid_moves(board: &BoardState, player: Player) -> Vec<(Position, Vec<Position>)> {
    all_positions()
        .filter(|&position| board.get_cell(position) == Some(Cell::Empty))
        .filter_map(|position| {
            let flips = flipped_positions(board, position, player);
            (!flips.is_empty()).then_some((position, flips))
        })
        .collect()
}

/// 8方向に相手の石が続き、自分の石で挟める範囲を集める
fn flipped_positions(board: &BoardState, position: Position, player: Player) -> Vec<Position> {
    let own = player.to_cell();
    let opponent = player.opposite().to_cell();
    let mut flipped = Vec::new();

    for &(dx, dy) in &DIRECTIONS {
        let mut line = Vec::new();
        let mut x = position.x as i8 + dx;
        let mut y = position.y as i8 + dy;

        while x >= 0 && y >= 0 {
            let Some(current) = Position::new(x as u8, y as u8) else {
                break;
            };
            match board.get_cell(current) {
                Some(cell) if cell == opponent => line.push(current),
                Some(cell) if cell == own => {
                    flipped.extend(line);
                    break;
                }
                _ => break,
            }
            x += dx;
            y += dy;
        }
    }

    flipped
}

/// 再現性のある軽量な乱数列
#[derive(Debug, Clone)]
struct SplitMix(u64);

impl SplitMix {
    fn new(seed: u64) -> Self {
        Self(seed)
    }

    fn next(&mut self) -> u64 {
        self.0 = self.0.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut z = self.0;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }

    /// `[0, bound)`の値（bound 0は0）
    fn below(&mut self, bound: u64) -> u64 {
        if bound == 0 {
            0
        } else {
            self.next() % bound
        }
    }
}
