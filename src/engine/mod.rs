//! リプレイ再構築エンジン
//! 盤面再構築、手の付加情報、盤面キャッシュ、分析結果の生成を提供する。

pub mod fifo_cache;
pub mod reconstruction;
pub mod enrichment;
pub mod board_cache;
pub mod analysis;

pub use fifo_cache::*;
pub use reconstruction::*;
pub use enrichment::*;
pub use board_cache::*;
pub use analysis::*;
