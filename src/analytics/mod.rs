//! リプレイ集合の分析層
//! 統計集計、フィルタ・ソート、ウィンドウ化アクセスを提供する。

pub mod statistics;
pub mod filter;
pub mod window;

pub use statistics::*;
pub use filter::*;
pub use window::*;
