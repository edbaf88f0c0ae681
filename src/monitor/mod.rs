//! パフォーマンス監視
//! 他のモジュールには依存せず、描画時間とメモリ使用量から改善提案を作る。

pub mod memory;
pub mod performance;

pub use memory::*;
pub use performance::*;
