//! リプレイ供給元
//! 供給元の抽象化、モック生成、ファイル・メモリ上の集合、検証済みカタログを提供する。

pub mod service;
pub mod mock_source;
pub mod memory_source;
pub mod catalog;

pub use service::*;
pub use mock_source::*;
pub use memory_source::*;
pub use catalog::*;
