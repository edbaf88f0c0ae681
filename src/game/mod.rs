pub mod types;
pub mod board;
pub mod record;
pub mod validation;

pub use types::*;
pub use board::*;
pub use record::*;
pub use validation::*;
