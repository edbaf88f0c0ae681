pub mod viewer_manager;

pub use viewer_manager::*;
