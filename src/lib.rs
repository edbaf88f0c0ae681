pub mod game;
pub mod engine;
pub mod analytics;
pub mod monitor;
pub mod source;
pub mod session;
pub mod api;
pub mod error;
pub mod config;

pub use error::{ReplayError, Result, SourceError, ValidationError};
pub use config::Config;
