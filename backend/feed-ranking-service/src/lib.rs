pub mod bootstrap;
pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod jobs;
pub mod metrics;
pub mod models;
pub mod queue;
pub mod services;
pub mod telemetry;
pub mod utils;

pub use bootstrap::AppState;
pub use config::Config;
pub use error::{AppError, Result};
