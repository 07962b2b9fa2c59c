//! Unified gateway: HTTP proxy for caller-specified MySQL execution and
//! Qianfan text-to-image generation. Stateless per request; every response
//! uses one JSON envelope shape.

pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod image;
pub mod response;
pub mod routes;
pub mod state;
pub mod validate;

pub use config::{AppConfig, ConfigError};
pub use error::AppError;
pub use routes::app;
pub use state::AppState;
