//! HTTP API and terminal client for the persona agent.

pub mod app;
pub mod bootstrap;
pub mod cli;
pub mod config;
pub mod docs;
pub mod error;
pub mod handlers;
pub mod logging;
pub mod middleware;
pub mod routes;
pub mod state;

pub use app::build_router;
pub use config::Config;
pub use error::{ApiError, ApiResult};
pub use state::AppState;
