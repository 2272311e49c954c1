pub mod builder;
pub mod config;
pub mod draft;
pub mod error;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod scoring;
pub mod session;
pub mod state;
pub mod store;
pub mod validation;

use config::AppConfig;

pub fn build_state(config: AppConfig) -> anyhow::Result<state::AppState> {
    // fail early on a bad bind address instead of at serve time
    config.addr()?;
    Ok(state::AppState::new(config))
}
