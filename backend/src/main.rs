use quizforge::{build_state, config::AppConfig, routes::build_router};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .json()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let config = AppConfig::from_env();
    let addr = config.addr()?;
    if config.admin_emails.is_empty() {
        tracing::warn!("ADMIN_EMAILS is empty, nobody can author quizzes");
    }
    match config.local_state_path.as_deref() {
        Some(path) => tracing::info!("persisting quizzes to {}", path),
        None => tracing::info!("running in memory only"),
    }

    let state = build_state(config)?;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("quiz service listening on {}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}
