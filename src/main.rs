use axum::{routing::get, Router};
use dotenvy::dotenv;
use log::{info, warn};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use churchserver::config::AppConfig;
use churchserver::core::rate_limit::RateLimitState;
use churchserver::cron::configure_cron_routes;
use churchserver::email::SmtpMailer;
use churchserver::legal::configure_legal_routes;
use churchserver::shared::state::AppState;
use churchserver::shared::utils::create_conn;
use churchserver::store::PgLegalStore;

async fn health() -> &'static str {
    "ok"
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = AppConfig::from_env();
    if config.cron.secret.is_none() {
        warn!("CRON_SECRET is not set; cron endpoints will refuse every request");
    }

    let conn = create_conn(&config.database_url)?;
    let state = Arc::new(AppState {
        store: Arc::new(PgLegalStore::new(conn.clone())),
        mailer: Arc::new(SmtpMailer::new(config.smtp.clone())),
        rate_limit: Arc::new(RateLimitState::from_env()),
        config: config.clone(),
        conn,
    });

    let app = Router::new()
        .route("/health", get(health))
        .merge(configure_cron_routes())
        .merge(configure_legal_routes())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    info!("churchserver listening on {addr}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
