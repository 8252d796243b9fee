use std::sync::Arc;

use actix_web::middleware::{Logger, from_fn};
use actix_web::{App, HttpServer};
use tracing::{error, info};

use student_management::config::AppConfig;
use student_management::middleware::session_middleware;
use student_management::responses::ContextRenderer;
use student_management::services::user_service::UserService;
use student_management::state::AppState;
use student_management::{db, logging};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();

    let config = AppConfig::from_env().map_err(std::io::Error::other)?;
    logging::init(&config.log_level);

    info!("Connecting to database...");
    let db = db::establish_connection(&config.database_url)
        .await
        .map_err(std::io::Error::other)?;
    db::create_schema(&db).await.map_err(std::io::Error::other)?;
    info!("Database connected!");

    if let Some(admin) = &config.bootstrap_admin {
        match UserService::ensure_bootstrap_admin(&db, admin).await {
            Ok(true) => info!("Bootstrap admin {} created", admin.email),
            Ok(false) => {}
            Err(e) => error!("Failed to create bootstrap admin {}: {}", admin.email, e),
        }
    }

    let state = AppState::new(
        db,
        config.session.clone(),
        config.media_root.clone(),
        Arc::new(ContextRenderer),
    );

    match state.sessions.purge_expired().await {
        Ok(0) => {}
        Ok(count) => info!("Purged {} expired sessions", count),
        Err(e) => error!("Failed to purge expired sessions: {}", e),
    }

    info!("Starting server on http://{}:{}", config.host, config.port);

    HttpServer::new(move || {
        let state = state.clone();
        App::new()
            .wrap(from_fn(session_middleware))
            .wrap(Logger::default())
            .configure(move |cfg| state.configure(cfg))
    })
        .bind((config.host.as_str(), config.port))?
        .run()
        .await
}
