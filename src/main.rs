// src/main.rs

use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{http, middleware::Logger, web, App, HttpServer};
use env_logger::Env;
use log::info;

use petaboo_api::app_state::AppState;
use petaboo_api::auth::Authentication;
use petaboo_api::config::Config;
use petaboo_api::events::{EventBus, TeamEvent};
use petaboo_api::{db, routes};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let config = Config::from_env();
    let pool = db::connect(&config.database_url)
        .await
        .map_err(|e| std::io::Error::other(format!("database init failed: {}", e)))?;

    let events = Arc::new(EventBus::new());
    // Operational trace of join traffic; the live notifier hangs off the
    // same bus.
    events.on(|event| {
        if let TeamEvent::JoinRequested { team_id, user_id, .. } = event {
            info!("user {} requested to join team {}", user_id, team_id);
        }
    });

    info!("server running at http://{}", config.bind_addr);
    info!("allowed CORS origins: {:?}", config.allowed_origins);

    let state = AppState {
        db: pool,
        config: config.clone(),
        events: events.clone(),
    };

    let server = HttpServer::new(move || {
        let mut cors = Cors::default()
            .allowed_methods(vec!["GET", "POST", "PUT", "PATCH", "DELETE", "OPTIONS"])
            .allowed_headers(vec![
                http::header::CONTENT_TYPE,
                http::header::ACCEPT,
                http::header::AUTHORIZATION,
            ])
            .supports_credentials()
            .max_age(3600);
        for origin in &state.config.allowed_origins {
            cors = cors.allowed_origin(origin);
        }

        App::new()
            .wrap(Logger::default())
            .wrap(cors)
            .wrap(Authentication)
            .app_data(web::Data::new(state.clone()))
            .configure(routes)
    })
    .bind(&config.bind_addr)?
    .run()
    .await;

    events.shutdown();
    server
}
