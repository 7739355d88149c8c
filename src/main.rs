use std::sync::{Arc, Mutex};

use axum::http::HeaderValue;
use axum::routing::{get, post, put};
use axum::Router;
use tokio::sync::broadcast;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use barbershop::config::AppConfig;
use barbershop::db;
use barbershop::handlers;
use barbershop::services::identity::HttpIdentityProvider;
use barbershop::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();

    let conn = db::init_db(&config.database_url)?;

    if config.identity_api_key.is_empty() {
        tracing::warn!("IDENTITY_API_KEY is not set; barber login will be rejected upstream");
    }
    let identity = HttpIdentityProvider::new(
        config.identity_url.clone(),
        config.identity_api_key.clone(),
    );

    let (events_tx, _) = broadcast::channel(256);

    let cors = CorsLayer::new()
        .allow_origin(config.frontend_origin.parse::<HeaderValue>()?)
        .allow_methods(Any)
        .allow_headers(Any);

    let state = Arc::new(AppState {
        db: Arc::new(Mutex::new(conn)),
        config: config.clone(),
        identity: Box::new(identity),
        events_tx,
    });

    let app = Router::new()
        .route("/health", get(handlers::health::health))
        .route("/api/auth/login", post(handlers::auth::login))
        .route("/api/auth/session", get(handlers::auth::session))
        .route("/api/barbers", get(handlers::barbers::list))
        .route("/api/barbers/:id", get(handlers::barbers::get))
        .route("/api/barbers/:id/hours", put(handlers::barbers::update_hours))
        .route(
            "/api/barbers/:id/appointments",
            get(handlers::barbers::day),
        )
        .route("/api/services", get(handlers::catalog::list_services))
        .route("/api/availability", get(handlers::availability::free_slots))
        .route(
            "/api/appointments",
            post(handlers::appointments::create).get(handlers::appointments::list),
        )
        .route(
            "/api/appointments/:id",
            get(handlers::appointments::get).patch(handlers::appointments::transition),
        )
        .route("/api/events", get(handlers::events::stream))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
