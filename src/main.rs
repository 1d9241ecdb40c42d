//! Bike Rental Backend
//!
//! REST backend for station slot allocation and the rental lifecycle, with
//! SQLite persistence and Tantivy station search.

mod api;
mod auth;
mod config;
mod db;
mod errors;
mod models;
mod rentals;
mod search;
mod slots;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use config::Config;
use db::Repository;
use search::SearchIndex;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub search: Arc<SearchIndex>,
    pub config: Arc<Config>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env();

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Bike Rental Backend");
    tracing::info!("Database path: {:?}", config.db_path);
    tracing::info!("Index path: {:?}", config.index_path);
    tracing::info!("Bind address: {}", config.bind_addr);

    if config.api_psk.is_none() {
        tracing::warn!("No admin key configured (RENTAL_API_PSK). Admin routes are open!");
    }

    let pool = db::init_database(&config.db_path).await?;
    let repo = Arc::new(Repository::new(pool));

    let search = Arc::new(SearchIndex::open(&config.index_path)?);

    tracing::info!("Building station index...");
    let stations = repo.list_stations().await?;
    search.rebuild(&stations).await?;
    tracing::info!("Station index built with {} stations", stations.len());

    let state = AppState {
        repo,
        search,
        config: Arc::new(config.clone()),
    };

    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let psk = state.config.api_psk.clone();

    // Rider-facing routes
    let public_routes = Router::new()
        .route("/datastore", get(api::get_datastore))
        .route("/datastore/revision", get(api::get_revision))
        .route("/stations", get(api::list_stations))
        .route("/stations/{key}", get(api::get_station))
        .route("/stations/{key}/slots", get(api::get_slots))
        .route("/search", get(api::search_stations))
        .route("/rentals", get(api::list_rentals).post(api::start_rental))
        .route("/rentals/{id}", get(api::get_rental))
        .route("/rentals/{id}/return", post(api::return_rental))
        .route("/users/{id}", get(api::get_user))
        .route("/session", get(api::get_session).put(api::set_session));

    // Administration, behind the pre-shared key
    let admin_routes = Router::new()
        .route("/users", get(api::list_users).post(api::create_user))
        .route("/users/{id}", put(api::update_user))
        .route("/bicycles", get(api::list_bicycles).post(api::create_bicycle))
        .route("/bicycles/{id}", delete(api::delete_bicycle))
        .route("/stations/{key}/slots/{slot_id}", put(api::update_slot))
        .route("/stations/{key}/slots/reset", post(api::reset_slots))
        .route("/dashboard", get(api::get_dashboard))
        .layer(middleware::from_fn(move |req, next| {
            auth::admin_key_layer(psk.clone(), req, next)
        }));

    let health_routes = Router::new().route("/health", get(health_check));

    Router::new()
        .nest("/api", public_routes.merge(admin_routes))
        .merge(health_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}
