use axum::{
    routing::{get, post},
    Json, Router,
};
use sea_orm_migration::MigratorTrait;
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use encore_db::AppState;

mod error;
mod forms;
mod pages;
mod templates;

#[derive(Serialize)]
struct ApiStatus {
    status: &'static str,
    version: &'static str,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Database connection
    let db_config = encore_db::DatabaseConfig::from_env();
    tracing::info!("connecting to database...");
    let db = encore_db::connect(&db_config)
        .await
        .expect("failed to connect to database");

    // Run migrations
    tracing::info!("running database migrations...");
    encore_migration::Migrator::up(&db, None)
        .await
        .expect("failed to run migrations");
    tracing::info!("migrations complete");

    let state = Arc::new(AppState { db });

    let app = Router::new()
        .route("/", get(pages::home))
        .route("/venues", get(pages::venues::list_venues))
        .route("/venues/search", post(pages::venues::search_venues))
        .route(
            "/venues/create",
            get(pages::venues::new_venue_form).post(pages::venues::create_venue),
        )
        .route(
            "/venues/{id}",
            get(pages::venues::show_venue).delete(pages::venues::delete_venue),
        )
        .route(
            "/venues/{id}/edit",
            get(pages::venues::edit_venue_form).post(pages::venues::update_venue),
        )
        .route("/artists", get(pages::artists::list_artists))
        .route("/artists/search", post(pages::artists::search_artists))
        .route(
            "/artists/create",
            get(pages::artists::new_artist_form).post(pages::artists::create_artist),
        )
        .route("/artists/{id}", get(pages::artists::show_artist))
        .route(
            "/artists/{id}/edit",
            get(pages::artists::edit_artist_form).post(pages::artists::update_artist),
        )
        .route("/shows", get(pages::shows::list_shows))
        .route(
            "/shows/create",
            get(pages::shows::new_show_form).post(pages::shows::create_show),
        )
        .route("/healthz", get(healthz))
        .fallback(pages::not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let port = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3000);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!(%addr, "server started");

    axum::serve(
        tokio::net::TcpListener::bind(addr)
            .await
            .expect("failed to bind address"),
        app,
    )
    .await
    .expect("server error");
}

async fn healthz() -> Json<ApiStatus> {
    Json(ApiStatus {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}
