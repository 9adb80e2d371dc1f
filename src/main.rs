use axum::Router;
use axum::routing::get;
use log::info;
use simplelog::{ColorChoice, Config as LogConfig, LevelFilter, TermLogger, TerminalMode};
use tower_http::cors::CorsLayer;

use dm_service::integration::db;
use dm_service::state::AppState;
use dm_service::{auth, chat};

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    TermLogger::init(
        LevelFilter::Info,
        LogConfig::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )
    .expect("logger should initialize");

    let config = db::Config::env().unwrap_or_default();
    let state = AppState::init(&config);

    let app = Router::new()
        .merge(chat::api(state.clone()))
        .layer(axum::middleware::from_fn(auth::middleware::identify))
        .route("/health", get(|| async { "OK" }))
        .layer(CorsLayer::permissive());

    let addr = "0.0.0.0:8000";
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("listener should bind");

    axum::serve(listener, app).await.expect("server should start");
}
