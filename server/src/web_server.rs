use std::sync::Arc;
use std::sync::atomic::AtomicU64;

use axum::{
    Router,
    extract::{State, WebSocketUpgrade},
    response::IntoResponse,
    routing::get,
};
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
};

use common::log;

use crate::api;
use crate::broadcaster::Broadcaster;
use crate::server_config::{MatchSettings, ServerConfig};
use crate::session_manager::SessionManager;
use crate::store::MemoryStore;
use crate::ws_handler::handle_websocket;

pub type AppSessionManager = SessionManager<MemoryStore, Broadcaster>;

#[derive(Clone)]
pub struct WebServerState {
    pub session_manager: AppSessionManager,
    pub broadcaster: Broadcaster,
    pub store: MemoryStore,
    pub next_connection_id: Arc<AtomicU64>,
    pub default_page_size: usize,
}

impl WebServerState {
    pub fn new(store: MemoryStore, settings: MatchSettings, default_page_size: usize) -> Self {
        let broadcaster = Broadcaster::new();
        Self {
            session_manager: SessionManager::new(store.clone(), broadcaster.clone(), settings),
            broadcaster,
            store,
            next_connection_id: Arc::new(AtomicU64::new(1)),
            default_page_size,
        }
    }
}

pub fn build_router(state: WebServerState, static_files_path: Option<&str>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let mut router = Router::new()
        .route("/ws", get(ws_upgrade_handler))
        .route("/api/leaderboard", get(api::leaderboard))
        .route("/api/leaderboard/player/{username}", get(api::player_stats))
        .route("/api/games/{session_id}", get(api::game_record));

    if let Some(path) = static_files_path {
        router = router.nest_service("/ui", ServeDir::new(path));
    }

    router.layer(cors).with_state(state)
}

pub async fn run_web_server(state: WebServerState, config: &ServerConfig) -> std::io::Result<()> {
    let app = build_router(state, config.static_files_path.as_deref());

    let listener = tokio::net::TcpListener::bind(&config.listen_address).await?;
    log!("Web server listening on {}", config.listen_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    log!("Web server shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => log!("Shutdown signal received"),
        Err(e) => {
            log!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

async fn ws_upgrade_handler(
    ws: WebSocketUpgrade,
    State(state): State<WebServerState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_websocket(socket, state))
}
