use std::sync::atomic::AtomicU64;
use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use pitchside_server::codec::SecureCodec;
use pitchside_server::config::ServerConfig;
use pitchside_server::room_loop::{run_room_loop, RoomBroadcast, RoomCommand};
use pitchside_server::ws::{health_handler, ws_handler, AppState};
use tokio::sync::{broadcast, mpsc};
use tower_http::cors::CorsLayer;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let config = ServerConfig::default();

    // Validate configuration before starting
    if let Err(e) = config.validate() {
        eprintln!("Invalid server configuration: {}", e);
        std::process::exit(1);
    }

    let listen_addr = config.listen_addr.clone();
    // Key material is read once here and moved into the room loop.
    let codec = SecureCodec::new(&config.encryption_key);

    let (room_tx, room_rx) = mpsc::channel::<RoomCommand>(256);
    let (broadcast_tx, _) = broadcast::channel::<RoomBroadcast>(64);

    // Spawn the room loop
    let bc_tx = broadcast_tx.clone();
    tokio::spawn(async move {
        run_room_loop(room_rx, bc_tx, config, codec).await;
    });

    // Axum app
    let app_state = AppState {
        room_tx,
        broadcast_tx,
        next_session: Arc::new(AtomicU64::new(1)),
        join_timeout: std::time::Duration::from_secs(10),
    };
    let app = Router::new()
        .route("/health", get(health_handler))
        .route("/ws", get(ws_handler))
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    tracing::info!("starting pitchside server on {}", listen_addr);

    let listener = tokio::net::TcpListener::bind(&listen_addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
