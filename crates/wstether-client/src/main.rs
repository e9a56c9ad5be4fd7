//! wsTether command-line client
//!
//! - Config: `wstether.yaml` (or the first argument), token from `client.token_env`
//! - Connect, join configured rooms, re-join after every reconnect
//! - Log inbound envelopes until Ctrl-C or the session settles to Disconnected

use secrecy::SecretString;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use wstether_client::realtime::ConnectionManager;
use wstether_client::{config, session};

#[tokio::main]
async fn main() {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let path = std::env::args().nth(1).unwrap_or_else(|| "wstether.yaml".to_string());
    let cfg = config::load_from_file(&path).expect("config load failed");
    let token = std::env::var(&cfg.client.token_env)
        .unwrap_or_else(|_| panic!("{} must hold the bearer token", cfg.client.token_env));

    let manager = ConnectionManager::with_websocket(cfg.client.clone());
    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    info!(endpoint = %cfg.client.endpoint, rooms = cfg.rooms.len(), "wstether-client starting");
    session::run(&manager, SecretString::new(token), &cfg.rooms, shutdown)
        .await
        .expect("session failed");
}
