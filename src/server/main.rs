// src/server/main.rs

use std::sync::Arc;

use keyforge::config::get_config;
use keyforge::engine::Issuer;
use keyforge::key_material::{CachedProvider, KeyProvider};
use keyforge::server::handlers::AppState;
use keyforge::server::routes::build_router;

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let config = match get_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    if config.server.shared_secret.is_empty() {
        eprintln!("Error: server.shared_secret is not configured (set KEYFORGE_SHARED_SECRET)");
        std::process::exit(1);
    }

    let calculator = match config.expiry_calculator() {
        Ok(calculator) => calculator,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    // The parsed key is cached across requests; issuance calls share it
    // behind a read lock.
    let provider: Box<dyn KeyProvider> = Box::new(CachedProvider::new(config.key_source()));
    let issuer = Issuer::new(provider)
        .with_calculator(calculator)
        .with_policy(config.expiry_policy());

    let state = AppState {
        issuer: Arc::new(issuer),
        shared_secret: config.server.shared_secret.clone(),
    };
    let app = build_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            eprintln!("Error: cannot bind {addr}: {e}");
            std::process::exit(1);
        }
    };
    println!("Listening on http://{addr}");

    if let Err(e) = axum::serve(listener, app).await {
        eprintln!("Error: server terminated: {e}");
        std::process::exit(1);
    }
}
