//! REST API routes configuration

use crate::api::handlers::{self, ApiState};
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};

/// Create the API router with all routes
pub fn create_router(state: ApiState) -> Router {
    // Configure CORS for browser access
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Chain endpoints
        .route("/api/chain", get(handlers::get_chain))
        .route("/api/chain/validate", get(handlers::validate_chain))
        .route("/api/blocks/{hash}", get(handlers::get_block_by_hash))
        // Wallets
        .route(
            "/api/wallets",
            get(handlers::list_wallets).post(handlers::create_wallet),
        )
        .route(
            "/api/wallets/{id}/balance",
            get(handlers::get_wallet_balance),
        )
        .route("/api/wallets/{id}/utxos", get(handlers::get_wallet_utxos))
        .route(
            "/api/wallets/{id}/history",
            get(handlers::get_wallet_history),
        )
        .route("/api/wallets/{id}/zakat", get(handlers::get_zakat_history))
        // Transactions
        .route("/api/transactions", post(handlers::submit_transaction))
        .route("/api/transactions/pending", get(handlers::get_pending))
        // Mining
        .route("/api/mine", post(handlers::mine_block))
        .route("/api/mining/status", get(handlers::get_mining_status))
        // Zakat
        .route("/api/zakat/run", post(handlers::run_zakat))
        .with_state(state)
        .layer(cors)
}
