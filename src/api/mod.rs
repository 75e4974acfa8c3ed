//! REST API module
//!
//! Provides HTTP access to the ledger.
//!
//! # Endpoints
//!
//! ## Chain
//! - `GET /api/chain` - Chain statistics and blocks
//! - `GET /api/chain/validate` - Validate chain
//! - `GET /api/blocks/{hash}` - Get block by hash
//!
//! ## Wallets
//! - `GET /api/wallets` - List wallets
//! - `POST /api/wallets` - Create wallet (returns the sealed private key)
//! - `GET /api/wallets/{id}/balance` - Balance
//! - `GET /api/wallets/{id}/utxos` - Unspent outputs
//! - `GET /api/wallets/{id}/history` - Transaction history
//! - `GET /api/wallets/{id}/zakat` - Zakat records
//!
//! ## Transactions
//! - `POST /api/transactions` - Submit a transaction
//! - `GET /api/transactions/pending` - Pending pool
//!
//! ## Mining & zakat
//! - `POST /api/mine` - Mine the pending pool
//! - `GET /api/mining/status` - Mining status
//! - `POST /api/zakat/run` - Queue zakat deductions

pub mod handlers;
pub mod routes;

pub use handlers::{ApiState, DEFAULT_MINING_TIMEOUT};
pub use routes::create_router;
