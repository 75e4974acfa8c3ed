//! REST API handlers for ledger operations

use crate::core::{
    Amount, Block, ChainStats, ChainViolation, ErrorKind, LedgerError, Transaction, Utxo, Wallet,
    ZakatRecord,
};
use crate::ledger::{CreatedWallet, Ledger};
use crate::mining::{MiningOutcome, MiningStats, MiningStatus, RejectedTransaction, SkipReason};
use crate::storage::{MemoryStore, SnapshotStorage};
use crate::zakat::ZakatBatchReport;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Default upper bound on one mining request
pub const DEFAULT_MINING_TIMEOUT: Duration = Duration::from_secs(120);

/// Shared application state for API handlers
#[derive(Clone)]
pub struct ApiState {
    pub ledger: Arc<Ledger<MemoryStore>>,
    /// Snapshot written after every mutating request, if set
    pub storage: Option<Arc<SnapshotStorage>>,
    pub mining_timeout: Duration,
}

impl ApiState {
    pub fn new(ledger: Arc<Ledger<MemoryStore>>, storage: Option<Arc<SnapshotStorage>>) -> Self {
        Self {
            ledger,
            storage,
            mining_timeout: DEFAULT_MINING_TIMEOUT,
        }
    }

    pub fn with_mining_timeout(mut self, timeout: Duration) -> Self {
        self.mining_timeout = timeout;
        self
    }

    fn persist(&self) {
        if let Some(storage) = &self.storage {
            if let Err(e) = storage.save(self.ledger.store()) {
                log::error!("Failed to save ledger: {}", e);
            }
        }
    }
}

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ApiError>)>;

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub height: u64,
}

#[derive(Debug, Serialize)]
pub struct ChainResponse {
    #[serde(flatten)]
    pub stats: ChainStats,
    pub blocks: Vec<Block>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResponse {
    pub valid: bool,
    pub blocks_checked: u64,
    pub violation: Option<ChainViolation>,
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceResponse {
    pub wallet_id: String,
    pub balance: Amount,
    pub cached_balance: Amount,
    pub utxo_count: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub tx_id: String,
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MineResponse {
    pub mined: bool,
    pub message: String,
    pub block: Option<Block>,
    pub stats: Option<MiningStats>,
    pub rejected: Vec<RejectedTransaction>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<ErrorKind>,
}

impl ApiError {
    fn response(status: StatusCode, message: impl Into<String>) -> (StatusCode, Json<ApiError>) {
        (
            status,
            Json(ApiError {
                error: message.into(),
                kind: None,
            }),
        )
    }
}

/// HTTP status for a ledger error category
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation | ErrorKind::Cryptographic => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::InsufficientBalance => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::InternalStore => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<LedgerError> for (StatusCode, Json<ApiError>) {
    fn from(e: LedgerError) -> Self {
        let kind = e.kind();
        (
            status_for(kind),
            Json(ApiError {
                error: e.to_string(),
                kind: Some(kind),
            }),
        )
    }
}

// ============================================================================
// Request Types
// ============================================================================

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateWalletRequest {
    pub user_id: Option<String>,
}

/// A transfer signed server-side with the caller's sealed key
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequest {
    pub sealed_private_key: String,
    pub receiver_wallet_id: String,
    pub amount: Amount,
    #[serde(default)]
    pub note: String,
}

/// Either a fully signed transaction or a transfer to sign
#[derive(Deserialize)]
#[serde(untagged)]
pub enum SubmitRequest {
    Signed(Box<Transaction>),
    Transfer(TransferRequest),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MineRequest {
    pub miner_wallet_id: String,
}

#[derive(Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

// ============================================================================
// Chain Handlers
// ============================================================================

/// GET /health - Liveness and current height
pub async fn health_check(State(state): State<ApiState>) -> ApiResult<HealthResponse> {
    let tip = state.ledger.latest_block()?;
    Ok(Json(HealthResponse {
        status: "ok",
        height: tip.index,
    }))
}

/// GET /api/chain - Chain statistics and every block, newest first
pub async fn get_chain(State(state): State<ApiState>) -> ApiResult<ChainResponse> {
    Ok(Json(ChainResponse {
        stats: state.ledger.chain_stats()?,
        blocks: state.ledger.chain()?,
    }))
}

/// GET /api/chain/validate - Validate the hash chain
pub async fn validate_chain(State(state): State<ApiState>) -> ApiResult<ValidationResponse> {
    let result = state.ledger.validate_chain()?;
    let message = match &result.violation {
        None => format!("Chain is valid ({} blocks verified)", result.blocks_checked),
        Some(v) => format!("Chain validation failed at block {}: {:?}", v.index, v.kind),
    };
    Ok(Json(ValidationResponse {
        valid: result.valid,
        blocks_checked: result.blocks_checked,
        violation: result.violation,
        message,
    }))
}

/// GET /api/blocks/{hash} - Get block by hash
pub async fn get_block_by_hash(
    State(state): State<ApiState>,
    Path(hash): Path<String>,
) -> ApiResult<Block> {
    Ok(Json(state.ledger.block_by_hash(&hash)?))
}

// ============================================================================
// Wallet Handlers
// ============================================================================

/// POST /api/wallets - Create a wallet; the private key is returned sealed
pub async fn create_wallet(
    State(state): State<ApiState>,
    Json(req): Json<CreateWalletRequest>,
) -> ApiResult<CreatedWallet> {
    let created = state.ledger.create_wallet(req.user_id)?;
    state.persist();
    Ok(Json(created))
}

/// GET /api/wallets - List wallet records
pub async fn list_wallets(State(state): State<ApiState>) -> ApiResult<Vec<Wallet>> {
    Ok(Json(state.ledger.wallets()?))
}

/// GET /api/wallets/{id}/balance
pub async fn get_wallet_balance(
    State(state): State<ApiState>,
    Path(wallet_id): Path<String>,
) -> ApiResult<BalanceResponse> {
    let wallet = state.ledger.wallet(&wallet_id)?;
    let utxos = state.ledger.utxos(&wallet_id)?;
    Ok(Json(BalanceResponse {
        balance: state.ledger.balance(&wallet_id)?,
        cached_balance: wallet.cached_balance,
        utxo_count: utxos.len(),
        wallet_id,
    }))
}

/// GET /api/wallets/{id}/utxos
pub async fn get_wallet_utxos(
    State(state): State<ApiState>,
    Path(wallet_id): Path<String>,
) -> ApiResult<Vec<Utxo>> {
    state.ledger.wallet(&wallet_id)?;
    Ok(Json(state.ledger.utxos(&wallet_id)?))
}

/// GET /api/wallets/{id}/history?limit=N
pub async fn get_wallet_history(
    State(state): State<ApiState>,
    Path(wallet_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Vec<Transaction>> {
    state.ledger.wallet(&wallet_id)?;
    Ok(Json(state.ledger.history(&wallet_id, query.limit)?))
}

/// GET /api/wallets/{id}/zakat
pub async fn get_zakat_history(
    State(state): State<ApiState>,
    Path(wallet_id): Path<String>,
) -> ApiResult<Vec<ZakatRecord>> {
    Ok(Json(state.ledger.zakat_history(&wallet_id)?))
}

// ============================================================================
// Transaction Handlers
// ============================================================================

/// POST /api/transactions - Queue a transaction
pub async fn submit_transaction(
    State(state): State<ApiState>,
    Json(req): Json<SubmitRequest>,
) -> Result<(StatusCode, Json<SubmitResponse>), (StatusCode, Json<ApiError>)> {
    let tx = match req {
        SubmitRequest::Signed(tx) => *tx,
        SubmitRequest::Transfer(transfer) => {
            let signer = state.ledger.unseal_signer(&transfer.sealed_private_key)?;
            state.ledger.prepare_transfer(
                &signer,
                &transfer.receiver_wallet_id,
                transfer.amount,
                &transfer.note,
            )?
        }
    };

    let tx_id = state.ledger.submit_transaction(tx)?;
    state.persist();
    Ok((
        StatusCode::CREATED,
        Json(SubmitResponse {
            tx_id,
            status: "pending",
        }),
    ))
}

/// GET /api/transactions/pending - The pending pool, oldest first
pub async fn get_pending(State(state): State<ApiState>) -> ApiResult<Vec<Transaction>> {
    Ok(Json(state.ledger.pending()?))
}

// ============================================================================
// Mining & Zakat Handlers
// ============================================================================

/// POST /api/mine - Mine the pending pool into a block
///
/// Proof of work runs on a blocking thread. If it outlives the configured
/// timeout the search is cancelled and the request fails with 504.
pub async fn mine_block(
    State(state): State<ApiState>,
    Json(req): Json<MineRequest>,
) -> ApiResult<MineResponse> {
    let cancel = Arc::new(AtomicBool::new(false));
    let ledger = Arc::clone(&state.ledger);
    let flag = Arc::clone(&cancel);
    let miner = req.miner_wallet_id;
    let handle = tokio::task::spawn_blocking(move || ledger.trigger_mining_with_cancel(&miner, &flag));

    let outcome = match tokio::time::timeout(state.mining_timeout, handle).await {
        Ok(Ok(result)) => result?,
        Ok(Err(e)) => {
            return Err(ApiError::response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Mining task failed: {}", e),
            ))
        }
        Err(_) => {
            cancel.store(true, Ordering::Relaxed);
            log::warn!("Mining timed out after {:?}, cancelling", state.mining_timeout);
            return Err(ApiError::response(
                StatusCode::GATEWAY_TIMEOUT,
                "Mining timed out",
            ));
        }
    };

    let response = match outcome {
        MiningOutcome::Mined(mined) => {
            state.persist();
            MineResponse {
                mined: true,
                message: format!("Block {} mined", mined.block.index),
                block: Some(mined.block),
                stats: Some(mined.stats),
                rejected: mined.rejected,
            }
        }
        MiningOutcome::Skipped(SkipReason::MiningInProgress) => {
            return Err(ApiError::response(
                StatusCode::CONFLICT,
                "Mining already in progress",
            ))
        }
        MiningOutcome::Skipped(SkipReason::NoPendingTransactions) => MineResponse {
            mined: false,
            message: "No pending transactions".to_string(),
            block: None,
            stats: None,
            rejected: Vec::new(),
        },
        MiningOutcome::Skipped(SkipReason::AllRejected(rejected)) => {
            state.persist();
            MineResponse {
                mined: false,
                message: "All pending transactions were rejected".to_string(),
                block: None,
                stats: None,
                rejected,
            }
        }
        MiningOutcome::Cancelled { attempts } => {
            return Err(ApiError::response(
                StatusCode::GATEWAY_TIMEOUT,
                format!("Mining cancelled after {} attempts", attempts),
            ))
        }
    };

    Ok(Json(response))
}

/// GET /api/mining/status
pub async fn get_mining_status(State(state): State<ApiState>) -> ApiResult<MiningStatus> {
    Ok(Json(state.ledger.mining_status()?))
}

/// POST /api/zakat/run - Queue zakat deductions for every funded wallet
pub async fn run_zakat(State(state): State<ApiState>) -> ApiResult<ZakatBatchReport> {
    let report = state.ledger.run_zakat_batch()?;
    state.persist();
    Ok(Json(report))
}
