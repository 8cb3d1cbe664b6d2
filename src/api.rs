//! REST API for the Ledgerchain control panel
//!
//! Exposes wallet creation, transfer submission, balance queries, the pending pool and
//! validator start/stop as JSON endpoints under `/api`.

use axum::{
    extract::{rejection::JsonRejection, Path, Query, Request, State},
    http::{self, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::blockchain::Block;
use crate::crypto::Address;
use crate::error::ChainError;
use crate::node::{Node, TransactionRequest};
use crate::transaction::Transaction;
use crate::validator::{CycleOutcome, ValidatorStatus};

/// Shared state handed to every handler.
pub struct ApiContext {
    pub node: Arc<Node>,
    api_stats: RwLock<ApiStats>,
}

impl ApiContext {
    pub fn new(node: Arc<Node>) -> Self {
        Self {
            node,
            api_stats: RwLock::new(ApiStats::new()),
        }
    }
}

/// API statistics and monitoring
#[derive(Debug, Default)]
struct ApiStats {
    total_requests: u64,
    successful_requests: u64,
    failed_requests: u64,
    transactions_submitted: u64,
    validation_starts: u64,
    validation_stops: u64,
    start_time: Option<Instant>,
}

impl ApiStats {
    fn new() -> Self {
        ApiStats {
            start_time: Some(Instant::now()),
            ..Default::default()
        }
    }

    fn record_request(&mut self, success: bool) {
        self.total_requests += 1;
        if success {
            self.successful_requests += 1;
        } else {
            self.failed_requests += 1;
        }
    }
}

// ============================================================================
// API Error Handling
// ============================================================================

#[derive(Debug)]
pub enum ApiError {
    Chain(ChainError),
    NotFound(String),
    /// The request body could not be decoded.
    BadRequest(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Chain(ChainError::DuplicateTransaction(_)) => StatusCode::CONFLICT,
            ApiError::Chain(
                ChainError::InvalidInput(_)
                | ChainError::InvalidSignature(_)
                | ChainError::InsufficientFunds { .. }
                | ChainError::InvalidBlock(_),
            ) => StatusCode::BAD_REQUEST,
            ApiError::Chain(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    fn message(self) -> String {
        match self {
            ApiError::Chain(e) => e.to_string(),
            ApiError::NotFound(msg) | ApiError::BadRequest(msg) => msg,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        (status, Json(ErrorResponse { error: self.message() })).into_response()
    }
}

impl From<ChainError> for ApiError {
    fn from(err: ChainError) -> Self {
        ApiError::Chain(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(format!(
            "invalid transaction request: {}",
            rejection.body_text()
        ))
    }
}

/// Failed transaction submission: the error descriptor is sent as a bare JSON string,
/// which wallet clients show as-is.
#[derive(Debug)]
pub struct SubmitError(ApiError);

impl IntoResponse for SubmitError {
    fn into_response(self) -> Response {
        let status = self.0.status();
        (status, Json(self.0.message())).into_response()
    }
}

impl From<ApiError> for SubmitError {
    fn from(err: ApiError) -> Self {
        SubmitError(err)
    }
}

impl From<ChainError> for SubmitError {
    fn from(err: ChainError) -> Self {
        SubmitError(ApiError::Chain(err))
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Serialize)]
pub struct BalanceResponse {
    pub address: String,
    /// Decimal rendering, e.g. `"60.5"`.
    pub balance: String,
    /// Exact balance in base units.
    pub units: u64,
}

#[derive(Serialize)]
pub struct PendingTransactionsResponse {
    pub count: usize,
    pub transactions: Vec<PendingTransaction>,
}

/// A pending transaction as listed to clients.
#[derive(Serialize)]
pub struct PendingTransaction {
    pub hash: String,
    pub sender_address: String,
    pub recipient_address: String,
    pub value: String,
    pub timestamp: u64,
}

impl From<&Transaction> for PendingTransaction {
    fn from(tx: &Transaction) -> Self {
        PendingTransaction {
            hash: tx.hash_str(),
            sender_address: tx.sender_address.to_hex(),
            recipient_address: tx.recipient_address.to_hex(),
            value: tx.value.to_string(),
            timestamp: tx.timestamp,
        }
    }
}

#[derive(Serialize)]
pub struct ApiStatsResponse {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub transactions_submitted: u64,
    pub validation_starts: u64,
    pub validation_stops: u64,
    pub uptime_seconds: u64,
    pub blocks_produced: u64,
    pub is_validating: bool,
}

#[derive(Serialize)]
struct SuccessResponse {
    message: String,
}

#[derive(Deserialize)]
struct PaginationQuery {
    #[serde(default = "default_page")]
    page: u64,
    #[serde(default = "default_limit")]
    limit: u64,
}

fn default_page() -> u64 {
    0
}
fn default_limit() -> u64 {
    10
}

// ============================================================================
// Middleware
// ============================================================================

async fn stats_middleware(
    State(ctx): State<Arc<ApiContext>>,
    req: Request,
    next: Next,
) -> Response {
    let response = next.run(req).await;

    let success = response.status().is_success();
    ctx.api_stats.write().await.record_request(success);

    response
}

async fn logging_middleware(
    State(ctx): State<Arc<ApiContext>>,
    req: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let response = next.run(req).await;

    tracing::info!(
        method = %method,
        path = %path,
        status = %response.status().as_u16(),
        duration_ms = %start.elapsed().as_millis(),
        validator = ?ctx.node.validator.state(),
        "api.request"
    );

    response
}

// ============================================================================
// API Server
// ============================================================================

/// Build the API router with all endpoints
pub fn build_api_router(node: Arc<Node>) -> Router {
    let ctx = Arc::new(ApiContext::new(node));

    // The control panel may be served from another origin.
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_methods(vec![
            http::Method::GET,
            http::Method::POST,
            http::Method::OPTIONS,
        ])
        .allow_headers(vec![http::header::CONTENT_TYPE]);

    let api_routes = Router::new()
        // Wallet endpoints
        .route("/wallet/create", post(create_wallet))
        // Transaction endpoints
        .route("/transaction", post(submit_transaction))
        .route("/transaction/signed", post(submit_signed_transaction))
        .route("/transaction/:hash", get(get_transaction))
        .route("/transactions", get(get_pending_transactions))
        // Address endpoints
        .route("/address/:addr", get(get_address))
        .route("/address/:addr/balance", get(get_address_balance))
        // Validation endpoints
        .route("/validation/start", post(start_validation))
        .route("/validation/stop", post(stop_validation))
        .route("/validation/once", post(validate_once))
        .route("/validation/status", get(get_validation_status))
        // Blockchain endpoints
        .route("/blockchain/height", get(get_blockchain_height))
        .route("/blockchain/blocks", get(get_blocks))
        .route("/blockchain/block/:height", get(get_block_by_height))
        // System endpoints
        .route("/health", get(health_check))
        .route("/stats", get(get_api_stats))
        // logging before stats so we always record timing
        .layer(middleware::from_fn_with_state(ctx.clone(), logging_middleware))
        .layer(middleware::from_fn_with_state(ctx.clone(), stats_middleware))
        .with_state(ctx);

    Router::new().nest("/api", api_routes).layer(cors)
}

/// Serves the API on `addr` until `shutdown` resolves.
pub async fn run_api_server<F>(
    node: Arc<Node>,
    addr: SocketAddr,
    shutdown: F,
) -> Result<(), Box<dyn std::error::Error>>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = build_api_router(node);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!(%addr, "api.listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}

// ============================================================================
// Route Handlers
// ============================================================================

async fn health_check(State(ctx): State<Arc<ApiContext>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "validator": ctx.node.validator.state(),
        "height": ctx.node.ledger.height(),
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn create_wallet(State(ctx): State<Arc<ApiContext>>) -> Result<impl IntoResponse, ApiError> {
    let wallet = ctx.node.create_wallet()?;
    Ok(Json(wallet))
}

async fn submit_transaction(
    State(ctx): State<Arc<ApiContext>>,
    payload: Result<Json<TransactionRequest>, JsonRejection>,
) -> Result<Json<&'static str>, SubmitError> {
    let Json(request) = payload.map_err(ApiError::from)?;
    let hash = ctx.node.submit_request(request)?;

    ctx.api_stats.write().await.transactions_submitted += 1;
    tracing::debug!(hash = %hex::encode(hash), "api.transaction_pooled");

    Ok(Json("success"))
}

/// Accepts a transaction signed offline, e.g. by `ledgerchain-wallet sign`.
async fn submit_signed_transaction(
    State(ctx): State<Arc<ApiContext>>,
    payload: Result<Json<Transaction>, JsonRejection>,
) -> Result<Json<&'static str>, SubmitError> {
    let Json(tx) = payload.map_err(ApiError::from)?;
    let hash = tx.hash_str();
    ctx.node.submit_transaction(tx)?;

    ctx.api_stats.write().await.transactions_submitted += 1;
    tracing::debug!(hash = %hash, "api.signed_transaction_pooled");

    Ok(Json("success"))
}

async fn get_transaction(
    State(ctx): State<Arc<ApiContext>>,
    Path(hash_str): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let mut hash = [0u8; 32];
    hex::decode_to_slice(&hash_str, &mut hash)
        .map_err(|e| ChainError::InvalidInput(format!("Invalid hex hash: {}", e)))?;

    if let Some((tx, height)) = ctx.node.ledger.find_transaction(&hash) {
        return Ok(Json(serde_json::json!({
            "status": "confirmed",
            "block_height": height,
            "transaction": tx
        })));
    }
    if let Some(tx) = ctx.node.pool.get(&hash) {
        return Ok(Json(serde_json::json!({
            "status": "pending",
            "transaction": tx
        })));
    }

    Err(ApiError::NotFound(format!("Transaction {} not found", hash_str)))
}

async fn get_pending_transactions(State(ctx): State<Arc<ApiContext>>) -> impl IntoResponse {
    let transactions: Vec<PendingTransaction> = ctx
        .node
        .pending_transactions()
        .iter()
        .map(PendingTransaction::from)
        .collect();

    Json(PendingTransactionsResponse {
        count: transactions.len(),
        transactions,
    })
}

/// Balance in coins as a plain JSON number.
async fn get_address_balance(
    State(ctx): State<Arc<ApiContext>>,
    Path(addr_str): Path<String>,
) -> Result<Json<f64>, ApiError> {
    let address = Address::from_hex(&addr_str)?;
    Ok(Json(ctx.node.balance_of(&address).to_coins_f64()))
}

async fn get_address(
    State(ctx): State<Arc<ApiContext>>,
    Path(addr_str): Path<String>,
) -> Result<Json<BalanceResponse>, ApiError> {
    let address = Address::from_hex(&addr_str)?;
    let balance = ctx.node.balance_of(&address);

    Ok(Json(BalanceResponse {
        address: address.to_hex(),
        balance: balance.to_string(),
        units: balance.units(),
    }))
}

async fn start_validation(State(ctx): State<Arc<ApiContext>>) -> Json<SuccessResponse> {
    let message = if ctx.node.start_validation().await {
        ctx.api_stats.write().await.validation_starts += 1;
        "Validation started"
    } else {
        "Validation already running"
    };
    Json(SuccessResponse {
        message: message.to_string(),
    })
}

async fn stop_validation(State(ctx): State<Arc<ApiContext>>) -> Json<SuccessResponse> {
    let message = if ctx.node.stop_validation().await {
        ctx.api_stats.write().await.validation_stops += 1;
        "Validation stopped"
    } else {
        "Validation already stopped"
    };
    Json(SuccessResponse {
        message: message.to_string(),
    })
}

async fn validate_once(State(ctx): State<Arc<ApiContext>>) -> Json<CycleOutcome> {
    Json(ctx.node.validate_once().await)
}

async fn get_validation_status(State(ctx): State<Arc<ApiContext>>) -> Json<ValidatorStatus> {
    Json(ctx.node.validator.status())
}

async fn get_blockchain_height(State(ctx): State<Arc<ApiContext>>) -> Json<u64> {
    Json(ctx.node.ledger.height())
}

async fn get_blocks(
    State(ctx): State<Arc<ApiContext>>,
    Query(params): Query<PaginationQuery>,
) -> impl IntoResponse {
    let blocks = ctx.node.ledger.blocks();
    let total = blocks.len();

    let limit = params.limit.min(100); // Max 100 blocks per request
    let offset = params.page.saturating_mul(limit);

    let page: Vec<_> = blocks
        .iter()
        .rev()
        .skip(offset as usize)
        .take(limit as usize)
        .map(|b| {
            serde_json::json!({
                "height": b.header.height,
                "timestamp": b.header.timestamp,
                "hash": b.hash_str(),
                "previous_hash": hex::encode(b.header.previous_hash),
                "producer": b.header.producer,
                "transactions": b.transactions.len()
            })
        })
        .collect();

    Json(serde_json::json!({
        "blocks": page,
        "total": total,
        "page": params.page,
        "limit": limit
    }))
}

async fn get_block_by_height(
    State(ctx): State<Arc<ApiContext>>,
    Path(height): Path<u64>,
) -> Result<Json<Block>, ApiError> {
    ctx.node
        .ledger
        .block_at(height)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Block at height {} not found", height)))
}

async fn get_api_stats(State(ctx): State<Arc<ApiContext>>) -> Json<ApiStatsResponse> {
    let stats = ctx.api_stats.read().await;
    let uptime = stats.start_time.map(|t| t.elapsed().as_secs()).unwrap_or(0);
    let validator = ctx.node.validator.status();

    Json(ApiStatsResponse {
        total_requests: stats.total_requests,
        successful_requests: stats.successful_requests,
        failed_requests: stats.failed_requests,
        transactions_submitted: stats.transactions_submitted,
        validation_starts: stats.validation_starts,
        validation_stops: stats.validation_stops,
        uptime_seconds: uptime,
        blocks_produced: validator.blocks_produced,
        is_validating: validator.state == crate::validator::ValidatorState::Running,
    })
}
