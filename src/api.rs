// Quantum Trust Dashboard - REST API
// Axum router shared by the server binary and the router tests

use crate::coherence::CoherenceOscillator;
use crate::config::DashboardConfig;
use crate::conversion::{convert, nullify_debt, parse_amount, trust_units, Gate};
use crate::db::{
    ApiSource, DebtData, DebtOwnership, EconomicIndicator, NewApiSource, NewDebtData,
    NewDebtOwnership, NewEconomicIndicator, NewUser, Storage, User,
};
use crate::error::StorageError;
use crate::feed::LiveFeed;
use crate::format::format_units;
use crate::ids::IdParts;
use crate::operations::{MockOperationRecord, OperationLog, OperationSimulator, OperationStatus};
use axum::{
    body::Bytes,
    extract::{
        rejection::JsonRejection,
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<Mutex<Storage>>,
    pub operations: Arc<Mutex<OperationLog>>,
    pub simulator: Arc<Mutex<OperationSimulator>>,
    pub config: Arc<DashboardConfig>,
}

impl AppState {
    pub fn new(storage: Storage, config: DashboardConfig) -> Self {
        Self::with_simulator(storage, OperationSimulator::new(config.success_rate), config)
    }

    pub fn with_simulator(
        storage: Storage,
        simulator: OperationSimulator,
        config: DashboardConfig,
    ) -> Self {
        AppState {
            storage: Arc::new(Mutex::new(storage)),
            operations: Arc::new(Mutex::new(OperationLog::new(config.log_window))),
            simulator: Arc::new(Mutex::new(simulator)),
            config: Arc::new(config),
        }
    }

    fn oscillator(&self) -> CoherenceOscillator {
        CoherenceOscillator::coherence(self.config.coherence_base)
    }

    fn record(&self, record: MockOperationRecord) {
        lock(&self.operations).push(record);
    }
}

/// A poisoned lock only means another handler panicked; the data is still usable
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ============================================================================
// Responses & errors
// ============================================================================

/// API Response wrapper
#[derive(Serialize)]
pub struct ApiResponse<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    fn err(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
        }
    }
}

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    Unavailable(String),
    Internal(String),
}

impl From<StorageError> for ApiError {
    fn from(e: StorageError) -> Self {
        if e.is_constraint_violation() {
            return ApiError::Conflict(e.to_string());
        }
        match e {
            StorageError::Invalid(v) => ApiError::BadRequest(v.to_string()),
            StorageError::NotFound(what) => ApiError::NotFound(what),
            other @ StorageError::Unavailable => ApiError::Unavailable(other.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(format!("invalid payload: {}", rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m),
            ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m),
            ApiError::Conflict(m) => (StatusCode::CONFLICT, m),
            ApiError::Unavailable(m) => (StatusCode::SERVICE_UNAVAILABLE, m),
            ApiError::Internal(m) => {
                error!("internal error: {}", m);
                (StatusCode::INTERNAL_SERVER_ERROR, m)
            }
        };

        (status, Json(ApiResponse::<()>::err(message))).into_response()
    }
}

type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

fn ok<T>(data: T) -> ApiResult<T> {
    Ok(Json(ApiResponse::ok(data)))
}

/// Accept both `12.5` and `"12.5"`
fn amount_from_json(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => parse_amount(s),
        _ => None,
    }
}

fn require_amount(value: &serde_json::Value) -> Result<f64, ApiError> {
    amount_from_json(value)
        .filter(|a| *a >= 0.0)
        .ok_or_else(|| ApiError::BadRequest("amount must be a non-negative number".to_string()))
}

// ============================================================================
// Quantum handlers
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct CoherenceResponse {
    pub coherence: f64,
    pub pulse: f64,
    pub base: f64,
    pub timestamp: String,
}

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/quantum/coherence
async fn get_coherence(State(state): State<AppState>) -> ApiResult<CoherenceResponse> {
    let now = Utc::now();
    let base = state.config.coherence_base;
    let millis = now.timestamp_millis();

    ok(CoherenceResponse {
        coherence: CoherenceOscillator::coherence(base).sample_at(millis),
        pulse: CoherenceOscillator::pulse(base).sample_at(millis),
        base,
        timestamp: now.to_rfc3339(),
    })
}

#[derive(Debug, Deserialize)]
pub struct NullifyRequest {
    pub amount: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NullifyResponse {
    pub id: String,
    pub amount: f64,
    pub sri: f64,
    pub trust_units: f64,
    pub coherence: f64,
    pub status: OperationStatus,
}

/// POST /api/quantum/debt-nullify
async fn debt_nullify(
    State(state): State<AppState>,
    payload: Result<Json<NullifyRequest>, JsonRejection>,
) -> ApiResult<NullifyResponse> {
    let Json(request) = payload?;
    let amount = require_amount(&request.amount)?;

    let result = nullify_debt(amount, state.oscillator().sample());
    let record = lock(&state.simulator).completed("nullify", amount, "USD");

    info!(id = %record.id, amount, trust_units = result.trust_units, "debt nullified");

    let response = NullifyResponse {
        id: record.id.clone(),
        amount,
        sri: result.sri,
        trust_units: result.trust_units,
        coherence: result.coherence,
        status: record.status,
    };
    state.record(record);

    ok(response)
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub document_id: String,
    pub fingerprint: String,
    pub size_bytes: usize,
    pub coherence: f64,
    pub trust_units: f64,
}

/// POST /api/quantum/pdf-upload - raw PDF body
async fn pdf_upload(State(state): State<AppState>, body: Bytes) -> ApiResult<UploadResponse> {
    if body.is_empty() {
        return Err(ApiError::BadRequest("empty upload".to_string()));
    }
    if !body.starts_with(b"%PDF") {
        return Err(ApiError::BadRequest("upload is not a PDF document".to_string()));
    }

    let mut hasher = Sha256::new();
    hasher.update(&body);
    let fingerprint = format!("{:x}", hasher.finalize());

    let coherence = state.oscillator().sample();
    let size_bytes = body.len();
    let response = UploadResponse {
        document_id: uuid::Uuid::new_v4().to_string(),
        fingerprint,
        size_bytes,
        coherence,
        trust_units: trust_units(size_bytes as f64, coherence),
    };

    let record = lock(&state.simulator).completed("pdf", size_bytes as f64, "bytes");
    state.record(record);
    debug!(document_id = %response.document_id, size_bytes, "pdf accepted");

    ok(response)
}

#[derive(Debug, Deserialize)]
pub struct ConvertRequest {
    pub amount: serde_json::Value,
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub gate: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConvertResponse {
    pub amount: f64,
    pub from: String,
    pub to: String,
    pub gate: Gate,
    pub rate: f64,
    pub coherence: f64,
    pub result: f64,
    pub formatted: String,
}

/// POST /api/quantum/convert
async fn convert_amount(
    State(state): State<AppState>,
    payload: Result<Json<ConvertRequest>, JsonRejection>,
) -> ApiResult<ConvertResponse> {
    let Json(request) = payload?;
    let amount = require_amount(&request.amount)?;
    let gate = match request.gate.as_deref() {
        Some(label) => label.parse::<Gate>().map_err(ApiError::BadRequest)?,
        None => Gate::default(),
    };

    let table = gate.rate_table();
    let coherence = state.oscillator().sample();
    let result = convert(amount, &request.from, &request.to, &table, coherence);

    ok(ConvertResponse {
        rate: table.rate(&request.from, &request.to),
        formatted: format_units(result, &request.to),
        amount,
        from: request.from,
        to: request.to,
        gate,
        coherence,
        result,
    })
}

#[derive(Debug, Deserialize)]
pub struct SimulateRequest {
    pub kind: String,
    pub amount: serde_json::Value,
    #[serde(default = "default_unit")]
    pub unit: String,
}

fn default_unit() -> String {
    "TU".to_string()
}

/// GET /api/quantum/operations
async fn list_operations(State(state): State<AppState>) -> ApiResult<Vec<MockOperationRecord>> {
    ok(lock(&state.operations).to_vec())
}

/// POST /api/quantum/operations - simulate a mock operation
async fn simulate_operation(
    State(state): State<AppState>,
    payload: Result<Json<SimulateRequest>, JsonRejection>,
) -> ApiResult<MockOperationRecord> {
    let Json(request) = payload?;
    if request.kind.trim().is_empty() {
        return Err(ApiError::BadRequest("kind must not be empty".to_string()));
    }
    let amount = require_amount(&request.amount)?;

    let delay = state.config.settle_delay;
    if delay.is_zero() {
        let record = lock(&state.simulator).simulate(&request.kind, amount, &request.unit);
        if record.status == OperationStatus::Error {
            warn!(id = %record.id, kind = %record.kind, "simulated operation failed");
        }
        state.record(record.clone());
        return ok(record);
    }

    let record = lock(&state.simulator).begin(&request.kind, amount, &request.unit);
    state.record(record.clone());
    tokio::spawn(settle_later(state.clone(), record.id.clone(), delay));

    ok(record)
}

/// Resolve a pending record once the artificial delay has passed
async fn settle_later(state: AppState, id: String, delay: Duration) {
    tokio::time::sleep(delay).await;

    let status = lock(&state.simulator).outcome();
    let settled = lock(&state.operations).settle(&id, status);

    if !settled {
        debug!(%id, "operation left the log before settling");
    } else if status == OperationStatus::Error {
        warn!(%id, "simulated operation failed");
    } else {
        debug!(%id, %status, "operation settled");
    }
}

/// GET /api/quantum/operations/:id
async fn get_operation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<MockOperationRecord> {
    if IdParts::parse(&id).is_none() {
        return Err(ApiError::BadRequest(format!("malformed operation id: {id}")));
    }

    let record = lock(&state.operations).get(&id).cloned();
    match record {
        Some(record) => ok(record),
        None => Err(ApiError::NotFound(format!("operation {id}"))),
    }
}

// ============================================================================
// CRUD handlers
// ============================================================================

/// GET /api/users
async fn list_users(State(state): State<AppState>) -> ApiResult<Vec<User>> {
    ok(lock(&state.storage).list_users()?)
}

/// POST /api/users
async fn create_user(
    State(state): State<AppState>,
    payload: Result<Json<NewUser>, JsonRejection>,
) -> ApiResult<User> {
    let Json(new) = payload?;
    ok(lock(&state.storage).create_user(&new)?)
}

/// GET /api/users/:username
async fn get_user(State(state): State<AppState>, Path(username): Path<String>) -> ApiResult<User> {
    ok(lock(&state.storage).get_user_by_username(&username)?)
}

/// GET /api/debt-data
async fn list_debt_data(State(state): State<AppState>) -> ApiResult<Vec<DebtData>> {
    ok(lock(&state.storage).list_debt_data()?)
}

/// POST /api/debt-data
async fn create_debt_data(
    State(state): State<AppState>,
    payload: Result<Json<NewDebtData>, JsonRejection>,
) -> ApiResult<DebtData> {
    let Json(new) = payload?;
    ok(lock(&state.storage).insert_debt_data(&new)?)
}

/// GET /api/debt-data/country/:country
async fn debt_data_by_country(
    State(state): State<AppState>,
    Path(country): Path<String>,
) -> ApiResult<Vec<DebtData>> {
    ok(lock(&state.storage).debt_data_by_country(&country)?)
}

/// GET /api/economic-indicators
async fn list_indicators(State(state): State<AppState>) -> ApiResult<Vec<EconomicIndicator>> {
    ok(lock(&state.storage).list_indicators()?)
}

/// POST /api/economic-indicators
async fn create_indicator(
    State(state): State<AppState>,
    payload: Result<Json<NewEconomicIndicator>, JsonRejection>,
) -> ApiResult<EconomicIndicator> {
    let Json(new) = payload?;
    ok(lock(&state.storage).insert_indicator(&new)?)
}

/// GET /api/economic-indicators/name/:name
async fn indicators_by_name(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Vec<EconomicIndicator>> {
    ok(lock(&state.storage).indicators_by_name(&name)?)
}

/// GET /api/debt-ownership
async fn list_ownership(State(state): State<AppState>) -> ApiResult<Vec<DebtOwnership>> {
    ok(lock(&state.storage).list_ownership()?)
}

/// POST /api/debt-ownership
async fn create_ownership(
    State(state): State<AppState>,
    payload: Result<Json<NewDebtOwnership>, JsonRejection>,
) -> ApiResult<DebtOwnership> {
    let Json(new) = payload?;
    ok(lock(&state.storage).insert_ownership(&new)?)
}

/// GET /api/debt-ownership/country/:country
async fn ownership_by_country(
    State(state): State<AppState>,
    Path(country): Path<String>,
) -> ApiResult<Vec<DebtOwnership>> {
    ok(lock(&state.storage).ownership_by_country(&country)?)
}

/// GET /api/api-sources
async fn list_api_sources(State(state): State<AppState>) -> ApiResult<Vec<ApiSource>> {
    ok(lock(&state.storage).list_api_sources()?)
}

/// POST /api/api-sources
async fn create_api_source(
    State(state): State<AppState>,
    payload: Result<Json<NewApiSource>, JsonRejection>,
) -> ApiResult<ApiSource> {
    let Json(new) = payload?;
    ok(lock(&state.storage).insert_api_source(&new)?)
}

/// GET /api/api-sources/:name
async fn get_api_source(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<ApiSource> {
    ok(lock(&state.storage).get_api_source_by_name(&name)?)
}

/// POST /api/api-sources/:name/fetched - stamp last_fetched
async fn mark_api_source_fetched(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<ApiSource> {
    let source = {
        let storage = lock(&state.storage);
        storage.mark_source_fetched(&name)?;
        storage.get_api_source_by_name(&name)?
    };
    info!(source = %source.name, "api source marked fetched");
    ok(source)
}

// ============================================================================
// Live feed WebSocket
// ============================================================================

/// GET /ws/feed
async fn feed_socket(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    let period = state.config.feed_interval;
    ws.on_upgrade(move |socket| stream_feed(socket, period))
}

async fn stream_feed(mut socket: WebSocket, period: Duration) {
    info!("feed client connected");

    let mut feed = LiveFeed::new();
    let mut ticker = tokio::time::interval(period);
    // first tick fires immediately; skip it so clients get a message per period
    ticker.tick().await;

    loop {
        tokio::select! {
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Ping(data))) => {
                        if let Err(e) = socket.send(Message::Pong(data)).await {
                            warn!("failed to send pong: {}", e);
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        info!("feed client disconnected");
                        break;
                    }
                    Some(Err(e)) => {
                        warn!("feed socket error: {}", e);
                        break;
                    }
                    _ => {}
                }
            }
            _ = ticker.tick() => {
                let message = feed.next_message();
                let text = match serde_json::to_string(&message) {
                    Ok(text) => text,
                    Err(e) => {
                        error!("failed to encode feed message: {}", e);
                        break;
                    }
                };
                if socket.send(Message::Text(text)).await.is_err() {
                    debug!("feed client went away");
                    break;
                }
            }
        }
    }
}

// ============================================================================
// Router
// ============================================================================

pub fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/quantum/coherence", get(get_coherence))
        .route("/quantum/debt-nullify", post(debt_nullify))
        .route("/quantum/pdf-upload", post(pdf_upload))
        .route("/quantum/convert", post(convert_amount))
        .route("/quantum/operations", get(list_operations).post(simulate_operation))
        .route("/quantum/operations/:id", get(get_operation))
        .route("/users", get(list_users).post(create_user))
        .route("/users/:username", get(get_user))
        .route("/debt-data", get(list_debt_data).post(create_debt_data))
        .route("/debt-data/country/:country", get(debt_data_by_country))
        .route("/economic-indicators", get(list_indicators).post(create_indicator))
        .route("/economic-indicators/name/:name", get(indicators_by_name))
        .route("/debt-ownership", get(list_ownership).post(create_ownership))
        .route("/debt-ownership/country/:country", get(ownership_by_country))
        .route("/api-sources", get(list_api_sources).post(create_api_source))
        .route("/api-sources/:name", get(get_api_source))
        .route("/api-sources/:name/fetched", post(mark_api_source_fetched));

    Router::new()
        .nest("/api", api_routes)
        .route("/ws/feed", get(feed_socket))
        .with_state(state)
}
