use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::admin::AdminState;
use crate::admission::QosPolicy;
use crate::counter::CounterSnapshot;
use crate::store::StoreError;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub namespace: String,
    pub ttl_secs: u64,
    pub default_threshold: i64,
}

#[derive(Serialize)]
pub struct ProviderStatus {
    #[serde(flatten)]
    pub snapshot: CounterSnapshot,
    pub threshold: i64,
    pub admit: bool,
}

/// Store errors rendered as HTTP responses.
pub struct AdminError(StoreError);

impl From<StoreError> for AdminError {
    fn from(e: StoreError) -> Self {
        Self(e)
    }
}

impl IntoResponse for AdminError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            StoreError::InvalidKey(_) => StatusCode::BAD_REQUEST,
            e if e.is_transient() => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(serde_json::json!({ "error": self.0.to_string() }));
        (status, body).into_response()
    }
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    let counter = state.gate.counter();
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        namespace: counter.namespace().to_string(),
        ttl_secs: counter.ttl().as_secs(),
        default_threshold: state.gate.policy().thresholds().default_threshold,
    })
}

pub async fn list_inflight(
    State(state): State<AdminState>,
) -> Result<Json<Vec<CounterSnapshot>>, AdminError> {
    Ok(Json(state.gate.counter().list().await?))
}

pub async fn get_inflight(
    State(state): State<AdminState>,
    Path(provider): Path<String>,
) -> Result<Json<ProviderStatus>, AdminError> {
    let key = state.gate.key_for(&provider)?;
    let snapshot = state.gate.counter().snapshot(&key).await?;
    let decision = QosPolicy::decide(snapshot.value, state.gate.policy().threshold_for(&provider));
    Ok(Json(ProviderStatus {
        admit: decision.admitted,
        threshold: decision.threshold,
        snapshot,
    }))
}

pub async fn reset_inflight(
    State(state): State<AdminState>,
    Path(provider): Path<String>,
) -> Result<Json<CounterSnapshot>, AdminError> {
    let key = state.gate.key_for(&provider)?;
    Ok(Json(state.gate.counter().reset(&key).await?))
}
