//! HTTP façade mapping the API routes onto the register access layer.
//!
//! Every handler resolves a descriptor (named, cataloged, or ad-hoc), lets
//! [`Inverter`] do the transport work, and serializes the outcome as JSON.
//! All responses carry permissive CORS headers so the panel can be served
//! from anywhere on the local network.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use tower_http::cors::{Any, CorsLayer};
use tracing::error;

use inverter_modbus::registers::{self, telemetry, RegisterKind};
use inverter_modbus::remote::RemoteMode;
use inverter_modbus::Inverter;

pub type SharedInverter = Arc<Inverter>;

pub fn router(inverter: SharedInverter) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(panel))
        .route("/api/status", get(status))
        .route("/api/info", get(info))
        .route("/api/energy", get(energy))
        .route("/api/write/workmode", post(write_work_mode))
        .route("/api/write/soc-limits", post(write_soc_limits))
        .route("/api/write/battery-limits", post(write_battery_limits))
        .route("/api/write/power-limits", post(write_power_limits))
        .route("/api/write/remote-power", post(write_remote_power))
        .route("/api/write/remote-control", post(write_remote_control))
        .route("/api/write/register", post(write_register))
        .route("/api/custom/read", post(custom_read))
        .route("/api/custom/write", post(custom_write))
        .layer(cors)
        .with_state(inverter)
}

/// Request-boundary failure, serialized as `{"error": …}`.
enum ApiError {
    BadRequest(String),
    Internal(inverter_modbus::Error),
}

impl From<inverter_modbus::Error> for ApiError {
    fn from(err: inverter_modbus::Error) -> Self {
        ApiError::Internal(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::Internal(err) => {
                error!(error = %err, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

type ApiResult = Result<Json<JsonValue>, ApiError>;

async fn panel() -> Html<&'static str> {
    Html(include_str!("panel.html"))
}

async fn status(State(inverter): State<SharedInverter>) -> ApiResult {
    let status = inverter.read(&telemetry::STATUS_1).await?;
    let active_power = inverter.read(&telemetry::ACTIVE_POWER).await?;
    let total_pv_power = inverter.read(&telemetry::TOTAL_PV_POWER).await?;
    let battery_power = inverter.read(&telemetry::BATTERY_COMBINED_POWER).await?;
    Ok(Json(json!({
        "status": status,
        "activePower": active_power,
        "totalPvPower": total_pv_power,
        "batteryPower": battery_power,
    })))
}

async fn info(State(inverter): State<SharedInverter>) -> ApiResult {
    let model_name = inverter.read(&telemetry::MODEL_NAME).await?;
    let serial_number = inverter.read(&telemetry::SERIAL_NUMBER).await?;
    let rated_power = inverter.read(&telemetry::RATED_POWER).await?;
    Ok(Json(json!({
        "modelName": model_name,
        "serialNumber": serial_number,
        "ratedPower": rated_power,
    })))
}

async fn energy(State(inverter): State<SharedInverter>) -> ApiResult {
    let total_generation = inverter.read(&telemetry::CUMULATIVE_GENERATION).await?;
    let daily_generation = inverter.read(&telemetry::DAILY_GENERATION).await?;
    Ok(Json(json!({
        "totalGeneration": total_generation,
        "dailyGeneration": daily_generation,
    })))
}

#[derive(Debug, Deserialize)]
struct WorkModeRequest {
    mode: u16,
}

async fn write_work_mode(
    State(inverter): State<SharedInverter>,
    Json(req): Json<WorkModeRequest>,
) -> ApiResult {
    if !(1..=7).contains(&req.mode) {
        return Err(ApiError::BadRequest(
            "Invalid work mode. Valid values: 1-7".to_string(),
        ));
    }
    let success = inverter.set_work_mode(req.mode).await?;
    Ok(Json(json!({ "success": success })))
}

#[derive(Debug, Deserialize)]
struct SocLimitsRequest {
    #[serde(rename = "minSoC")]
    min_soc: f64,
    #[serde(rename = "maxSoC")]
    max_soc: f64,
}

async fn write_soc_limits(
    State(inverter): State<SharedInverter>,
    Json(req): Json<SocLimitsRequest>,
) -> ApiResult {
    let success = inverter.set_soc_limits(req.min_soc, req.max_soc).await?;
    Ok(Json(json!({ "success": success })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BatteryLimitsRequest {
    max_charge_current: f64,
    max_discharge_current: f64,
}

async fn write_battery_limits(
    State(inverter): State<SharedInverter>,
    Json(req): Json<BatteryLimitsRequest>,
) -> ApiResult {
    let success = inverter
        .set_battery_limits(req.max_charge_current, req.max_discharge_current)
        .await?;
    Ok(Json(json!({ "success": success })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PowerLimitsRequest {
    import_limit: f64,
    export_limit: f64,
}

async fn write_power_limits(
    State(inverter): State<SharedInverter>,
    Json(req): Json<PowerLimitsRequest>,
) -> ApiResult {
    let success = inverter
        .set_power_limits(req.import_limit, req.export_limit)
        .await?;
    Ok(Json(json!({ "success": success })))
}

#[derive(Debug, Deserialize)]
struct RemotePowerRequest {
    power: f64,
}

async fn write_remote_power(
    State(inverter): State<SharedInverter>,
    Json(req): Json<RemotePowerRequest>,
) -> ApiResult {
    let success = inverter.set_remote_power(req.power).await?;
    Ok(Json(json!({ "success": success })))
}

#[derive(Debug, Deserialize)]
struct RemoteControlRequest {
    mode: u16,
}

async fn write_remote_control(
    State(inverter): State<SharedInverter>,
    Json(req): Json<RemoteControlRequest>,
) -> ApiResult {
    let Some(mode) = RemoteMode::from_mode(req.mode) else {
        return Err(ApiError::BadRequest(
            "Invalid remote control mode".to_string(),
        ));
    };
    let success = inverter.set_remote_mode(mode).await?;
    Ok(Json(json!({ "success": success })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NamedWriteRequest {
    register_name: String,
    value: f64,
}

async fn write_register(
    State(inverter): State<SharedInverter>,
    Json(req): Json<NamedWriteRequest>,
) -> ApiResult {
    let Some(def) = registers::writable(&req.register_name) else {
        return Err(ApiError::BadRequest("Invalid register name".to_string()));
    };
    let success = inverter.write(&def, req.value).await?;
    Ok(Json(json!({ "success": success })))
}

#[derive(Debug, Deserialize)]
struct CustomReadRequest {
    address: u16,
    length: u16,
    #[serde(rename = "type")]
    kind: String,
    scale: Option<f64>,
}

async fn custom_read(
    State(inverter): State<SharedInverter>,
    Json(req): Json<CustomReadRequest>,
) -> ApiResult {
    let def = registers::custom(req.address, req.length, &req.kind, req.scale).ok_or_else(|| {
        ApiError::BadRequest(format!(
            "Invalid register description: {} x{}",
            req.kind, req.length
        ))
    })?;
    let value = inverter.read(&def).await?;
    Ok(Json(json!({
        "success": value.is_some(),
        "value": value,
        "register": req.address,
    })))
}

#[derive(Debug, Deserialize)]
struct CustomWriteRequest {
    address: u16,
    length: u16,
    #[serde(rename = "type")]
    kind: String,
    scale: Option<f64>,
    value: f64,
}

async fn custom_write(
    State(inverter): State<SharedInverter>,
    Json(req): Json<CustomWriteRequest>,
) -> ApiResult {
    let def = registers::custom(req.address, req.length, &req.kind, req.scale).ok_or_else(|| {
        ApiError::BadRequest(format!(
            "Invalid register description: {} x{}",
            req.kind, req.length
        ))
    })?;
    if matches!(def.kind, RegisterKind::Str(_)) {
        return Err(ApiError::BadRequest(
            "String registers cannot be written".to_string(),
        ));
    }
    let success = inverter.write(&def, req.value).await?;
    Ok(Json(json!({
        "success": success,
        "register": req.address,
        "writtenValue": req.value,
    })))
}
