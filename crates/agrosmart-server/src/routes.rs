use axum::Json;
use axum::Router;
use axum::body::Bytes;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::HeaderValue;
use axum::routing::{get, post};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use agrosmart_core::config::ServerConfig;
use agrosmart_core::store::ZoneStore;
use agrosmart_core::{Irrigator, SensorReport, ZoneId, ZoneOverview, ZoneSettings};

use crate::error::ApiError;

/// Shared application state.
#[derive(Clone)]
pub struct AppState<S> {
    pub irrigator: Irrigator<S>,
}

/// Response to a sensor report.
#[derive(Debug, Serialize, Deserialize)]
pub struct ReportResponse {
    pub pump_on: bool,
    pub message: String,
}

/// Optional body of a manual watering request.
#[derive(Debug, Default, Deserialize)]
pub struct WaterRequest {
    /// Litres; display only. Absent or `null` means 0.
    #[serde(default)]
    pub amount: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
}

/// `GET /zones` body: `"Zone N"` to overview, in zone order.
pub struct ZonesResponse(Vec<(ZoneId, ZoneOverview)>);

impl Serialize for ZonesResponse {
    fn serialize<Ser: Serializer>(&self, serializer: Ser) -> Result<Ser::Ok, Ser::Error> {
        serializer.collect_map(self.0.iter().map(|(id, zone)| (id.label(), zone)))
    }
}

/// Path segments that are not a zone id name no zone.
fn zone_id(raw: &str) -> Result<ZoneId, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::NotFound("Zone not found".into()))
}

/// `POST /report/{zone_id}` and `POST /zones/{zone_id}`.
pub async fn report<S: ZoneStore>(
    State(state): State<AppState<S>>,
    Path(raw): Path<String>,
    payload: Result<Json<SensorReport>, JsonRejection>,
) -> Result<Json<ReportResponse>, ApiError> {
    let zone = zone_id(&raw)?;
    let Json(report) = payload?;
    let decision = state.irrigator.handle_report(zone, report).await?;
    Ok(Json(ReportResponse {
        pump_on: decision.pump_on,
        message: format!("Zone {zone} updated"),
    }))
}

/// `GET /zones`
pub async fn list_zones<S: ZoneStore>(
    State(state): State<AppState<S>>,
) -> Result<Json<ZonesResponse>, ApiError> {
    let overview = state.irrigator.overview().await?;
    Ok(Json(ZonesResponse(overview)))
}

/// `GET /zones/{zone_id}`
pub async fn get_zone<S: ZoneStore>(
    State(state): State<AppState<S>>,
    Path(raw): Path<String>,
) -> Result<Json<ZoneOverview>, ApiError> {
    let zone = zone_id(&raw)?;
    Ok(Json(state.irrigator.zone_overview(zone).await?))
}

/// `PUT /zones/{zone_id}`
pub async fn configure_zone<S: ZoneStore>(
    State(state): State<AppState<S>>,
    Path(raw): Path<String>,
    payload: Result<Json<ZoneSettings>, JsonRejection>,
) -> Result<Json<ZoneOverview>, ApiError> {
    let zone = zone_id(&raw)?;
    let Json(settings) = payload?;
    Ok(Json(state.irrigator.configure(zone, &settings).await?))
}

/// `POST /zones/{zone_id}/water` with an optional `{"amount": N}` body.
pub async fn water_zone<S: ZoneStore>(
    State(state): State<AppState<S>>,
    Path(raw): Path<String>,
    body: Bytes,
) -> Result<Json<MessageResponse>, ApiError> {
    let zone = zone_id(&raw)?;
    let request = if body.iter().all(u8::is_ascii_whitespace) {
        WaterRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::BadRequest(format!("invalid water request: {e}")))?
    };
    state
        .irrigator
        .request_watering(zone, request.amount.unwrap_or(0))
        .await?;
    Ok(Json(MessageResponse {
        message: format!(
            "Manual watering requested for Zone {zone}. Next sensor sync will activate pump."
        ),
    }))
}

/// `GET /health`
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".into(),
        timestamp: Utc::now(),
    })
}

/// `POST /reset`
pub async fn reset<S: ZoneStore>(
    State(state): State<AppState<S>>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.irrigator.reset().await?;
    Ok(Json(MessageResponse {
        message: "All zones reset".into(),
    }))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(origin = %origin, error = %e, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(allowed)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Build the application router.
pub fn build_router<S>(state: AppState<S>, server: &ServerConfig) -> Router
where
    S: ZoneStore + Clone + 'static,
{
    let mut router = Router::new()
        .route("/report/{zone_id}", post(report::<S>))
        .route("/zones", get(list_zones::<S>))
        .route(
            "/zones/{zone_id}",
            get(get_zone::<S>)
                .put(configure_zone::<S>)
                .post(report::<S>),
        )
        .route("/zones/{zone_id}/water", post(water_zone::<S>))
        .route("/health", get(health));

    if server.allow_reset {
        router = router.route("/reset", post(reset::<S>));
    }

    router
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&server.cors_origins))
        .with_state(state)
}
