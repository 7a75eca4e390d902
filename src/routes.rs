use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::{
    aggregate::ForecastResult,
    config::{Config, WeatherProviderKind},
    energy::{EnergyModel, PvSystemConfig},
    error::ForecastError,
    forecast::types::Coordinates,
    location::Place,
    service::{validate_systems, ForecastService},
    session::{SaveOutcome, SessionState, SessionStore},
};

// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub service: Arc<ForecastService>,
    pub session: Arc<SessionStore>,
}

// Request/Response types
#[derive(Debug, Deserialize)]
pub struct GeocodeQuery {
    pub query: String,
}

#[derive(Debug, Serialize)]
pub struct GeocodeResponse {
    pub suggestions: Vec<Place>,
}

#[derive(Debug, Deserialize)]
pub struct ForecastRequest {
    pub address: String,
    pub pv_systems: Vec<PvSystemConfig>,
    pub stc_temperature: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct LockLocationRequest {
    pub address: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub version: String,
    pub weather_provider: WeatherProviderKind,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub session: SessionState,
    pub persisted: SaveOutcome,
}

#[derive(Debug, Serialize)]
pub struct ClearResponse {
    pub removed: u64,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub detail: String,
}

/// Forecast failures as HTTP responses with a `{detail}` body.
#[derive(Debug)]
pub struct ApiError(ForecastError);

impl From<ForecastError> for ApiError {
    fn from(err: ForecastError) -> Self {
        ApiError(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self.0 {
            ForecastError::LocationNotFound(_) => StatusCode::NOT_FOUND,
            ForecastError::InvalidRequest(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ForecastError::NetworkFailure(_) | ForecastError::AllSystemsFailed { .. } => {
                StatusCode::BAD_GATEWAY
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorBody {
            detail: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

// Route handlers
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let status = match state.session.health_check().await {
        Ok(()) => "healthy",
        Err(e) => {
            tracing::warn!("Store health check failed: {}", e);
            "degraded"
        }
    };
    Json(HealthResponse {
        status: status.to_string(),
        timestamp: chrono::Utc::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        weather_provider: state.config.weather_provider,
    })
}

pub async fn geocode(
    State(state): State<AppState>,
    Query(params): Query<GeocodeQuery>,
) -> Json<GeocodeResponse> {
    let suggestions = match state.service.resolver().suggest(&params.query).await {
        Ok(places) => places,
        Err(e) => {
            tracing::error!("Suggestion lookup failed for '{}': {}", params.query, e);
            Vec::new()
        }
    };
    Json(GeocodeResponse { suggestions })
}

pub async fn forecast(
    State(state): State<AppState>,
    Json(request): Json<ForecastRequest>,
) -> Result<Json<ForecastResult>, ApiError> {
    let snapshot = state.session.load().await.unwrap_or_default();
    let model = match request.stc_temperature {
        Some(stc) => EnergyModel::new(stc),
        None => snapshot.energy_model(),
    };
    let query = snapshot.location_query(&request.address);

    let computed = state
        .service
        .compute(&query, &request.pv_systems, model)
        .await?;

    tracing::info!(
        "Forecast for {} ({} systems): {:.2} kWh on day 1",
        computed.place.address,
        request.pv_systems.len(),
        computed.result.primary_day_total_kwh
    );

    // Merge into whatever the session became while computing.
    let (_, persisted) = state
        .session
        .update(|session| {
            if let Some(stc) = request.stc_temperature {
                session.stc_temperature = stc;
            }
            session.record_compute(&request.address, &request.pv_systems);
        })
        .await;
    if persisted != SaveOutcome::Saved {
        tracing::warn!("Forecast inputs were not persisted ({:?})", persisted);
    }

    Ok(Json(computed.result))
}

pub async fn get_session(State(state): State<AppState>) -> Json<SessionState> {
    Json(state.session.load().await.unwrap_or_default())
}

pub async fn put_session(
    State(state): State<AppState>,
    Json(session): Json<SessionState>,
) -> Result<Json<SessionResponse>, ApiError> {
    if !session.systems.is_empty() {
        validate_systems(&session.systems)?;
    }
    if let Some(place) = &session.resolved_location {
        if !place.coordinates().is_valid() {
            return Err(ForecastError::InvalidRequest(format!(
                "Coordinates ({}, {}) are out of range",
                place.latitude, place.longitude
            ))
            .into());
        }
    }

    let persisted = state.session.save(&session).await;
    Ok(Json(SessionResponse { session, persisted }))
}

pub async fn delete_session(State(state): State<AppState>) -> Json<ClearResponse> {
    let removed = state.session.clear().await;
    Json(ClearResponse { removed })
}

pub async fn lock_location(
    State(state): State<AppState>,
    Json(request): Json<LockLocationRequest>,
) -> Result<Json<SessionResponse>, ApiError> {
    let location = Coordinates::new(request.latitude, request.longitude);
    if !location.is_valid() {
        return Err(ForecastError::InvalidRequest(format!(
            "Coordinates ({}, {}) are out of range",
            request.latitude, request.longitude
        ))
        .into());
    }

    let address = request
        .address
        .filter(|a| !a.trim().is_empty())
        .unwrap_or_else(|| format!("{:.5}, {:.5}", location.latitude, location.longitude));
    let place = Place {
        address,
        latitude: location.latitude,
        longitude: location.longitude,
    };

    let (session, persisted) = state
        .session
        .update(|session| session.lock_location(place))
        .await;
    Ok(Json(SessionResponse { session, persisted }))
}

pub async fn unlock_location(State(state): State<AppState>) -> Json<SessionResponse> {
    let (session, persisted) = state.session.update(SessionState::unlock_location).await;
    Json(SessionResponse { session, persisted })
}

// Create the router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/geocode", get(geocode))
        .route("/api/forecast", post(forecast))
        .route(
            "/api/session",
            get(get_session).put(put_session).delete(delete_session),
        )
        .route(
            "/api/session/location",
            post(lock_location).delete(unlock_location),
        )
        .with_state(state)
}
