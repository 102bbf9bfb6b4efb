// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API routes for authenticated players.

use crate::db::Store;
use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{Achievement, GeoPoint, Player, Team, Zone, ZoneHistoryEntry};
use crate::services::{Notification, PointOutcome, SubmittedPoint, TrekOutcome, TrekSubmission};
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    routing::{get, post, put},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use geojson::FeatureCollection;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use validator::Validate;

const DEFAULT_NEAR_RADIUS_M: f64 = 1000.0;
const MAX_NEAR_RADIUS_M: f64 = 50_000.0;

/// API routes (require authentication via JWT).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes<S: Store>() -> Router<Arc<AppState<S>>> {
    Router::new()
        .route("/api/me", get(get_me::<S>))
        .route("/api/me/team", put(set_team::<S>))
        .route("/api/treks/start", post(start_trek::<S>))
        .route("/api/treks/point", post(add_point::<S>))
        .route("/api/treks/finish", post(finish_trek::<S>))
        .route("/api/treks/cancel", post(cancel_trek::<S>))
        .route("/api/treks/submit", post(submit_trek::<S>))
        .route("/api/zones", get(zones_near::<S>))
        .route("/api/zones/circle", post(create_circle::<S>))
        .route("/api/zones/mine", get(my_zones::<S>))
        .route("/api/zones/geojson", get(zones_geojson::<S>))
        .route("/api/zones/{id}/history", get(zone_history::<S>))
        .route("/api/achievements", get(get_achievements::<S>))
        .route("/api/achievements/evaluate", post(evaluate_achievements::<S>))
}

// ─── Player ──────────────────────────────────────────────────

/// Get the current player's ledger row.
async fn get_me<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Player>> {
    Ok(Json(state.ledger.get(user.player_id).await?))
}

#[derive(Deserialize, Validate)]
pub struct TeamRequest {
    #[validate(length(min = 1, max = 16))]
    pub team: String,
}

async fn set_team<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<TeamRequest>,
) -> Result<Json<Player>> {
    req.validate()?;
    let team = req
        .team
        .parse::<Team>()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    Ok(Json(state.ledger.set_team(user.player_id, team).await?))
}

// ─── Treks ───────────────────────────────────────────────────

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct TrekStartedResponse {
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub trek_id: u64,
    pub started_at: String,
}

async fn start_trek<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<TrekStartedResponse>> {
    let trek = state.treks.start_trek(user.player_id).await?;
    Ok(Json(TrekStartedResponse {
        trek_id: trek.id,
        started_at: trek.started_at.to_rfc3339(),
    }))
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct PointRequest {
    #[validate(range(min = -90.0, max = 90.0))]
    pub lat: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    pub lng: f64,
    /// Client capture time; server time is used when absent
    pub timestamp: Option<DateTime<Utc>>,
}

async fn add_point<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<PointRequest>,
) -> Result<Json<PointOutcome>> {
    req.validate()?;
    let outcome = state
        .treks
        .add_point(
            user.player_id,
            req.lat,
            req.lng,
            req.timestamp.unwrap_or_else(Utc::now),
        )
        .await?;
    Ok(Json(outcome))
}

async fn finish_trek<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<TrekOutcome>> {
    let outcome = state.capture.complete_trek(user.player_id).await?;
    notify_captures(&state, user.player_id, &outcome);
    Ok(Json(outcome))
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct CancelResponse {
    pub cancelled: bool,
}

async fn cancel_trek<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<CancelResponse>> {
    let cancelled = state.treks.cancel_trek(user.player_id).await?;
    Ok(Json(CancelResponse { cancelled }))
}

#[derive(Debug, Deserialize, Validate)]
pub struct SubmitTrekRequest {
    #[validate(length(min = 1, max = 20000), nested)]
    pub points: Vec<PointRequest>,
    /// Team the client believes the player is on (logged, not trusted)
    pub team: Option<String>,
    #[serde(default)]
    pub closed: bool,
    #[serde(default)]
    pub distance: f64,
}

/// Submit a whole trek at once and run the capture flow on it.
async fn submit_trek<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<SubmitTrekRequest>,
) -> Result<Json<TrekOutcome>> {
    req.validate()?;

    let submission = TrekSubmission {
        points: req
            .points
            .iter()
            .map(|p| SubmittedPoint {
                lat: p.lat,
                lng: p.lng,
                timestamp: p.timestamp,
            })
            .collect(),
        team: req.team,
        closed: req.closed,
        distance_m: req.distance,
    };

    let outcome = state
        .capture
        .finish_capture_flow(user.player_id, submission)
        .await?;
    notify_captures(&state, user.player_id, &outcome);
    Ok(Json(outcome))
}

/// Tell previous owners that their zones were taken.
fn notify_captures<S: Store>(state: &AppState<S>, player_id: u64, outcome: &TrekOutcome) {
    for captured in outcome.captured() {
        let Some(previous_owner) = captured.previous_owner else {
            continue;
        };
        state.notifications.send(Notification::ZoneCaptured {
            recipient: previous_owner,
            zone_id: captured.zone_id,
            zone_name: captured.name.clone(),
            captured_by: player_id,
            team: outcome.team,
        });
    }
}

// ─── Zones ───────────────────────────────────────────────────

#[derive(Debug, Deserialize, Validate)]
pub struct CircleRequest {
    #[validate(range(min = -90.0, max = 90.0))]
    pub lat: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    pub lng: f64,
    #[validate(range(min = 1.0))]
    pub radius_m: f64,
    #[validate(length(min = 1, max = 64))]
    pub name: Option<String>,
}

#[derive(Serialize)]
pub struct CircleResponse {
    pub zone: Zone,
    pub new_achievements: Vec<String>,
}

/// Drop a circular marker zone.
async fn create_circle<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<CircleRequest>,
) -> Result<Json<CircleResponse>> {
    req.validate()?;

    let max_radius = state.config.rules.max_circle_radius_m;
    if req.radius_m > max_radius {
        return Err(AppError::Validation(format!(
            "Radius must be at most {} m",
            max_radius
        )));
    }

    let team = state.ledger.authoritative_team(user.player_id).await?;
    let zone = state
        .zones
        .create_circle(
            user.player_id,
            team,
            GeoPoint::new(req.lat, req.lng),
            req.radius_m,
            req.name,
        )
        .await?;
    let new_achievements = state.achievements.evaluate(user.player_id).await?;

    Ok(Json(CircleResponse {
        zone,
        new_achievements,
    }))
}

#[derive(Debug, Deserialize, Validate)]
pub struct NearQuery {
    #[validate(range(min = -90.0, max = 90.0))]
    pub lat: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    pub lng: f64,
    #[validate(range(min = 0.0, max = 50000.0))]
    pub radius_m: Option<f64>,
}

/// Active zones around a point, nearest first.
async fn zones_near<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Query(params): Query<NearQuery>,
) -> Result<Json<Vec<Zone>>> {
    params.validate()?;
    let radius_m = params
        .radius_m
        .unwrap_or(DEFAULT_NEAR_RADIUS_M)
        .min(MAX_NEAR_RADIUS_M);

    Ok(Json(
        state
            .zones
            .zones_near(params.lat, params.lng, radius_m)
            .await?,
    ))
}

async fn my_zones<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<Zone>>> {
    Ok(Json(state.zones.player_zones(user.player_id).await?))
}

/// All active zones as a GeoJSON FeatureCollection for the map.
async fn zones_geojson<S: Store>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<FeatureCollection>> {
    let features = state
        .zones
        .active_zones()
        .await?
        .iter()
        .map(Zone::to_feature)
        .collect();

    Ok(Json(FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }))
}

async fn zone_history<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Path(zone_id): Path<u64>,
) -> Result<Json<Vec<ZoneHistoryEntry>>> {
    Ok(Json(state.zones.history(zone_id).await?))
}

// ─── Achievements ────────────────────────────────────────────

async fn get_achievements<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<Achievement>>> {
    Ok(Json(state.achievements.earned(user.player_id).await?))
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct EvaluateResponse {
    pub new_achievements: Vec<String>,
}

async fn evaluate_achievements<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<EvaluateResponse>> {
    let new_achievements = state.achievements.evaluate(user.player_id).await?;
    Ok(Json(EvaluateResponse { new_achievements }))
}
