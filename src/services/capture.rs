// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Capture engine: turns a finished trek into zones.
//!
//! A closed loop becomes a new polygon zone owned by the trekker, and every
//! rival zone whose center falls inside the loop changes hands. The scan over
//! rival zones is not one transaction: each capture commits on its own and a
//! failed capture is logged and skipped.

use crate::db::Store;
use crate::error::{AppError, Result};
use crate::models::{CapturedZone, GeoPoint, PlayerDelta, Team, TrackPoint, Trek};
use crate::services::achievements::AchievementEvaluator;
use crate::services::geometry::{self, TrekPolygon};
use crate::services::ledger::PlayerLedger;
use crate::services::treks::{FinishOutcome, TrekRecorder};
use crate::services::zones::ZoneStore;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Claimed values below this difference are not worth a log line.
const DISTANCE_MISMATCH_TOLERANCE_M: f64 = 1.0;

/// One point of a submitted trek.
#[derive(Debug, Clone, Copy)]
pub struct SubmittedPoint {
    pub lat: f64,
    pub lng: f64,
    pub timestamp: Option<DateTime<Utc>>,
}

/// A complete trek delivered in one request.
///
/// `team`, `closed` and `distance_m` are whatever the client believes; they
/// are logged when they disagree with the server but never used.
#[derive(Debug, Clone)]
pub struct TrekSubmission {
    pub points: Vec<SubmittedPoint>,
    pub team: Option<String>,
    pub closed: bool,
    pub distance_m: f64,
}

/// What closing (or not closing) the loop produced.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Closure {
    Closed {
        zone_id: u64,
        area_m2: f64,
        captured: Vec<CapturedZone>,
    },
    /// The loop did not close; `remaining_m` is the gap between the ends.
    Open { remaining_m: f64 },
}

#[derive(Debug, Clone, Serialize)]
pub struct TrekOutcome {
    pub trek_id: u64,
    /// Team the zones were claimed for
    pub team: Team,
    pub point_count: usize,
    pub distance_m: f64,
    pub closure: Closure,
    pub new_achievements: Vec<String>,
}

impl TrekOutcome {
    pub fn captured(&self) -> &[CapturedZone] {
        match &self.closure {
            Closure::Closed { captured, .. } => captured,
            Closure::Open { .. } => &[],
        }
    }
}

#[derive(Clone)]
pub struct CaptureEngine<S: Store> {
    ledger: PlayerLedger<S>,
    zones: ZoneStore<S>,
    treks: TrekRecorder<S>,
    achievements: AchievementEvaluator<S>,
}

impl<S: Store> CaptureEngine<S> {
    pub fn new(
        ledger: PlayerLedger<S>,
        zones: ZoneStore<S>,
        treks: TrekRecorder<S>,
        achievements: AchievementEvaluator<S>,
    ) -> Self {
        Self {
            ledger,
            zones,
            treks,
            achievements,
        }
    }

    /// Settle a trek submitted in one piece.
    ///
    /// Nothing is written if the trek is too short or the player has no team.
    pub async fn finish_capture_flow(
        &self,
        player_id: u64,
        submission: TrekSubmission,
    ) -> Result<TrekOutcome> {
        let min_points = self.treks.min_trek_points();
        if submission.points.len() < min_points {
            return Err(AppError::Validation(format!(
                "Trek needs at least {} points, got {}",
                min_points,
                submission.points.len()
            )));
        }

        let team = self.ledger.authoritative_team(player_id).await?;
        if let Some(claimed) = submission.team.as_deref() {
            if claimed.parse::<Team>().ok() != Some(team) {
                tracing::warn!(
                    player_id,
                    claimed_team = claimed,
                    team = %team,
                    "Claimed team ignored"
                );
            }
        }

        let now = Utc::now();
        let points: Vec<TrackPoint> = submission
            .points
            .iter()
            .map(|p| TrackPoint {
                lat: p.lat,
                lng: p.lng,
                timestamp: p.timestamp.unwrap_or(now),
            })
            .collect();

        let server_closed = self.treks.is_closed(&points);
        if submission.closed != server_closed {
            tracing::warn!(
                player_id,
                claimed_closed = submission.closed,
                closed = server_closed,
                "Claimed closure ignored"
            );
        }

        let trek = self.treks.record_finished(player_id, points).await?;
        if (submission.distance_m - trek.distance_m).abs() > DISTANCE_MISMATCH_TOLERANCE_M {
            tracing::debug!(
                player_id,
                trek_id = trek.id,
                claimed_distance_m = submission.distance_m,
                distance_m = trek.distance_m,
                "Claimed distance ignored"
            );
        }

        self.settle(player_id, team, trek).await
    }

    /// Finish the player's recorded trek and settle it.
    pub async fn complete_trek(&self, player_id: u64) -> Result<TrekOutcome> {
        let team = self.ledger.authoritative_team(player_id).await?;

        match self.treks.finish_trek(player_id).await? {
            FinishOutcome::Finished(trek) => self.settle(player_id, team, trek).await,
            FinishOutcome::TooShort { point_count } => Err(AppError::Validation(format!(
                "Trek needs at least {} points, got {}; it was cancelled",
                self.treks.min_trek_points(),
                point_count
            ))),
            FinishOutcome::NoActiveTrek => {
                Err(AppError::NotFound(format!("Active trek for player {}", player_id)))
            }
        }
    }

    async fn settle(&self, player_id: u64, team: Team, trek: Trek) -> Result<TrekOutcome> {
        self.ledger
            .adjust(player_id, PlayerDelta::walked(trek.distance_m))
            .await?;

        let closure = if self.treks.is_closed(&trek.points) {
            self.claim_loop(player_id, team, &trek).await?
        } else {
            Closure::Open {
                remaining_m: geometry::closure_gap(&trek.points),
            }
        };

        let new_achievements = self.achievements.evaluate(player_id).await?;

        Ok(TrekOutcome {
            trek_id: trek.id,
            team,
            point_count: trek.points.len(),
            distance_m: trek.distance_m,
            closure,
            new_achievements,
        })
    }

    async fn claim_loop(&self, player_id: u64, team: Team, trek: &Trek) -> Result<Closure> {
        let outline: Vec<GeoPoint> = trek
            .points
            .iter()
            .map(|p| GeoPoint::new(p.lat, p.lng))
            .collect();
        let zone = self
            .zones
            .create_polygon(player_id, team, outline, None)
            .await?;

        let polygon = TrekPolygon::new(&trek.points);
        let mut captured = Vec::new();

        for rival in self.zones.active_zones().await? {
            if rival.id == zone.id || rival.owner == Some(player_id) {
                continue;
            }
            if !polygon.contains(rival.center.lat, rival.center.lng) {
                continue;
            }

            match self.zones.capture_zone(rival.id, player_id, team).await {
                Ok(Some(snapshot)) => captured.push(snapshot),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(
                        player_id,
                        zone_id = rival.id,
                        error = %e,
                        "Capture failed, skipping zone"
                    );
                }
            }
        }

        tracing::info!(
            player_id,
            trek_id = trek.id,
            zone_id = zone.id,
            area_m2 = zone.area_m2,
            captured = captured.len(),
            "Loop closed"
        );

        Ok(Closure::Closed {
            zone_id: zone.id,
            area_m2: zone.area_m2,
            captured,
        })
    }
}
