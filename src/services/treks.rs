// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Trek recorder: per-player state machine over an in-progress GPS path.
//!
//! Idle → Active → {Finished, Cancelled}. Operations for one player are
//! serialized through a per-player mutex; different players never contend.

use crate::config::GameRules;
use crate::db::{Sequence, Store};
use crate::error::Result;
use crate::models::{TrackPoint, Trek, TrekStatus};
use crate::services::geometry;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Per-player mutex to serialize trek operations.
pub type TrekLocks = Arc<DashMap<u64, Arc<Mutex<()>>>>;

/// Holds one player's trek lock. On drop the map entry is removed unless
/// another operation is already waiting on it, so idle players cost nothing.
struct PlayerLock<'a> {
    locks: &'a DashMap<u64, Arc<Mutex<()>>>,
    player_id: u64,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for PlayerLock<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.locks
            .remove_if(&self.player_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}

/// Outcome of appending a GPS point.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PointOutcome {
    Recorded {
        point_count: usize,
        distance_m: f64,
        closed: bool,
    },
    NoActiveTrek,
}

/// Outcome of finishing the active trek.
#[derive(Debug, Clone)]
pub enum FinishOutcome {
    Finished(Trek),
    /// The trek was cancelled because it had too few points.
    TooShort { point_count: usize },
    NoActiveTrek,
}

#[derive(Clone)]
pub struct TrekRecorder<S: Store> {
    store: S,
    locks: TrekLocks,
    closure_threshold_m: f64,
    closure_min_points: usize,
    min_trek_points: usize,
}

impl<S: Store> TrekRecorder<S> {
    pub fn new(store: S, rules: &GameRules) -> Self {
        Self {
            store,
            locks: Arc::new(DashMap::new()),
            closure_threshold_m: rules.closure_threshold_m,
            closure_min_points: rules.closure_min_points,
            min_trek_points: rules.min_trek_points,
        }
    }

    async fn lock_player(&self, player_id: u64) -> PlayerLock<'_> {
        let lock = self
            .locks
            .entry(player_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        PlayerLock {
            locks: &self.locks,
            player_id,
            guard: Some(lock.lock_owned().await),
        }
    }

    /// Cancel any active trek and start a fresh one.
    pub async fn start_trek(&self, player_id: u64) -> Result<Trek> {
        let _lock = self.lock_player(player_id).await;

        self.cancel_active(player_id).await?;

        let trek = Trek {
            id: self.store.next_id(Sequence::Trek).await?,
            player_id,
            points: Vec::new(),
            distance_m: 0.0,
            status: TrekStatus::Active,
            started_at: Utc::now(),
            finished_at: None,
        };
        self.store.upsert_trek(&trek).await?;

        tracing::info!(player_id, trek_id = trek.id, "Trek started");
        Ok(trek)
    }

    pub async fn add_point(
        &self,
        player_id: u64,
        lat: f64,
        lng: f64,
        timestamp: DateTime<Utc>,
    ) -> Result<PointOutcome> {
        let _lock = self.lock_player(player_id).await;

        let Some(mut trek) = self.store.find_active_trek(player_id).await? else {
            return Ok(PointOutcome::NoActiveTrek);
        };

        trek.points.push(TrackPoint {
            lat,
            lng,
            timestamp,
        });
        trek.distance_m = geometry::path_length(&trek.points);
        self.store.upsert_trek(&trek).await?;

        let closed = self.is_closed(&trek.points);
        tracing::debug!(
            player_id,
            trek_id = trek.id,
            points = trek.points.len(),
            distance_m = trek.distance_m,
            closed,
            "Trek point recorded"
        );

        Ok(PointOutcome::Recorded {
            point_count: trek.points.len(),
            distance_m: trek.distance_m,
            closed,
        })
    }

    /// Freeze the active trek.
    pub async fn finish_trek(&self, player_id: u64) -> Result<FinishOutcome> {
        let _lock = self.lock_player(player_id).await;

        let Some(mut trek) = self.store.find_active_trek(player_id).await? else {
            return Ok(FinishOutcome::NoActiveTrek);
        };

        let point_count = trek.points.len();
        let now = Utc::now();
        if point_count < self.min_trek_points {
            trek.status = TrekStatus::Cancelled;
            trek.finished_at = Some(now);
            self.store.upsert_trek(&trek).await?;
            tracing::info!(player_id, trek_id = trek.id, point_count, "Trek too short");
            return Ok(FinishOutcome::TooShort { point_count });
        }

        trek.distance_m = geometry::path_length(&trek.points);
        trek.status = TrekStatus::Finished;
        trek.finished_at = Some(now);
        self.store.upsert_trek(&trek).await?;

        tracing::info!(
            player_id,
            trek_id = trek.id,
            point_count,
            distance_m = trek.distance_m,
            "Trek finished"
        );
        Ok(FinishOutcome::Finished(trek))
    }

    /// Persist a complete trek delivered in one submission.
    ///
    /// Any active trek of the player is cancelled first.
    pub async fn record_finished(&self, player_id: u64, points: Vec<TrackPoint>) -> Result<Trek> {
        let _lock = self.lock_player(player_id).await;

        self.cancel_active(player_id).await?;

        let now = Utc::now();
        let trek = Trek {
            id: self.store.next_id(Sequence::Trek).await?,
            player_id,
            distance_m: geometry::path_length(&points),
            started_at: points.first().map(|p| p.timestamp).unwrap_or(now),
            points,
            status: TrekStatus::Finished,
            finished_at: Some(now),
        };
        self.store.upsert_trek(&trek).await?;

        tracing::info!(
            player_id,
            trek_id = trek.id,
            point_count = trek.points.len(),
            distance_m = trek.distance_m,
            "Submitted trek recorded"
        );
        Ok(trek)
    }

    /// Cancel the active trek, if any. Returns whether one was cancelled.
    pub async fn cancel_trek(&self, player_id: u64) -> Result<bool> {
        let _lock = self.lock_player(player_id).await;
        self.cancel_active(player_id).await
    }

    pub async fn active_trek(&self, player_id: u64) -> Result<Option<Trek>> {
        self.store.find_active_trek(player_id).await
    }

    pub fn is_closed(&self, points: &[TrackPoint]) -> bool {
        geometry::loop_closed(points, self.closure_threshold_m, self.closure_min_points)
    }

    pub fn min_trek_points(&self) -> usize {
        self.min_trek_points
    }

    // Caller must hold the player's lock.
    async fn cancel_active(&self, player_id: u64) -> Result<bool> {
        let Some(mut trek) = self.store.find_active_trek(player_id).await? else {
            return Ok(false);
        };
        trek.status = TrekStatus::Cancelled;
        trek.finished_at = Some(Utc::now());
        self.store.upsert_trek(&trek).await?;
        tracing::info!(player_id, trek_id = trek.id, "Active trek cancelled");
        Ok(true)
    }
}
