// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Zone lifecycle: creation, capture, expiry and queries.
//!
//! Every operation is a short per-zone read-modify-write that commits
//! together with its history entry, followed by independent per-player
//! counter updates. Once the zone write has committed, a failed counter
//! update is logged and skipped; `zones_owned` tolerates that drift.

use crate::db::{Sequence, Store, ZoneFilter};
use crate::error::{AppError, Result};
use crate::models::{
    CapturedZone, GeoPoint, PlayerDelta, Team, Zone, ZoneAction, ZoneGeometry, ZoneHistoryEntry,
};
use crate::services::geometry;
use crate::services::ledger::PlayerLedger;
use chrono::{DateTime, Duration, Utc};
use std::f64::consts::PI;

#[derive(Clone)]
pub struct ZoneStore<S: Store> {
    store: S,
    ledger: PlayerLedger<S>,
    expiry_window: Duration,
}

impl<S: Store> ZoneStore<S> {
    pub fn new(store: S, ledger: PlayerLedger<S>, expiry_window: Duration) -> Self {
        Self {
            store,
            ledger,
            expiry_window,
        }
    }

    // ─── Creation ────────────────────────────────────────────────

    pub async fn create_circle(
        &self,
        owner: u64,
        team: Team,
        center: GeoPoint,
        radius_m: f64,
        name: Option<String>,
    ) -> Result<Zone> {
        if !(radius_m.is_finite() && radius_m > 0.0) {
            return Err(AppError::Validation(format!(
                "Circle radius must be positive, got {}",
                radius_m
            )));
        }

        let geometry = ZoneGeometry::Circle { center, radius_m };
        self.create(owner, team, geometry, center, PI * radius_m * radius_m, name)
            .await
    }

    pub async fn create_polygon(
        &self,
        owner: u64,
        team: Team,
        points: Vec<GeoPoint>,
        name: Option<String>,
    ) -> Result<Zone> {
        if points.len() < 3 {
            return Err(AppError::Validation(format!(
                "Polygon needs at least 3 points, got {}",
                points.len()
            )));
        }

        let (lat, lng) = geometry::centroid(&points);
        let area = geometry::polygon_area(&points);
        let geometry = ZoneGeometry::Polygon { points };
        self.create(owner, team, geometry, GeoPoint::new(lat, lng), area, name)
            .await
    }

    async fn create(
        &self,
        owner: u64,
        team: Team,
        geometry: ZoneGeometry,
        center: GeoPoint,
        area_m2: f64,
        name: Option<String>,
    ) -> Result<Zone> {
        // Unknown owners must not leave an orphaned zone behind.
        self.ledger.get(owner).await?;

        let now = Utc::now();
        let zone = Zone {
            id: self.store.next_id(Sequence::Zone).await?,
            name,
            owner: Some(owner),
            team: Some(team),
            geometry,
            center,
            area_m2,
            active: true,
            created_at: now,
            claimed_at: now,
            revision: 0,
        };

        let created = ZoneHistoryEntry {
            zone_id: zone.id,
            action: ZoneAction::Created,
            from_owner: None,
            from_team: None,
            to_owner: Some(owner),
            to_team: Some(team),
            timestamp: now,
        };
        self.store.insert_zone(&zone, &created).await?;
        self.adjust_counter(owner, zone.id, PlayerDelta::gained_zone())
            .await;

        tracing::info!(
            zone_id = zone.id,
            owner,
            team = %team,
            kind = ?zone.kind(),
            area_m2 = zone.area_m2,
            "Zone created"
        );
        Ok(zone)
    }

    // ─── Ownership Changes ───────────────────────────────────────

    /// Move a zone to a new owner.
    ///
    /// Returns `Ok(None)` without touching anything if the zone is unknown,
    /// inactive, or already owned by `new_owner`. A concurrent write to the
    /// same zone surfaces as `Conflict`.
    pub async fn capture_zone(
        &self,
        zone_id: u64,
        new_owner: u64,
        new_team: Team,
    ) -> Result<Option<CapturedZone>> {
        let Some(zone) = self.store.get_zone(zone_id).await? else {
            return Ok(None);
        };
        if !zone.active || zone.owner == Some(new_owner) {
            return Ok(None);
        }

        let now = Utc::now();
        let snapshot = CapturedZone {
            zone_id,
            name: zone.name.clone(),
            previous_owner: zone.owner,
            previous_team: zone.team,
        };

        let expected_revision = zone.revision;
        let updated = Zone {
            owner: Some(new_owner),
            team: Some(new_team),
            claimed_at: now,
            revision: expected_revision + 1,
            ..zone
        };
        let entry = ZoneHistoryEntry {
            zone_id,
            action: ZoneAction::Captured,
            from_owner: snapshot.previous_owner,
            from_team: snapshot.previous_team,
            to_owner: Some(new_owner),
            to_team: Some(new_team),
            timestamp: now,
        };
        self.store
            .replace_zone(&updated, expected_revision, Some(&entry))
            .await?;

        // The zone has changed hands; counters follow on a best-effort basis
        if let Some(old_owner) = snapshot.previous_owner {
            self.adjust_counter(old_owner, zone_id, PlayerDelta::lost_zone())
                .await;
        }
        self.adjust_counter(new_owner, zone_id, PlayerDelta::captured_zone())
            .await;

        tracing::info!(
            zone_id,
            new_owner,
            new_team = %new_team,
            previous_owner = ?snapshot.previous_owner,
            "Zone captured"
        );
        Ok(Some(snapshot))
    }

    /// Revert a zone to neutral if it has not changed hands within the
    /// expiry window.
    ///
    /// Returns the history entry written, or `None` if the zone was left alone.
    pub async fn expire_zone(
        &self,
        zone_id: u64,
        now: DateTime<Utc>,
    ) -> Result<Option<ZoneHistoryEntry>> {
        let Some(zone) = self.store.get_zone(zone_id).await? else {
            return Ok(None);
        };
        if !zone.active || zone.is_neutral() || !self.is_stale(&zone, now) {
            return Ok(None);
        }

        let expected_revision = zone.revision;
        let (old_owner, old_team) = (zone.owner, zone.team);
        let updated = Zone {
            owner: None,
            team: None,
            revision: expected_revision + 1,
            ..zone
        };
        let entry = ZoneHistoryEntry {
            zone_id,
            action: ZoneAction::Expired,
            from_owner: old_owner,
            from_team: old_team,
            to_owner: None,
            to_team: None,
            timestamp: now,
        };
        self.store
            .replace_zone(&updated, expected_revision, Some(&entry))
            .await?;

        if let Some(old_owner) = old_owner {
            self.adjust_counter(old_owner, zone_id, PlayerDelta::lost_zone())
                .await;
        }

        tracing::info!(zone_id, previous_owner = ?old_owner, "Zone expired to neutral");
        Ok(Some(entry))
    }

    pub fn is_stale(&self, zone: &Zone, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(zone.claimed_at) > self.expiry_window
    }

    async fn adjust_counter(&self, player_id: u64, zone_id: u64, delta: PlayerDelta) {
        if let Err(e) = self.ledger.adjust(player_id, delta).await {
            tracing::warn!(
                zone_id,
                player_id,
                delta = ?delta,
                error = %e,
                "Failed to update zone counters"
            );
        }
    }

    // ─── Queries ─────────────────────────────────────────────────

    pub async fn zone(&self, zone_id: u64) -> Result<Zone> {
        self.store
            .get_zone(zone_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Zone {}", zone_id)))
    }

    /// All active zones in ascending ID order.
    pub async fn active_zones(&self) -> Result<Vec<Zone>> {
        self.store.list_zones(ZoneFilter::Active).await
    }

    /// Active zones whose center lies within `radius_m`, nearest first.
    pub async fn zones_near(&self, lat: f64, lng: f64, radius_m: f64) -> Result<Vec<Zone>> {
        let origin = GeoPoint::new(lat, lng);
        let mut nearby: Vec<(f64, Zone)> = self
            .active_zones()
            .await?
            .into_iter()
            .map(|z| (geometry::distance(&origin, &z.center), z))
            .filter(|(d, _)| *d <= radius_m)
            .collect();

        nearby.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.id.cmp(&b.1.id)));
        Ok(nearby.into_iter().map(|(_, z)| z).collect())
    }

    pub async fn player_zones(&self, player_id: u64) -> Result<Vec<Zone>> {
        self.store.list_zones(ZoneFilter::OwnedBy(player_id)).await
    }

    /// Ownership history, oldest first.
    pub async fn history(&self, zone_id: u64) -> Result<Vec<ZoneHistoryEntry>> {
        if self.store.get_zone(zone_id).await?.is_none() {
            return Err(AppError::NotFound(format!("Zone {}", zone_id)));
        }
        self.store.list_history(zone_id).await
    }
}
