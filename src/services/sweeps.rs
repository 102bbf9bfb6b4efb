// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Periodic sweeps over the live game state.
//!
//! Both sweeps work from a snapshot and commit per row; neither takes a
//! store-wide lock. Per-item failures are counted and logged, never fatal.
//! They run either from the in-process background loops or from the
//! scheduler-authenticated `/tasks/*` endpoints.

use crate::config::GameRules;
use crate::db::Store;
use crate::error::Result;
use crate::services::geometry;
use crate::services::ledger::PlayerLedger;
use crate::services::notify::{Notification, NotificationQueue};
use crate::services::zones::ZoneStore;
use chrono::{DateTime, Duration, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Time-bounded "recently notified" set keyed by (zone, player).
#[derive(Clone)]
pub struct CooldownCache {
    entries: Arc<DashMap<(u64, u64), DateTime<Utc>>>,
    ttl: Duration,
}

impl CooldownCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            ttl,
        }
    }

    /// Mark `key` as notified at `now` unless it already is within the TTL.
    ///
    /// Returns true if the caller should go ahead and notify.
    pub fn try_acquire(&self, key: (u64, u64), now: DateTime<Utc>) -> bool {
        match self.entries.entry(key) {
            Entry::Occupied(mut e) => {
                if now.signed_duration_since(*e.get()) < self.ttl {
                    return false;
                }
                e.insert(now);
                true
            }
            Entry::Vacant(e) => {
                e.insert(now);
                true
            }
        }
    }

    /// Drop entries whose cooldown has elapsed.
    pub fn purge(&self, now: DateTime<Utc>) {
        self.entries
            .retain(|_, at| now.signed_duration_since(*at) < self.ttl);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Counts from one sweep run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub scanned: usize,
    pub affected: usize,
    pub failed: usize,
}

#[derive(Clone)]
pub struct Sweeps<S: Store> {
    store: S,
    ledger: PlayerLedger<S>,
    zones: ZoneStore<S>,
    queue: NotificationQueue,
    cooldowns: CooldownCache,
    proximity_radius_m: f64,
}

impl<S: Store> Sweeps<S> {
    pub fn new(
        store: S,
        ledger: PlayerLedger<S>,
        zones: ZoneStore<S>,
        queue: NotificationQueue,
        cooldowns: CooldownCache,
        rules: &GameRules,
    ) -> Self {
        Self {
            store,
            ledger,
            zones,
            queue,
            cooldowns,
            proximity_radius_m: rules.proximity_radius_m,
        }
    }

    /// Revert every zone left untouched for longer than the expiry window.
    pub async fn run_expiry_sweep(&self, now: DateTime<Utc>) -> Result<SweepReport> {
        let zones = self.zones.active_zones().await?;
        let mut report = SweepReport {
            scanned: zones.len(),
            ..SweepReport::default()
        };

        for zone in zones {
            if zone.is_neutral() || !self.zones.is_stale(&zone, now) {
                continue;
            }

            match self.zones.expire_zone(zone.id, now).await {
                Ok(Some(entry)) => {
                    report.affected += 1;
                    if let Some(owner) = entry.from_owner {
                        self.queue.send(Notification::ZoneExpired {
                            recipient: owner,
                            zone_id: zone.id,
                        });
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(zone_id = zone.id, error = %e, "Zone expiry failed");
                }
            }
        }

        tracing::info!(
            scanned = report.scanned,
            expired = report.affected,
            failed = report.failed,
            "Expiry sweep complete"
        );
        Ok(report)
    }

    /// Warn zone owners about rival players trekking nearby.
    ///
    /// A rival is another player on a different team. Each (zone, player)
    /// pair is reported at most once per cooldown period.
    pub async fn run_proximity_sweep(&self, now: DateTime<Utc>) -> Result<SweepReport> {
        self.cooldowns.purge(now);

        let treks = self.store.list_active_treks().await?;
        let zones = self.zones.active_zones().await?;
        let mut report = SweepReport {
            scanned: treks.len(),
            ..SweepReport::default()
        };

        for trek in treks {
            let Some(position) = trek.points.last() else {
                continue;
            };

            let intruder_team = match self.ledger.get(trek.player_id).await {
                Ok(player) => match player.team {
                    Some(team) => team,
                    // Players without a team cannot capture anything
                    None => continue,
                },
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(
                        player_id = trek.player_id,
                        error = %e,
                        "Proximity check skipped"
                    );
                    continue;
                }
            };

            for zone in &zones {
                let Some(owner) = zone.owner else {
                    continue;
                };
                if owner == trek.player_id || zone.team == Some(intruder_team) {
                    continue;
                }

                let distance_m = geometry::distance(position, &zone.center);
                if distance_m > self.proximity_radius_m {
                    continue;
                }
                if !self.cooldowns.try_acquire((zone.id, trek.player_id), now) {
                    continue;
                }

                report.affected += 1;
                tracing::debug!(
                    zone_id = zone.id,
                    owner,
                    intruder = trek.player_id,
                    distance_m,
                    "Rival near zone"
                );
                self.queue.send(Notification::ZoneThreatened {
                    recipient: owner,
                    zone_id: zone.id,
                    intruder: trek.player_id,
                    intruder_team,
                    distance_m,
                });
            }
        }

        tracing::info!(
            treks = report.scanned,
            alerts = report.affected,
            failed = report.failed,
            "Proximity sweep complete"
        );
        Ok(report)
    }

    /// Spawn both sweep loops on their configured intervals.
    pub fn spawn_background(self, rules: &GameRules) -> Vec<JoinHandle<()>> {
        let proximity = self.clone();
        let proximity_every = std::time::Duration::from_secs(rules.proximity_interval_secs.max(1));
        let expiry_every = std::time::Duration::from_secs(rules.expiry_interval_secs.max(1));

        vec![
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(proximity_every);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                loop {
                    ticker.tick().await;
                    if let Err(e) = proximity.run_proximity_sweep(Utc::now()).await {
                        tracing::error!(error = %e, "Proximity sweep failed");
                    }
                }
            }),
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(expiry_every);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                loop {
                    ticker.tick().await;
                    if let Err(e) = self.run_expiry_sweep(Utc::now()).await {
                        tracing::error!(error = %e, "Expiry sweep failed");
                    }
                }
            }),
        ]
    }
}
