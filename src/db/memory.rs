// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process store backed by `DashMap`.
//!
//! Each map entry is its own lock, so read-modify-write on one row never
//! blocks writes to another. Used for local development and tests.

use crate::db::{Sequence, Store, ZoneFilter};
use crate::error::{AppError, Result};
use crate::models::{Achievement, Player, Trek, Zone, ZoneHistoryEntry};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Default)]
struct Tables {
    players: DashMap<u64, Player>,
    zones: DashMap<u64, Zone>,
    history: DashMap<u64, Vec<ZoneHistoryEntry>>,
    treks: DashMap<u64, Trek>,
    /// player → ID of their active trek
    active_treks: DashMap<u64, u64>,
    achievements: DashMap<(u64, String), Achievement>,
    zone_seq: AtomicU64,
    trek_seq: AtomicU64,
}

/// Shared in-memory store. Clones share the same tables.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    // Lock order is always zone row, then history row.
    fn push_history(&self, entry: &ZoneHistoryEntry) {
        self.tables
            .history
            .entry(entry.zone_id)
            .or_default()
            .push(entry.clone());
    }
}

impl Store for MemoryStore {
    async fn get_player(&self, id: u64) -> Result<Option<Player>> {
        Ok(self.tables.players.get(&id).map(|p| p.clone()))
    }

    async fn upsert_player(&self, player: &Player) -> Result<()> {
        self.tables.players.insert(player.id, player.clone());
        Ok(())
    }

    async fn update_player<F>(&self, id: u64, f: F) -> Result<Player>
    where
        F: FnOnce(&mut Player) + Send + 'static,
    {
        let mut row = self
            .tables
            .players
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Player {}", id)))?;
        f(row.value_mut());
        Ok(row.clone())
    }

    async fn next_id(&self, sequence: Sequence) -> Result<u64> {
        let counter = match sequence {
            Sequence::Zone => &self.tables.zone_seq,
            Sequence::Trek => &self.tables.trek_seq,
        };
        Ok(counter.fetch_add(1, Ordering::SeqCst) + 1)
    }

    async fn insert_zone(&self, zone: &Zone, created: &ZoneHistoryEntry) -> Result<()> {
        match self.tables.zones.entry(zone.id) {
            Entry::Occupied(_) => Err(AppError::Conflict(format!("Zone {} exists", zone.id))),
            Entry::Vacant(slot) => {
                // History is pushed while the zone slot is still locked
                let _row = slot.insert(zone.clone());
                self.push_history(created);
                Ok(())
            }
        }
    }

    async fn get_zone(&self, id: u64) -> Result<Option<Zone>> {
        Ok(self.tables.zones.get(&id).map(|z| z.clone()))
    }

    async fn replace_zone(
        &self,
        zone: &Zone,
        expected_revision: u64,
        entry: Option<&ZoneHistoryEntry>,
    ) -> Result<()> {
        let mut row = self
            .tables
            .zones
            .get_mut(&zone.id)
            .ok_or_else(|| AppError::NotFound(format!("Zone {}", zone.id)))?;
        if row.revision != expected_revision {
            return Err(AppError::Conflict(format!(
                "Zone {} changed (revision {} != {})",
                zone.id, row.revision, expected_revision
            )));
        }
        *row = zone.clone();
        if let Some(entry) = entry {
            self.push_history(entry);
        }
        Ok(())
    }

    async fn list_zones(&self, filter: ZoneFilter) -> Result<Vec<Zone>> {
        let mut zones: Vec<Zone> = self
            .tables
            .zones
            .iter()
            .filter(|z| z.active)
            .filter(|z| match filter {
                ZoneFilter::Active => true,
                ZoneFilter::OwnedBy(owner) => z.owner == Some(owner),
            })
            .map(|z| z.clone())
            .collect();
        zones.sort_by_key(|z| z.id);
        Ok(zones)
    }

    async fn list_history(&self, zone_id: u64) -> Result<Vec<ZoneHistoryEntry>> {
        Ok(self
            .tables
            .history
            .get(&zone_id)
            .map(|h| h.clone())
            .unwrap_or_default())
    }

    async fn get_trek(&self, id: u64) -> Result<Option<Trek>> {
        Ok(self.tables.treks.get(&id).map(|t| t.clone()))
    }

    async fn upsert_trek(&self, trek: &Trek) -> Result<()> {
        // Row before index, so an indexed ID always resolves
        self.tables.treks.insert(trek.id, trek.clone());
        match self.tables.active_treks.entry(trek.player_id) {
            Entry::Occupied(mut slot) => {
                if trek.is_active() && trek.id >= *slot.get() {
                    slot.insert(trek.id);
                } else if !trek.is_active() && *slot.get() == trek.id {
                    slot.remove();
                }
            }
            Entry::Vacant(slot) => {
                if trek.is_active() {
                    slot.insert(trek.id);
                }
            }
        }
        Ok(())
    }

    async fn find_active_trek(&self, player_id: u64) -> Result<Option<Trek>> {
        let Some(trek_id) = self.tables.active_treks.get(&player_id).map(|id| *id) else {
            return Ok(None);
        };
        Ok(self
            .tables
            .treks
            .get(&trek_id)
            .filter(|t| t.is_active())
            .map(|t| t.clone()))
    }

    async fn list_active_treks(&self) -> Result<Vec<Trek>> {
        let mut treks: Vec<Trek> = self
            .tables
            .treks
            .iter()
            .filter(|t| t.is_active())
            .map(|t| t.clone())
            .collect();
        treks.sort_by_key(|t| t.id);
        Ok(treks)
    }

    async fn insert_achievement(&self, achievement: &Achievement) -> Result<bool> {
        let key = (achievement.player_id, achievement.code.clone());
        match self.tables.achievements.entry(key) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(achievement.clone());
                Ok(true)
            }
        }
    }

    async fn list_achievements(&self, player_id: u64) -> Result<Vec<Achievement>> {
        let mut earned: Vec<Achievement> = self
            .tables
            .achievements
            .iter()
            .filter(|a| a.player_id == player_id)
            .map(|a| a.clone())
            .collect();
        earned.sort_by_key(|a| a.earned_at);
        Ok(earned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{GeoPoint, TrekStatus, ZoneAction, ZoneGeometry};
    use chrono::Utc;

    fn zone(id: u64, owner: Option<u64>) -> Zone {
        let center = GeoPoint::new(41.3, 69.2);
        Zone {
            id,
            name: None,
            owner,
            team: None,
            geometry: ZoneGeometry::Circle {
                center,
                radius_m: 10.0,
            },
            center,
            area_m2: 314.0,
            active: true,
            created_at: Utc::now(),
            claimed_at: Utc::now(),
            revision: 0,
        }
    }

    #[tokio::test]
    async fn test_sequences_are_independent_and_increasing() {
        let store = MemoryStore::new();
        assert_eq!(store.next_id(Sequence::Zone).await.unwrap(), 1);
        assert_eq!(store.next_id(Sequence::Zone).await.unwrap(), 2);
        assert_eq!(store.next_id(Sequence::Trek).await.unwrap(), 1);
    }

    fn entry(zone_id: u64, action: ZoneAction, to_owner: u64) -> ZoneHistoryEntry {
        ZoneHistoryEntry {
            zone_id,
            action,
            from_owner: None,
            from_team: None,
            to_owner: Some(to_owner),
            to_team: None,
            timestamp: Utc::now(),
        }
    }

    async fn insert(store: &MemoryStore, zone: &Zone) {
        let owner = zone.owner.unwrap_or_default();
        store
            .insert_zone(zone, &entry(zone.id, ZoneAction::Created, owner))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_replace_zone_detects_stale_revision() {
        let store = MemoryStore::new();
        insert(&store, &zone(1, Some(5))).await;

        let mut updated = zone(1, Some(6));
        updated.revision = 1;
        let captured = entry(1, ZoneAction::Captured, 6);
        store
            .replace_zone(&updated, 0, Some(&captured))
            .await
            .unwrap();

        let err = store
            .replace_zone(&updated, 0, Some(&captured))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        // The losing write left no history behind
        let actions: Vec<ZoneAction> = store
            .list_history(1)
            .await
            .unwrap()
            .iter()
            .map(|e| e.action)
            .collect();
        assert_eq!(actions, vec![ZoneAction::Created, ZoneAction::Captured]);
    }

    #[tokio::test]
    async fn test_duplicate_insert_writes_no_history() {
        let store = MemoryStore::new();
        insert(&store, &zone(1, Some(5))).await;

        let err = store
            .insert_zone(&zone(1, Some(6)), &entry(1, ZoneAction::Created, 6))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(store.list_history(1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_active_trek_index_follows_status() {
        let store = MemoryStore::new();
        let mut trek = Trek {
            id: 3,
            player_id: 7,
            points: Vec::new(),
            distance_m: 0.0,
            status: TrekStatus::Active,
            started_at: Utc::now(),
            finished_at: None,
        };
        store.upsert_trek(&trek).await.unwrap();
        assert_eq!(store.find_active_trek(7).await.unwrap().unwrap().id, 3);

        // Finishing an older trek must not clear the newer one
        let old = Trek {
            id: 1,
            status: TrekStatus::Cancelled,
            ..trek.clone()
        };
        store.upsert_trek(&old).await.unwrap();
        assert_eq!(store.find_active_trek(7).await.unwrap().unwrap().id, 3);

        trek.status = TrekStatus::Finished;
        store.upsert_trek(&trek).await.unwrap();
        assert!(store.find_active_trek(7).await.unwrap().is_none());
        assert!(store.tables.active_treks.is_empty());
    }

    #[tokio::test]
    async fn test_list_zones_sorted_and_filtered() {
        let store = MemoryStore::new();
        for (id, owner) in [(3, Some(1)), (1, Some(2)), (2, Some(1))] {
            insert(&store, &zone(id, owner)).await;
        }

        let all: Vec<u64> = store
            .list_zones(ZoneFilter::Active)
            .await
            .unwrap()
            .iter()
            .map(|z| z.id)
            .collect();
        assert_eq!(all, vec![1, 2, 3]);

        let mine = store.list_zones(ZoneFilter::OwnedBy(1)).await.unwrap();
        assert_eq!(mine.len(), 2);
    }

    #[tokio::test]
    async fn test_achievement_insert_is_unique() {
        let store = MemoryStore::new();
        let a = Achievement {
            player_id: 1,
            code: "first_zone".to_string(),
            earned_at: Utc::now(),
        };
        assert!(store.insert_achievement(&a).await.unwrap());
        assert!(!store.insert_achievement(&a).await.unwrap());
        assert_eq!(store.list_achievements(1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_update_missing_player_is_not_found() {
        let store = MemoryStore::new();
        let err = store.update_player(9, |_| {}).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
