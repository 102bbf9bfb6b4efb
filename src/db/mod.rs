//! Database layer.
//!
//! [`Store`] is the CRUD contract the game core is written against. Every
//! mutating call is a short, independently committed read-modify-write on a
//! single row. The one exception is a zone write, which commits together
//! with the history entry describing it.

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreDb;
pub use memory::MemoryStore;

use crate::error::Result;
use crate::models::{Achievement, Player, Trek, Zone, ZoneHistoryEntry};
use std::future::Future;

/// Collection names as constants.
pub mod collections {
    pub const PLAYERS: &str = "players";
    pub const ZONES: &str = "zones";
    pub const ZONE_HISTORY: &str = "zone_history";
    pub const TREKS: &str = "treks";
    pub const ACHIEVEMENTS: &str = "achievements";
    /// Monotonic ID counters (keyed by sequence name)
    pub const COUNTERS: &str = "counters";
}

/// Monotonic ID sequences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sequence {
    Zone,
    Trek,
}

impl Sequence {
    pub fn name(&self) -> &'static str {
        match self {
            Sequence::Zone => "zones",
            Sequence::Trek => "treks",
        }
    }
}

/// Which zones a listing returns. Results are always active zones in
/// ascending ID order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoneFilter {
    Active,
    OwnedBy(u64),
}

/// Persistence contract for players, zones, history, treks and achievements.
pub trait Store: Clone + Send + Sync + 'static {
    // ─── Players ─────────────────────────────────────────────────

    fn get_player(&self, id: u64) -> impl Future<Output = Result<Option<Player>>> + Send;

    fn upsert_player(&self, player: &Player) -> impl Future<Output = Result<()>> + Send;

    /// Atomically read, modify and write one player row.
    ///
    /// Returns `NotFound` if the player does not exist.
    fn update_player<F>(&self, id: u64, f: F) -> impl Future<Output = Result<Player>> + Send
    where
        F: FnOnce(&mut Player) + Send + 'static;

    // ─── Zones ───────────────────────────────────────────────────

    fn next_id(&self, sequence: Sequence) -> impl Future<Output = Result<u64>> + Send;

    /// Insert a new zone and its `created` history entry as one unit.
    ///
    /// Returns `Conflict` if the ID is taken.
    fn insert_zone(
        &self,
        zone: &Zone,
        created: &ZoneHistoryEntry,
    ) -> impl Future<Output = Result<()>> + Send;

    fn get_zone(&self, id: u64) -> impl Future<Output = Result<Option<Zone>>> + Send;

    /// Write `zone` only if the stored revision still equals `expected_revision`,
    /// appending `entry` to its history in the same commit.
    ///
    /// Returns `Conflict` on a revision mismatch, `NotFound` if the zone is gone.
    /// Either both the zone and the entry are written or neither is.
    fn replace_zone(
        &self,
        zone: &Zone,
        expected_revision: u64,
        entry: Option<&ZoneHistoryEntry>,
    ) -> impl Future<Output = Result<()>> + Send;

    fn list_zones(&self, filter: ZoneFilter) -> impl Future<Output = Result<Vec<Zone>>> + Send;

    // ─── Zone History ────────────────────────────────────────────

    /// History of one zone, oldest first.
    fn list_history(
        &self,
        zone_id: u64,
    ) -> impl Future<Output = Result<Vec<ZoneHistoryEntry>>> + Send;

    // ─── Treks ───────────────────────────────────────────────────

    fn get_trek(&self, id: u64) -> impl Future<Output = Result<Option<Trek>>> + Send;

    fn upsert_trek(&self, trek: &Trek) -> impl Future<Output = Result<()>> + Send;

    fn find_active_trek(
        &self,
        player_id: u64,
    ) -> impl Future<Output = Result<Option<Trek>>> + Send;

    fn list_active_treks(&self) -> impl Future<Output = Result<Vec<Trek>>> + Send;

    // ─── Achievements ────────────────────────────────────────────

    /// Insert unless `(player_id, code)` already exists.
    ///
    /// Returns `false` for a duplicate; duplicates are not an error.
    fn insert_achievement(
        &self,
        achievement: &Achievement,
    ) -> impl Future<Output = Result<bool>> + Send;

    fn list_achievements(
        &self,
        player_id: u64,
    ) -> impl Future<Output = Result<Vec<Achievement>>> + Send;
}
