// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::Serialize;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use territory::config::Config;
use dashmap::DashSet;
use territory::db::{FirestoreDb, MemoryStore, Sequence, Store, ZoneFilter};
use territory::error::{AppError, Result};
use territory::models::{Achievement, GeoPoint, Player, Team, Trek, Zone, ZoneHistoryEntry};
use territory::routes::create_router;
use territory::services::geometry::EARTH_RADIUS_M;
use territory::services::{Notification, NotificationQueue, SubmittedPoint, TrekSubmission};
use territory::AppState;
use tokio::sync::mpsc::UnboundedReceiver;

/// Tashkent city center; every test loop is laid out around it.
#[allow(dead_code)]
pub const ORIGIN: (f64, f64) = (41.3111, 69.2797);

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Shared state over a fresh in-memory store.
/// The receiver sees every notification the services emit.
#[allow(dead_code)]
pub fn test_state() -> (Arc<AppState<MemoryStore>>, UnboundedReceiver<Notification>) {
    let (queue, rx) = NotificationQueue::new();
    let state = Arc::new(AppState::new(
        Config::test_default(),
        MemoryStore::new(),
        queue,
    ));
    (state, rx)
}

/// Create a test app over a fresh in-memory store.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app() -> (
    axum::Router,
    Arc<AppState<MemoryStore>>,
    UnboundedReceiver<Notification>,
) {
    let (state, rx) = test_state();
    (create_router(state.clone()), state, rx)
}

/// Create a test JWT token.
#[allow(dead_code)]
pub fn create_test_jwt(player_id: u64, signing_key: &[u8]) -> String {
    #[derive(Serialize)]
    struct Claims {
        sub: String,
        exp: usize,
        iat: usize,
    }

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs() as usize;

    let claims = Claims {
        sub: player_id.to_string(),
        exp: now + 86400,
        iat: now,
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(signing_key),
    )
    .unwrap()
}

/// Create a player on `team` in the ledger.
#[allow(dead_code)]
pub async fn player_on_team<S: Store>(state: &AppState<S>, player_id: u64, team: Team) {
    state
        .ledger
        .get_or_create(player_id, &format!("Player {}", player_id))
        .await
        .unwrap();
    state.ledger.set_team(player_id, team).await.unwrap();
}

/// Offset a point by the given number of meters north/east.
#[allow(dead_code)]
pub fn offset(origin: (f64, f64), north_m: f64, east_m: f64) -> (f64, f64) {
    let dlat = (north_m / EARTH_RADIUS_M).to_degrees();
    let dlng = (east_m / (EARTH_RADIUS_M * origin.0.to_radians().cos())).to_degrees();
    (origin.0 + dlat, origin.1 + dlng)
}

#[allow(dead_code)]
pub fn geo(point: (f64, f64)) -> GeoPoint {
    GeoPoint::new(point.0, point.1)
}

/// A closed 10-point walk around a `side_m` square whose south-west corner
/// is `origin`. Ends exactly where it started.
#[allow(dead_code)]
pub fn square_loop(origin: (f64, f64), side_m: f64) -> Vec<(f64, f64)> {
    let s = side_m;
    vec![
        offset(origin, 0.0, 0.0),
        offset(origin, 0.0, s / 2.0),
        offset(origin, 0.0, s),
        offset(origin, s / 2.0, s),
        offset(origin, s, s),
        offset(origin, s, s / 2.0),
        offset(origin, s, 0.0),
        offset(origin, s / 2.0, 0.0),
        offset(origin, s / 10.0, 0.0),
        offset(origin, 0.0, 0.0),
    ]
}

/// A straight 10-point walk heading east; never closes.
#[allow(dead_code)]
pub fn straight_walk(origin: (f64, f64), step_m: f64) -> Vec<(f64, f64)> {
    (0..10)
        .map(|i| offset(origin, 0.0, step_m * i as f64))
        .collect()
}

#[allow(dead_code)]
pub fn submission(points: &[(f64, f64)]) -> TrekSubmission {
    TrekSubmission {
        points: points
            .iter()
            .map(|&(lat, lng)| SubmittedPoint {
                lat,
                lng,
                timestamp: None,
            })
            .collect(),
        team: None,
        closed: false,
        distance_m: 0.0,
    }
}

/// In-memory store with switchable write failures.
///
/// Zone writes fail with `Conflict` for zones in `conflicting_zones`;
/// player updates fail with `Database` for players in `broken_players`.
#[allow(dead_code)]
#[derive(Clone, Default)]
pub struct FaultyStore {
    inner: MemoryStore,
    pub conflicting_zones: Arc<DashSet<u64>>,
    pub broken_players: Arc<DashSet<u64>>,
}

impl Store for FaultyStore {
    async fn get_player(&self, id: u64) -> Result<Option<Player>> {
        self.inner.get_player(id).await
    }

    async fn upsert_player(&self, player: &Player) -> Result<()> {
        self.inner.upsert_player(player).await
    }

    async fn update_player<F>(&self, id: u64, f: F) -> Result<Player>
    where
        F: FnOnce(&mut Player) + Send + 'static,
    {
        if self.broken_players.contains(&id) {
            return Err(AppError::Database(format!("player {} unavailable", id)));
        }
        self.inner.update_player(id, f).await
    }

    async fn next_id(&self, sequence: Sequence) -> Result<u64> {
        self.inner.next_id(sequence).await
    }

    async fn insert_zone(&self, zone: &Zone, created: &ZoneHistoryEntry) -> Result<()> {
        self.inner.insert_zone(zone, created).await
    }

    async fn get_zone(&self, id: u64) -> Result<Option<Zone>> {
        self.inner.get_zone(id).await
    }

    async fn replace_zone(
        &self,
        zone: &Zone,
        expected_revision: u64,
        entry: Option<&ZoneHistoryEntry>,
    ) -> Result<()> {
        if self.conflicting_zones.contains(&zone.id) {
            return Err(AppError::Conflict(format!("Zone {} changed", zone.id)));
        }
        self.inner.replace_zone(zone, expected_revision, entry).await
    }

    async fn list_zones(&self, filter: ZoneFilter) -> Result<Vec<Zone>> {
        self.inner.list_zones(filter).await
    }

    async fn list_history(&self, zone_id: u64) -> Result<Vec<ZoneHistoryEntry>> {
        self.inner.list_history(zone_id).await
    }

    async fn get_trek(&self, id: u64) -> Result<Option<Trek>> {
        self.inner.get_trek(id).await
    }

    async fn upsert_trek(&self, trek: &Trek) -> Result<()> {
        self.inner.upsert_trek(trek).await
    }

    async fn find_active_trek(&self, player_id: u64) -> Result<Option<Trek>> {
        self.inner.find_active_trek(player_id).await
    }

    async fn list_active_treks(&self) -> Result<Vec<Trek>> {
        self.inner.list_active_treks().await
    }

    async fn insert_achievement(&self, achievement: &Achievement) -> Result<bool> {
        self.inner.insert_achievement(achievement).await
    }

    async fn list_achievements(&self, player_id: u64) -> Result<Vec<Achievement>> {
        self.inner.list_achievements(player_id).await
    }
}

/// Shared state over a [`FaultyStore`].
#[allow(dead_code)]
pub fn faulty_state() -> (Arc<AppState<FaultyStore>>, FaultyStore) {
    let (queue, _rx) = NotificationQueue::new();
    let store = FaultyStore::default();
    let state = Arc::new(AppState::new(Config::test_default(), store.clone(), queue));
    (state, store)
}
