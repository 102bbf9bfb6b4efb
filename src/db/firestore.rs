// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper implementing [`Store`].
//!
//! Collections:
//! - `players` (ledger rows, keyed by player ID)
//! - `zones` (keyed by zone ID)
//! - `zone_history` (append-only, keyed by zone ID + zone revision)
//! - `treks` (keyed by trek ID)
//! - `achievements` (keyed by `{player_id}_{code}`; the key is the uniqueness constraint)
//! - `counters` (monotonic ID sequences)

use crate::db::{collections, Sequence, Store, ZoneFilter};
use crate::error::{AppError, Result};
use crate::models::{Achievement, Player, Trek, Zone, ZoneHistoryEntry};
use firestore::{FirestoreConsistencySelector, FirestoreTransaction};
use serde::{Deserialize, Serialize};

/// Counter document for ID sequences.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Counter {
    value: u64,
}

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self> {
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create an offline client for testing.
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    async fn begin(&self) -> Result<FirestoreTransaction<'_>> {
        self.get_client()?
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))
    }

    /// A client whose reads run inside `transaction`.
    ///
    /// Documents read through it are locked until commit, so of two
    /// transactions racing on one document only one can commit.
    fn reader(&self, transaction: &FirestoreTransaction<'_>) -> Result<firestore::FirestoreDb> {
        Ok(self
            .get_client()?
            .clone_with_consistency_selector(FirestoreConsistencySelector::Transaction(
                transaction.transaction_id().clone(),
            )))
    }

    /// Read one document inside `transaction`.
    async fn read_in<T>(
        &self,
        transaction: &FirestoreTransaction<'_>,
        collection: &str,
        id: &str,
    ) -> Result<Option<T>>
    where
        T: for<'de> Deserialize<'de> + Send,
    {
        self.reader(transaction)?
            .fluent()
            .select()
            .by_id_in(collection)
            .obj()
            .one(id)
            .await
            .map_err(|e| {
                AppError::Database(format!("Failed to read {} in transaction: {}", collection, e))
            })
    }

    /// Stage a zone and, optionally, its history entry on `transaction`.
    fn stage_zone(
        &self,
        transaction: &mut FirestoreTransaction<'_>,
        zone: &Zone,
        entry: Option<&ZoneHistoryEntry>,
    ) -> Result<()> {
        let client = self.get_client()?;

        client
            .fluent()
            .update()
            .in_col(collections::ZONES)
            .document_id(zone.id.to_string())
            .object(zone)
            .add_to_transaction(transaction)
            .map_err(|e| AppError::Database(format!("Failed to add zone to transaction: {}", e)))?;

        if let Some(entry) = entry {
            client
                .fluent()
                .update()
                .in_col(collections::ZONE_HISTORY)
                .document_id(history_doc_id(zone))
                .object(entry)
                .add_to_transaction(transaction)
                .map_err(|e| {
                    AppError::Database(format!("Failed to add history to transaction: {}", e))
                })?;
        }
        Ok(())
    }
}

async fn commit(transaction: FirestoreTransaction<'_>) -> Result<()> {
    transaction
        .commit()
        .await
        .map_err(|e| AppError::Database(format!("Transaction commit failed: {}", e)))?;
    Ok(())
}

/// History is keyed by the zone revision it produced. Revisions only grow,
/// so the ID is unique per zone and sorts chronologically.
fn history_doc_id(zone: &Zone) -> String {
    format!("{}_{:020}", zone.id, zone.revision)
}

impl Store for FirestoreDb {
    // ─── Player Operations ───────────────────────────────────────

    async fn get_player(&self, id: u64) -> Result<Option<Player>> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::PLAYERS)
            .obj()
            .one(&id.to_string())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn upsert_player(&self, player: &Player) -> Result<()> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::PLAYERS)
            .document_id(player.id.to_string())
            .object(player)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    async fn update_player<F>(&self, id: u64, f: F) -> Result<Player>
    where
        F: FnOnce(&mut Player) + Send + 'static,
    {
        let mut transaction = self.begin().await?;

        let current: Option<Player> = self
            .read_in(&transaction, collections::PLAYERS, &id.to_string())
            .await?;

        let Some(mut player) = current else {
            let _ = transaction.rollback().await;
            return Err(AppError::NotFound(format!("Player {}", id)));
        };

        f(&mut player);

        self.get_client()?
            .fluent()
            .update()
            .in_col(collections::PLAYERS)
            .document_id(id.to_string())
            .object(&player)
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                AppError::Database(format!("Failed to add player to transaction: {}", e))
            })?;

        commit(transaction).await?;
        Ok(player)
    }

    // ─── Zone Operations ─────────────────────────────────────────

    async fn next_id(&self, sequence: Sequence) -> Result<u64> {
        let mut transaction = self.begin().await?;

        let current: Option<Counter> = self
            .read_in(&transaction, collections::COUNTERS, sequence.name())
            .await?;

        let next = Counter {
            value: current.unwrap_or_default().value + 1,
        };

        self.get_client()?
            .fluent()
            .update()
            .in_col(collections::COUNTERS)
            .document_id(sequence.name())
            .object(&next)
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                AppError::Database(format!("Failed to add counter to transaction: {}", e))
            })?;

        commit(transaction).await?;
        Ok(next.value)
    }

    async fn insert_zone(&self, zone: &Zone, created: &ZoneHistoryEntry) -> Result<()> {
        let mut transaction = self.begin().await?;

        let existing: Option<Zone> = self
            .read_in(&transaction, collections::ZONES, &zone.id.to_string())
            .await?;
        if existing.is_some() {
            let _ = transaction.rollback().await;
            return Err(AppError::Conflict(format!("Zone {} exists", zone.id)));
        }

        self.stage_zone(&mut transaction, zone, Some(created))?;
        commit(transaction).await
    }

    async fn get_zone(&self, id: u64) -> Result<Option<Zone>> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::ZONES)
            .obj()
            .one(&id.to_string())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn replace_zone(
        &self,
        zone: &Zone,
        expected_revision: u64,
        entry: Option<&ZoneHistoryEntry>,
    ) -> Result<()> {
        let mut transaction = self.begin().await?;

        let stored: Option<Zone> = self
            .read_in(&transaction, collections::ZONES, &zone.id.to_string())
            .await?;

        let Some(stored) = stored else {
            let _ = transaction.rollback().await;
            return Err(AppError::NotFound(format!("Zone {}", zone.id)));
        };

        if stored.revision != expected_revision {
            let _ = transaction.rollback().await;
            return Err(AppError::Conflict(format!(
                "Zone {} changed (revision {} != {})",
                zone.id, stored.revision, expected_revision
            )));
        }

        self.stage_zone(&mut transaction, zone, entry)?;
        commit(transaction).await
    }

    async fn list_zones(&self, filter: ZoneFilter) -> Result<Vec<Zone>> {
        let query = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::ZONES);

        let query = match filter {
            ZoneFilter::Active => query.filter(|q| q.for_all([q.field("active").eq(true)])),
            ZoneFilter::OwnedBy(owner) => query.filter(move |q| {
                q.for_all([q.field("active").eq(true), q.field("owner").eq(owner)])
            }),
        };

        let mut zones: Vec<Zone> = query
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        zones.sort_by_key(|z| z.id);
        Ok(zones)
    }

    // ─── Zone History Operations ─────────────────────────────────

    async fn list_history(&self, zone_id: u64) -> Result<Vec<ZoneHistoryEntry>> {
        let mut entries: Vec<ZoneHistoryEntry> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::ZONE_HISTORY)
            .filter(move |q| q.for_all([q.field("zone_id").eq(zone_id)]))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        entries.sort_by_key(|e| e.timestamp);
        Ok(entries)
    }

    // ─── Trek Operations ─────────────────────────────────────────

    async fn get_trek(&self, id: u64) -> Result<Option<Trek>> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::TREKS)
            .obj()
            .one(&id.to_string())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn upsert_trek(&self, trek: &Trek) -> Result<()> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::TREKS)
            .document_id(trek.id.to_string())
            .object(trek)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    async fn find_active_trek(&self, player_id: u64) -> Result<Option<Trek>> {
        let treks: Vec<Trek> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::TREKS)
            .filter(move |q| {
                q.for_all([
                    q.field("player_id").eq(player_id),
                    q.field("status").eq("active"),
                ])
            })
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(treks.into_iter().max_by_key(|t| t.id))
    }

    async fn list_active_treks(&self) -> Result<Vec<Trek>> {
        let mut treks: Vec<Trek> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::TREKS)
            .filter(|q| q.for_all([q.field("status").eq("active")]))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        treks.sort_by_key(|t| t.id);
        Ok(treks)
    }

    // ─── Achievement Operations ──────────────────────────────────

    async fn insert_achievement(&self, achievement: &Achievement) -> Result<bool> {
        // `insert` fails with a conflict if the document already exists.
        let result: std::result::Result<Achievement, _> = self
            .get_client()?
            .fluent()
            .insert()
            .into(collections::ACHIEVEMENTS)
            .document_id(achievement.document_id())
            .object(achievement)
            .execute()
            .await;

        match result {
            Ok(_) => Ok(true),
            Err(firestore::errors::FirestoreError::DataConflictError(_)) => Ok(false),
            Err(e) => Err(AppError::Database(e.to_string())),
        }
    }

    async fn list_achievements(&self, player_id: u64) -> Result<Vec<Achievement>> {
        let mut earned: Vec<Achievement> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::ACHIEVEMENTS)
            .filter(move |q| q.for_all([q.field("player_id").eq(player_id)]))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        earned.sort_by_key(|a| a.earned_at);
        Ok(earned)
    }
}
