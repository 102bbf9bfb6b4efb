// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Player ledger: aggregate counters per player.

use crate::db::Store;
use crate::error::{AppError, Result};
use crate::models::{Player, PlayerDelta, Team};
use chrono::Utc;

#[derive(Clone)]
pub struct PlayerLedger<S: Store> {
    store: S,
}

impl<S: Store> PlayerLedger<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub async fn get(&self, player_id: u64) -> Result<Player> {
        self.store
            .get_player(player_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Player {}", player_id)))
    }

    /// Fetch the player, creating an empty row on first contact.
    pub async fn get_or_create(&self, player_id: u64, display_name: &str) -> Result<Player> {
        if let Some(player) = self.store.get_player(player_id).await? {
            return Ok(player);
        }

        let player = Player::new(player_id, display_name, Utc::now());
        self.store.upsert_player(&player).await?;
        tracing::info!(player_id, "Player created");
        Ok(player)
    }

    pub async fn set_team(&self, player_id: u64, team: Team) -> Result<Player> {
        let player = self
            .store
            .update_player(player_id, move |p| p.team = Some(team))
            .await?;
        tracing::info!(player_id, team = %team, "Team chosen");
        Ok(player)
    }

    /// Apply counter deltas in one read-modify-write.
    pub async fn adjust(&self, player_id: u64, delta: PlayerDelta) -> Result<Player> {
        self.store
            .update_player(player_id, move |p| delta.apply(p))
            .await
    }

    /// The team recorded in the ledger; the only team the game trusts.
    pub async fn authoritative_team(&self, player_id: u64) -> Result<Team> {
        self.get(player_id).await?.team.ok_or_else(|| {
            AppError::Validation(format!("Player {} has not chosen a team", player_id))
        })
    }
}
