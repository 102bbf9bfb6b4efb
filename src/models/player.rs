// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Player ledger row and team enumeration.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The fixed set of teams a player can join.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Team {
    Red,
    Blue,
    Green,
    Yellow,
}

impl Team {
    pub const ALL: [Team; 4] = [Team::Red, Team::Blue, Team::Green, Team::Yellow];

    pub fn as_str(&self) -> &'static str {
        match self {
            Team::Red => "red",
            Team::Blue => "blue",
            Team::Green => "green",
            Team::Yellow => "yellow",
        }
    }
}

impl fmt::Display for Team {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown team name.
#[derive(Debug, thiserror::Error)]
#[error("Unknown team: {0}")]
pub struct UnknownTeam(pub String);

impl FromStr for Team {
    type Err = UnknownTeam;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "red" => Ok(Team::Red),
            "blue" => Ok(Team::Blue),
            "green" => Ok(Team::Green),
            "yellow" => Ok(Team::Yellow),
            other => Err(UnknownTeam(other.to_string())),
        }
    }
}

/// Player aggregate row (also used as document ID: `players/{id}`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    pub id: u64,
    #[serde(default)]
    pub display_name: String,
    /// Chosen team; `None` until the player picks one
    #[serde(default)]
    pub team: Option<Team>,
    #[serde(default)]
    pub total_distance_m: f64,
    #[serde(default)]
    pub zones_owned: u32,
    #[serde(default)]
    pub zones_captured_count: u32,
    #[serde(default)]
    pub referral_count: u32,
    pub created_at: DateTime<Utc>,
}

impl Player {
    pub fn new(id: u64, display_name: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            team: None,
            total_distance_m: 0.0,
            zones_owned: 0,
            zones_captured_count: 0,
            referral_count: 0,
            created_at: now,
        }
    }
}

/// Signed counter adjustments applied to a player row in one read-modify-write.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PlayerDelta {
    pub distance_m: f64,
    pub zones_owned: i64,
    pub zones_captured: i64,
}

impl PlayerDelta {
    pub fn gained_zone() -> Self {
        Self {
            zones_owned: 1,
            ..Self::default()
        }
    }

    pub fn lost_zone() -> Self {
        Self {
            zones_owned: -1,
            ..Self::default()
        }
    }

    pub fn captured_zone() -> Self {
        Self {
            zones_owned: 1,
            zones_captured: 1,
            ..Self::default()
        }
    }

    pub fn walked(distance_m: f64) -> Self {
        Self {
            distance_m,
            ..Self::default()
        }
    }

    /// Apply the delta. Counters never go below zero; drift is tolerated.
    pub fn apply(&self, player: &mut Player) {
        player.total_distance_m = (player.total_distance_m + self.distance_m).max(0.0);
        player.zones_owned = clamp_add(player.zones_owned, self.zones_owned);
        player.zones_captured_count = clamp_add(player.zones_captured_count, self.zones_captured);
    }
}

fn clamp_add(value: u32, delta: i64) -> u32 {
    (i64::from(value) + delta).clamp(0, i64::from(u32::MAX)) as u32
}
