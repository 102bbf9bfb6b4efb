// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Trek model: a player's recorded GPS path.

use crate::services::geometry::LatLng;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single GPS fix.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackPoint {
    pub lat: f64,
    pub lng: f64,
    pub timestamp: DateTime<Utc>,
}

impl LatLng for TrackPoint {
    fn lat(&self) -> f64 {
        self.lat
    }
    fn lng(&self) -> f64 {
        self.lng
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrekStatus {
    Active,
    Finished,
    Cancelled,
}

/// Stored trek (document ID: `treks/{id}`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trek {
    pub id: u64,
    pub player_id: u64,
    #[serde(default)]
    pub points: Vec<TrackPoint>,
    #[serde(default)]
    pub distance_m: f64,
    pub status: TrekStatus,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
}

impl Trek {
    pub fn is_active(&self) -> bool {
        self.status == TrekStatus::Active
    }
}
