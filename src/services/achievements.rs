// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Achievement evaluation over player aggregates.
//!
//! Evaluation is idempotent: each code is persisted through the store's
//! unique insert, so two concurrent evaluations for the same player award a
//! code at most once between them.

use crate::db::Store;
use crate::error::Result;
use crate::models::{Achievement, Player};
use crate::services::ledger::PlayerLedger;
use chrono::Utc;
use std::collections::HashSet;

/// Which aggregate a threshold reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    ZonesOwned,
    ZonesCaptured,
    DistanceMeters,
    Referrals,
}

impl Metric {
    fn read(&self, player: &Player) -> f64 {
        match self {
            Metric::ZonesOwned => f64::from(player.zones_owned),
            Metric::ZonesCaptured => f64::from(player.zones_captured_count),
            Metric::DistanceMeters => player.total_distance_m,
            Metric::Referrals => f64::from(player.referral_count),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Threshold {
    pub code: &'static str,
    pub metric: Metric,
    pub at_least: f64,
}

impl Threshold {
    pub fn is_met(&self, player: &Player) -> bool {
        self.metric.read(player) >= self.at_least
    }
}

pub const THRESHOLDS: &[Threshold] = &[
    Threshold {
        code: "first_zone",
        metric: Metric::ZonesOwned,
        at_least: 1.0,
    },
    Threshold {
        code: "landlord",
        metric: Metric::ZonesOwned,
        at_least: 10.0,
    },
    Threshold {
        code: "first_capture",
        metric: Metric::ZonesCaptured,
        at_least: 1.0,
    },
    Threshold {
        code: "conqueror",
        metric: Metric::ZonesCaptured,
        at_least: 10.0,
    },
    Threshold {
        code: "walker_10k",
        metric: Metric::DistanceMeters,
        at_least: 10_000.0,
    },
    Threshold {
        code: "marathoner",
        metric: Metric::DistanceMeters,
        at_least: 42_195.0,
    },
    Threshold {
        code: "recruiter",
        metric: Metric::Referrals,
        at_least: 5.0,
    },
];

/// Codes satisfied by `player` that are not in `earned`, in table order.
pub fn newly_satisfied(player: &Player, earned: &HashSet<&str>) -> Vec<&'static str> {
    THRESHOLDS
        .iter()
        .filter(|t| t.is_met(player) && !earned.contains(t.code))
        .map(|t| t.code)
        .collect()
}

#[derive(Clone)]
pub struct AchievementEvaluator<S: Store> {
    store: S,
    ledger: PlayerLedger<S>,
}

impl<S: Store> AchievementEvaluator<S> {
    pub fn new(store: S, ledger: PlayerLedger<S>) -> Self {
        Self { store, ledger }
    }

    /// Persist and return every code newly earned by the player.
    pub async fn evaluate(&self, player_id: u64) -> Result<Vec<String>> {
        let player = self.ledger.get(player_id).await?;
        let earned = self.store.list_achievements(player_id).await?;
        let earned_codes: HashSet<&str> = earned.iter().map(|a| a.code.as_str()).collect();

        let mut awarded = Vec::new();
        for code in newly_satisfied(&player, &earned_codes) {
            let achievement = Achievement {
                player_id,
                code: code.to_string(),
                earned_at: Utc::now(),
            };
            // A concurrent evaluation may have inserted it first.
            if self.store.insert_achievement(&achievement).await? {
                tracing::info!(player_id, code, "Achievement earned");
                awarded.push(achievement.code);
            }
        }
        Ok(awarded)
    }

    pub async fn earned(&self, player_id: u64) -> Result<Vec<Achievement>> {
        self.store.list_achievements(player_id).await
    }
}
