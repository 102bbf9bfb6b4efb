// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Territory: a location-based zone capture game
//!
//! Players claim zones on the map by dropping a circle or by walking a
//! closed GPS loop, and capture rival zones by walking a loop around them.
//! This crate provides the game core and the HTTP API in front of it.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use config::Config;
use db::Store;
use services::{
    AchievementEvaluator, CaptureEngine, CooldownCache, NotificationQueue, PlayerLedger, Sweeps,
    TrekRecorder, ZoneStore,
};

/// Shared application state.
pub struct AppState<S: Store> {
    pub config: Config,
    pub store: S,
    pub ledger: PlayerLedger<S>,
    pub zones: ZoneStore<S>,
    pub treks: TrekRecorder<S>,
    pub achievements: AchievementEvaluator<S>,
    pub capture: CaptureEngine<S>,
    pub sweeps: Sweeps<S>,
    pub notifications: NotificationQueue,
}

impl<S: Store> AppState<S> {
    /// Wire every service onto one store.
    pub fn new(config: Config, store: S, notifications: NotificationQueue) -> Self {
        let rules = &config.rules;
        let ledger = PlayerLedger::new(store.clone());
        let zones = ZoneStore::new(store.clone(), ledger.clone(), rules.expiry_window);
        let treks = TrekRecorder::new(store.clone(), rules);
        let achievements = AchievementEvaluator::new(store.clone(), ledger.clone());
        let capture = CaptureEngine::new(
            ledger.clone(),
            zones.clone(),
            treks.clone(),
            achievements.clone(),
        );
        let sweeps = Sweeps::new(
            store.clone(),
            ledger.clone(),
            zones.clone(),
            notifications.clone(),
            CooldownCache::new(rules.proximity_cooldown),
            rules,
        );

        Self {
            config,
            store,
            ledger,
            zones,
            treks,
            achievements,
            capture,
            sweeps,
            notifications,
        }
    }
}
