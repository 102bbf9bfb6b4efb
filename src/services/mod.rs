// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - game logic layer.

pub mod achievements;
pub mod capture;
pub mod geometry;
pub mod ledger;
pub mod notify;
pub mod sweeps;
pub mod treks;
pub mod zones;

pub use achievements::AchievementEvaluator;
pub use capture::{CaptureEngine, Closure, SubmittedPoint, TrekOutcome, TrekSubmission};
pub use ledger::PlayerLedger;
pub use notify::{Delivery, Notification, NotificationQueue, WebhookClient};
pub use sweeps::{CooldownCache, SweepReport, Sweeps};
pub use treks::{FinishOutcome, PointOutcome, TrekRecorder};
pub use zones::ZoneStore;
