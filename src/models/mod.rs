// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod achievement;
pub mod player;
pub mod trek;
pub mod zone;

pub use achievement::Achievement;
pub use player::{Player, PlayerDelta, Team};
pub use trek::{TrackPoint, Trek, TrekStatus};
pub use zone::{CapturedZone, GeoPoint, Zone, ZoneAction, ZoneGeometry, ZoneHistoryEntry, ZoneKind};
