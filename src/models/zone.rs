// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Zone model, geometry payload and ownership history.

use crate::models::Team;
use crate::services::geometry::LatLng;
use chrono::{DateTime, Utc};
use geo::{LineString, Point, Polygon};
use geojson::{feature::Id, Feature, JsonObject};
use serde::{Deserialize, Serialize};

/// A WGS84 coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

impl LatLng for GeoPoint {
    fn lat(&self) -> f64 {
        self.lat
    }
    fn lng(&self) -> f64 {
        self.lng
    }
}

/// Zone shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ZoneGeometry {
    Circle { center: GeoPoint, radius_m: f64 },
    Polygon { points: Vec<GeoPoint> },
}

/// Discriminant of [`ZoneGeometry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZoneKind {
    Circle,
    Polygon,
}

impl ZoneGeometry {
    pub fn kind(&self) -> ZoneKind {
        match self {
            ZoneGeometry::Circle { .. } => ZoneKind::Circle,
            ZoneGeometry::Polygon { .. } => ZoneKind::Polygon,
        }
    }
}

/// A claimed region (document ID: `zones/{id}`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Zone {
    pub id: u64,
    #[serde(default)]
    pub name: Option<String>,
    /// `None` means neutral
    pub owner: Option<u64>,
    pub team: Option<Team>,
    pub geometry: ZoneGeometry,
    /// Circle center or polygon centroid; used for capture and proximity
    pub center: GeoPoint,
    pub area_m2: f64,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    /// Last ownership change; the expiry clock runs from here
    pub claimed_at: DateTime<Utc>,
    /// Bumped on every write; guards read-modify-write against lost updates
    #[serde(default)]
    pub revision: u64,
}

impl Zone {
    pub fn kind(&self) -> ZoneKind {
        self.geometry.kind()
    }

    pub fn is_neutral(&self) -> bool {
        self.owner.is_none()
    }

    /// Render as a GeoJSON feature for map clients.
    pub fn to_feature(&self) -> Feature {
        let geometry = match &self.geometry {
            ZoneGeometry::Circle { center, .. } => {
                geojson::Geometry::new(geojson::Value::from(&Point::new(center.lng, center.lat)))
            }
            ZoneGeometry::Polygon { points } => {
                let ring: LineString<f64> = points.iter().map(|p| (p.lng, p.lat)).collect();
                geojson::Geometry::new(geojson::Value::from(&Polygon::new(ring, vec![])))
            }
        };

        let mut properties = JsonObject::new();
        properties.insert("kind".to_string(), serde_json::json!(self.kind()));
        properties.insert("name".to_string(), serde_json::json!(self.name));
        properties.insert("owner".to_string(), serde_json::json!(self.owner));
        properties.insert("team".to_string(), serde_json::json!(self.team));
        properties.insert("area_m2".to_string(), serde_json::json!(self.area_m2));
        if let ZoneGeometry::Circle { radius_m, .. } = &self.geometry {
            properties.insert("radius_m".to_string(), serde_json::json!(radius_m));
        }

        Feature {
            bbox: None,
            geometry: Some(geometry),
            id: Some(Id::Number(self.id.into())),
            properties: Some(properties),
            foreign_members: None,
        }
    }
}

/// What happened to a zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZoneAction {
    Created,
    Captured,
    Expired,
}

/// Immutable, append-only ownership history row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneHistoryEntry {
    pub zone_id: u64,
    pub action: ZoneAction,
    pub from_owner: Option<u64>,
    pub from_team: Option<Team>,
    /// Both `None` for an expiry (zone went neutral)
    pub to_owner: Option<u64>,
    pub to_team: Option<Team>,
    pub timestamp: DateTime<Utc>,
}

/// Snapshot of a zone's ownership right before it was captured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapturedZone {
    pub zone_id: u64,
    pub name: Option<String>,
    pub previous_owner: Option<u64>,
    pub previous_team: Option<Team>,
}
