// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Geometry kernel over GPS coordinates.
//!
//! Everything here is total: degenerate input yields a defined fallback
//! (zero area, `false` containment) instead of an error. The planar
//! projection assumes city-scale extents and does not handle the antimeridian.

use geo::{BoundingRect, LineString, Rect};

/// Mean Earth radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Anything that carries a WGS84 latitude/longitude.
pub trait LatLng {
    fn lat(&self) -> f64;
    fn lng(&self) -> f64;
}

impl LatLng for (f64, f64) {
    fn lat(&self) -> f64 {
        self.0
    }
    fn lng(&self) -> f64 {
        self.1
    }
}

/// Great-circle distance in meters (haversine).
pub fn distance<A: LatLng, B: LatLng>(a: &A, b: &B) -> f64 {
    let phi1 = a.lat().to_radians();
    let phi2 = b.lat().to_radians();
    let dphi = (b.lat() - a.lat()).to_radians();
    let dlambda = (b.lng() - a.lng()).to_radians();

    let h = (dphi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (dlambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().min(1.0).asin()
}

/// Sum of consecutive segment distances.
pub fn path_length<P: LatLng>(points: &[P]) -> f64 {
    points.windows(2).map(|w| distance(&w[0], &w[1])).sum()
}

/// Distance between the first and last point (0 for an empty path).
pub fn closure_gap<P: LatLng>(points: &[P]) -> f64 {
    match (points.first(), points.last()) {
        (Some(first), Some(last)) => distance(first, last),
        _ => 0.0,
    }
}

/// True iff there are at least `min_points` points and the endpoints are
/// within `threshold_m` of each other.
pub fn loop_closed<P: LatLng>(points: &[P], threshold_m: f64, min_points: usize) -> bool {
    points.len() >= min_points && closure_gap(points) <= threshold_m
}

/// Polygon area in square meters.
///
/// Vertices are projected to local planar meters relative to the first
/// vertex, then the shoelace formula is applied.
pub fn polygon_area<P: LatLng>(points: &[P]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }

    let origin = (points[0].lat(), points[0].lng());
    let projected: Vec<(f64, f64)> = points
        .iter()
        .map(|p| {
            let x = distance(&origin, &(origin.0, p.lng())).copysign(p.lng() - origin.1);
            let y = distance(&origin, &(p.lat(), origin.1)).copysign(p.lat() - origin.0);
            (x, y)
        })
        .collect();

    let n = projected.len();
    let twice_area: f64 = (0..n)
        .map(|i| {
            let (x1, y1) = projected[i];
            let (x2, y2) = projected[(i + 1) % n];
            x1 * y2 - x2 * y1
        })
        .sum();

    (twice_area / 2.0).abs()
}

/// Unweighted mean of latitudes and longitudes.
pub fn centroid<P: LatLng>(points: &[P]) -> (f64, f64) {
    if points.is_empty() {
        return (0.0, 0.0);
    }
    let n = points.len() as f64;
    let lat = points.iter().map(LatLng::lat).sum::<f64>() / n;
    let lng = points.iter().map(LatLng::lng).sum::<f64>() / n;
    (lat, lng)
}

/// Even-odd ray casting test.
///
/// The result for a point lying exactly on an edge is unspecified.
pub fn point_in_polygon<P: LatLng>(lat: f64, lng: f64, polygon: &[P]) -> bool {
    if polygon.len() < 3 {
        return false;
    }

    let mut inside = false;
    let mut j = polygon.len() - 1;
    for i in 0..polygon.len() {
        let (yi, xi) = (polygon[i].lat(), polygon[i].lng());
        let (yj, xj) = (polygon[j].lat(), polygon[j].lng());

        if (yi > lat) != (yj > lat) && lng < (xj - xi) * (lat - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// A closed trek outline prepared for repeated containment tests.
///
/// The bounding box rejects far-away centers before ray casting.
#[derive(Debug, Clone)]
pub struct TrekPolygon {
    vertices: Vec<(f64, f64)>,
    bounds: Option<Rect<f64>>,
}

impl TrekPolygon {
    pub fn new<P: LatLng>(points: &[P]) -> Self {
        let vertices: Vec<(f64, f64)> = points.iter().map(|p| (p.lat(), p.lng())).collect();
        let line: LineString<f64> = vertices.iter().map(|&(lat, lng)| (lng, lat)).collect();
        Self {
            bounds: line.bounding_rect(),
            vertices,
        }
    }

    pub fn contains(&self, lat: f64, lng: f64) -> bool {
        let Some(bounds) = self.bounds else {
            return false;
        };
        let (min, max) = (bounds.min(), bounds.max());
        if lng < min.x || lng > max.x || lat < min.y || lat > max.y {
            return false;
        }
        point_in_polygon(lat, lng, &self.vertices)
    }

    pub fn area_m2(&self) -> f64 {
        polygon_area(&self.vertices)
    }
}
