//! Core geographic types shared by the daemon and its clients.
//!
//! Every value here lives for a single request. Nothing is cached or persisted.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Search radius used when a point query does not name one (meters)
pub const DEFAULT_RADIUS_M: u32 = 3000;

/// Degrees added to every edge of a route's bounding box before the corridor search
pub const BBOX_PADDING_DEG: f64 = 0.05;

/// Summary returned when neither routing provider finds a drivable path
pub const NO_ROUTE_MESSAGE: &str = "No drivable route was found between the selected points.";

/// Coordinate validation errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CoordinateError {
    #[error("latitude {0} is outside [-90, 90]")]
    LatitudeOutOfRange(f64),

    #[error("longitude {0} is outside [-180, 180]")]
    LongitudeOutOfRange(f64),
}

/// A WGS84 point, always held as (lat, lon)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    /// Validate and build a coordinate. NaN fails both range checks.
    pub fn new(lat: f64, lon: f64) -> Result<Self, CoordinateError> {
        if !(-90.0..=90.0).contains(&lat) {
            return Err(CoordinateError::LatitudeOutOfRange(lat));
        }
        if !(-180.0..=180.0).contains(&lon) {
            return Err(CoordinateError::LongitudeOutOfRange(lon));
        }
        Ok(Self { lat, lon })
    }

    /// Build from a wire pair in GeoJSON order `[lon, lat]`
    pub fn from_lon_lat(lon: f64, lat: f64) -> Self {
        Self { lat, lon }
    }

    /// Re-check an already-built value (request bodies deserialize straight into this type)
    pub fn validated(self) -> Result<Self, CoordinateError> {
        Self::new(self.lat, self.lon)
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.lat, self.lon)
    }
}

/// Reverse-geocoded description of a coordinate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceInfo {
    pub display_name: Option<String>,
    pub road: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub country_code: Option<String>,
    pub lat: f64,
    pub lon: f64,
}

impl PlaceInfo {
    /// Empty description anchored at the queried coordinate
    pub fn at(coord: Coordinate) -> Self {
        Self {
            display_name: None,
            road: None,
            city: None,
            state: None,
            country: None,
            country_code: None,
            lat: coord.lat,
            lon: coord.lon,
        }
    }

    /// Label used in the via summary: first non-empty of city, state, country
    pub fn region_label(&self) -> Option<&str> {
        [&self.city, &self.state, &self.country]
            .into_iter()
            .filter_map(|v| v.as_deref())
            .map(str::trim)
            .find(|v| !v.is_empty())
    }
}

/// A single point of interest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointOfInterest {
    pub lat: f64,
    pub lon: f64,
    pub name: Option<String>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

/// Which routing backend produced a route
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteProvider {
    Osrm,
    Ors,
}

impl RouteProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteProvider::Osrm => "osrm",
            RouteProvider::Ors => "ors",
        }
    }
}

impl fmt::Display for RouteProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A computed driving route
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteResult {
    pub distance_m: f64,
    pub duration_s: f64,
    pub points: Vec<Coordinate>,
    pub provider: RouteProvider,
}

impl RouteResult {
    /// Build a route, clamping negative totals to zero and guaranteeing at least two points
    pub fn new(
        distance_m: f64,
        duration_s: f64,
        points: Vec<Coordinate>,
        provider: RouteProvider,
        start: Coordinate,
        end: Coordinate,
    ) -> Self {
        let points = if points.len() < 2 {
            vec![start, end]
        } else {
            points
        };
        Self {
            distance_m: distance_m.max(0.0),
            duration_s: duration_s.max(0.0),
            points,
            provider,
        }
    }
}

/// Padded search window around a route
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub min_lon: f64,
    pub max_lat: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    /// Coordinate-wise extrema of the given points, or None for an empty slice
    pub fn around(points: &[Coordinate]) -> Option<Self> {
        let first = points.first()?;
        let init = Self {
            min_lat: first.lat,
            min_lon: first.lon,
            max_lat: first.lat,
            max_lon: first.lon,
        };
        Some(points.iter().fold(init, |b, p| Self {
            min_lat: b.min_lat.min(p.lat),
            min_lon: b.min_lon.min(p.lon),
            max_lat: b.max_lat.max(p.lat),
            max_lon: b.max_lon.max(p.lon),
        }))
    }

    /// Grow every edge outward by `pad` degrees
    pub fn padded(self, pad: f64) -> Self {
        Self {
            min_lat: self.min_lat - pad,
            min_lon: self.min_lon - pad,
            max_lat: self.max_lat + pad,
            max_lon: self.max_lon + pad,
        }
    }
}

/// Facts for a single-location query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointFacts {
    pub location: PlaceInfo,
    pub radius_m: u32,
    pub pois: Vec<PointOfInterest>,
    pub user_prompt: Option<String>,
}

/// Facts for an A to B query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteFacts {
    pub start: PlaceInfo,
    pub end: PlaceInfo,
    pub distance_m: f64,
    pub duration_s: f64,
    pub provider: RouteProvider,
    pub via_summary: Vec<String>,
    pub pois: Vec<PointOfInterest>,
    pub user_prompt: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coordinate_range_checks() {
        assert!(Coordinate::new(45.0, 7.0).is_ok());
        assert!(Coordinate::new(-90.0, 180.0).is_ok());
        assert_eq!(
            Coordinate::new(90.5, 0.0),
            Err(CoordinateError::LatitudeOutOfRange(90.5))
        );
        assert_eq!(
            Coordinate::new(0.0, -181.0),
            Err(CoordinateError::LongitudeOutOfRange(-181.0))
        );
        assert!(Coordinate::new(f64::NAN, 0.0).is_err());
    }

    #[test]
    fn test_region_label_order() {
        let mut place = PlaceInfo::at(Coordinate { lat: 0.0, lon: 0.0 });
        assert_eq!(place.region_label(), None);

        place.country = Some("Italy".to_string());
        assert_eq!(place.region_label(), Some("Italy"));

        place.state = Some("".to_string());
        assert_eq!(place.region_label(), Some("Italy"));

        place.state = Some("Piemonte".to_string());
        place.city = Some("Torino".to_string());
        assert_eq!(place.region_label(), Some("Torino"));
    }

    #[test]
    fn test_bbox_padding() {
        let points = vec![
            Coordinate { lat: 10.0, lon: 20.0 },
            Coordinate { lat: 20.0, lon: 10.0 },
            Coordinate { lat: 15.0, lon: 15.0 },
        ];
        let bbox = BoundingBox::around(&points).unwrap().padded(BBOX_PADDING_DEG);
        assert_eq!(bbox.min_lat, 9.95);
        assert_eq!(bbox.min_lon, 9.95);
        assert_eq!(bbox.max_lat, 20.05);
        assert_eq!(bbox.max_lon, 20.05);
    }

    #[test]
    fn test_bbox_empty() {
        assert!(BoundingBox::around(&[]).is_none());
    }

    #[test]
    fn test_route_result_short_geometry() {
        let a = Coordinate { lat: 1.0, lon: 2.0 };
        let b = Coordinate { lat: 3.0, lon: 4.0 };
        let route = RouteResult::new(-5.0, 10.0, vec![a], RouteProvider::Osrm, a, b);
        assert_eq!(route.points, vec![a, b]);
        assert_eq!(route.distance_m, 0.0);
    }

    #[test]
    fn test_provider_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&RouteProvider::Ors).unwrap(), "\"ors\"");
        assert_eq!(RouteProvider::Osrm.to_string(), "osrm");
    }

    #[test]
    fn test_poi_tags_default_empty() {
        let poi: PointOfInterest =
            serde_json::from_str(r#"{"lat": 1.0, "lon": 2.0, "name": null}"#).unwrap();
        assert!(poi.tags.is_empty());
        assert!(poi.name.is_none());
    }
}
