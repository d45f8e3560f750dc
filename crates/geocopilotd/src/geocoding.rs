//! Reverse geocoding against a Nominatim-compatible service.

use crate::error::UpstreamError;
use crate::http;
use anyhow::Result;
use async_trait::async_trait;
use geocopilot_common::{Coordinate, PlaceInfo, ServiceSettings};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

const SERVICE: &str = "nominatim";

/// Resolves a coordinate to a structured place description
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn reverse(&self, coord: Coordinate) -> Result<PlaceInfo, UpstreamError>;
}

/// Nominatim `/reverse` client
#[derive(Debug, Clone)]
pub struct NominatimGeocoder {
    base_url: String,
    timeout: Duration,
    http: reqwest::Client,
}

#[derive(Debug, Default, Deserialize)]
struct ReverseResponse {
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    lat: Option<Value>,
    #[serde(default)]
    lon: Option<Value>,
    #[serde(default)]
    address: Address,
}

#[derive(Debug, Default, Deserialize)]
struct Address {
    road: Option<String>,
    city: Option<String>,
    town: Option<String>,
    village: Option<String>,
    state: Option<String>,
    country: Option<String>,
    country_code: Option<String>,
}

impl NominatimGeocoder {
    pub fn new(settings: &ServiceSettings) -> Result<Self> {
        let timeout = Duration::from_secs(settings.geocode_timeout_secs);
        Ok(Self {
            base_url: http::trim_base(&settings.nominatim_url),
            timeout,
            http: http::build_client(&settings.user_agent, timeout)?,
        })
    }
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    async fn reverse(&self, coord: Coordinate) -> Result<PlaceInfo, UpstreamError> {
        debug!("Reverse geocoding {}", coord);
        let request = self
            .http
            .get(format!("{}/reverse", self.base_url))
            .query(&[
                ("lat", coord.lat.to_string()),
                ("lon", coord.lon.to_string()),
                ("format", "jsonv2".to_string()),
            ]);
        let response = http::send(SERVICE, self.timeout, request).await?;
        let response = http::ensure_success(SERVICE, response).await?;
        let body: ReverseResponse = http::read_json(SERVICE, self.timeout, response).await?;
        Ok(to_place_info(body, coord))
    }
}

/// Nominatim sends coordinates as strings; accept numbers too
fn coord_value(v: Option<&Value>) -> Option<f64> {
    match v? {
        Value::String(s) => s.trim().parse().ok(),
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}

fn to_place_info(body: ReverseResponse, coord: Coordinate) -> PlaceInfo {
    let lat = coord_value(body.lat.as_ref()).unwrap_or(coord.lat);
    let lon = coord_value(body.lon.as_ref()).unwrap_or(coord.lon);
    let addr = body.address;
    PlaceInfo {
        display_name: body.display_name,
        road: addr.road,
        city: addr.city.or(addr.town).or(addr.village),
        state: addr.state,
        country: addr.country,
        country_code: addr.country_code,
        lat,
        lon,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &str, coord: Coordinate) -> PlaceInfo {
        to_place_info(serde_json::from_str(raw).unwrap(), coord)
    }

    #[test]
    fn test_town_used_when_city_missing() {
        let place = parse(
            r#"{
                "display_name": "Via Roma, Limone Piemonte, Cuneo, Italia",
                "lat": "44.2009", "lon": "7.5761",
                "address": {"road": "Via Roma", "town": "Limone Piemonte", "village": "X",
                            "state": "Piemonte", "country": "Italia", "country_code": "it"}
            }"#,
            Coordinate { lat: 44.2, lon: 7.57 },
        );
        assert_eq!(place.city.as_deref(), Some("Limone Piemonte"));
        assert_eq!(place.road.as_deref(), Some("Via Roma"));
        assert_eq!(place.country_code.as_deref(), Some("it"));
        assert_eq!(place.lat, 44.2009);
        assert_eq!(place.lon, 7.5761);
    }

    #[test]
    fn test_missing_fields_default_to_input() {
        let coord = Coordinate { lat: 0.5, lon: -30.0 };
        let place = parse(r#"{"error": "Unable to geocode"}"#, coord);
        assert_eq!(place, PlaceInfo::at(coord));
    }

    #[test]
    fn test_unparsable_coordinates_fall_back() {
        let coord = Coordinate { lat: 1.0, lon: 2.0 };
        let place = parse(r#"{"lat": "north", "lon": 3.5, "address": {}}"#, coord);
        assert_eq!(place.lat, 1.0);
        assert_eq!(place.lon, 3.5);
    }

    #[test]
    fn test_client_construction() {
        let geocoder = NominatimGeocoder::new(&ServiceSettings {
            nominatim_url: "https://nominatim.example.org/".to_string(),
            ..ServiceSettings::default()
        })
        .unwrap();
        assert_eq!(geocoder.base_url, "https://nominatim.example.org");
        assert_eq!(geocoder.timeout, Duration::from_secs(20));
    }
}
