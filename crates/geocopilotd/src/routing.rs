//! Driving routes from OSRM (keyless) and OpenRouteService (API key).
//!
//! Both providers share one contract: a route, or `None` when no drivable
//! path exists. `RoutePlanner` applies the fallback policy chosen at startup.
//! Wire formats use `[lon, lat]`; everything past this module is (lat, lon).

use crate::error::UpstreamError;
use crate::http;
use anyhow::Result;
use async_trait::async_trait;
use geocopilot_common::{Coordinate, RouteProvider, RouteResult, RoutingSettings};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// OSRM codes meaning "no drivable path", not a failure
const OSRM_NO_ROUTE_CODES: [&str; 2] = ["NoRoute", "NoSegment"];

/// ORS error codes for unroutable points
const ORS_NO_ROUTE_CODES: [i64; 2] = [2009, 2010];

/// Resolves a start/end pair to a driving route
#[async_trait]
pub trait RoutingProvider: Send + Sync {
    fn provider(&self) -> RouteProvider;

    async fn route(
        &self,
        start: Coordinate,
        end: Coordinate,
    ) -> Result<Option<RouteResult>, UpstreamError>;
}

fn transpose(coords: &[[f64; 2]]) -> Vec<Coordinate> {
    coords
        .iter()
        .map(|[lon, lat]| Coordinate::from_lon_lat(*lon, *lat))
        .collect()
}

// ============================================================================
// OSRM
// ============================================================================

/// OSRM `route/v1/driving` client
#[derive(Debug, Clone)]
pub struct OsrmRouting {
    base_url: String,
    timeout: Duration,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct OsrmResponse {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    routes: Vec<OsrmRoute>,
}

#[derive(Debug, Deserialize)]
struct OsrmRoute {
    distance: f64,
    duration: f64,
    geometry: LineString,
}

#[derive(Debug, Deserialize)]
struct LineString {
    #[serde(default)]
    coordinates: Vec<[f64; 2]>,
}

impl OsrmRouting {
    const SERVICE: &'static str = "osrm";

    pub fn new(settings: &RoutingSettings, user_agent: &str) -> Result<Self> {
        let timeout = Duration::from_secs(settings.osrm_timeout_secs);
        Ok(Self {
            base_url: http::trim_base(&settings.osrm_url),
            timeout,
            http: http::build_client(user_agent, timeout)?,
        })
    }

    fn url(&self, start: Coordinate, end: Coordinate) -> String {
        format!(
            "{}/route/v1/driving/{},{};{},{}?overview=full&geometries=geojson&steps=false",
            self.base_url, start.lon, start.lat, end.lon, end.lat
        )
    }
}

/// Interpret an OSRM body; `status_ok` is false for 4xx/5xx replies
fn parse_osrm(
    status: u16,
    status_ok: bool,
    bytes: &[u8],
    start: Coordinate,
    end: Coordinate,
) -> Result<Option<RouteResult>, UpstreamError> {
    let parsed = serde_json::from_slice::<OsrmResponse>(bytes);

    if let Ok(body) = &parsed {
        if let Some(code) = body.code.as_deref() {
            if OSRM_NO_ROUTE_CODES.contains(&code) {
                debug!("OSRM reported {}", code);
                return Ok(None);
            }
        }
    }

    if !status_ok {
        return Err(UpstreamError::Status {
            service: OsrmRouting::SERVICE,
            status,
            body: String::from_utf8_lossy(bytes).chars().take(200).collect(),
        });
    }

    let body = parsed.map_err(|e| UpstreamError::decode(OsrmRouting::SERVICE, e.to_string()))?;
    Ok(body.routes.into_iter().next().map(|rt| {
        RouteResult::new(
            rt.distance,
            rt.duration,
            transpose(&rt.geometry.coordinates),
            RouteProvider::Osrm,
            start,
            end,
        )
    }))
}

#[async_trait]
impl RoutingProvider for OsrmRouting {
    fn provider(&self) -> RouteProvider {
        RouteProvider::Osrm
    }

    async fn route(
        &self,
        start: Coordinate,
        end: Coordinate,
    ) -> Result<Option<RouteResult>, UpstreamError> {
        let request = self.http.get(self.url(start, end));
        let response = http::send(Self::SERVICE, self.timeout, request).await?;
        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| UpstreamError::from_reqwest(Self::SERVICE, self.timeout, e))?;
        parse_osrm(status.as_u16(), status.is_success(), &bytes, start, end)
    }
}

// ============================================================================
// OpenRouteService
// ============================================================================

/// OpenRouteService `directions/driving-car` client
#[derive(Debug, Clone)]
pub struct OrsRouting {
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct OrsResponse {
    #[serde(default)]
    features: Vec<OrsFeature>,
}

#[derive(Debug, Deserialize)]
struct OrsFeature {
    geometry: LineString,
    #[serde(default)]
    properties: OrsProperties,
}

#[derive(Debug, Default, Deserialize)]
struct OrsProperties {
    #[serde(default)]
    summary: Option<OrsSummary>,
    #[serde(default)]
    segments: Vec<OrsSummary>,
}

#[derive(Debug, Default, Deserialize)]
struct OrsSummary {
    #[serde(default)]
    distance: Option<f64>,
    #[serde(default)]
    duration: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OrsErrorBody {
    error: OrsError,
}

#[derive(Debug, Deserialize)]
struct OrsError {
    code: i64,
}

impl OrsRouting {
    const SERVICE: &'static str = "ors";

    pub fn new(settings: &RoutingSettings, user_agent: &str) -> Result<Self> {
        let timeout = Duration::from_secs(settings.ors_timeout_secs);
        Ok(Self {
            base_url: http::trim_base(&settings.ors_url),
            api_key: settings.ors_key().map(str::to_string),
            timeout,
            http: http::build_client(user_agent, timeout)?,
        })
    }

    pub fn has_key(&self) -> bool {
        self.api_key.is_some()
    }
}

fn parse_ors(
    status: u16,
    status_ok: bool,
    bytes: &[u8],
    start: Coordinate,
    end: Coordinate,
) -> Result<Option<RouteResult>, UpstreamError> {
    if !status_ok {
        if let Ok(err) = serde_json::from_slice::<OrsErrorBody>(bytes) {
            if ORS_NO_ROUTE_CODES.contains(&err.error.code) {
                debug!("ORS reported no route (code {})", err.error.code);
                return Ok(None);
            }
        }
        return Err(UpstreamError::Status {
            service: OrsRouting::SERVICE,
            status,
            body: String::from_utf8_lossy(bytes).chars().take(200).collect(),
        });
    }

    let body: OrsResponse = serde_json::from_slice(bytes)
        .map_err(|e| UpstreamError::decode(OrsRouting::SERVICE, e.to_string()))?;
    let Some(feature) = body.features.into_iter().next() else {
        return Ok(None);
    };

    let props = feature.properties;
    let totals = props
        .summary
        .filter(|s| s.distance.is_some() || s.duration.is_some())
        .or_else(|| props.segments.into_iter().next())
        .unwrap_or_default();

    Ok(Some(RouteResult::new(
        totals.distance.unwrap_or(0.0),
        totals.duration.unwrap_or(0.0),
        transpose(&feature.geometry.coordinates),
        RouteProvider::Ors,
        start,
        end,
    )))
}

#[async_trait]
impl RoutingProvider for OrsRouting {
    fn provider(&self) -> RouteProvider {
        RouteProvider::Ors
    }

    async fn route(
        &self,
        start: Coordinate,
        end: Coordinate,
    ) -> Result<Option<RouteResult>, UpstreamError> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Ok(None);
        };
        let body = serde_json::json!({
            "coordinates": [[start.lon, start.lat], [end.lon, end.lat]]
        });
        let request = self
            .http
            .post(format!("{}/v2/directions/driving-car/geojson", self.base_url))
            .header("Authorization", api_key)
            .json(&body);
        let response = http::send(Self::SERVICE, self.timeout, request).await?;
        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| UpstreamError::from_reqwest(Self::SERVICE, self.timeout, e))?;
        parse_ors(status.as_u16(), status.is_success(), &bytes, start, end)
    }
}

// ============================================================================
// Fallback policy
// ============================================================================

/// Premium-first routing with keyless fallback
#[derive(Clone)]
pub struct RoutePlanner {
    primary: Option<Arc<dyn RoutingProvider>>,
    fallback: Arc<dyn RoutingProvider>,
}

impl RoutePlanner {
    /// `primary` is tried first when present; a `None` result falls through
    pub fn new(
        primary: Option<Arc<dyn RoutingProvider>>,
        fallback: Arc<dyn RoutingProvider>,
    ) -> Self {
        Self { primary, fallback }
    }

    /// Providers chosen from configuration. ORS without a key is dropped
    /// silently so startup never fails on it.
    pub fn from_settings(settings: &RoutingSettings, user_agent: &str) -> Result<Self> {
        let ors = Arc::new(OrsRouting::new(settings, user_agent)?);
        let osrm = Arc::new(OsrmRouting::new(settings, user_agent)?);
        Ok(Self::select(settings, ors, osrm))
    }

    /// Apply the startup selection policy to a pair of providers
    pub fn select(
        settings: &RoutingSettings,
        premium: Arc<dyn RoutingProvider>,
        keyless: Arc<dyn RoutingProvider>,
    ) -> Self {
        match settings.effective_provider() {
            RouteProvider::Ors => Self::new(Some(premium), keyless),
            RouteProvider::Osrm => {
                if settings.preferred == RouteProvider::Ors {
                    warn!("ORS preferred but no API key configured, routing with OSRM only");
                }
                Self::new(None, keyless)
            }
        }
    }

    /// Provider asked first
    pub fn first_choice(&self) -> RouteProvider {
        self.primary
            .as_ref()
            .map(|p| p.provider())
            .unwrap_or_else(|| self.fallback.provider())
    }

    pub async fn route(
        &self,
        start: Coordinate,
        end: Coordinate,
    ) -> Result<Option<RouteResult>, UpstreamError> {
        if let Some(primary) = &self.primary {
            if let Some(route) = primary.route(start, end).await? {
                info!("Route found by {}", primary.provider());
                return Ok(Some(route));
            }
            info!(
                "{} found no route, falling back to {}",
                primary.provider(),
                self.fallback.provider()
            );
        }

        let route = self.fallback.route(start, end).await?;
        match &route {
            Some(_) => info!("Route found by {}", self.fallback.provider()),
            None => info!("No route between {} and {}", start, end),
        }
        Ok(route)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::FakeRouting;

    const A: Coordinate = Coordinate { lat: 45.0, lon: 7.0 };
    const B: Coordinate = Coordinate { lat: 44.0, lon: 8.0 };

    #[test]
    fn test_parse_osrm_transposes() {
        let body = br#"{"code": "Ok", "routes": [{"distance": 1200.5, "duration": 90.0,
            "geometry": {"type": "LineString", "coordinates": [[7.0, 45.0], [7.5, 44.5], [8.0, 44.0]]}}]}"#;
        let route = parse_osrm(200, true, body, A, B).unwrap().unwrap();
        assert_eq!(route.provider, RouteProvider::Osrm);
        assert_eq!(route.distance_m, 1200.5);
        assert_eq!(route.points[1], Coordinate { lat: 44.5, lon: 7.5 });
    }

    #[test]
    fn test_parse_osrm_no_route() {
        let body = br#"{"code": "NoRoute", "message": "Impossible route between points"}"#;
        assert!(parse_osrm(400, false, body, A, B).unwrap().is_none());

        let body = br#"{"code": "Ok", "routes": []}"#;
        assert!(parse_osrm(200, true, body, A, B).unwrap().is_none());
    }

    #[test]
    fn test_parse_osrm_server_error() {
        let err = parse_osrm(502, false, b"bad gateway", A, B).unwrap_err();
        assert!(matches!(err, UpstreamError::Status { status: 502, .. }));
    }

    #[test]
    fn test_parse_ors() {
        let body = br#"{"type": "FeatureCollection", "features": [{
            "geometry": {"type": "LineString", "coordinates": [[7.0, 45.0], [8.0, 44.0]]},
            "properties": {"summary": {"distance": 150000.0, "duration": 7200.0},
                           "segments": [{"distance": 1.0, "duration": 1.0}]}}]}"#;
        let route = parse_ors(200, true, body, A, B).unwrap().unwrap();
        assert_eq!(route.provider, RouteProvider::Ors);
        assert_eq!(route.distance_m, 150000.0);
        assert_eq!(route.points, vec![A, B]);
    }

    #[test]
    fn test_parse_ors_segment_fallback_and_no_route() {
        let body = br#"{"features": [{"geometry": {"coordinates": []},
            "properties": {"summary": {}, "segments": [{"distance": 10.0, "duration": 2.0}]}}]}"#;
        let route = parse_ors(200, true, body, A, B).unwrap().unwrap();
        assert_eq!(route.distance_m, 10.0);
        assert_eq!(route.points, vec![A, B]);

        let body = br#"{"error": {"code": 2009, "message": "Route could not be found"}}"#;
        assert!(parse_ors(404, false, body, A, B).unwrap().is_none());

        let body = br#"{"error": {"code": 2000, "message": "bad request"}}"#;
        assert!(parse_ors(400, false, body, A, B).is_err());
    }

    #[test]
    fn test_ors_without_key_uses_osrm() {
        let settings = RoutingSettings {
            preferred: RouteProvider::Ors,
            ors_api_key: None,
            ..RoutingSettings::default()
        };
        let planner = RoutePlanner::from_settings(&settings, "test").unwrap();
        assert_eq!(planner.first_choice(), RouteProvider::Osrm);

        let settings = RoutingSettings {
            ors_api_key: Some("key".to_string()),
            ..settings
        };
        let planner = RoutePlanner::from_settings(&settings, "test").unwrap();
        assert_eq!(planner.first_choice(), RouteProvider::Ors);
    }

    #[tokio::test]
    async fn test_keyless_ors_returns_none() {
        let ors = OrsRouting::new(&RoutingSettings::default(), "test").unwrap();
        assert!(!ors.has_key());
        assert!(ors.route(A, B).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_primary_result_wins() {
        let ors = Arc::new(FakeRouting::found(RouteProvider::Ors, vec![A, B]));
        let osrm = Arc::new(FakeRouting::found(RouteProvider::Osrm, vec![A, B]));
        let planner = RoutePlanner::new(Some(ors.clone() as Arc<dyn RoutingProvider>), osrm.clone());
        let route = planner.route(A, B).await.unwrap().unwrap();
        assert_eq!(route.provider, RouteProvider::Ors);
        assert_eq!(osrm.call_count(), 0);
    }

    #[tokio::test]
    async fn test_falls_back_on_none() {
        let ors = Arc::new(FakeRouting::none(RouteProvider::Ors));
        let osrm = Arc::new(FakeRouting::found(RouteProvider::Osrm, vec![A, B]));
        let planner = RoutePlanner::new(Some(ors.clone() as Arc<dyn RoutingProvider>), osrm.clone());
        let route = planner.route(A, B).await.unwrap().unwrap();
        assert_eq!(route.provider, RouteProvider::Osrm);
        assert_eq!(ors.call_count(), 1);
        assert_eq!(osrm.call_count(), 1);
    }

    #[tokio::test]
    async fn test_both_none() {
        let planner = RoutePlanner::new(
            Some(Arc::new(FakeRouting::none(RouteProvider::Ors))),
            Arc::new(FakeRouting::none(RouteProvider::Osrm)),
        );
        assert!(planner.route(A, B).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_primary_error_propagates() {
        let osrm = Arc::new(FakeRouting::found(RouteProvider::Osrm, vec![A, B]));
        let planner = RoutePlanner::new(
            Some(Arc::new(FakeRouting::failing(RouteProvider::Ors))),
            osrm.clone(),
        );
        assert!(planner.route(A, B).await.is_err());
        assert_eq!(osrm.call_count(), 0);
    }
}
