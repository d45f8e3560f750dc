//! Point-of-interest search against an Overpass API endpoint.

use crate::error::UpstreamError;
use crate::http;
use anyhow::Result;
use async_trait::async_trait;
use geocopilot_common::{BoundingBox, Coordinate, PointOfInterest, ServiceSettings};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

const SERVICE: &str = "overpass";

/// POIs returned for a radius search
pub const AROUND_LIMIT: usize = 30;

/// POIs returned for a corridor search
pub const BBOX_LIMIT: usize = 40;

/// Tag filters shared by both search shapes
const TAG_FILTERS: [&str; 3] = [
    r#"node["tourism"~"attraction|viewpoint|museum"]"#,
    r#"node["amenity"~"fuel|restaurant|cafe"]"#,
    r#"node["natural"~"beach|peak|spring"]"#,
];

/// Resolves a region to a list of points of interest
#[async_trait]
pub trait PoiFinder: Send + Sync {
    async fn around(
        &self,
        center: Coordinate,
        radius_m: u32,
        limit: usize,
    ) -> Result<Vec<PointOfInterest>, UpstreamError>;

    async fn in_bbox(
        &self,
        bbox: BoundingBox,
        limit: usize,
    ) -> Result<Vec<PointOfInterest>, UpstreamError>;
}

/// Overpass QL client
#[derive(Debug, Clone)]
pub struct OverpassPoiFinder {
    url: String,
    timeout: Duration,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct OverpassResponse {
    #[serde(default)]
    elements: Vec<Element>,
}

#[derive(Debug, Deserialize)]
struct Element {
    #[serde(rename = "type")]
    kind: String,
    lat: Option<f64>,
    lon: Option<f64>,
    #[serde(default)]
    tags: BTreeMap<String, String>,
}

/// Overpass QL for nodes within `radius_m` of a point
pub fn around_query(center: Coordinate, radius_m: u32, limit: usize) -> String {
    let area = format!("(around:{},{},{})", radius_m, center.lat, center.lon);
    build_query(&area, limit)
}

/// Overpass QL for nodes inside a bounding box
pub fn bbox_query(bbox: BoundingBox, limit: usize) -> String {
    let area = format!(
        "({},{},{},{})",
        bbox.min_lat, bbox.min_lon, bbox.max_lat, bbox.max_lon
    );
    build_query(&area, limit)
}

fn build_query(area: &str, limit: usize) -> String {
    let selectors: String = TAG_FILTERS
        .iter()
        .map(|filter| format!("  {}{};\n", filter, area))
        .collect();
    format!(
        "[out:json][timeout:25];\n(\n{});\nout center {};",
        selectors, limit
    )
}

/// Keep nodes with coordinates, truncated to `limit`
fn to_pois(body: OverpassResponse, limit: usize) -> Vec<PointOfInterest> {
    body.elements
        .into_iter()
        .filter(|e| e.kind == "node")
        .filter_map(|e| {
            let (lat, lon) = (e.lat?, e.lon?);
            Some(PointOfInterest {
                lat,
                lon,
                name: e.tags.get("name").cloned(),
                tags: e.tags,
            })
        })
        .take(limit)
        .collect()
}

impl OverpassPoiFinder {
    pub fn new(settings: &ServiceSettings) -> Result<Self> {
        let timeout = Duration::from_secs(settings.poi_timeout_secs);
        Ok(Self {
            url: settings.overpass_url.clone(),
            timeout,
            http: http::build_client(&settings.user_agent, timeout)?,
        })
    }

    async fn run(&self, query: String, limit: usize) -> Result<Vec<PointOfInterest>, UpstreamError> {
        let request = self.http.post(&self.url).body(query);
        let response = http::send(SERVICE, self.timeout, request).await?;
        let response = http::ensure_success(SERVICE, response).await?;
        let body: OverpassResponse = http::read_json(SERVICE, self.timeout, response).await?;
        let pois = to_pois(body, limit);
        debug!("Overpass returned {} POIs", pois.len());
        Ok(pois)
    }
}

#[async_trait]
impl PoiFinder for OverpassPoiFinder {
    async fn around(
        &self,
        center: Coordinate,
        radius_m: u32,
        limit: usize,
    ) -> Result<Vec<PointOfInterest>, UpstreamError> {
        self.run(around_query(center, radius_m, limit), limit).await
    }

    async fn in_bbox(
        &self,
        bbox: BoundingBox,
        limit: usize,
    ) -> Result<Vec<PointOfInterest>, UpstreamError> {
        self.run(bbox_query(bbox, limit), limit).await
    }
}
