//! Fact assembly: turns geocoding, POI and routing results into the
//! fact sets handed to the prompt builder.
//!
//! Route queries short-circuit on "no route" before any POI search or via
//! geocoding. Independent lookups run concurrently; outputs keep request
//! order (start before end, via labels in sampled order).

use crate::error::UpstreamError;
use crate::geocoding::Geocoder;
use crate::pois::{PoiFinder, AROUND_LIMIT, BBOX_LIMIT};
use crate::routing::RoutePlanner;
use futures::future::try_join_all;
use geocopilot_common::{
    BoundingBox, Coordinate, PointFacts, RouteFacts, RouteResult, BBOX_PADDING_DEG,
};
use std::sync::Arc;
use tracing::{debug, info};

/// Result of assembling route facts
#[derive(Debug, Clone, PartialEq)]
pub enum RouteOutcome {
    Found(RouteFacts),
    NoRoute,
}

/// Indices sampled from a route of `len` points to summarize the places it
/// passes through. Strictly increasing and within `[0, len - 1]`.
pub fn via_indices(len: usize) -> Vec<usize> {
    if len == 0 {
        return Vec::new();
    }
    let last = len - 1;
    let candidates = [0, (len / 3).max(1), (2 * len / 3).max(2), last];
    let mut indices: Vec<usize> = Vec::with_capacity(candidates.len());
    for idx in candidates.map(|i| i.min(last)) {
        if indices.last().map_or(true, |prev| idx > *prev) {
            indices.push(idx);
        }
    }
    indices
}

/// Padded corridor searched for POIs along a route
pub fn route_search_box(route: &RouteResult) -> Option<BoundingBox> {
    BoundingBox::around(&route.points).map(|b| b.padded(BBOX_PADDING_DEG))
}

/// Collects facts from the upstream services
#[derive(Clone)]
pub struct FactAssembler {
    geocoder: Arc<dyn Geocoder>,
    pois: Arc<dyn PoiFinder>,
    router: RoutePlanner,
}

impl FactAssembler {
    pub fn new(geocoder: Arc<dyn Geocoder>, pois: Arc<dyn PoiFinder>, router: RoutePlanner) -> Self {
        Self {
            geocoder,
            pois,
            router,
        }
    }

    /// Location and nearby POIs for a single point
    pub async fn point_facts(
        &self,
        location: Coordinate,
        radius_m: u32,
        user_prompt: Option<String>,
    ) -> Result<PointFacts, UpstreamError> {
        let (place, pois) = tokio::try_join!(
            self.geocoder.reverse(location),
            self.pois.around(location, radius_m, AROUND_LIMIT),
        )?;
        debug!("Point facts: {} POIs within {} m", pois.len(), radius_m);
        Ok(PointFacts {
            location: place,
            radius_m,
            pois,
            user_prompt,
        })
    }

    /// Endpoints, route totals, via places and corridor POIs for an A to B query
    pub async fn route_facts(
        &self,
        start: Coordinate,
        end: Coordinate,
        user_prompt: Option<String>,
    ) -> Result<RouteOutcome, UpstreamError> {
        let (start_place, end_place) =
            tokio::try_join!(self.geocoder.reverse(start), self.geocoder.reverse(end))?;

        let Some(route) = self.router.route(start, end).await? else {
            return Ok(RouteOutcome::NoRoute);
        };

        let pois = match route_search_box(&route) {
            Some(bbox) => self.pois.in_bbox(bbox, BBOX_LIMIT).await?,
            None => Vec::new(),
        };
        let via_summary = self.via_summary(&route.points).await?;

        info!(
            "Route facts: {:.1} km via {} ({} places, {} POIs)",
            route.distance_m / 1000.0,
            route.provider,
            via_summary.len(),
            pois.len()
        );

        Ok(RouteOutcome::Found(RouteFacts {
            start: start_place,
            end: end_place,
            distance_m: route.distance_m,
            duration_s: route.duration_s,
            provider: route.provider,
            via_summary,
            pois,
            user_prompt,
        }))
    }

    /// Region labels at the sampled points, first occurrence only
    async fn via_summary(&self, points: &[Coordinate]) -> Result<Vec<String>, UpstreamError> {
        let lookups = via_indices(points.len())
            .into_iter()
            .map(|i| self.geocoder.reverse(points[i]));
        let places = try_join_all(lookups).await?;

        let mut labels: Vec<String> = Vec::new();
        for place in &places {
            if let Some(label) = place.region_label() {
                if !labels.iter().any(|l| l == label) {
                    labels.push(label.to_string());
                }
            }
        }
        Ok(labels)
    }
}
