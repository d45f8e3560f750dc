//! Deterministic in-memory collaborators for tests.
//!
//! Each fake counts its calls so tests can assert which upstreams were
//! (or were not) contacted.

use crate::error::UpstreamError;
use crate::geocoding::Geocoder;
use crate::llm_client::TextGenerator;
use crate::pois::PoiFinder;
use crate::routing::RoutingProvider;
use async_trait::async_trait;
use geocopilot_common::{
    BoundingBox, Coordinate, PlaceInfo, PointOfInterest, RouteProvider, RouteResult,
};
use std::sync::Mutex;

/// Geocoder answering from a fixed table; unknown points get an empty `PlaceInfo`
#[derive(Default)]
pub struct FakeGeocoder {
    places: Vec<(Coordinate, PlaceInfo)>,
    fail: bool,
    calls: Mutex<Vec<Coordinate>>,
}

impl FakeGeocoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn with_place(mut self, coord: Coordinate, place: PlaceInfo) -> Self {
        self.places.push((coord, place));
        self
    }

    /// Shorthand for a place known only by its city
    pub fn with_city(self, coord: Coordinate, city: &str) -> Self {
        let place = PlaceInfo {
            city: Some(city.to_string()),
            ..PlaceInfo::at(coord)
        };
        self.with_place(coord, place)
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Coordinates looked up, in call order
    pub fn calls(&self) -> Vec<Coordinate> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Geocoder for FakeGeocoder {
    async fn reverse(&self, coord: Coordinate) -> Result<PlaceInfo, UpstreamError> {
        self.calls.lock().unwrap().push(coord);
        if self.fail {
            return Err(UpstreamError::Status {
                service: "nominatim",
                status: 503,
                body: "unavailable".to_string(),
            });
        }
        Ok(self
            .places
            .iter()
            .find(|(c, _)| *c == coord)
            .map(|(_, p)| p.clone())
            .unwrap_or_else(|| PlaceInfo::at(coord)))
    }
}

/// A recorded POI search
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PoiQuery {
    Around {
        center: Coordinate,
        radius_m: u32,
        limit: usize,
    },
    Bbox {
        bbox: BoundingBox,
        limit: usize,
    },
}

/// POI finder returning the same list for every search
#[derive(Default)]
pub struct FakePoiFinder {
    pois: Vec<PointOfInterest>,
    queries: Mutex<Vec<PoiQuery>>,
}

impl FakePoiFinder {
    pub fn new(pois: Vec<PointOfInterest>) -> Self {
        Self {
            pois,
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.queries.lock().unwrap().len()
    }

    pub fn queries(&self) -> Vec<PoiQuery> {
        self.queries.lock().unwrap().clone()
    }

    fn answer(&self, query: PoiQuery, limit: usize) -> Vec<PointOfInterest> {
        self.queries.lock().unwrap().push(query);
        self.pois.iter().take(limit).cloned().collect()
    }
}

#[async_trait]
impl PoiFinder for FakePoiFinder {
    async fn around(
        &self,
        center: Coordinate,
        radius_m: u32,
        limit: usize,
    ) -> Result<Vec<PointOfInterest>, UpstreamError> {
        let query = PoiQuery::Around {
            center,
            radius_m,
            limit,
        };
        Ok(self.answer(query, limit))
    }

    async fn in_bbox(
        &self,
        bbox: BoundingBox,
        limit: usize,
    ) -> Result<Vec<PointOfInterest>, UpstreamError> {
        Ok(self.answer(PoiQuery::Bbox { bbox, limit }, limit))
    }
}

enum RoutingBehavior {
    Found(Vec<Coordinate>),
    NoRoute,
    Fail,
}

/// Routing provider with a fixed outcome
pub struct FakeRouting {
    provider: RouteProvider,
    behavior: RoutingBehavior,
    calls: Mutex<usize>,
}

impl FakeRouting {
    /// Distance and duration are fixed at 12 km and 15 minutes
    pub fn found(provider: RouteProvider, points: Vec<Coordinate>) -> Self {
        Self::with(provider, RoutingBehavior::Found(points))
    }

    pub fn none(provider: RouteProvider) -> Self {
        Self::with(provider, RoutingBehavior::NoRoute)
    }

    pub fn failing(provider: RouteProvider) -> Self {
        Self::with(provider, RoutingBehavior::Fail)
    }

    fn with(provider: RouteProvider, behavior: RoutingBehavior) -> Self {
        Self {
            provider,
            behavior,
            calls: Mutex::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl RoutingProvider for FakeRouting {
    fn provider(&self) -> RouteProvider {
        self.provider
    }

    async fn route(
        &self,
        start: Coordinate,
        end: Coordinate,
    ) -> Result<Option<RouteResult>, UpstreamError> {
        *self.calls.lock().unwrap() += 1;
        match &self.behavior {
            RoutingBehavior::Found(points) => Ok(Some(RouteResult::new(
                12_000.0,
                900.0,
                points.clone(),
                self.provider,
                start,
                end,
            ))),
            RoutingBehavior::NoRoute => Ok(None),
            RoutingBehavior::Fail => Err(UpstreamError::Timeout {
                service: self.provider.as_str(),
                secs: 30,
            }),
        }
    }
}

/// Text generator with a canned reply; keeps every prompt it receives
pub struct FakeTextGenerator {
    reply: Option<String>,
    prompts: Mutex<Vec<String>>,
}

impl FakeTextGenerator {
    pub fn replying(reply: impl Into<String>) -> Self {
        Self {
            reply: Some(reply.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            reply: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl TextGenerator for FakeTextGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, UpstreamError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.reply.clone().ok_or(UpstreamError::Http {
            service: "ollama",
            message: "connection refused".to_string(),
        })
    }
}
