//! Provider implementation for routing using an OSRM route service.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use binwatch_core::{
    model::{Coordinate, Route},
    ports::{PortError, RoutingPort},
};

/// Public OSRM demo server.
pub const DEFAULT_BASE_URL: &str = "https://router.project-osrm.org/route/v1";

const PROFILE: &str = "driving";
const OK_CODE: &str = "Ok";

/// Response from /route/v1/{profile}/{coordinates}
#[derive(Debug, Deserialize)]
struct RouteResponse {
    code: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    routes: Vec<RouteEntry>,
}

/// Single route alternative.
#[derive(Debug, Deserialize)]
struct RouteEntry {
    /// Meters.
    distance: f64,
    /// Seconds.
    duration: f64,
    geometry: Geometry,
}

/// `GeoJSON` line string; coordinates are `[longitude, latitude]` pairs.
#[derive(Debug, Deserialize)]
struct Geometry {
    coordinates: Vec<[f64; 2]>,
}

/// Routing implementation backed by OSRM.
pub struct OsrmRoutingPort {
    client: Client,
    base_url: String,
}

impl OsrmRoutingPort {
    /// Create a new routing port bound to the given HTTP client and service URL.
    #[must_use]
    pub fn new<S: Into<String>>(client: Client, base_url: S) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    fn route_request(&self, from: Coordinate, to: Coordinate) -> RequestBuilder {
        let base = self.base_url.trim_end_matches('/');
        self.client
            .get(format!(
                "{base}/{PROFILE}/{},{};{},{}",
                from.longitude, from.latitude, to.longitude, to.latitude
            ))
            .query(&[("overview", "full"), ("geometries", "geojson")])
    }
}

#[async_trait]
impl RoutingPort for OsrmRoutingPort {
    async fn route(&self, from: Coordinate, to: Coordinate) -> Result<Route, PortError> {
        tracing::debug!(?from, ?to, "requesting route");
        let response = fetch_json::<RouteResponse>(self.route_request(from, to)).await?;
        into_route(response)
    }
}

/// Build the routing port for the given service URL.
#[must_use]
pub fn port(client: Client, base_url: &str) -> Arc<OsrmRoutingPort> {
    Arc::new(OsrmRoutingPort::new(client, base_url))
}

fn into_route(response: RouteResponse) -> Result<Route, PortError> {
    if response.code != OK_CODE {
        tracing::debug!(
            code = %response.code,
            reason = response.message.as_deref().unwrap_or_default(),
            "routing service returned no route"
        );
        return Err(PortError::NoRoute);
    }

    let best = response.routes.into_iter().next().ok_or(PortError::NoRoute)?;

    Ok(Route {
        path: best
            .geometry
            .coordinates
            .into_iter()
            .map(|[longitude, latitude]| Coordinate {
                latitude,
                longitude,
            })
            .collect(),
        distance_meters: best.distance,
        duration_seconds: best.duration,
    })
}

// Small helper to fetch and decode JSON. OSRM reports failures such as
// `NoRoute` in the body with a 400 status, so the body is decoded either way.
async fn fetch_json<T: DeserializeOwned>(req: RequestBuilder) -> Result<T, PortError> {
    req.send()
        .await
        .map_err(PortError::from)?
        .json()
        .await
        .map_err(PortError::from)
}
