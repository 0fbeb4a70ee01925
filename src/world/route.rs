//! Routes for the simulated outdoor ride
//!
//! A route is a closed loop of geographic points. Riding past the end starts
//! the next lap, so every distance lookup wraps modulo the loop length.

use crate::world::physics::SpeedModel;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Mean Earth radius in meters
pub const EARTH_RADIUS: f64 = 6_371_000.0;

/// The loop bundled with the crate
const EXAMPLE_ROUTE: &str = include_str!("../../assets/routes/washington_loop.geojson");

/// A point along a route
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoutePoint {
    /// Latitude in degrees
    pub lat: f64,
    /// Longitude in degrees
    pub lon: f64,
    /// Elevation in meters
    pub elevation: f64,
}

impl RoutePoint {
    pub fn new(lat: f64, lon: f64, elevation: f64) -> Self {
        Self {
            lat,
            lon,
            elevation,
        }
    }

    fn same_position(&self, other: &RoutePoint) -> bool {
        self.lat == other.lat && self.lon == other.lon
    }
}

/// Great-circle distance in meters between two points
pub fn haversine(a: &RoutePoint, b: &RoutePoint) -> f64 {
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lon = (b.lon - a.lon).to_radians();

    let h = (d_lat / 2.0).sin().powi(2)
        + a.lat.to_radians().cos() * b.lat.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).max(0.0).sqrt());

    EARTH_RADIUS * c
}

/// Whether the road gradient feeds into the speed model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlopeMode {
    /// Use the gradient of the current segment
    #[default]
    Terrain,
    /// Ride every segment as if it were flat
    Flat,
}

/// Position on the loop resolved from a travelled distance
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordInfo {
    /// Interpolated position
    pub point: RoutePoint,
    /// Index of the segment's first point
    pub start_index: usize,
    /// Index of the segment's last point
    pub end_index: usize,
    /// Progress through the segment, 0.0 at `start_index`
    pub fraction: f64,
}

/// Errors loading or building a route
#[derive(Debug, Error)]
pub enum RouteError {
    /// A loop needs at least two points
    #[error("Route needs at least 2 points, got {0}")]
    TooFewPoints(usize),

    /// JSON could not be parsed
    #[error("Invalid GeoJSON: {0}")]
    InvalidGeoJson(String),

    /// No LineString geometry in the document
    #[error("GeoJSON has no LineString feature")]
    NoLineString,

    /// Coordinate without a longitude and latitude
    #[error("Invalid coordinate at index {0}")]
    InvalidCoordinate(usize),

    /// IO error reading file
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

#[derive(Deserialize)]
struct FeatureCollection {
    features: Vec<Feature>,
}

#[derive(Deserialize)]
struct Feature {
    #[serde(default)]
    properties: Option<FeatureProperties>,
    geometry: Option<Geometry>,
}

#[derive(Deserialize)]
struct FeatureProperties {
    name: Option<String>,
}

#[derive(Deserialize)]
struct Geometry {
    #[serde(rename = "type")]
    kind: String,
    /// Shape depends on `kind`, only LineStrings are decoded further
    #[serde(default)]
    coordinates: serde_json::Value,
}

/// A closed loop of route points
#[derive(Debug, Clone, Serialize)]
pub struct Route {
    name: String,
    points: Vec<RoutePoint>,
    /// Distance from the first point to each point
    cumulative: Vec<f64>,
}

impl Route {
    /// Build a route, appending the first point when the loop is not closed.
    pub fn new(name: impl Into<String>, mut points: Vec<RoutePoint>) -> Result<Self, RouteError> {
        if points.len() < 2 {
            return Err(RouteError::TooFewPoints(points.len()));
        }

        let first = points[0];
        if let Some(last) = points.last() {
            if !last.same_position(&first) {
                points.push(first);
            }
        }

        let mut cumulative = Vec::with_capacity(points.len());
        let mut total = 0.0;
        cumulative.push(total);
        for pair in points.windows(2) {
            total += haversine(&pair[0], &pair[1]);
            cumulative.push(total);
        }

        let route = Self {
            name: name.into(),
            points,
            cumulative,
        };
        tracing::debug!(
            "Route '{}': {} points, {:.0} m",
            route.name,
            route.points.len(),
            route.total_distance()
        );
        Ok(route)
    }

    /// Parse the first LineString of a GeoJSON FeatureCollection.
    /// Coordinates are `[lon, lat]` or `[lon, lat, elevation]`.
    pub fn from_geojson(text: &str) -> Result<Self, RouteError> {
        let collection: FeatureCollection =
            serde_json::from_str(text).map_err(|e| RouteError::InvalidGeoJson(e.to_string()))?;

        let feature = collection
            .features
            .into_iter()
            .find(|f| matches!(&f.geometry, Some(g) if g.kind == "LineString"))
            .ok_or(RouteError::NoLineString)?;

        let name = feature
            .properties
            .and_then(|p| p.name)
            .unwrap_or_else(|| "Unnamed route".to_string());

        let coordinates: Vec<Vec<f64>> = feature
            .geometry
            .map(|g| serde_json::from_value(g.coordinates))
            .transpose()
            .map_err(|e| RouteError::InvalidGeoJson(e.to_string()))?
            .unwrap_or_default();

        let points = coordinates
            .iter()
            .enumerate()
            .map(|(i, c)| match c.as_slice() {
                [lon, lat] => Ok(RoutePoint::new(*lat, *lon, 0.0)),
                [lon, lat, elevation, ..] => Ok(RoutePoint::new(*lat, *lon, *elevation)),
                _ => Err(RouteError::InvalidCoordinate(i)),
            })
            .collect::<Result<Vec<_>, _>>()?;

        Self::new(name, points)
    }

    /// Load a GeoJSON route from disk.
    pub fn from_geojson_file(path: &Path) -> Result<Self, RouteError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_geojson(&text)
    }

    /// The bundled Washington loop.
    pub fn example() -> Result<Self, RouteError> {
        Self::from_geojson(EXAMPLE_ROUTE)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Points of the closed loop, first and last equal
    pub fn points(&self) -> &[RoutePoint] {
        &self.points
    }

    /// Distance along the route from point `i` to point `j` in meters.
    /// Zero when `j <= i`; indices past the end are clamped.
    pub fn distance(&self, i: usize, j: usize) -> f64 {
        let last = self.points.len() - 1;
        let (i, j) = (i.min(last), j.min(last));
        if j <= i {
            return 0.0;
        }
        self.cumulative[j] - self.cumulative[i]
    }

    /// Length of one lap in meters
    pub fn total_distance(&self) -> f64 {
        self.cumulative.last().copied().unwrap_or(0.0)
    }

    /// Resolve the position `travelled` meters into the ride.
    pub fn coord_info(&self, travelled: f64) -> CoordInfo {
        let total = self.total_distance();
        let last_segment = self.points.len() - 2;

        let along = if total > 0.0 && travelled.is_finite() {
            travelled.rem_euclid(total)
        } else {
            0.0
        };

        let start_index = self
            .cumulative
            .partition_point(|d| *d <= along)
            .saturating_sub(1)
            .min(last_segment);
        let end_index = start_index + 1;

        let start = self.points[start_index];
        let end = self.points[end_index];
        let length = self.cumulative[end_index] - self.cumulative[start_index];

        if length <= 0.0 {
            return CoordInfo {
                point: start,
                start_index,
                end_index,
                fraction: 0.0,
            };
        }

        let fraction = ((along - self.cumulative[start_index]) / length).clamp(0.0, 1.0);
        let lerp = |a: f64, b: f64| a + (b - a) * fraction;

        CoordInfo {
            point: RoutePoint::new(
                lerp(start.lat, end.lat),
                lerp(start.lon, end.lon),
                lerp(start.elevation, end.elevation),
            ),
            start_index,
            end_index,
            fraction,
        }
    }

    /// Mean grade angle in radians over the sub-segments from `i` to `j`.
    /// Positive uphill. Zero-length sub-segments count as flat.
    pub fn slope(&self, i: usize, j: usize) -> f64 {
        let last = self.points.len() - 1;
        let (i, j) = (i.min(last), j.min(last));
        if j <= i {
            return 0.0;
        }

        let sum: f64 = (i..j)
            .map(|k| {
                let run = self.cumulative[k + 1] - self.cumulative[k];
                if run <= 0.0 {
                    0.0
                } else {
                    ((self.points[k + 1].elevation - self.points[k].elevation) / run).atan()
                }
            })
            .sum();

        sum / (j - i) as f64
    }

    /// Speed in km/h at `travelled` meters for the given power.
    pub fn speed(
        &self,
        travelled: f64,
        power_watts: f64,
        model: &SpeedModel,
        slope_mode: SlopeMode,
    ) -> f64 {
        let slope = match slope_mode {
            SlopeMode::Terrain => {
                let info = self.coord_info(travelled);
                self.slope(info.start_index, info.end_index)
            }
            SlopeMode::Flat => 0.0,
        };
        model.calculate_speed(power_watts, slope)
    }
}
