//! Wire types for the TravelTime `time-map` endpoint.
//!
//! Only the departure-search form is used: one origin, one transport type and
//! one travel-time budget per request.
//!
//! See: <https://docs.traveltime.com/api/reference/isochrones>

use geo::{Coord, LineString, Polygon};
use serde::{Deserialize, Serialize};

/// Latitude/longitude pair as the service spells it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coords {
    pub lat: f64,
    pub lng: f64,
}

impl From<Coords> for Coord<f64> {
    fn from(coords: Coords) -> Self {
        Self {
            x: coords.lng,
            y: coords.lat,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transportation {
    #[serde(rename = "type")]
    pub kind: String,
}

/// One isochrone search leaving `coords` at `departure_time`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DepartureSearch {
    pub id: String,
    pub coords: Coords,
    pub transportation: Transportation,
    pub departure_time: String,
    /// Budget in seconds.
    pub travel_time: u32,
}

/// Request body for `POST /v4/time-map`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeMapRequest {
    pub departure_searches: Vec<DepartureSearch>,
    pub arrival_searches: Vec<DepartureSearch>,
}

/// Successful response body.
#[derive(Debug, Deserialize)]
pub struct TimeMapResponse {
    pub results: Vec<TimeMapResult>,
}

#[derive(Debug, Deserialize)]
pub struct TimeMapResult {
    pub search_id: String,
    pub shapes: Vec<TimeMapShape>,
}

/// A reachable polygon: an outer shell and optional holes.
#[derive(Debug, Deserialize)]
pub struct TimeMapShape {
    pub shell: Vec<Coords>,
    #[serde(default)]
    pub holes: Vec<Vec<Coords>>,
}

impl TimeMapShape {
    /// Convert to a polygon, dropping holes too small to enclose anything.
    pub fn into_polygon(self) -> Polygon<f64> {
        let ring = |points: Vec<Coords>| -> LineString<f64> {
            points.into_iter().map(Coord::from).collect()
        };
        let holes = self
            .holes
            .into_iter()
            .filter(|hole| hole.len() >= 3)
            .map(ring)
            .collect();
        Polygon::new(ring(self.shell), holes)
    }
}

/// Error body returned alongside 4xx/5xx statuses.
#[derive(Debug, Deserialize)]
pub struct TimeMapError {
    #[serde(default)]
    pub http_status: Option<u16>,
    pub error_code: serde_json::Value,
    #[serde(default)]
    pub description: String,
}

impl TimeMapError {
    /// Error code as text; the service sends it as a number.
    pub fn code(&self) -> String {
        match &self.error_code {
            serde_json::Value::String(code) => code.clone(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::Area;

    #[test]
    fn request_serialises_departure_search() {
        let request = TimeMapRequest {
            departure_searches: vec![DepartureSearch {
                id: "walking".to_owned(),
                coords: Coords {
                    lat: 51.5,
                    lng: -0.1,
                },
                transportation: Transportation {
                    kind: "walking".to_owned(),
                },
                departure_time: "2019-09-30T08:00:00+0000".to_owned(),
                travel_time: 900,
            }],
            arrival_searches: Vec::new(),
        };

        let value = serde_json::to_value(&request).expect("should serialise");

        assert_eq!(value["departure_searches"][0]["transportation"]["type"], "walking");
        assert_eq!(value["departure_searches"][0]["coords"]["lng"], -0.1);
        assert_eq!(value["departure_searches"][0]["travel_time"], 900);
        assert_eq!(value["arrival_searches"], serde_json::json!([]));
    }

    #[test]
    fn deserialise_shapes_with_and_without_holes() {
        let json = r#"{
            "results": [{
                "search_id": "bus",
                "shapes": [
                    {"shell": [{"lat": 0.0, "lng": 0.0}, {"lat": 0.0, "lng": 4.0},
                               {"lat": 4.0, "lng": 4.0}, {"lat": 4.0, "lng": 0.0}],
                     "holes": [[{"lat": 1.0, "lng": 1.0}, {"lat": 1.0, "lng": 2.0},
                                {"lat": 2.0, "lng": 2.0}, {"lat": 2.0, "lng": 1.0}]]},
                    {"shell": [{"lat": 10.0, "lng": 10.0}, {"lat": 10.0, "lng": 11.0},
                               {"lat": 11.0, "lng": 11.0}]}
                ]
            }]
        }"#;

        let response: TimeMapResponse = serde_json::from_str(json).expect("should deserialise");

        let result = response.results.into_iter().next().expect("one result");
        assert_eq!(result.search_id, "bus");
        let areas: Vec<f64> = result
            .shapes
            .into_iter()
            .map(|shape| shape.into_polygon().unsigned_area())
            .collect();
        assert_eq!(areas, vec![15.0, 0.5]);
    }

    #[test]
    fn deserialise_error_body_with_numeric_code() {
        let json = r#"{
            "http_status": 422,
            "error_code": 15,
            "description": "travel_time must be at most 14400"
        }"#;

        let error: TimeMapError = serde_json::from_str(json).expect("should deserialise");

        assert_eq!(error.http_status, Some(422));
        assert_eq!(error.code(), "15");
        assert!(error.description.contains("travel_time"));
    }
}
