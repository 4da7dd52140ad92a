use geo::{Distance, Geodesic};
use serde::{Deserialize, Serialize};

use crate::geo_point::GeoPoint;

/// The points recorded during one lap.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PathSegment {
    points: Vec<GeoPoint>,
}

impl PathSegment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn points(&self) -> &[GeoPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Sum of the geodesic distances between consecutive points, on the WGS-84 ellipsoid.
    pub fn length_meters(&self) -> f64 {
        self.points
            .windows(2)
            .map(|pair| Geodesic.distance(geo::Point::from(pair[0]), geo::Point::from(pair[1])))
            .sum()
    }
}

impl From<Vec<GeoPoint>> for PathSegment {
    fn from(points: Vec<GeoPoint>) -> Self {
        Self { points }
    }
}

/// Ordered segments of a session. Points only ever go into the last segment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeoPath {
    segments: Vec<PathSegment>,
}

impl GeoPath {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open_segment(&mut self) {
        self.segments.push(PathSegment::new());
    }

    /// Appends to the last segment. Returns false if no segment has been opened.
    pub fn push_point(&mut self, point: GeoPoint) -> bool {
        match self.segments.last_mut() {
            Some(segment) => {
                segment.points.push(point);
                true
            }
            None => false,
        }
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    pub fn point_count(&self) -> usize {
        self.segments.iter().map(PathSegment::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn length_meters(&self) -> f64 {
        self.segments.iter().map(PathSegment::length_meters).sum()
    }

    /// Whole meters. Each segment is truncated before summing, so gaps between laps never count.
    pub fn distance_meters(&self) -> u32 {
        self.segments
            .iter()
            .map(|segment| segment.length_meters() as u32)
            .sum()
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, &'static str> {
        bincode::serialize(self).map_err(|_| "Failed to serialize GeoPath")
    }
}

impl From<Vec<Vec<GeoPoint>>> for GeoPath {
    fn from(segments: Vec<Vec<GeoPoint>>) -> Self {
        Self {
            segments: segments.into_iter().map(PathSegment::from).collect(),
        }
    }
}

impl TryFrom<&[u8]> for GeoPath {
    type Error = &'static str;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        bincode::deserialize(value).map_err(|_| "Failed to deserialize GeoPath")
    }
}
