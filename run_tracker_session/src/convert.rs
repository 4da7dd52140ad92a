use std::{f64::consts::PI, str::FromStr, sync::Arc};

use run_tracker_lib::geo_point::GeoPoint;

use crate::ConversionError;

/// Turns a raw geodetic fix into the coordinate system the map displays.
#[async_trait::async_trait]
pub trait CoordinateConverter: Send + Sync {
    async fn convert(&self, point: GeoPoint) -> Result<GeoPoint, ConversionError>;
}

/// For maps that display WGS-84 directly.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThroughConverter;

#[async_trait::async_trait]
impl CoordinateConverter for PassThroughConverter {
    async fn convert(&self, point: GeoPoint) -> Result<GeoPoint, ConversionError> {
        if !point.is_valid() {
            return Err(ConversionError::InvalidCoordinate(point));
        }
        Ok(point)
    }
}

/// WGS-84 to GCJ-02, the datum mandated for maps of mainland China.
#[derive(Debug, Clone, Copy, Default)]
pub struct Gcj02Converter;

#[async_trait::async_trait]
impl CoordinateConverter for Gcj02Converter {
    async fn convert(&self, point: GeoPoint) -> Result<GeoPoint, ConversionError> {
        if !point.is_valid() {
            return Err(ConversionError::InvalidCoordinate(point));
        }
        Ok(wgs84_to_gcj02(point))
    }
}

// Krasovsky 1940
const SEMI_MAJOR_AXIS: f64 = 6378245.0;
const ECCENTRICITY_SQUARED: f64 = 0.006_693_421_622_965_943;

fn outside_china(point: GeoPoint) -> bool {
    !(72.004..=137.8347).contains(&point.longitude) || !(0.8293..=55.8271).contains(&point.latitude)
}

fn offset_latitude(x: f64, y: f64) -> f64 {
    let mut offset = -100.0 + 2.0 * x + 3.0 * y + 0.2 * y * y + 0.1 * x * y + 0.2 * x.abs().sqrt();
    offset += (20.0 * (6.0 * x * PI).sin() + 20.0 * (2.0 * x * PI).sin()) * 2.0 / 3.0;
    offset += (20.0 * (y * PI).sin() + 40.0 * (y / 3.0 * PI).sin()) * 2.0 / 3.0;
    offset += (160.0 * (y / 12.0 * PI).sin() + 320.0 * (y * PI / 30.0).sin()) * 2.0 / 3.0;
    offset
}

fn offset_longitude(x: f64, y: f64) -> f64 {
    let mut offset = 300.0 + x + 2.0 * y + 0.1 * x * x + 0.1 * x * y + 0.1 * x.abs().sqrt();
    offset += (20.0 * (6.0 * x * PI).sin() + 20.0 * (2.0 * x * PI).sin()) * 2.0 / 3.0;
    offset += (20.0 * (x * PI).sin() + 40.0 * (x / 3.0 * PI).sin()) * 2.0 / 3.0;
    offset += (150.0 * (x / 12.0 * PI).sin() + 300.0 * (x / 30.0 * PI).sin()) * 2.0 / 3.0;
    offset
}

pub fn wgs84_to_gcj02(point: GeoPoint) -> GeoPoint {
    if outside_china(point) {
        return point;
    }

    let x = point.longitude - 105.0;
    let y = point.latitude - 35.0;

    let rad_latitude = point.latitude / 180.0 * PI;
    let magic = 1.0 - ECCENTRICITY_SQUARED * rad_latitude.sin().powi(2);
    let sqrt_magic = magic.sqrt();

    let d_latitude = offset_latitude(x, y) * 180.0
        / ((SEMI_MAJOR_AXIS * (1.0 - ECCENTRICITY_SQUARED)) / (magic * sqrt_magic) * PI);
    let d_longitude = offset_longitude(x, y) * 180.0 / (SEMI_MAJOR_AXIS / sqrt_magic * rad_latitude.cos() * PI);

    GeoPoint::new(point.latitude + d_latitude, point.longitude + d_longitude)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CoordinateSystem {
    #[default]
    Wgs84,
    Gcj02,
}

impl CoordinateSystem {
    pub fn converter(&self) -> Arc<dyn CoordinateConverter> {
        match self {
            CoordinateSystem::Wgs84 => Arc::new(PassThroughConverter),
            CoordinateSystem::Gcj02 => Arc::new(Gcj02Converter),
        }
    }
}

impl FromStr for CoordinateSystem {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "wgs84" => Ok(CoordinateSystem::Wgs84),
            "gcj02" => Ok(CoordinateSystem::Gcj02),
            _ => Err(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use geo::{Distance, Geodesic};

    use super::*;

    #[tokio::test]
    async fn pass_through_keeps_point() {
        let point = GeoPoint::new(55.6761, 12.5683);
        assert_eq!(PassThroughConverter.convert(point).await, Ok(point));
    }

    #[tokio::test]
    async fn invalid_points_are_rejected() {
        let point = GeoPoint::new(91.0, 0.0);
        assert_eq!(PassThroughConverter.convert(point).await, Err(ConversionError::InvalidCoordinate(point)));
        assert!(Gcj02Converter.convert(GeoPoint::new(f64::NAN, 116.0)).await.is_err());
    }

    #[tokio::test]
    async fn gcj02_leaves_points_outside_china() {
        let copenhagen = GeoPoint::new(55.6761, 12.5683);
        assert_eq!(Gcj02Converter.convert(copenhagen).await, Ok(copenhagen));
    }

    #[tokio::test]
    async fn gcj02_shifts_beijing_by_a_few_hundred_meters() {
        let tiananmen = GeoPoint::new(39.9087, 116.3975);
        let shifted = Gcj02Converter.convert(tiananmen).await.unwrap();

        assert_ne!(shifted, tiananmen);
        let shift = Geodesic.distance(geo::Point::from(tiananmen), geo::Point::from(shifted));
        assert!((100.0..1000.0).contains(&shift), "shift was {shift} m");
        // The datum moves points north-east around Beijing.
        assert!(shifted.latitude > tiananmen.latitude);
        assert!(shifted.longitude > tiananmen.longitude);
    }

    #[test]
    fn coordinate_system_names() {
        assert_eq!("wgs84".parse(), Ok(CoordinateSystem::Wgs84));
        assert_eq!("GCJ02".parse(), Ok(CoordinateSystem::Gcj02));
        assert_eq!("bd09".parse::<CoordinateSystem>(), Err(()));
    }
}
