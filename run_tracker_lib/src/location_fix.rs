use serde::{Deserialize, Serialize};

use crate::geo_point::GeoPoint;

/// A raw reading from the location source. Never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationFix {
    pub latitude: f64,
    pub longitude: f64,
    pub error_code: i32,
    pub error_info: String,
}

impl LocationFix {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            error_code: 0,
            error_info: String::new(),
        }
    }

    pub fn error(error_code: i32, error_info: impl Into<String>) -> Self {
        Self {
            latitude: 0.0,
            longitude: 0.0,
            error_code,
            error_info: error_info.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error_code != 0
    }

    pub fn point(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }
}
