use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "sqlx")]
use sqlx::{prelude::*, sqlite::SqliteRow};

use crate::geo_path::GeoPath;

/// What a finished run hands to the persistence store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub timestamp: DateTime<Utc>,
    pub avg_speed_kmh: f32,
    pub distance_meters: u32,
    pub duration_millis: i64,
    pub calories_burned: u32,
    pub path: GeoPath,
}

impl RunSummary {
    pub fn compute(path: GeoPath, duration_millis: i64, body_weight_kg: f32, timestamp: DateTime<Utc>) -> Self {
        let distance_meters = path.distance_meters();

        Self {
            timestamp,
            avg_speed_kmh: average_speed_kmh(distance_meters, duration_millis),
            distance_meters,
            duration_millis,
            calories_burned: calories_burned(distance_meters, body_weight_kg),
            path,
        }
    }
}

/// Rounded to one decimal. A run without duration has no speed.
pub fn average_speed_kmh(distance_meters: u32, duration_millis: i64) -> f32 {
    if duration_millis <= 0 {
        return 0.0;
    }

    let km = distance_meters as f64 / 1000.0;
    let hours = duration_millis as f64 / 3_600_000.0;
    ((km / hours * 10.0).round() / 10.0) as f32
}

pub fn calories_burned(distance_meters: u32, body_weight_kg: f32) -> u32 {
    let calories = (distance_meters as f64 / 1000.0) * body_weight_kg as f64;
    if calories.is_finite() && calories > 0.0 {
        calories.floor() as u32
    } else {
        0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRun {
    pub run_id: i64,
    pub summary: RunSummary,
}

#[cfg(feature = "sqlx")]
impl FromRow<'_, SqliteRow> for StoredRun {
    fn from_row(row: &SqliteRow) -> sqlx::Result<Self> {
        let path_bytes: Vec<u8> = row.try_get(6)?;
        let path = if path_bytes.is_empty() {
            GeoPath::new()
        } else {
            GeoPath::try_from(path_bytes.as_slice()).map_err(|err| sqlx::Error::Decode(err.into()))?
        };

        Ok(Self {
            run_id: row.try_get(0)?,
            summary: RunSummary {
                timestamp: row.try_get(1)?,
                avg_speed_kmh: row.try_get(2)?,
                distance_meters: row.try_get(3)?,
                duration_millis: row.try_get(4)?,
                calories_burned: row.try_get(5)?,
                path,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::geo_point::GeoPoint;

    #[test]
    fn speed_is_rounded_to_one_decimal() {
        // 5 km in 25 minutes is 12 km/h
        assert_eq!(average_speed_kmh(5000, 25 * 60_000), 12.0);
        // 1113 m in 10 minutes is 6.678 km/h
        assert_eq!(average_speed_kmh(1113, 10 * 60_000), 6.7);
        assert_eq!(average_speed_kmh(1113, 0), 0.0);
    }

    #[test]
    fn calories_are_floored() {
        assert_eq!(calories_burned(1113, 80.0), 89);
        assert_eq!(calories_burned(999, 1.0), 0);
        assert_eq!(calories_burned(5000, 72.5), 362);
        assert_eq!(calories_burned(5000, f32::NAN), 0);
    }

    #[test]
    fn compute_uses_truncated_path_distance() {
        let path = GeoPath::from(vec![vec![GeoPoint::new(0.0, 0.0), GeoPoint::new(0.0, 0.01)]]);
        let timestamp = Utc.with_ymd_and_hms(2024, 5, 1, 7, 30, 0).unwrap();

        let summary = RunSummary::compute(path.clone(), 10 * 60_000, 80.0, timestamp);

        assert_eq!(summary.distance_meters, path.distance_meters());
        assert_eq!(summary.avg_speed_kmh, average_speed_kmh(summary.distance_meters, 10 * 60_000));
        assert_eq!(summary.calories_burned, calories_burned(summary.distance_meters, 80.0));
        assert_eq!(summary.timestamp, timestamp);
        assert_eq!(summary.path, path);
    }
}
