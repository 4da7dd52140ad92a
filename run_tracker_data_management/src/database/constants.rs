pub const RUNS_TABLE_NAME: &str = "Runs";
pub const RUN_ID: &str = "run_id";
pub const TIMESTAMP: &str = "timestamp";
pub const AVG_SPEED: &str = "avg_speed_kmh";
pub const DISTANCE: &str = "distance_meters";
pub const DURATION: &str = "duration_millis";
pub const CALORIES: &str = "calories_burned";
pub const PATH: &str = "path";
