pub mod geo_point;
pub mod geo_path;
pub mod location_fix;
pub mod run_summary;
pub mod stopwatch;
