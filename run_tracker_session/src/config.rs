use std::{path::Path, str::FromStr, time::Duration};

use crate::{
    CoordinateSystem, ConfigError, RunnerProfile, TimerPrecision, DEFAULT_BUS_CAPACITY, DEFAULT_CONVERSION_TIMEOUT,
    DEFAULT_TICK_INTERVAL, MAX_TICK_INTERVAL,
};

#[derive(Debug, Clone, PartialEq)]
pub struct TrackerConfig {
    pub tick_interval: Duration,
    pub conversion_timeout: Duration,
    pub command_queue: usize,
    pub fix_queue: usize,
    pub bus_capacity: usize,
    pub timer_precision: TimerPrecision,
    pub coordinate_system: CoordinateSystem,
    pub profile: RunnerProfile,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            tick_interval: DEFAULT_TICK_INTERVAL,
            conversion_timeout: DEFAULT_CONVERSION_TIMEOUT,
            command_queue: 32,
            fix_queue: 256,
            bus_capacity: DEFAULT_BUS_CAPACITY,
            timer_precision: TimerPrecision::default(),
            coordinate_system: CoordinateSystem::default(),
            profile: RunnerProfile::default(),
        }
    }
}

impl TrackerConfig {
    /// Parses `key = value` lines. Blank lines and `#` comments are skipped,
    /// keys that are not recognised are logged and ignored.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        for (index, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                return Err(ConfigError::Malformed {
                    line: index + 1,
                    text: line.to_string(),
                });
            };
            let value = value.trim();

            match key.trim() {
                "tick_interval_ms" => {
                    let millis = parse_number::<u64>("tick_interval_ms", value)?;
                    let interval = Duration::from_millis(millis);
                    if interval.is_zero() || interval > MAX_TICK_INTERVAL {
                        return Err(invalid("tick_interval_ms", value, "must be between 1 and 1000"));
                    }
                    config.tick_interval = interval;
                }
                "conversion_timeout_ms" => {
                    let millis = parse_positive::<u64>("conversion_timeout_ms", value)?;
                    config.conversion_timeout = Duration::from_millis(millis);
                }
                "command_queue" => config.command_queue = parse_positive("command_queue", value)?,
                "fix_queue" => config.fix_queue = parse_positive("fix_queue", value)?,
                "bus_capacity" => config.bus_capacity = parse_positive("bus_capacity", value)?,
                "timer_precision" => {
                    config.timer_precision = value
                        .parse()
                        .map_err(|_| invalid("timer_precision", value, "expected seconds or centis"))?;
                }
                "coordinate_system" => {
                    config.coordinate_system = value
                        .parse()
                        .map_err(|_| invalid("coordinate_system", value, "expected wgs84 or gcj02"))?;
                }
                "name" => config.profile.name = value.to_string(),
                "weight_kg" => {
                    let weight = parse_number::<f32>("weight_kg", value)?;
                    if !weight.is_finite() || weight <= 0.0 {
                        return Err(invalid("weight_kg", value, "must be a positive number"));
                    }
                    config.profile.weight_kg = weight;
                }
                unknown => tracing::warn!("Unknown config key: {}", unknown),
            }
        }

        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&text)
    }
}

fn invalid(key: &'static str, value: &str, reason: &'static str) -> ConfigError {
    ConfigError::InvalidValue {
        key,
        value: value.to_string(),
        reason,
    }
}

fn parse_number<T: FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| invalid(key, value, "not a number"))
}

fn parse_positive<T: FromStr + PartialOrd + Default>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    let number = parse_number::<T>(key, value)?;
    if number <= T::default() {
        return Err(invalid(key, value, "must be greater than zero"));
    }
    Ok(number)
}
