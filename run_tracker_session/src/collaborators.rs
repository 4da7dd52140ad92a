use std::sync::Arc;

use run_tracker_lib::run_summary::RunSummary;

use crate::CoordinateConverter;

pub const DEFAULT_WEIGHT_KG: f32 = 80.0;

/// Durable storage for finished runs.
#[async_trait::async_trait]
pub trait RunStore: Send + Sync {
    async fn save_run(&self, run: RunSummary) -> anyhow::Result<()>;
}

pub trait Settings: Send + Sync {
    fn body_weight_kg(&self) -> f32;
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunnerProfile {
    pub name: String,
    pub weight_kg: f32,
}

impl Default for RunnerProfile {
    fn default() -> Self {
        Self {
            name: String::new(),
            weight_kg: DEFAULT_WEIGHT_KG,
        }
    }
}

impl Settings for RunnerProfile {
    fn body_weight_kg(&self) -> f32 {
        self.weight_kg
    }
}

/// The outside world a tracker talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub converter: Arc<dyn CoordinateConverter>,
    pub store: Arc<dyn RunStore>,
    pub settings: Arc<dyn Settings>,
}
