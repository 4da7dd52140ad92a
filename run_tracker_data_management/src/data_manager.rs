use std::path::Path;

use run_tracker_lib::run_summary::{RunSummary, StoredRun};
use run_tracker_session::RunStore;

use crate::{database::db::RunDatabase, DataManagerError, DATABASE_FILE};

#[derive(Clone)]
pub struct DataManager {
    pub(crate) database: RunDatabase,
}

/// The public interface for stored runs.
impl DataManager {
    pub async fn start(data_dir: impl AsRef<Path>) -> Result<Self, DataManagerError> {
        let data_dir = data_dir.as_ref();
        if !data_dir.exists() {
            tokio::fs::create_dir_all(data_dir).await?;
        }

        let database = RunDatabase::connect(data_dir.join(DATABASE_FILE)).await?;

        Ok(DataManager { database })
    }

    pub async fn insert_run(&self, summary: RunSummary) -> Result<StoredRun, DataManagerError> {
        self.database.insert_run(summary).await
    }

    pub async fn get_run(&self, run_id: i64) -> Result<Option<StoredRun>, DataManagerError> {
        self.database.get_run(run_id).await
    }

    pub async fn get_runs(&self) -> Result<Vec<StoredRun>, DataManagerError> {
        self.database.get_runs().await
    }

    pub async fn delete_run(&self, run_id: i64) -> Result<bool, DataManagerError> {
        self.database.delete_run(run_id).await
    }
}

#[async_trait::async_trait]
impl RunStore for DataManager {
    async fn save_run(&self, run: RunSummary) -> anyhow::Result<()> {
        let stored = self.insert_run(run).await?;
        tracing::info!("Stored run {}", stored.run_id);
        Ok(())
    }
}
