use std::path::Path;

use const_format::concatcp;
use run_tracker_lib::run_summary::{RunSummary, StoredRun};
use sqlx::{query, query_as, sqlite::SqliteConnectOptions, Executor, Pool, Sqlite, SqlitePool};

use crate::DataManagerError;

use super::constants::*;

const RUN_COLUMNS: &str = concatcp!(RUN_ID, ", ", TIMESTAMP, ", ", AVG_SPEED, ", ", DISTANCE, ", ", DURATION, ", ", CALORIES, ", ", PATH);

#[derive(Clone)]
pub struct RunDatabase {
    pool: Pool<Sqlite>,
}

impl RunDatabase {
    pub async fn connect(path: impl AsRef<Path>) -> Result<Self, DataManagerError> {
        let options = SqliteConnectOptions::new()
            .filename(path.as_ref())
            .create_if_missing(true);

        let pool = SqlitePool::connect_with(options)
            .await
            .map_err(|err| DataManagerError::Database(format!("Failed to connect to database: {}", err)))?;

        let db = Self { pool };
        db.init().await?;

        tracing::info!("Opened run database at {}", path.as_ref().display());
        Ok(db)
    }

    pub async fn init(&self) -> Result<(), DataManagerError> {
        self.pool.execute(concatcp!("
            CREATE TABLE IF NOT EXISTS ", RUNS_TABLE_NAME, "(",
                RUN_ID,    " INTEGER PRIMARY KEY AUTOINCREMENT,",
                TIMESTAMP, " TIMESTAMP NOT NULL,",
                AVG_SPEED, " REAL NOT NULL,",
                DISTANCE,  " INTEGER NOT NULL,",
                DURATION,  " INTEGER NOT NULL,",
                CALORIES,  " INTEGER NOT NULL,",
                PATH,      " BLOB NOT NULL
            )")).await
            .map_err(|err| DataManagerError::Database(format!("Failed to create tables: {}", err)))
            .map(|_| ())
    }

    pub async fn insert_run(&self, summary: RunSummary) -> Result<StoredRun, DataManagerError> {
        let path = summary.path.to_bytes().map_err(DataManagerError::Encoding)?;

        let run_id = query_as::<_, (i64,)>(concatcp!("
            INSERT INTO ", RUNS_TABLE_NAME, "(", RUN_COLUMNS, ")
            VALUES (NULL, ?1, ?2, ?3, ?4, ?5, ?6) RETURNING ", RUN_ID))
                .bind(summary.timestamp)
                .bind(summary.avg_speed_kmh)
                .bind(summary.distance_meters)
                .bind(summary.duration_millis)
                .bind(summary.calories_burned)
                .bind(path)
                .fetch_one(&self.pool).await
                .map_err(|err| DataManagerError::Database(format!("Failed to insert run: {}", err)))
                .map(|row| row.0)?;

        Ok(StoredRun { run_id, summary })
    }

    pub async fn get_run(&self, run_id: i64) -> Result<Option<StoredRun>, DataManagerError> {
        query_as::<_, StoredRun>(concatcp!("SELECT ", RUN_COLUMNS, " FROM ", RUNS_TABLE_NAME, " WHERE ", RUN_ID, " = ?1"))
            .bind(run_id)
            .fetch_optional(&self.pool).await
            .map_err(|err| DataManagerError::Database(format!("Failed to get run: {}", err)))
    }

    /// Newest first.
    pub async fn get_runs(&self) -> Result<Vec<StoredRun>, DataManagerError> {
        query_as::<_, StoredRun>(concatcp!("SELECT ", RUN_COLUMNS, " FROM ", RUNS_TABLE_NAME, " ORDER BY ", TIMESTAMP, " DESC, ", RUN_ID, " DESC"))
            .fetch_all(&self.pool).await
            .map_err(|err| DataManagerError::Database(format!("Failed to get runs: {}", err)))
    }

    /// Returns whether a run was removed.
    pub async fn delete_run(&self, run_id: i64) -> Result<bool, DataManagerError> {
        query(concatcp!("DELETE FROM ", RUNS_TABLE_NAME, " WHERE ", RUN_ID, " = ?1"))
            .bind(run_id)
            .execute(&self.pool).await
            .map_err(|err| DataManagerError::Database(format!("Failed to delete run: {}", err)))
            .map(|result| result.rows_affected() > 0)
    }
}
