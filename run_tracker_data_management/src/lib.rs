use std::path::PathBuf;

pub mod database;
mod data_manager;

pub use data_manager::*;

pub const DATA_DIR: &str = "data/";
pub const DATABASE_FILE: &str = "database.db";

#[derive(Debug, thiserror::Error)]
pub enum DataManagerError {
    #[error("database error: {0}")]
    Database(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Encoding(&'static str),
}

/// `data/` under the project root, or under the working directory when there is no project root.
pub fn default_data_dir() -> PathBuf {
    match project_root::get_project_root() {
        Ok(root) => root.join(DATA_DIR),
        Err(_) => PathBuf::from(DATA_DIR),
    }
}
