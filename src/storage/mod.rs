//! Storage Layer
//!
//! Persists document records using SQLite and resolves the application's
//! data and configuration directories.

pub mod database;

pub use database::{Database, StoredRecord};

use anyhow::Result;
use std::path::PathBuf;

use crate::document::DocumentRecord;
use crate::error::StorageError;

/// Destination for finished document records
pub trait RecordSink {
    /// Persist one record as a complete unit
    fn store(&mut self, record: &DocumentRecord) -> Result<(), StorageError>;
}

/// Get the application data directory
pub fn get_data_dir() -> Result<PathBuf> {
    let proj_dirs = directories::ProjectDirs::from("com", "idcardscanner", "IdCardScanner")
        .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;

    let data_dir = proj_dirs.data_dir().to_path_buf();
    std::fs::create_dir_all(&data_dir)?;

    Ok(data_dir)
}

/// Get the configuration directory
pub fn get_config_dir() -> Result<PathBuf> {
    let proj_dirs = directories::ProjectDirs::from("com", "idcardscanner", "IdCardScanner")
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;

    let config_dir = proj_dirs.config_dir().to_path_buf();
    std::fs::create_dir_all(&config_dir)?;

    Ok(config_dir)
}
