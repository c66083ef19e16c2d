//! SQLite database for persistent storage
//!
//! Table and column names are fixed for compatibility with existing data.
//! All values are bound as statement parameters; absent attributes are
//! stored as NULL.

use anyhow::{Context, Result};
use rusqlite::{params, Connection, Row};
use serde::Serialize;
use std::path::Path;
use tracing::{debug, info};

use super::RecordSink;
use crate::document::{DocumentRecord, DriverLicense, GenericId, ImageRef};
use crate::error::StorageError;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS drivecard (
    id       INTEGER PRIMARY KEY AUTOINCREMENT,
    dtype    TEXT,
    dltype   TEXT,
    dnumber  TEXT,
    name     TEXT,
    pnumber  TEXT,
    address  TEXT,
    ddate    TEXT,
    dissuer  TEXT,
    dimage   TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS idcard (
    id       INTEGER PRIMARY KEY AUTOINCREMENT,
    idtype   TEXT,
    name     TEXT,
    pnumber  TEXT,
    address  TEXT,
    pdate    TEXT,
    issuer   TEXT,
    pimage   TEXT NOT NULL
);
";

/// A record read back from storage
#[derive(Debug, Clone, Serialize)]
pub struct StoredRecord {
    /// Row id within the record's table
    pub id: i64,
    #[serde(flatten)]
    pub record: DocumentRecord,
}

/// Database connection wrapper
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open or create database at path
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database {:?}", path))?;
        info!("Opened record database at {:?}", path);

        let db = Self { conn };
        db.init_schema()?;
        Ok(db)
    }

    /// Open a throwaway in-memory database
    pub fn open_in_memory() -> Result<Self> {
        let db = Self {
            conn: Connection::open_in_memory()?,
        };
        db.init_schema()?;
        Ok(db)
    }

    /// Initialize database schema
    pub fn init_schema(&self) -> Result<()> {
        self.conn
            .execute_batch(SCHEMA)
            .context("Failed to create tables")?;
        Ok(())
    }

    /// Insert one record into the table matching its type, returning the row id
    pub fn insert(&self, record: &DocumentRecord) -> Result<i64, StorageError> {
        match record {
            DocumentRecord::DriverLicense(r) => {
                self.conn.execute(
                    "INSERT INTO drivecard (dtype, dltype, dnumber, name, pnumber, address, ddate, dissuer, dimage) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                    params![
                        r.doc_type,
                        r.license_type,
                        r.number,
                        r.name,
                        r.phone,
                        r.address,
                        r.issue_date,
                        r.issuer,
                        r.image_ref.as_str(),
                    ],
                )?;
            }
            DocumentRecord::GenericId(r) => {
                self.conn.execute(
                    "INSERT INTO idcard (idtype, name, pnumber, address, pdate, issuer, pimage) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![
                        r.doc_type,
                        r.name,
                        r.phone,
                        r.address,
                        r.issue_date,
                        r.issuer,
                        r.image_ref.as_str(),
                    ],
                )?;
            }
        }

        let id = self.conn.last_insert_rowid();
        debug!(
            "Inserted {} row {} for {}",
            record.document_type().table_name(),
            id,
            record.image_ref()
        );
        Ok(id)
    }

    /// Most recent rows from both tables, driver licenses first
    pub fn records(&self, limit: usize) -> Result<Vec<StoredRecord>, StorageError> {
        let limit = limit as i64;
        let mut records = Vec::new();

        let mut stmt = self.conn.prepare(
            "SELECT id, dtype, dltype, dnumber, name, pnumber, address, ddate, dissuer, dimage \
             FROM drivecard ORDER BY id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit], driver_license_from_row)?;
        for row in rows {
            records.push(row?);
        }

        let mut stmt = self.conn.prepare(
            "SELECT id, idtype, name, pnumber, address, pdate, issuer, pimage \
             FROM idcard ORDER BY id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit], generic_id_from_row)?;
        for row in rows {
            records.push(row?);
        }

        Ok(records)
    }

    /// Number of rows in the table for a record type
    pub fn count(&self, table: &str) -> Result<i64, StorageError> {
        let sql = match table {
            "drivecard" => "SELECT COUNT(*) FROM drivecard",
            "idcard" => "SELECT COUNT(*) FROM idcard",
            other => return Err(StorageError::Unavailable(format!("unknown table '{}'", other))),
        };
        Ok(self.conn.query_row(sql, [], |row| row.get(0))?)
    }
}

impl RecordSink for Database {
    fn store(&mut self, record: &DocumentRecord) -> Result<(), StorageError> {
        self.insert(record).map(|_| ())
    }
}

fn driver_license_from_row(row: &Row<'_>) -> rusqlite::Result<StoredRecord> {
    Ok(StoredRecord {
        id: row.get(0)?,
        record: DocumentRecord::DriverLicense(DriverLicense {
            doc_type: row.get(1)?,
            license_type: row.get(2)?,
            number: row.get(3)?,
            name: row.get(4)?,
            phone: row.get(5)?,
            address: row.get(6)?,
            issue_date: row.get(7)?,
            issuer: row.get(8)?,
            image_ref: ImageRef::new(row.get::<_, String>(9)?),
        }),
    })
}

fn generic_id_from_row(row: &Row<'_>) -> rusqlite::Result<StoredRecord> {
    Ok(StoredRecord {
        id: row.get(0)?,
        record: DocumentRecord::GenericId(GenericId {
            doc_type: row.get(1)?,
            name: row.get(2)?,
            phone: row.get(3)?,
            address: row.get(4)?,
            issue_date: row.get(5)?,
            issuer: row.get(6)?,
            image_ref: ImageRef::new(row.get::<_, String>(7)?),
        }),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{extract_record, MIN_FIELDS};
    use tempfile::TempDir;

    fn driver_license() -> DocumentRecord {
        extract_record(
            "2\nB\n12345\nKim\n010-1111\nSeoul\nGangnam\n\n\n\n\n2024.01.01 CityHall",
            MIN_FIELDS,
            ImageRef::new("face_0.jpg"),
        )
    }

    #[test]
    fn test_insert_and_read_driver_license() {
        let db = Database::open_in_memory().unwrap();
        let id = db.insert(&driver_license()).unwrap();
        assert_eq!(id, 1);

        let records = db.records(10).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].record, driver_license());
        assert_eq!(db.count("drivecard").unwrap(), 1);
        assert_eq!(db.count("idcard").unwrap(), 0);
    }

    #[test]
    fn test_absent_attributes_stored_as_null() {
        let db = Database::open_in_memory().unwrap();
        let record = extract_record("ID\nPark", MIN_FIELDS, ImageRef::new("face_1.jpg"));
        db.insert(&record).unwrap();

        let phone: Option<String> = db
            .conn
            .query_row("SELECT pnumber FROM idcard WHERE id = 1", [], |row| row.get(0))
            .unwrap();
        assert!(phone.is_none());

        let records = db.records(10).unwrap();
        assert_eq!(records[0].record, record);
    }

    #[test]
    fn test_quotes_are_stored_verbatim() {
        let db = Database::open_in_memory().unwrap();
        let text = "ID\nO'Brien'); DROP TABLE idcard; --\n010";
        let record = extract_record(text, MIN_FIELDS, ImageRef::new("face_'0'.jpg"));
        db.insert(&record).unwrap();

        let records = db.records(10).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].record.name(), Some("O'Brien'); DROP TABLE idcard; --"));
        assert_eq!(records[0].record.image_ref().as_str(), "face_'0'.jpg");
    }

    #[test]
    fn test_records_limit_and_order() {
        let db = Database::open_in_memory().unwrap();
        for i in 0..3 {
            let record = extract_record(
                &format!("ID\nPerson{}", i),
                MIN_FIELDS,
                ImageRef::new(format!("face_{}.jpg", i)),
            );
            db.insert(&record).unwrap();
        }

        let records = db.records(2).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, 3);
        assert_eq!(records[0].record.name(), Some("Person2"));
    }

    #[test]
    fn test_count_unknown_table() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.count("users").is_err());
    }

    #[test]
    fn test_open_file_database_persists() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("idcards.db");

        {
            let mut db = Database::open(&path).unwrap();
            db.store(&driver_license()).unwrap();
        }

        let db = Database::open(&path).unwrap();
        assert_eq!(db.count("drivecard").unwrap(), 1);
    }
}
