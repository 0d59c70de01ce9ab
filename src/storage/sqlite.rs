//! SQLite storage implementation

use std::path::Path;
use rusqlite::{Connection, params, OptionalExtension};
use crate::{Result, Error};
use crate::exchange::{Exchange, ExchangeKind, Uncertainty};
use crate::key::RecordKey;
use crate::record::Record;
use super::schema;

const RECORD_COLUMNS: &str =
    "project, store, code, name, location, unit, reference_product, categories, auto_generated";

const EXCHANGE_COLUMNS: &str =
    "output_key, input_key, amount, unit, kind, uncertainty_type, loc, scale, negative, minimum, maximum";

/// SQLite-backed storage for any number of projects and stores
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open a database file (creates if doesn't exist)
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Initialize the database schema
    fn initialize_schema(&self) -> Result<()> {
        for stmt in schema::all_schema_statements() {
            self.conn.execute(stmt, [])?;
        }
        Ok(())
    }

    // ========== Record Operations ==========

    /// Insert a record. Records are append-only: an existing key is an error.
    pub fn insert_record(&self, record: &Record) -> Result<()> {
        let categories = record
            .categories
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        self.conn.execute(
            r#"
            INSERT INTO records (project, store, code, name, location, unit, reference_product, categories, auto_generated)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                record.key.project,
                record.key.store,
                record.key.code,
                record.name,
                record.location,
                record.unit,
                record.reference_product,
                categories,
                record.auto_generated,
            ],
        )?;
        Ok(())
    }

    /// Get a record by key
    pub fn get_record(&self, key: &RecordKey) -> Result<Option<Record>> {
        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM records WHERE project = ?1 AND store = ?2 AND code = ?3"
        );
        self.conn
            .query_row(&sql, params![key.project, key.store, key.code], |row| self.row_to_record(row))
            .optional()
            .map_err(Into::into)
    }

    /// All records of one store, in insertion order
    pub fn records_in_store(&self, project: &str, store: &str) -> Result<Vec<Record>> {
        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM records WHERE project = ?1 AND store = ?2 ORDER BY id"
        );
        let mut stmt = self.conn.prepare(&sql)?;

        let records = stmt
            .query_map(params![project, store], |row| self.row_to_record(row))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(records)
    }

    /// Count all records
    pub fn count_records(&self) -> Result<usize> {
        let count: i64 = self.conn.query_row("SELECT COUNT(*) FROM records", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Count records created by the migrator
    pub fn count_auto_generated(&self) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM records WHERE auto_generated = 1",
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Helper to convert a row to a Record
    fn row_to_record(&self, row: &rusqlite::Row) -> rusqlite::Result<Record> {
        let categories: Option<String> = row.get(7)?;
        let categories = categories
            .map(|json| serde_json::from_str::<Vec<String>>(&json))
            .transpose()
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(7, rusqlite::types::Type::Text, Box::new(e))
            })?;

        Ok(Record {
            key: RecordKey::new(row.get::<_, String>(0)?, row.get::<_, String>(1)?, row.get::<_, String>(2)?),
            name: row.get(3)?,
            location: row.get(4)?,
            unit: row.get(5)?,
            reference_product: row.get(6)?,
            categories,
            auto_generated: row.get(8)?,
        })
    }

    // ========== Exchange Operations ==========

    /// Insert an exchange
    pub fn insert_exchange(&self, exchange: &Exchange) -> Result<()> {
        let u = &exchange.uncertainty;
        self.conn.execute(
            r#"
            INSERT INTO exchanges (output_key, input_key, amount, unit, kind, uncertainty_type, loc, scale, negative, minimum, maximum)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
            params![
                exchange.output.to_key_string(),
                exchange.input.to_key_string(),
                exchange.amount,
                exchange.unit,
                exchange.kind.as_str(),
                u.uncertainty_type,
                u.loc,
                u.scale,
                u.negative,
                u.minimum,
                u.maximum,
            ],
        )?;
        Ok(())
    }

    /// Get the exchanges owned by a record, in insertion order
    pub fn exchanges_from(&self, key: &RecordKey) -> Result<Vec<Exchange>> {
        let sql = format!("SELECT {EXCHANGE_COLUMNS} FROM exchanges WHERE output_key = ?1 ORDER BY id");
        let mut stmt = self.conn.prepare(&sql)?;

        let exchanges = stmt
            .query_map([key.to_key_string()], |row| self.row_to_exchange(row))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(exchanges)
    }

    /// Get exchanges pointing at a record (reverse lookup)
    pub fn exchanges_to(&self, key: &RecordKey) -> Result<Vec<Exchange>> {
        let sql = format!("SELECT {EXCHANGE_COLUMNS} FROM exchanges WHERE input_key = ?1 ORDER BY id");
        let mut stmt = self.conn.prepare(&sql)?;

        let exchanges = stmt
            .query_map([key.to_key_string()], |row| self.row_to_exchange(row))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(exchanges)
    }

    /// Count all exchanges
    pub fn count_exchanges(&self) -> Result<usize> {
        let count: i64 = self.conn.query_row("SELECT COUNT(*) FROM exchanges", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Helper to convert a row to an Exchange
    fn row_to_exchange(&self, row: &rusqlite::Row) -> rusqlite::Result<Exchange> {
        let output_str: String = row.get(0)?;
        let input_str: String = row.get(1)?;
        let kind_str: String = row.get(4)?;

        let output = RecordKey::parse(&output_str).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        })?;

        let input = RecordKey::parse(&input_str).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
        })?;

        let kind: ExchangeKind = kind_str.parse().map_err(|e: Error| {
            rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
        })?;

        Ok(Exchange {
            output,
            input,
            amount: row.get(2)?,
            unit: row.get(3)?,
            kind,
            uncertainty: Uncertainty {
                uncertainty_type: row.get(5)?,
                loc: row.get(6)?,
                scale: row.get(7)?,
                negative: row.get(8)?,
                minimum: row.get(9)?,
                maximum: row.get(10)?,
            },
        })
    }

    // ========== Bulk Operations ==========

    /// Begin a transaction for bulk operations
    pub fn begin_transaction(&self) -> Result<()> {
        self.conn.execute("BEGIN TRANSACTION", [])?;
        Ok(())
    }

    /// Commit a transaction
    pub fn commit(&self) -> Result<()> {
        self.conn.execute("COMMIT", [])?;
        Ok(())
    }

    /// Rollback a transaction
    pub fn rollback(&self) -> Result<()> {
        self.conn.execute("ROLLBACK", [])?;
        Ok(())
    }

    /// Run `f` in a transaction: committed on `Ok`, rolled back on `Err`.
    ///
    /// The error returned by `f` is passed through unchanged.
    pub fn in_transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce() -> Result<T>,
    {
        self.begin_transaction()?;
        match f() {
            Ok(value) => {
                self.commit()?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback) = self.rollback() {
                    tracing::error!("Rollback failed: {}", rollback);
                }
                Err(e)
            }
        }
    }

    /// Per-store record counts, ordered by project then store
    pub fn store_stats(&self) -> Result<Vec<StoreStats>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT project, store, COUNT(*), SUM(auto_generated)
            FROM records
            GROUP BY project, store
            ORDER BY project, store
            "#,
        )?;

        let stores = stmt
            .query_map([], |row| {
                let records: i64 = row.get(2)?;
                let auto_generated: i64 = row.get(3)?;
                Ok(StoreStats {
                    project: row.get(0)?,
                    store: row.get(1)?,
                    records: records as usize,
                    auto_generated: auto_generated as usize,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(stores)
    }

    /// Get database statistics
    pub fn stats(&self) -> Result<DbStats> {
        Ok(DbStats {
            records: self.count_records()?,
            auto_generated: self.count_auto_generated()?,
            exchanges: self.count_exchanges()?,
            stores: self.store_stats()?,
        })
    }
}

/// Record counts of one store
#[derive(Debug, Clone, serde::Serialize)]
pub struct StoreStats {
    pub project: String,
    pub store: String,
    pub records: usize,
    pub auto_generated: usize,
}

/// Database statistics
#[derive(Debug, Clone, serde::Serialize)]
pub struct DbStats {
    pub records: usize,
    pub auto_generated: usize,
    pub exchanges: usize,
    pub stores: Vec<StoreStats>,
}

impl std::fmt::Display for DbStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Database Statistics:")?;
        writeln!(f, "  Records: {}", self.records)?;
        writeln!(f, "  Auto-generated: {}", self.auto_generated)?;
        write!(f, "  Exchanges: {}", self.exchanges)?;
        for store in &self.stores {
            write!(
                f,
                "\n    {}/{}: {} records ({} auto-generated)",
                store.project, store.store, store.records, store.auto_generated
            )?;
        }
        Ok(())
    }
}
