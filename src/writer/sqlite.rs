use anyhow::{Context, Result};
use rusqlite::Connection;
use std::path::Path;
use tracing::{debug, info};

use super::schema_gen::{generate_create_table, generate_indexes, quote_ident};
use super::value::row_values;
use crate::model::SolutionModel;
use crate::table::Table;
use crate::ui::{Phase, Ui};

const BATCH_SIZE: usize = 1000;

pub struct SqliteWriter {
    conn: Connection,
}

impl SqliteWriter {
    pub fn new(db_path: &Path) -> Result<Self> {
        if db_path.exists() {
            std::fs::remove_file(db_path).context("Failed to remove existing database")?;
        }

        let conn = Connection::open(db_path).context("Failed to create database")?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA cache_size = -64000;",
        )?;

        Ok(Self { conn })
    }

    /// Create every table and its key index
    pub fn create_tables(&self, tables: &[(String, &Table)]) -> Result<()> {
        debug!(count = tables.len(), "creating tables");

        for (name, table) in tables {
            if table.columns().is_empty() {
                debug!(table = %name, "no columns, not created");
                continue;
            }
            let sql = generate_create_table(name, table);
            self.conn
                .execute(&sql, [])
                .with_context(|| format!("Failed to create table: {}", name))?;

            for index_sql in generate_indexes(name, table) {
                self.conn
                    .execute(&index_sql, [])
                    .with_context(|| format!("Failed to create index for: {}", name))?;
            }
        }

        Ok(())
    }

    /// Insert all rows of one table inside a single transaction
    pub fn import_table(&mut self, name: &str, table: &Table, ui: &mut impl Ui) -> Result<u64> {
        let total = table.len() as u64;
        let names = table.columns();
        if names.is_empty() {
            ui.rows_written(name, 0, 0);
            return Ok(0);
        }

        let columns: Vec<String> = names.iter().map(|c| quote_ident(c)).collect();
        let placeholders: Vec<&str> = columns.iter().map(|_| "?").collect();
        let insert_sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_ident(name),
            columns.join(", "),
            placeholders.join(", ")
        );

        let tx = self.conn.transaction()?;
        let mut count: u64 = 0;

        for batch in table.rows().chunks(BATCH_SIZE) {
            let mut stmt = tx.prepare_cached(&insert_sql)?;
            for row in batch {
                for (idx, value) in row_values(row, &names).iter().enumerate() {
                    value.bind_to(idx + 1, &mut stmt)?;
                }
                stmt.raw_execute()
                    .with_context(|| format!("Failed to insert into {}", name))?;
            }
            count += batch.len() as u64;
            ui.rows_written(name, count, total);
        }

        tx.commit()?;
        if count == 0 {
            ui.rows_written(name, 0, 0);
        }

        Ok(count)
    }

    pub fn finalize(self) -> Result<()> {
        self.conn.execute_batch("PRAGMA optimize;")?;
        Ok(())
    }
}

/// Write the selected tables of a model to a fresh SQLite database,
/// returning the number of rows written
pub fn convert_to_sqlite(
    model: &SolutionModel,
    output_db: &Path,
    tables: &[(String, &Table)],
    ui: &mut impl Ui,
) -> Result<u64> {
    ui.set_phase(Phase::Writing);
    info!(
        tables = tables.len(),
        raw_record_types = model.raw_tables().len(),
        "writing database"
    );

    let mut writer = SqliteWriter::new(output_db)?;
    writer.create_tables(tables)?;

    let mut total_records: u64 = 0;
    for (name, table) in tables {
        total_records += writer.import_table(name, table, ui)?;
    }

    writer.finalize()?;
    info!(tables = tables.len(), rows = total_records, db = ?output_db, "database written");

    Ok(total_records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{Cell, Row};
    use crate::ui::SilentUi;

    #[test]
    fn test_import_table_batches_rows() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("out.db");

        let rows: Vec<Row> = (0..(BATCH_SIZE as i64 + 5))
            .map(|i| Row::from([("band_id".to_string(), Cell::Integer(i))]))
            .collect();
        let table = Table::from_rows("t_band", &rows).unwrap();
        let tables = vec![("band".to_string(), &table)];

        let mut writer = SqliteWriter::new(&db).unwrap();
        writer.create_tables(&tables).unwrap();
        let count = writer.import_table("band", &table, &mut SilentUi).unwrap();
        assert_eq!(count, BATCH_SIZE as u64 + 5);
        writer.finalize().unwrap();

        let conn = Connection::open(&db).unwrap();
        let stored: i64 = conn
            .query_row("SELECT COUNT(*) FROM band", [], |r| r.get(0))
            .unwrap();
        assert_eq!(stored, BATCH_SIZE as i64 + 5);
    }

    #[test]
    fn test_existing_database_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("out.db");
        std::fs::write(&db, b"not a database").unwrap();

        let writer = SqliteWriter::new(&db).unwrap();
        writer.finalize().unwrap();
        assert!(Connection::open(&db).is_ok());
    }
}
