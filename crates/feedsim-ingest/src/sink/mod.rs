//! Row sinks
//!
//! Records are written one row per statement, with every value bound as a
//! positional parameter. Nothing is transactional and nothing is
//! deduplicated: ingesting the same objects twice inserts their rows twice.

use crate::config::{is_identifier, is_sql_type, is_table_name, ColumnConfig};
use crate::error::{IngestError, Result};
use async_trait::async_trait;

pub mod memory;
pub mod postgres;

pub use memory::MemorySink;
pub use postgres::PgSink;

/// A single bound value; `None` is written as NULL
pub type FieldValue = Option<String>;

/// Values in column order
pub type Row = Vec<FieldValue>;

/// A parameterized INSERT for one table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertStatement {
    table: String,
    columns: Vec<String>,
    sql: String,
}

impl InsertStatement {
    /// Build `INSERT INTO table (c1, c2) VALUES ($1, CAST($2 AS type))`
    ///
    /// Identifiers are emitted unquoted and must be plain names; anything
    /// else is rejected rather than escaped.
    pub fn build(table: &str, columns: &[ColumnConfig]) -> Result<Self> {
        if !is_table_name(table) {
            return Err(IngestError::statement(table, "invalid table name"));
        }
        if columns.is_empty() {
            return Err(IngestError::statement(table, "no columns"));
        }

        let mut names = Vec::with_capacity(columns.len());
        let mut values = Vec::with_capacity(columns.len());

        for (i, column) in columns.iter().enumerate() {
            if !is_identifier(&column.name) {
                return Err(IngestError::statement(
                    table,
                    format!("invalid column name '{}'", column.name),
                ));
            }
            names.push(column.name.clone());

            let placeholder = format!("${}", i + 1);
            match &column.sql_type {
                Some(sql_type) if !is_sql_type(sql_type) => {
                    return Err(IngestError::statement(
                        table,
                        format!("invalid type '{}' for column '{}'", sql_type, column.name),
                    ));
                },
                Some(sql_type) => values.push(format!("CAST({placeholder} AS {sql_type})")),
                None => values.push(placeholder),
            }
        }

        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            table,
            names.join(", "),
            values.join(", ")
        );

        Ok(Self {
            table: table.to_string(),
            columns: names,
            sql,
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Reject rows whose width doesn't match the column list
    pub fn check_row(&self, row: &Row) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(IngestError::statement(
                &self.table,
                format!("expected {} values, got {}", self.columns.len(), row.len()),
            ));
        }
        Ok(())
    }
}

/// Destination for parsed records
#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Insert one row; any failure aborts the calling object
    async fn insert(&self, statement: &InsertStatement, row: Row) -> Result<()>;
}
