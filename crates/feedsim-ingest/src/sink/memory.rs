//! In-memory sink that records rows per table

use super::{InsertStatement, RecordSink, Row};
use crate::error::{IngestError, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::trace;

/// Sink that keeps every inserted row in memory, grouped by table
///
/// Backs `start --dry-run`, where rows are counted but never written.
#[derive(Debug, Default)]
pub struct MemorySink {
    tables: Mutex<BTreeMap<String, Vec<Row>>>,
    reject: Option<String>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail any insert carrying `value`, as a database constraint would
    pub fn rejecting(value: impl Into<String>) -> Self {
        Self {
            tables: Mutex::default(),
            reject: Some(value.into()),
        }
    }

    fn tables(&self) -> MutexGuard<'_, BTreeMap<String, Vec<Row>>> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Rows inserted into `table`, in insertion order
    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.tables().get(table).cloned().unwrap_or_default()
    }

    pub fn row_count(&self, table: &str) -> usize {
        self.tables().get(table).map_or(0, Vec::len)
    }

    pub fn total_rows(&self) -> usize {
        self.tables().values().map(Vec::len).sum()
    }
}

#[async_trait]
impl RecordSink for MemorySink {
    async fn insert(&self, statement: &InsertStatement, row: Row) -> Result<()> {
        statement.check_row(&row)?;

        if let Some(reject) = &self.reject {
            if row.iter().flatten().any(|value| value == reject) {
                return Err(IngestError::Sink {
                    table: statement.table().to_string(),
                    message: format!("value '{reject}' rejected"),
                });
            }
        }

        trace!(table = statement.table(), ?row, "Recording");

        self.tables()
            .entry(statement.table().to_string())
            .or_default()
            .push(row);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::config::ColumnConfig;

    fn statement() -> InsertStatement {
        InsertStatement::build("trips", &[ColumnConfig::text("a"), ColumnConfig::text("b")])
            .unwrap()
    }

    #[tokio::test]
    async fn test_records_rows_in_order() {
        let sink = MemorySink::new();
        let stmt = statement();

        sink.insert(&stmt, vec![Some("1".into()), None]).await.unwrap();
        sink.insert(&stmt, vec![Some("2".into()), Some("x".into())])
            .await
            .unwrap();

        assert_eq!(sink.row_count("trips"), 2);
        assert_eq!(sink.rows("trips")[1], vec![Some("2".to_string()), Some("x".to_string())]);
        assert_eq!(sink.row_count("riders"), 0);
        assert_eq!(sink.total_rows(), 2);
    }

    #[tokio::test]
    async fn test_rejects_marked_values_and_bad_widths() {
        let sink = MemorySink::rejecting("poison");
        let stmt = statement();

        let err = sink
            .insert(&stmt, vec![Some("poison".into()), None])
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::Sink { .. }));

        let err = sink.insert(&stmt, vec![None]).await.unwrap_err();
        assert!(matches!(err, IngestError::Statement { .. }));

        assert_eq!(sink.total_rows(), 0);
    }
}
