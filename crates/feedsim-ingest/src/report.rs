//! Run reporting

use crate::pool::PageSummary;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use feedsim_common::format_size;
use std::time::Duration;

/// What happened to one source
#[derive(Debug, Clone, Default)]
pub struct SourceReport {
    pub table: String,
    pub files_dispatched: usize,
    pub files_succeeded: usize,
    pub files_failed: usize,
    pub bytes_downloaded: u64,
    pub rows_inserted: usize,
    pub lines_skipped: usize,
    /// Set when listing failed and the traversal stopped early
    pub traversal_error: Option<String>,
    pub elapsed: Duration,
}

impl SourceReport {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Default::default()
        }
    }

    pub fn add_page(&mut self, page: &PageSummary) {
        self.files_dispatched += page.dispatched;
        self.files_succeeded += page.succeeded;
        self.files_failed += page.failed;
        self.bytes_downloaded += page.bytes;
        self.rows_inserted += page.rows_inserted;
        self.lines_skipped += page.lines_skipped;
    }

    pub fn is_success(&self) -> bool {
        self.traversal_error.is_none()
    }
}

/// Reports of every source in a run
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub sources: Vec<SourceReport>,
}

impl RunReport {
    /// Object-level failures don't fail the run; only a broken traversal does
    pub fn is_success(&self) -> bool {
        self.sources.iter().all(SourceReport::is_success)
    }

    pub fn source(&self, table: &str) -> Option<&SourceReport> {
        self.sources.iter().find(|s| s.table == table)
    }

    pub fn total_rows(&self) -> usize {
        self.sources.iter().map(|s| s.rows_inserted).sum()
    }

    /// Summary table for the terminal
    pub fn to_table(&self) -> Table {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec![
                "Table", "Files", "Failed", "Downloaded", "Rows", "Skipped", "Time", "Status",
            ]);

        for source in &self.sources {
            let status = match &source.traversal_error {
                None => "ok".to_string(),
                Some(error) => format!("failed: {error}"),
            };
            table.add_row(vec![
                source.table.clone(),
                source.files_dispatched.to_string(),
                source.files_failed.to_string(),
                format_size(source.bytes_downloaded),
                source.rows_inserted.to_string(),
                source.lines_skipped.to_string(),
                format!("{:.1}s", source.elapsed.as_secs_f64()),
                status,
            ]);
        }

        table
    }
}
