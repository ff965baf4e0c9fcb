//! Per-object extraction: fetch, frame, parse and insert
//!
//! Lines are consumed in file order until the row cap is reached; whatever
//! follows is never read. Skipped lines don't count toward the cap.

use crate::config::TableConfig;
use crate::error::{IngestError, Result};
use crate::fetcher::ObjectFetcher;
use crate::governor::RateGovernor;
use crate::parser::{LineOutcome, RecordParser, SkipReason};
use crate::sink::{InsertStatement, RecordSink};
use crate::store::{ObjectHandle, ObjectStore};
use feedsim_common::format_size;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Counters for one processed object
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ObjectOutcome {
    pub rows_inserted: usize,
    pub lines_skipped: usize,
    /// Bytes downloaded, before decompression
    pub bytes: u64,
}

/// Runs the fetch/parse/insert chain for the objects of one source
pub struct ObjectExtractor {
    fetcher: ObjectFetcher,
    parser: RecordParser,
    statement: InsertStatement,
    sink: Arc<dyn RecordSink>,
    rows_cap: usize,
    header: bool,
    max_line_bytes: usize,
    governor: Option<RateGovernor>,
}

impl ObjectExtractor {
    pub fn new(
        table: &TableConfig,
        bucket: &str,
        store: Arc<dyn ObjectStore>,
        sink: Arc<dyn RecordSink>,
    ) -> Result<Self> {
        let statement = InsertStatement::build(&table.name, &table.sink_columns())?;

        Ok(Self {
            fetcher: ObjectFetcher::new(store, bucket, table.source.compressed),
            parser: RecordParser::for_table(table),
            statement,
            sink,
            rows_cap: table.extract.rows,
            header: table.source.header,
            max_line_bytes: table.extract.max_line_bytes,
            governor: table.extract.pacing.as_ref().map(RateGovernor::from_config),
        })
    }

    pub fn statement(&self) -> &InsertStatement {
        &self.statement
    }

    /// Extract one object into the sink
    pub async fn extract(&self, handle: &ObjectHandle) -> Result<ObjectOutcome> {
        info!(
            key = %handle.key,
            size = %format_size(handle.size),
            "Extracting file"
        );

        let object = self.fetcher.fetch(handle).await?;
        let mut outcome = ObjectOutcome {
            bytes: object.stored_len() as u64,
            ..Default::default()
        };

        let mut lines = object.lines(self.max_line_bytes);
        let mut block = self
            .governor
            .as_ref()
            .map(|governor| governor.next_block(0, self.rows_cap));

        while outcome.rows_inserted < self.rows_cap {
            let first = lines.line_number() == 0;
            let Some(line) = lines.next_line()? else {
                break;
            };
            if first && self.header {
                continue;
            }

            let parsed = self.parser.parse_line(line);
            let number = lines.line_number();
            let parsed = parsed.map_err(|source| IngestError::Malformed {
                key: handle.key.clone(),
                line: number,
                source,
            })?;

            let record = match parsed {
                LineOutcome::Record(record) => record,
                LineOutcome::Skipped(reason) => {
                    outcome.lines_skipped += 1;
                    match reason {
                        SkipReason::Blank => {
                            debug!(key = %handle.key, line = number, "Skipping blank line")
                        },
                        reason => {
                            warn!(key = %handle.key, line = number, %reason, "Skipping line")
                        },
                    }
                    continue;
                },
            };

            self.sink.insert(&self.statement, record.into_row()).await?;
            outcome.rows_inserted += 1;

            if let (Some(governor), Some(current)) = (&self.governor, block) {
                let remaining = self.rows_cap - outcome.rows_inserted;
                if remaining > 0 && current.is_complete(outcome.rows_inserted) {
                    debug!(
                        key = %handle.key,
                        rows = outcome.rows_inserted,
                        delay_ms = current.delay.as_millis() as u64,
                        "Block complete, pausing"
                    );
                    tokio::time::sleep(current.delay).await;
                    block = Some(governor.next_block(outcome.rows_inserted, remaining));
                }
            }
        }

        info!(
            key = %handle.key,
            rows = outcome.rows_inserted,
            skipped = outcome.lines_skipped,
            "Finished extracting file"
        );

        Ok(outcome)
    }
}
