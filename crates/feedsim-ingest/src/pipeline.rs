//! Source orchestration
//!
//! Every configured table is ingested as an independent task. Within a
//! source the traverser produces pages of claimed objects and the worker
//! pool runs the extractor over each page before the next one is listed.

use crate::config::TableConfig;
use crate::extract::ObjectExtractor;
use crate::pool::{PageSummary, WorkerPool};
use crate::report::{RunReport, SourceReport};
use crate::sink::RecordSink;
use crate::store::{ObjectHandle, ObjectStore};
use crate::traverse::{FileBudget, PageHandler, PrefixTraverser};
use async_trait::async_trait;
use feedsim_common::format_size;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinSet;
use tracing::{error, info, instrument};

/// Dispatches each page to the worker pool and keeps running totals
struct DispatchHandler {
    pool: WorkerPool,
    extractor: Arc<ObjectExtractor>,
    totals: PageSummary,
}

#[async_trait]
impl PageHandler for DispatchHandler {
    async fn handle_page(&mut self, objects: Vec<ObjectHandle>) {
        let extractor = Arc::clone(&self.extractor);
        let summary = self
            .pool
            .run_page(objects, move |handle| {
                let extractor = Arc::clone(&extractor);
                async move { extractor.extract(&handle).await }
            })
            .await;
        self.totals.merge(&summary);
    }
}

/// Collects claimed objects without downloading them
#[derive(Default)]
struct CollectHandler {
    objects: Vec<ObjectHandle>,
}

#[async_trait]
impl PageHandler for CollectHandler {
    async fn handle_page(&mut self, objects: Vec<ObjectHandle>) {
        self.objects.extend(objects);
    }
}

/// Runs sources against an object store and a sink
#[derive(Clone)]
pub struct Ingestor {
    store: Arc<dyn ObjectStore>,
    sink: Arc<dyn RecordSink>,
    default_bucket: String,
}

impl Ingestor {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        sink: Arc<dyn RecordSink>,
        default_bucket: impl Into<String>,
    ) -> Self {
        Self {
            store,
            sink,
            default_bucket: default_bucket.into(),
        }
    }

    /// Ingest every table concurrently; reports keep the order of `tables`
    pub async fn run(&self, tables: &[TableConfig]) -> RunReport {
        let mut tasks = JoinSet::new();

        for (index, table) in tables.iter().enumerate() {
            let ingestor = self.clone();
            let table = table.clone();
            tasks.spawn(async move { (index, ingestor.ingest_source(&table).await) });
        }

        let mut reports: Vec<Option<SourceReport>> = vec![None; tables.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, report)) => reports[index] = Some(report),
                Err(e) => error!(error = %e, "Source task panicked"),
            }
        }

        let sources = reports
            .into_iter()
            .zip(tables)
            .map(|(report, table)| {
                report.unwrap_or_else(|| SourceReport {
                    traversal_error: Some("source task panicked".to_string()),
                    ..SourceReport::new(&table.name)
                })
            })
            .collect();

        RunReport { sources }
    }

    /// Ingest one table
    ///
    /// Object failures are counted in the report; a listing failure stops the
    /// traversal and is recorded as the source's error.
    #[instrument(skip_all, fields(table = %table.name))]
    pub async fn ingest_source(&self, table: &TableConfig) -> SourceReport {
        let started = Instant::now();
        let bucket = table.bucket_or(&self.default_bucket);
        let mut report = SourceReport::new(&table.name);

        info!(
            bucket,
            prefix = %table.source.prefix,
            format = %table.source.format,
            files = table.extract.files,
            rows = table.extract.rows,
            workers = table.extract.workers,
            "Ingesting source"
        );

        let extractor =
            match ObjectExtractor::new(table, bucket, Arc::clone(&self.store), Arc::clone(&self.sink)) {
                Ok(extractor) => Arc::new(extractor),
                Err(e) => {
                    error!(error = %e, "Source not started");
                    report.traversal_error = Some(e.to_string());
                    return report;
                },
            };

        let budget = Arc::new(FileBudget::new(table.extract.files));
        let traverser = PrefixTraverser::new(
            Arc::clone(&self.store),
            bucket,
            table.source.recursive,
            budget,
        );
        let mut handler = DispatchHandler {
            pool: WorkerPool::new(table.extract.workers, table.extract.next_delay()),
            extractor,
            totals: PageSummary::default(),
        };

        if let Err(e) = traverser.walk(&table.source.prefix, &mut handler).await {
            error!(error = %e, "Traversal aborted");
            report.traversal_error = Some(e.to_string());
        }

        report.add_page(&handler.totals);
        report.elapsed = started.elapsed();

        info!(
            files = report.files_dispatched,
            failed = report.files_failed,
            size = %format_size(report.bytes_downloaded),
            rows = report.rows_inserted,
            skipped = report.lines_skipped,
            "Source finished"
        );

        report
    }
}

/// Objects a source would extract, honoring recursion and the file cap
pub async fn list_source(
    store: Arc<dyn ObjectStore>,
    default_bucket: &str,
    table: &TableConfig,
) -> crate::error::Result<Vec<ObjectHandle>> {
    let budget = Arc::new(FileBudget::new(table.extract.files));
    let traverser = PrefixTraverser::new(
        store,
        table.bucket_or(default_bucket),
        table.source.recursive,
        budget,
    );

    let mut handler = CollectHandler::default();
    traverser.walk(&table.source.prefix, &mut handler).await?;
    Ok(handler.objects)
}
