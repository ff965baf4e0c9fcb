//! Command implementations behind the `feedsim` binary

use crate::config::{AppConfig, TableConfig};
use crate::pipeline::{list_source, Ingestor};
use crate::report::RunReport;
use crate::sink::{MemorySink, PgSink, RecordSink};
use crate::store::{ObjectStore, S3Store};
use anyhow::{Context, Result};
use comfy_table::{presets::UTF8_FULL, Table};
use feedsim_common::format_size;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Options of the `start` command
#[derive(Debug, Clone, Default)]
pub struct StartOptions<'a> {
    /// Count rows without writing them
    pub dry_run: bool,
    /// Migrations directory used instead of the built-in migrations
    pub migrations: Option<&'a Path>,
    /// Leave the schema as it is
    pub skip_migrations: bool,
}

/// Schema setup performed before a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationPlan<'a> {
    Skip,
    Embedded,
    Directory(&'a Path),
}

impl<'a> StartOptions<'a> {
    /// Built-in migrations run on every start that writes to the database
    pub fn migration_plan(&self) -> MigrationPlan<'a> {
        if self.dry_run || self.skip_migrations {
            return MigrationPlan::Skip;
        }
        match self.migrations {
            Some(dir) => MigrationPlan::Directory(dir),
            None => MigrationPlan::Embedded,
        }
    }
}

/// Ingest every configured table
pub async fn start(config: &AppConfig, options: StartOptions<'_>) -> Result<RunReport> {
    let sink: Arc<dyn RecordSink> = if options.dry_run {
        info!("Dry run, rows will not be written to the database");
        Arc::new(MemorySink::new())
    } else {
        let sink = PgSink::connect(&config.conn).await?;
        match options.migration_plan() {
            MigrationPlan::Skip => info!("Skipping migrations"),
            MigrationPlan::Embedded => sink.run_embedded_migrations().await?,
            MigrationPlan::Directory(dir) => sink.run_migrations(dir).await?,
        }
        Arc::new(sink)
    };

    let store: Arc<dyn ObjectStore> = Arc::new(S3Store::new(&config.conn).await);

    info!(tables = config.tables.len(), bucket = %config.conn.bucket, "Starting ingestion");
    let report = Ingestor::new(store, sink, &config.conn.bucket)
        .run(&config.tables)
        .await;
    info!(rows = report.total_rows(), "Ingestion complete");

    Ok(report)
}

/// Print the objects each selected table would extract
pub async fn list(config: &AppConfig, table: Option<&str>) -> Result<()> {
    let tables = select_tables(config, table)?;
    let store: Arc<dyn ObjectStore> = Arc::new(S3Store::new(&config.conn).await);

    for table in tables {
        let bucket = table.bucket_or(&config.conn.bucket);
        let objects = list_source(Arc::clone(&store), &config.conn.bucket, table)
            .await
            .with_context(|| format!("Failed to list objects for table '{}'", table.name))?;

        println!(
            "{} <- s3://{}/{} ({} of at most {} files)",
            table.name,
            bucket,
            table.source.prefix,
            objects.len(),
            table.extract.files
        );

        let mut listing = Table::new();
        listing.load_preset(UTF8_FULL).set_header(vec!["Key", "Size"]);
        for object in &objects {
            listing.add_row(vec![object.key.clone(), format_size(object.size)]);
        }
        println!("{listing}");
    }

    Ok(())
}

fn select_tables<'a>(config: &'a AppConfig, name: Option<&str>) -> Result<Vec<&'a TableConfig>> {
    match name {
        Some(name) => {
            let table = config
                .table(name)
                .with_context(|| format!("Table '{}' is not configured", name))?;
            Ok(vec![table])
        },
        None => Ok(config.tables.iter().collect()),
    }
}
