//! End-to-end pipeline tests
//!
//! Drive whole sources through traversal, the worker pool, extraction and
//! the sink, using the in-memory store and sink.
//!
//! **Running tests**:
//! ```bash
//! cargo test -p feedsim-ingest --test pipeline_tests
//! ```

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::{columns, gzip, json_lines, TestEnv, BUCKET};
use feedsim_ingest::config::TableConfig;
use feedsim_ingest::sink::MemorySink;
use feedsim_ingest::store::MemoryStore;
use std::time::Duration;

// ============================================================================
// Volume caps
// ============================================================================

#[tokio::test]
async fn test_file_and_row_caps() {
    for workers in [1, 2, 8] {
        let env = TestEnv::new();
        env.put("riders/part-0.json", json_lines(0, 5));
        env.put("riders/part-1.json", json_lines(5, 5));
        env.put("riders/part-2.json", json_lines(10, 5));

        let table = TableConfig::json("riders", "riders/")
            .caps(2, 3)
            .workers(workers);
        let report = env.ingestor.ingest_source(&table).await;

        assert!(report.is_success());
        assert_eq!(report.files_dispatched, 2, "workers={workers}");
        assert_eq!(report.rows_inserted, 6, "workers={workers}");
        assert_eq!(env.store.downloaded().len(), 2);
        assert_eq!(env.sink.row_count("riders"), 6);
    }
}

#[tokio::test]
async fn test_file_cap_holds_across_recursion_and_workers() {
    let env = TestEnv::with_store(MemoryStore::new().with_page_size(3));
    for year in 2013..2018 {
        for part in 0..4 {
            env.put(&format!("trips/{year}/part-{part}.json"), json_lines(0, 2));
        }
    }

    let table = TableConfig::json("trips", "trips/")
        .recursive(true)
        .caps(7, 10)
        .workers(4);
    let report = env.ingestor.ingest_source(&table).await;

    assert!(report.is_success());
    assert_eq!(report.files_dispatched, 7);
    assert_eq!(env.store.downloaded().len(), 7);
    assert_eq!(env.sink.row_count("trips"), 14);
}

#[tokio::test]
async fn test_directory_markers_are_never_downloaded() {
    let env = TestEnv::new();
    env.put("riders/", "");
    env.put("riders/2019/", "");
    env.put("riders/2019/part-0.json", json_lines(0, 1));
    env.put("riders/part-0.json", json_lines(0, 1));

    let table = TableConfig::json("riders", "riders/").recursive(true);
    let report = env.ingestor.ingest_source(&table).await;

    assert_eq!(report.files_dispatched, 2);
    let downloaded = env.store.downloaded();
    assert!(downloaded.iter().all(|key| !key.ends_with('/')));
    assert_eq!(downloaded.len(), 2);
}

#[tokio::test]
async fn test_sources_with_shared_stem_stay_apart() {
    let env = TestEnv::new();
    env.put("citibike-trips/trips_2013_0_0_0.csv", "1,2\n3,4\n");
    env.put("citibike-trips/2014/trips_2014_0_0_0.csv", "5,6\n");
    env.put("citibike-trips-json/2013/part-0.json", json_lines(0, 2));

    let run = env
        .ingestor
        .run(&[
            TableConfig::json("riders", "citibike-trips-json").recursive(true),
            TableConfig::csv("trips", "citibike-trips", columns(2)).recursive(true),
        ])
        .await;

    assert!(run.is_success());
    assert_eq!(run.source("riders").unwrap().files_dispatched, 1);
    assert_eq!(run.source("trips").unwrap().files_dispatched, 2);
    assert_eq!(run.source("trips").unwrap().lines_skipped, 0);
    assert_eq!(env.sink.row_count("riders"), 2);
    assert_eq!(env.sink.row_count("trips"), 3);
}

// ============================================================================
// Parsing
// ============================================================================

#[tokio::test]
async fn test_malformed_json_line_is_skipped() {
    let env = TestEnv::new();
    env.put(
        "riders/part-0.json",
        "{\"rider\":1}\n{\"rider\":\n{\"rider\":3}\n",
    );

    let report = env
        .ingestor
        .ingest_source(&TableConfig::json("riders", "riders/"))
        .await;

    assert_eq!(report.files_failed, 0);
    assert_eq!(report.rows_inserted, 2);
    assert_eq!(report.lines_skipped, 1);
    assert_eq!(
        env.sink.rows("riders")[1],
        vec![Some("{\"rider\":3}".to_string())]
    );
}

#[tokio::test]
async fn test_short_delimited_line_is_skipped() {
    let env = TestEnv::new();
    env.put("trips/part-0.csv", "1,2,3,4\n5,6,7\n8,9,10,11\n");

    let table = TableConfig::csv("trips", "trips/", columns(4));
    let report = env.ingestor.ingest_source(&table).await;

    assert_eq!(report.files_failed, 0);
    assert_eq!(report.rows_inserted, 2);
    assert_eq!(report.lines_skipped, 1);
}

#[tokio::test]
async fn test_compressed_delimited_source_with_header() {
    let env = TestEnv::new();
    let body = "tripduration,starttime,bikeid\n\
                695,2013-06-01 00:00:01,19678\n\
                693,2013-06-01 00:00:08,16649\n";
    env.put("trips/part-0.csv.gz", gzip(body.as_bytes()));

    let table = TableConfig::csv("trips", "trips/", columns(3))
        .compressed(true)
        .header(true);
    let report = env.ingestor.ingest_source(&table).await;

    assert_eq!(report.rows_inserted, 2);
    assert_eq!(
        env.sink.rows("trips")[0],
        vec![
            Some("695".to_string()),
            Some("2013-06-01 00:00:01".to_string()),
            Some("19678".to_string()),
        ]
    );
}

// ============================================================================
// Failure isolation
// ============================================================================

#[tokio::test]
async fn test_corrupt_object_fails_alone() {
    let env = TestEnv::new();
    env.put("riders/part-0.json.gz", gzip(json_lines(0, 3).as_bytes()));
    env.put("riders/part-1.json.gz", "not gzip at all");
    env.put("riders/part-2.json.gz", gzip(json_lines(3, 3).as_bytes()));

    let table = TableConfig::json("riders", "riders/").compressed(true);
    let report = env.ingestor.ingest_source(&table).await;

    assert!(report.is_success());
    assert_eq!(report.files_dispatched, 3);
    assert_eq!(report.files_failed, 1);
    assert_eq!(report.files_succeeded, 2);
    assert_eq!(report.rows_inserted, 6);
}

#[tokio::test]
async fn test_sink_failure_fails_object_only() {
    let env = TestEnv::with(MemoryStore::new(), MemorySink::rejecting("poison"));
    env.put("trips/a.csv", "1,2\npoison,3\n4,5\n");
    env.put("trips/b.csv", "6,7\n8,9\n");

    let table = TableConfig::csv("trips", "trips/", columns(2));
    let report = env.ingestor.ingest_source(&table).await;

    assert!(report.is_success());
    assert_eq!(report.files_failed, 1);
    // One row from a.csv before the rejected line, both rows of b.csv
    assert_eq!(env.sink.row_count("trips"), 3);
}

#[tokio::test]
async fn test_listing_failure_fails_only_its_source() {
    let env = TestEnv::new();
    env.put("riders/part-0.json", json_lines(0, 2));
    env.put("trips/part-0.csv", "1,2\n");
    env.store.fail_listing(BUCKET, "trips/");

    let run = env
        .ingestor
        .run(&[
            TableConfig::json("riders", "riders/"),
            TableConfig::csv("trips", "trips/", columns(2)),
        ])
        .await;

    assert!(!run.is_success());
    let riders = run.source("riders").unwrap();
    assert!(riders.is_success());
    assert_eq!(riders.rows_inserted, 2);

    let trips = run.source("trips").unwrap();
    assert!(trips.traversal_error.as_deref().unwrap().contains("trips/"));
    assert_eq!(trips.files_dispatched, 0);
}

// ============================================================================
// Concurrency and pacing
// ============================================================================

#[tokio::test]
async fn test_worker_limit_bounds_in_flight_objects() {
    let env = TestEnv::with_store(MemoryStore::new().with_download_delay(Duration::from_millis(30)));
    for i in 0..5 {
        env.put(&format!("riders/part-{i}.json"), json_lines(i, 1));
    }

    let table = TableConfig::json("riders", "riders/").workers(2);
    let report = env.ingestor.ingest_source(&table).await;

    assert_eq!(report.files_succeeded, 5);
    assert!(env.store.max_in_flight() <= 2);
    assert_eq!(env.store.max_in_flight(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_next_delay_throttles_dispatch() {
    let env = TestEnv::new();
    for i in 0..4 {
        env.put(&format!("riders/part-{i}.json"), json_lines(i, 1));
    }

    let table = TableConfig::json("riders", "riders/")
        .workers(1)
        .next_delay(Duration::from_millis(500));
    let started = tokio::time::Instant::now();
    let report = env.ingestor.ingest_source(&table).await;

    assert_eq!(report.files_succeeded, 4);
    assert!(started.elapsed() >= Duration::from_secs(2));
}

// ============================================================================
// Delivery semantics
// ============================================================================

#[tokio::test]
async fn test_rerun_inserts_rows_again() {
    let env = TestEnv::new();
    env.put("riders/part-0.json", json_lines(0, 3));
    let table = TableConfig::json("riders", "riders/");

    env.ingestor.ingest_source(&table).await;
    env.ingestor.ingest_source(&table).await;

    // No dedup: the second run duplicates every row
    let rows = env.sink.rows("riders");
    assert_eq!(rows.len(), 6);
    assert_eq!(rows[0], rows[3]);
}
