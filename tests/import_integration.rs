//! Integration tests for the import pipeline against an in-memory store

use logstats::import::{ImportError, ImportPipeline};
use logstats::storage::{SqliteStorage, Storage};
use std::path::{Path, PathBuf};
use std::sync::Arc;

async fn memory_storage() -> Arc<dyn Storage> {
    let storage = SqliteStorage::new("sqlite::memory:", 1).await.unwrap();
    storage.init().await.unwrap();
    Arc::new(storage)
}

fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}

fn pipeline_without_geo(storage: Arc<dyn Storage>) -> ImportPipeline {
    ImportPipeline::new(storage, PathBuf::from("/nonexistent/ranges.csv"))
}

const ACCESS_LOG: &str = concat!(
    "203.0.113.5 - - [10/Jan/2020:08:15:00 +0000] \"GET /a\"\n",
    "203.0.113.5 - - [10/Jan/2020:08:20:00 +0000] \"GET /b\"\n",
    "1.0.0.1 - - [10/Jan/2020:09:05:00 +0000] \"GET /c\"\n",
);

#[tokio::test]
async fn import_returns_line_count_and_persists() {
    let storage = memory_storage().await;
    let dir = tempfile::tempdir().unwrap();
    let file = write_file(dir.path(), "access.log", ACCESS_LOG);

    let pipeline = pipeline_without_geo(Arc::clone(&storage));
    let count = pipeline.import(&file).await.unwrap();

    assert_eq!(count, 3);
    assert_eq!(storage.count_by_ident("access.log").await.unwrap(), 3);

    let records = storage.records_by_ident("access.log").await.unwrap();
    assert_eq!(records[0].resource, "GET /a");
    assert_eq!(records[0].timestamp_utc, 1_578_644_100);
    assert_eq!(records[2].resource, "GET /c");
}

#[tokio::test]
async fn reimport_replaces_prior_batch() {
    let storage = memory_storage().await;
    let dir = tempfile::tempdir().unwrap();
    let file = write_file(dir.path(), "access.log", ACCESS_LOG);

    let pipeline = pipeline_without_geo(Arc::clone(&storage));
    let first = pipeline.import(&file).await.unwrap();
    let second = pipeline.import(&file).await.unwrap();

    // same count both times, same final record set: replace, not append
    assert_eq!(first, 3);
    assert_eq!(second, 3);
    assert_eq!(storage.count_by_ident("access.log").await.unwrap(), 3);
}

#[tokio::test]
async fn malformed_lines_count_with_zero_valued_fields() {
    let storage = memory_storage().await;
    let dir = tempfile::tempdir().unwrap();
    let content = concat!(
        "203.0.113.5 - - [10/Jan/2020:08:15:00 +0000] \"GET /a\"\n",
        "\n",
        "complete garbage\n",
    );
    let file = write_file(dir.path(), "mixed.log", content);

    let pipeline = pipeline_without_geo(Arc::clone(&storage));
    let count = pipeline.import(&file).await.unwrap();

    // the blank line is skipped, the garbage line still consumed a row
    assert_eq!(count, 2);

    let records = storage.records_by_ident("mixed.log").await.unwrap();
    assert_eq!(records[1].resource, "");
    assert_eq!(records[1].timestamp_utc, 0);
    assert_eq!(records[1].country, None);
}

#[tokio::test]
async fn missing_file_is_path_not_found() {
    let storage = memory_storage().await;
    let pipeline = pipeline_without_geo(storage);

    let err = pipeline
        .import(Path::new("/nonexistent/access.log"))
        .await
        .unwrap_err();
    assert!(matches!(err, ImportError::PathNotFound(_)));
}

#[tokio::test]
async fn import_enriches_countries_from_geo_ranges() {
    let storage = memory_storage().await;
    let dir = tempfile::tempdir().unwrap();

    // 1.0.0.0/24 and 203.0.113.0/24 as integer ranges
    let geo = write_file(
        dir.path(),
        "ranges.csv",
        "16777216,16777471,AU\n3405803776,3405804031,NL\n",
    );
    let content = concat!(
        "1.0.0.1 - - [10/Jan/2020:08:15:00 +0000] \"GET /a\"\n",
        "203.0.113.5 - - [10/Jan/2020:08:20:00 +0000] \"GET /b\"\n",
        "8.8.8.8 - - [10/Jan/2020:08:25:00 +0000] \"GET /c\"\n",
    );
    let file = write_file(dir.path(), "geo.log", content);

    let pipeline = ImportPipeline::new(Arc::clone(&storage), geo);
    pipeline.import(&file).await.unwrap();

    let records = storage.records_by_ident("geo.log").await.unwrap();
    assert_eq!(records[0].country.as_deref(), Some("AU"));
    assert_eq!(records[1].country.as_deref(), Some("NL"));
    assert_eq!(records[2].country, None);
}

#[tokio::test]
async fn missing_geo_dataset_degrades_to_no_country() {
    let storage = memory_storage().await;
    let dir = tempfile::tempdir().unwrap();
    let file = write_file(dir.path(), "access.log", ACCESS_LOG);

    let pipeline = pipeline_without_geo(Arc::clone(&storage));
    let count = pipeline.import(&file).await.unwrap();

    assert_eq!(count, 3);
    let records = storage.records_by_ident("access.log").await.unwrap();
    assert!(records.iter().all(|r| r.country.is_none()));
}

#[tokio::test]
async fn directory_import_isolates_per_file_failures() {
    let storage = memory_storage().await;
    let dir = tempfile::tempdir().unwrap();

    write_file(dir.path(), "good.log", ACCESS_LOG);
    write_file(dir.path(), "skip.txt", ACCESS_LOG);
    // a directory with the .log suffix passes the filter but cannot be
    // read as a file, standing in for an unreadable entry
    std::fs::create_dir(dir.path().join("bad.log")).unwrap();

    let pipeline = pipeline_without_geo(Arc::clone(&storage));
    let imported = pipeline.import_dir(dir.path()).await.unwrap();

    assert_eq!(imported.len(), 1);
    let (path, count) = &imported[0];
    assert!(path.ends_with("good.log"));
    assert_eq!(*count, 3);

    // the good file's batch landed despite the bad entry
    assert_eq!(storage.count_by_ident("good.log").await.unwrap(), 3);
    // the non-matching suffix was skipped silently
    assert_eq!(storage.count_by_ident("skip.txt").await.unwrap(), 0);
}

#[tokio::test]
async fn missing_directory_is_path_not_found() {
    let storage = memory_storage().await;
    let pipeline = pipeline_without_geo(storage);

    let err = pipeline
        .import_dir(Path::new("/nonexistent/logs"))
        .await
        .unwrap_err();
    assert!(matches!(err, ImportError::PathNotFound(_)));
}
