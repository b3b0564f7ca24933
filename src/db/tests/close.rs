use super::*;
use tempfile::NamedTempFile;

/// Querying after the pool is closed returns an error rather than hanging
#[tokio::test]
async fn test_get_download_after_pool_close_returns_error() {
    let temp_file = NamedTempFile::new().unwrap();
    let db = Database::new(temp_file.path()).await.unwrap();

    let handle = db
        .insert_download(&record("http://x/a", 10, DownloadState::Complete))
        .await
        .unwrap();
    assert!(db.get_download(handle).await.unwrap().is_some());

    db.pool().close().await;

    let result = db.get_download(handle).await;
    assert!(
        result.is_err(),
        "get_download after pool close should return an error, got: {:?}",
        result
    );
}

#[tokio::test]
async fn test_insert_after_pool_close_returns_error() {
    let temp_file = NamedTempFile::new().unwrap();
    let db = Database::new(temp_file.path()).await.unwrap();

    db.pool().close().await;

    let result = db
        .insert_download(&record("http://x/a", 10, DownloadState::InProgress))
        .await;
    assert!(matches!(
        result,
        Err(crate::Error::Database(crate::error::DatabaseError::QueryFailed(_)))
    ));
}
