use super::*;
use tempfile::NamedTempFile;

#[tokio::test]
async fn test_database_creation() {
    let temp_file = NamedTempFile::new().unwrap();
    let db = Database::new(temp_file.path()).await.unwrap();

    let mut conn = db.pool.acquire().await.unwrap();
    let tables: Vec<String> =
        sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .fetch_all(&mut *conn)
            .await
            .unwrap();

    assert!(tables.contains(&"downloads".to_string()));
    assert!(tables.contains(&"schema_version".to_string()));
    assert!(tables.contains(&"runtime_state".to_string()));
    drop(conn);

    db.close().await;
}

#[tokio::test]
async fn test_reopen_keeps_data_and_skips_migration() {
    let temp_file = NamedTempFile::new().unwrap();

    let handle = {
        let db = Database::new(temp_file.path()).await.unwrap();
        let handle = db
            .insert_download(&record("http://x/a.zip", 100, DownloadState::Complete))
            .await
            .unwrap();
        db.close().await;
        handle
    };

    let db = Database::new(temp_file.path()).await.unwrap();
    let versions: Vec<i64> = sqlx::query_scalar("SELECT version FROM schema_version")
        .fetch_all(db.pool())
        .await
        .unwrap();
    assert_eq!(versions, vec![1], "migration must be recorded exactly once");
    assert!(db.get_download(handle).await.unwrap().is_some());

    db.close().await;
}

#[tokio::test]
async fn test_database_in_missing_directory_is_created() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("nested").join("history.db");

    let db = Database::new(&path).await.unwrap();
    assert!(path.exists());
    db.close().await;
}
