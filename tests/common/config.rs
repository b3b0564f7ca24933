//! Test configuration helpers for creating services in temporary directories

use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

use browser_dl::{Config, Database, DownloadService};

use super::Fakes;

/// A running service with everything it writes kept inside a temp dir
pub struct TestEnv {
    pub temp: TempDir,
    pub config: Config,
    pub db: Arc<Database>,
    pub fakes: Fakes,
    pub service: DownloadService,
}

impl TestEnv {
    pub fn download_dir(&self) -> PathBuf {
        self.config.download.download_dir.clone()
    }
}

/// Configuration rooted at `temp`
pub fn test_config(temp: &TempDir) -> Config {
    let mut config = Config::default();
    config.download.download_dir = temp.path().join("downloads");
    config.download.documents_dir = temp.path().join("documents");
    config.persistence.database_path = temp.path().join("history.db");
    config
}

/// Start a service in a fresh temp dir
pub async fn start_service(customize: impl FnOnce(&mut Config), fakes: Fakes) -> TestEnv {
    let temp = tempfile::tempdir().expect("failed to create temp dir");
    start_service_in(temp, customize, fakes).await
}

/// Start a service in an existing temp dir (reusing its database)
pub async fn start_service_in(
    temp: TempDir,
    customize: impl FnOnce(&mut Config),
    fakes: Fakes,
) -> TestEnv {
    let mut config = test_config(&temp);
    customize(&mut config);
    std::fs::create_dir_all(&config.download.documents_dir).expect("failed to create documents dir");

    let db = Arc::new(
        Database::new(&config.persistence.database_path)
            .await
            .expect("failed to open database"),
    );
    let service = DownloadService::with_collaborators(config.clone(), fakes.collaborators(db.clone()))
        .expect("failed to start service");

    TestEnv {
        temp,
        config,
        db,
        fakes,
        service,
    }
}
