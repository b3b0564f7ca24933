//! Executable downloads: temporary names, approval and discarding

mod common;

use common::{Fakes, TestEnv, start_service, wait_for_completed, wait_for_event, wait_until};
use browser_dl::{DownloadCreateInfo, DownloadId, DownloadState, Event, SafetyState};

fn setup_exe(id: i32) -> DownloadCreateInfo {
    DownloadCreateInfo::new(
        DownloadId(id),
        "http://host/setup.exe",
        "application/octet-stream",
    )
}

fn is_unconfirmed(path: &std::path::Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with("unconfirmed ") && name.ends_with(".download"))
}

async fn finish_dangerous(env: &TestEnv) -> common::Completed {
    let mut events = env.service.subscribe();
    env.service.start_download(setup_exe(1)).unwrap();
    env.service.download_finished(DownloadId(1), 64).unwrap();
    wait_for_completed(&mut events).await
}

#[tokio::test]
async fn test_dangerous_download_waits_under_temporary_name() {
    let env = start_service(|_| {}, Fakes::default()).await;
    let completed = finish_dangerous(&env).await;

    assert!(is_unconfirmed(&completed.path), "got {}", completed.path.display());
    assert_eq!(completed.path.parent(), Some(env.download_dir().as_path()));

    let downloads = env.service.downloads().await.unwrap();
    assert_eq!(downloads.len(), 1);
    assert_eq!(downloads[0].safety_state, SafetyState::Dangerous);
    assert_eq!(downloads[0].display_name, std::path::PathBuf::from("setup.exe"));
    assert_eq!(downloads[0].state, DownloadState::Complete);

    // Neither opened automatically nor on request while unapproved
    assert!(env.service.open_download(completed.key).await.is_err());
    assert!(env.fakes.opened().is_empty());

    env.service.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_validated_download_is_moved_to_true_name() {
    let env = start_service(|_| {}, Fakes::default()).await;
    let completed = finish_dangerous(&env).await;
    let mut events = env.service.subscribe();

    env.service
        .validate_dangerous_download(completed.key)
        .await
        .unwrap();

    let expected = env.download_dir().join("setup.exe");
    let renamed = wait_for_event(&mut events, |e| {
        matches!(e, Event::DownloadUpdated(s) if s.full_path == expected)
    })
    .await;
    assert!(renamed.is_some(), "download was never renamed");
    assert!(expected.exists());
    assert!(!completed.path.exists());

    let snapshot = env.service.downloads().await.unwrap().remove(0);
    assert_eq!(snapshot.safety_state, SafetyState::DangerousButValidated);
    env.service.open_download(completed.key).await.unwrap();

    env.service.shutdown().await.unwrap();

    let record = env.db.get_download(completed.db_handle).await.unwrap().unwrap();
    assert_eq!(record.full_path, expected);
    assert_eq!(env.fakes.opened(), vec![expected]);
}

#[tokio::test]
async fn test_validated_download_avoids_existing_file() {
    let env = start_service(|_| {}, Fakes::default()).await;
    let completed = finish_dangerous(&env).await;
    std::fs::write(env.download_dir().join("setup.exe"), b"other").unwrap();
    let mut events = env.service.subscribe();

    env.service
        .validate_dangerous_download(completed.key)
        .await
        .unwrap();

    let expected = env.download_dir().join("setup (1).exe");
    assert!(
        wait_for_event(&mut events, |e| {
            matches!(e, Event::DownloadUpdated(s) if s.full_path == expected)
        })
        .await
        .is_some()
    );
    assert_eq!(
        std::fs::read(env.download_dir().join("setup.exe")).unwrap(),
        b"other"
    );

    env.service.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_discarded_download_is_deleted_everywhere() {
    let env = start_service(|_| {}, Fakes::default()).await;
    let completed = finish_dangerous(&env).await;

    env.service
        .discard_dangerous_download(completed.key)
        .await
        .unwrap();
    assert!(env.service.downloads().await.unwrap().is_empty());

    let path = completed.path.clone();
    assert!(wait_until(|| {
        let path = path.clone();
        async move { !path.exists() }
    })
    .await);

    env.service.shutdown().await.unwrap();
    assert!(env.db.get_download(completed.db_handle).await.unwrap().is_none());
    assert_eq!(env.fakes.deleted(), vec![completed.path]);
}

#[tokio::test]
async fn test_shutdown_discards_unapproved_downloads() {
    let env = start_service(|_| {}, Fakes::default()).await;
    let completed = finish_dangerous(&env).await;

    let report = env.service.shutdown().await.unwrap();
    assert_eq!(report.discarded_dangerous, 1);
    assert_eq!(report.cancelled, 0);

    assert!(!completed.path.exists());
    assert!(env.db.get_download(completed.db_handle).await.unwrap().is_none());
}

#[tokio::test]
async fn test_validating_safe_download_is_rejected() {
    let env = start_service(|_| {}, Fakes::default()).await;
    let mut events = env.service.subscribe();

    let info = DownloadCreateInfo::new(DownloadId(1), "http://host/notes.txt", "text/plain");
    env.service.start_download(info).unwrap();
    env.service.download_finished(DownloadId(1), 3).unwrap();
    let completed = wait_for_completed(&mut events).await;

    assert!(
        env.service
            .validate_dangerous_download(completed.key)
            .await
            .is_err()
    );
    assert!(
        env.service
            .discard_dangerous_download(completed.key)
            .await
            .is_err()
    );

    env.service.shutdown().await.unwrap();
}
