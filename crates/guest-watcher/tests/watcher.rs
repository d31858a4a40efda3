//! Watcher and supervisor behaviour against an in-memory store.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use guest_watcher::supervise::supervise;
use guest_watcher::{ArtifactWatcher, ObjectHandle, ObjectStore, StoreError, WatcherConfig, WatcherError};
use tokio_util::sync::CancellationToken;

/// Records uploads; files named in `fail` are rejected, and every upload
/// waits `delay` first.
#[derive(Default)]
struct MemoryStore {
    fail: Vec<&'static str>,
    delay: Duration,
    uploaded: Mutex<Vec<(String, Vec<u8>)>>,
}

impl MemoryStore {
    fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .uploaded
            .lock()
            .unwrap()
            .iter()
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn upload(&self, path: &Path, key: &str) -> Result<ObjectHandle, StoreError> {
        tokio::time::sleep(self.delay).await;
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        if self.fail.contains(&name.as_str()) {
            return Err(StoreError::Status {
                status: 500,
                body: "InternalError".into(),
            });
        }
        let data = tokio::fs::read(path).await.map_err(|source| StoreError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        self.uploaded.lock().unwrap().push((name, data));
        Ok(ObjectHandle {
            bucket: "memory".into(),
            key: key.to_string(),
        })
    }

    async fn presign(&self, handle: &ObjectHandle, ttl: Duration) -> Result<String, StoreError> {
        Ok(format!(
            "https://store.test/{}/{}?expires={}",
            handle.bucket,
            handle.key,
            ttl.as_secs()
        ))
    }
}

fn config(dir: &Path) -> WatcherConfig {
    WatcherConfig {
        watch_dir: dir.to_path_buf(),
        poll_interval: Duration::from_millis(50),
        ..WatcherConfig::default()
    }
}

fn sh(script: &str) -> Vec<String> {
    vec!["sh".into(), "-c".into(), script.into()]
}

async fn run_script(dir: &Path, store: Arc<MemoryStore>, script: &str) -> (i32, Vec<String>) {
    let mut out = Vec::new();
    let code = supervise(&sh(script), config(dir), store, &mut out)
        .await
        .unwrap();
    let stdout = String::from_utf8(out).unwrap();
    assert!(stdout.starts_with(report_proto::MARKER), "{stdout}");
    (code, report_proto::parse_report(&stdout))
}

#[tokio::test]
async fn each_qualifying_file_yields_one_url() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryStore::default());

    let (code, urls) = run_script(
        dir.path(),
        store.clone(),
        "echo a > a.txt; echo b > b.csv; printf 'png' > c.png; \
         echo x > debug.log; echo y > .hidden; mkdir sub; echo z > sub/inner.txt",
    )
    .await;

    assert_eq!(code, 0);
    assert_eq!(urls.len(), 3, "{urls:?}");
    assert_eq!(store.names(), vec!["a.txt", "b.csv", "c.png"]);
    for url in &urls {
        assert!(url.starts_with("https://store.test/memory/"), "{url}");
        assert!(url.ends_with("?expires=10800"), "{url}");
    }
    let pngs: Vec<_> = urls.iter().filter(|u| u.contains(".png?")).collect();
    assert_eq!(pngs.len(), 1);

    let uploaded = store.uploaded.lock().unwrap();
    let png = uploaded.iter().find(|(n, _)| n == "c.png").unwrap();
    assert_eq!(png.1, b"png");
}

#[tokio::test]
async fn failed_upload_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryStore {
        fail: vec!["bad.txt"],
        ..MemoryStore::default()
    });

    let (code, urls) = run_script(
        dir.path(),
        store.clone(),
        "echo ok > good.txt; echo no > bad.txt",
    )
    .await;

    assert_eq!(code, 0);
    assert_eq!(urls.len(), 1, "{urls:?}");
    assert_eq!(store.names(), vec!["good.txt"]);
}

#[tokio::test]
async fn exit_code_is_passed_through_with_empty_report() {
    let dir = tempfile::tempdir().unwrap();
    let (code, urls) = run_script(
        dir.path(),
        Arc::new(MemoryStore::default()),
        "echo boom >&2; exit 3",
    )
    .await;
    assert_eq!(code, 3);
    assert!(urls.is_empty());
    let leftovers: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
    assert!(leftovers.is_empty(), "{leftovers:?}");
}

#[tokio::test]
async fn same_code_twice_gives_distinct_urls() {
    let script = "echo hello > result.txt";
    let first_dir = tempfile::tempdir().unwrap();
    let second_dir = tempfile::tempdir().unwrap();

    let (_, first) = run_script(first_dir.path(), Arc::new(MemoryStore::default()), script).await;
    let (_, second) = run_script(second_dir.path(), Arc::new(MemoryStore::default()), script).await;

    assert_eq!(first.len(), 1);
    assert_eq!(second.len(), 1);
    assert_ne!(first, second);
}

#[tokio::test]
async fn leftover_done_file_does_not_end_the_run_early() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join(".done"), b"").unwrap();
    let (_, urls) = run_script(
        dir.path(),
        Arc::new(MemoryStore::default()),
        "sleep 0.3; echo late > late.txt",
    )
    .await;
    assert_eq!(urls.len(), 1, "{urls:?}");
}

#[tokio::test]
async fn done_file_written_by_user_code_does_not_end_the_watch() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryStore::default());
    let (code, urls) = run_script(
        dir.path(),
        store.clone(),
        "touch .done; sleep 0.5; echo a > a.txt; echo b > b.csv",
    )
    .await;
    assert_eq!(code, 0);
    assert_eq!(urls.len(), 2, "{urls:?}");
    assert_eq!(store.names(), vec!["a.txt", "b.csv"]);
}

#[tokio::test]
async fn background_processes_are_killed_before_report() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryStore::default());
    let started = Instant::now();

    let (code, urls) = run_script(
        dir.path(),
        store.clone(),
        "(sleep 3; echo late > late.txt) & echo now > now.txt",
    )
    .await;

    assert_eq!(code, 0);
    assert!(started.elapsed() < Duration::from_secs(3));
    assert_eq!(urls.len(), 1);
    tokio::time::sleep(Duration::from_secs(4)).await;
    assert!(!dir.path().join("late.txt").exists());
}

#[tokio::test]
async fn empty_command_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let mut out = Vec::new();
    let err = supervise(&[], config(dir.path()), Arc::new(MemoryStore::default()), &mut out)
        .await
        .unwrap_err();
    assert!(matches!(err, WatcherError::EmptyCommand));
    assert!(out.is_empty());
}

#[tokio::test]
async fn missing_program_is_spawn_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut out = Vec::new();
    let err = supervise(
        &["/nonexistent/python3".to_string()],
        config(dir.path()),
        Arc::new(MemoryStore::default()),
        &mut out,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, WatcherError::Spawn { .. }), "{err}");
}

#[tokio::test]
async fn missing_watch_dir_is_rejected() {
    let cfg = config(&PathBuf::from("/nonexistent/watch-dir"));
    let err = ArtifactWatcher::new(cfg, Arc::new(MemoryStore::default()))
        .start(CancellationToken::new())
        .err()
        .unwrap();
    assert!(matches!(err, WatcherError::MissingDir(_)));
}

#[tokio::test]
async fn standalone_watch_ends_on_external_sentinel() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryStore::default());
    let watch = ArtifactWatcher::new(config(dir.path()), store.clone())
        .start(CancellationToken::new())
        .unwrap();

    std::fs::write(dir.path().join("table.csv"), b"a,b\n1,2\n").unwrap();
    std::fs::write(dir.path().join("Thumbs.db"), b"junk").unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    std::fs::write(dir.path().join(".done"), b"").unwrap();

    let urls = watch.finish().await;
    assert_eq!(urls.len(), 1);
    assert_eq!(store.names(), vec!["table.csv"]);
}

#[tokio::test]
async fn file_renamed_into_dir_is_uploaded() {
    let dir = tempfile::tempdir().unwrap();
    let staging = tempfile::tempdir_in(dir.path().parent().unwrap()).unwrap();
    let store = Arc::new(MemoryStore::default());
    let cancel = CancellationToken::new();
    let watch = ArtifactWatcher::new(config(dir.path()), store.clone())
        .start(cancel.clone())
        .unwrap();

    let src = staging.path().join("report.pdf.part");
    std::fs::write(&src, b"%PDF").unwrap();
    std::fs::rename(&src, dir.path().join("report.pdf")).unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;
    cancel.cancel();

    let urls = watch.finish().await;
    assert_eq!(urls.len(), 1, "{urls:?}");
    assert!(urls[0].contains(".pdf?"));
}

#[tokio::test]
async fn slow_uploads_are_abandoned_after_drain_window() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryStore {
        delay: Duration::from_secs(30),
        ..MemoryStore::default()
    });
    let cfg = WatcherConfig {
        drain_window: Duration::from_millis(200),
        ..config(dir.path())
    };
    let cancel = CancellationToken::new();
    let watch = ArtifactWatcher::new(cfg, store.clone())
        .start(cancel.clone())
        .unwrap();

    std::fs::write(dir.path().join("big.bin"), b"0000").unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    let started = Instant::now();
    cancel.cancel();

    let urls = watch.finish().await;
    assert!(urls.is_empty());
    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(store.names().is_empty());
}
