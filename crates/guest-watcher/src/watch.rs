//! Watches the working directory for files written by user code and uploads
//! each one to the object store.
//!
//! A file becomes pending when it is created (or renamed into the directory)
//! and is uploaded on its first close-after-write. Files renamed in are
//! already complete and upload at once. Anything still pending when the
//! completion sentinel appears is uploaded during the drain.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use guest_common::{log_debug, log_info, log_warn};
use notify::event::{AccessKind, AccessMode, CreateKind, ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;

use crate::config::WatcherConfig;
use crate::error::WatcherError;
use crate::filter::IgnoreFilter;
use crate::key::upload_key;
use crate::store::ObjectStore;

const LOG_TAG: &str = "watcher";

/// What a filesystem event means for the upload queue.
#[derive(Debug, PartialEq, Eq)]
enum Action {
    /// Remember the path until its writer closes it.
    Track(PathBuf),
    /// Upload now if the path is being tracked.
    Closed(PathBuf),
    /// Upload now regardless of tracking.
    Arrived(PathBuf),
}

fn classify(event: Event) -> Vec<Action> {
    match event.kind {
        EventKind::Create(CreateKind::Folder) => Vec::new(),
        EventKind::Create(_) => event.paths.into_iter().map(Action::Track).collect(),
        EventKind::Access(AccessKind::Close(AccessMode::Write)) => {
            event.paths.into_iter().map(Action::Closed).collect()
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
            event.paths.into_iter().map(Action::Arrived).collect()
        }
        // Both paths are reported: source first, destination last.
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            let mut paths = event.paths;
            paths.pop().map(Action::Arrived).into_iter().collect()
        }
        _ => Vec::new(),
    }
}

/// Upload one file and presign it. Failures are logged and yield `None`.
async fn upload_one(store: Arc<dyn ObjectStore>, path: PathBuf, ttl: Duration) -> Option<String> {
    match tokio::fs::metadata(&path).await {
        Ok(meta) if meta.is_file() => {}
        Ok(_) => return None,
        Err(e) => {
            log_warn!(LOG_TAG, "Skipping {}: {e}", path.display());
            return None;
        }
    }

    let key = upload_key(&path);
    log_info!(LOG_TAG, "Uploading {} as {key}", path.display());

    let handle = match store.upload(&path, &key).await {
        Ok(handle) => handle,
        Err(e) => {
            log_warn!(LOG_TAG, "Failed to upload {}: {e}", path.display());
            return None;
        }
    };
    match store.presign(&handle, ttl).await {
        Ok(url) => {
            log_info!(LOG_TAG, "Uploaded {}", path.display());
            Some(url)
        }
        Err(e) => {
            log_warn!(LOG_TAG, "Failed to presign {}: {e}", handle.key);
            None
        }
    }
}

pub struct ArtifactWatcher {
    config: WatcherConfig,
    store: Arc<dyn ObjectStore>,
    filter: IgnoreFilter,
}

impl ArtifactWatcher {
    pub fn new(config: WatcherConfig, store: Arc<dyn ObjectStore>) -> Self {
        Self {
            config,
            store,
            filter: IgnoreFilter,
        }
    }

    /// Start observing the directory and return the running watch.
    ///
    /// Observation is active when this returns, so files created afterwards
    /// are never missed. The watch ends when the sentinel appears or
    /// `cancel` fires.
    pub fn start(mut self, cancel: CancellationToken) -> Result<WatchHandle, WatcherError> {
        if !self.config.watch_dir.is_dir() {
            return Err(WatcherError::MissingDir(self.config.watch_dir.clone()));
        }
        // Event paths are compared against this, so resolve symlinks once.
        self.config.watch_dir = std::fs::canonicalize(&self.config.watch_dir)?;
        let dir = &self.config.watch_dir;

        let (tx, rx) = mpsc::unbounded_channel();
        let mut fs_watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let _ = tx.send(res);
        })?;
        fs_watcher.watch(dir, RecursiveMode::NonRecursive)?;
        log_info!(LOG_TAG, "Watching for files in: {}", dir.display());

        let task = tokio::spawn(self.run(fs_watcher, rx, cancel));
        Ok(WatchHandle { task })
    }

    fn accepts(&self, path: &Path) -> bool {
        if path.parent() != Some(self.config.watch_dir.as_path()) {
            return false;
        }
        if self.filter.is_ignored_path(path) {
            log_debug!(LOG_TAG, "Skipping ignored file: {}", path.display());
            return false;
        }
        true
    }

    fn spawn_upload(&self, uploads: &mut JoinSet<Option<String>>, path: PathBuf) {
        uploads.spawn(upload_one(self.store.clone(), path, self.config.presign_ttl));
    }

    /// Returns true when the action reports the sentinel itself.
    fn apply(
        &self,
        action: Action,
        pending: &mut HashSet<PathBuf>,
        uploads: &mut JoinSet<Option<String>>,
    ) -> bool {
        match action {
            Action::Track(path) => {
                if path.file_name() == Some(std::ffi::OsStr::new(&self.config.sentinel)) {
                    return true;
                }
                if self.accepts(&path) {
                    log_debug!(LOG_TAG, "New file created: {}", path.display());
                    pending.insert(path);
                }
            }
            Action::Closed(path) => {
                if pending.remove(&path) {
                    self.spawn_upload(uploads, path);
                }
            }
            Action::Arrived(path) => {
                pending.remove(&path);
                if self.accepts(&path) {
                    self.spawn_upload(uploads, path);
                }
            }
        }
        false
    }

    /// Apply one notify result. Returns true once the sentinel was created.
    fn handle(
        &self,
        res: notify::Result<Event>,
        pending: &mut HashSet<PathBuf>,
        uploads: &mut JoinSet<Option<String>>,
    ) -> bool {
        match res {
            Ok(event) => {
                let mut sentinel = false;
                for action in classify(event) {
                    sentinel |= self.apply(action, pending, uploads);
                }
                sentinel
            }
            Err(e) => {
                log_warn!(LOG_TAG, "Watch error: {e}");
                false
            }
        }
    }

    async fn run(
        self,
        fs_watcher: RecommendedWatcher,
        mut rx: mpsc::UnboundedReceiver<notify::Result<Event>>,
        cancel: CancellationToken,
    ) -> Vec<String> {
        let sentinel = self.config.sentinel_path();
        let mut pending: HashSet<PathBuf> = HashSet::new();
        let mut uploads: JoinSet<Option<String>> = JoinSet::new();
        let mut urls = Vec::new();
        let mut poll = tokio::time::interval(self.config.poll_interval);

        let mut sentinel_event = false;
        loop {
            tokio::select! {
                Some(res) = rx.recv() => {
                    if self.handle(res, &mut pending, &mut uploads) {
                        log_info!(LOG_TAG, "Detected {}, finishing up", self.config.sentinel);
                        sentinel_event = true;
                        break;
                    }
                }
                Some(done) = uploads.join_next(), if !uploads.is_empty() => {
                    if let Ok(Some(url)) = done {
                        urls.push(url);
                    }
                }
                _ = poll.tick() => {
                    if tokio::fs::try_exists(&sentinel).await.unwrap_or(false) {
                        log_info!(LOG_TAG, "Detected {}, finishing up", self.config.sentinel);
                        break;
                    }
                }
                _ = cancel.cancelled() => {
                    log_info!(LOG_TAG, "Cancelled, finishing up");
                    break;
                }
            }
        }

        // Events are delivered in order, so everything before the sentinel's
        // own event has been seen once it arrives. Otherwise give in-flight
        // events one poll interval.
        if !sentinel_event {
            let grace = tokio::time::sleep(self.config.poll_interval);
            tokio::pin!(grace);
            loop {
                tokio::select! {
                    Some(res) = rx.recv() => {
                        if self.handle(res, &mut pending, &mut uploads) {
                            break;
                        }
                    }
                    _ = &mut grace => break,
                }
            }
        }

        // Stop observing, then take whatever was already queued.
        drop(fs_watcher);
        while let Ok(res) = rx.try_recv() {
            self.handle(res, &mut pending, &mut uploads);
        }
        for path in pending.drain() {
            self.spawn_upload(&mut uploads, path);
        }

        let deadline = tokio::time::Instant::now() + self.config.drain_window;
        while !uploads.is_empty() {
            match tokio::time::timeout_at(deadline, uploads.join_next()).await {
                Ok(Some(Ok(Some(url)))) => urls.push(url),
                Ok(Some(_)) => {}
                Ok(None) => break,
                Err(_) => {
                    log_warn!(
                        LOG_TAG,
                        "Drain window elapsed, abandoning {} upload(s)",
                        uploads.len()
                    );
                    uploads.abort_all();
                    break;
                }
            }
        }

        log_info!(LOG_TAG, "Collected {} artifact URL(s)", urls.len());
        urls
    }
}

/// A running watch.
pub struct WatchHandle {
    task: JoinHandle<Vec<String>>,
}

impl WatchHandle {
    /// Wait for the watch to end. URLs are in upload completion order.
    pub async fn finish(self) -> Vec<String> {
        match self.task.await {
            Ok(urls) => urls,
            Err(e) => {
                log_warn!(LOG_TAG, "Watch task failed: {e}");
                Vec::new()
            }
        }
    }
}
