//! Directory crawler
//!
//! Walks a directory tree on a fixed pool of worker threads and queues every
//! indexable file the store doesn't already hold.
//!
//! Workers share a deque of pending directories. A worker hands a newly found
//! sub-directory to the shared deque only while some other worker is idle;
//! otherwise it keeps the directory on its own local stack and walks it
//! itself. Thread count stays fixed no matter how wide the tree is.
//!
//! The crawl ends when every worker is idle and the shared deque is empty.

use crate::audio::AudioFormat;
use crate::db::Store;
use crate::error::{Error, Result, ScanError};
use crate::models::{CrawlStats, DiscoveredFile};
use crate::queue::HandoffQueue;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Check that `root` exists and is a directory
pub fn validate_root(root: &Path) -> std::result::Result<(), ScanError> {
    match std::fs::metadata(root) {
        Ok(metadata) if metadata.is_dir() => Ok(()),
        Ok(_) => Err(ScanError::NotADirectory(root.to_path_buf())),
        Err(_) => Err(ScanError::PathNotFound(root.to_path_buf())),
    }
}

/// Bounded-pool recursive crawler
pub struct Crawler {
    store: Store,
    runtime: Handle,
    workers: usize,
    cancel: CancellationToken,
}

impl Crawler {
    /// `runtime` drives the store's existence checks from the worker threads
    pub fn new(store: Store, runtime: Handle, workers: usize, cancel: CancellationToken) -> Self {
        Self {
            store,
            runtime,
            workers: workers.max(1),
            cancel,
        }
    }

    /// Walk `root` and push every unindexed candidate file onto `out`
    ///
    /// Blocks until all workers have finished. Directory listing failures are
    /// logged and counted; a store failure stops every worker and is returned.
    /// Does not touch `out`'s producing flag.
    pub fn crawl(&self, root: &Path, out: &HandoffQueue<DiscoveredFile>) -> Result<CrawlStats> {
        validate_root(root)?;

        let pool = WorkerPool::new(self.workers, root.to_path_buf());
        debug!(root = %root.display(), workers = self.workers, "Starting crawl");

        let results: Vec<thread::Result<CrawlStats>> = thread::scope(|scope| {
            let handles: Vec<_> = (0..self.workers)
                .map(|_| scope.spawn(|| self.run_worker(&pool, out)))
                .collect();
            handles.into_iter().map(|h| h.join()).collect()
        });

        let mut stats = CrawlStats::default();
        let mut panicked = 0;
        for result in results {
            match result {
                Ok(worker_stats) => stats.merge(&worker_stats),
                Err(_) => panicked += 1,
            }
        }

        if let Some(err) = pool.take_failure() {
            return Err(err);
        }
        if panicked > 0 {
            return Err(Error::Internal(format!("{} crawl worker(s) panicked", panicked)));
        }

        info!(
            "Crawl finished: {} directories, {} files seen, {} queued, {} already indexed",
            stats.directories, stats.files_seen, stats.files_queued, stats.already_indexed
        );

        Ok(stats)
    }

    fn run_worker(&self, pool: &WorkerPool, out: &HandoffQueue<DiscoveredFile>) -> CrawlStats {
        // Stops the pool however this worker exits, so a panic can't leave
        // the remaining workers waiting for it to go idle.
        let _stop = StopOnExit(pool);

        let mut stats = CrawlStats::default();
        let mut local: Vec<PathBuf> = Vec::new();

        loop {
            let dir = match local.pop() {
                Some(dir) => dir,
                None => match pool.next_directory() {
                    Some(dir) => dir,
                    None => break,
                },
            };

            if self.cancel.is_cancelled() || pool.is_stopped() {
                break;
            }

            match self.walk_directory(&dir, out, &mut stats) {
                Ok(subdirs) => {
                    local.extend(subdirs);
                    pool.share(&mut local);
                }
                Err(err) => {
                    error!("Crawl aborted: {}", err);
                    pool.fail(err);
                    break;
                }
            }
        }

        stats
    }

    /// List one directory; returns its sub-directories
    fn walk_directory(
        &self,
        dir: &Path,
        out: &HandoffQueue<DiscoveredFile>,
        stats: &mut CrawlStats,
    ) -> Result<Vec<PathBuf>> {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(path = %dir.display(), error = %e, "Cannot list directory");
                stats.directory_errors += 1;
                return Ok(Vec::new());
            }
        };
        stats.directories += 1;

        let mut subdirs = Vec::new();
        for entry in entries {
            if self.cancel.is_cancelled() {
                break;
            }

            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(path = %dir.display(), error = %e, "Cannot read directory entry");
                    continue;
                }
            };

            // DirEntry::file_type does not follow symlinks, so links are
            // neither files nor directories here and get skipped.
            let file_type = match entry.file_type() {
                Ok(file_type) => file_type,
                Err(e) => {
                    warn!(path = %entry.path().display(), error = %e, "Cannot stat entry");
                    continue;
                }
            };

            let path = entry.path();
            if file_type.is_dir() {
                subdirs.push(path);
            } else if file_type.is_file() {
                stats.files_seen += 1;
                self.consider_file(path, out, stats)?;
            }
        }

        Ok(subdirs)
    }

    fn consider_file(
        &self,
        path: PathBuf,
        out: &HandoffQueue<DiscoveredFile>,
        stats: &mut CrawlStats,
    ) -> Result<()> {
        if !AudioFormat::from_path(&path).is_some_and(AudioFormat::is_indexed) {
            return Ok(());
        }

        let Some(file) = DiscoveredFile::new(path.clone()) else {
            // Can't store it without changing it, and a changed key would
            // never match on the next scan
            stats.skipped_non_utf8 += 1;
            warn!(path = %path.display(), "Skipping file with non-UTF-8 path");
            return Ok(());
        };

        if self.runtime.block_on(self.store.exists(&file.key))? {
            stats.already_indexed += 1;
            return Ok(());
        }

        out.push(file);
        stats.files_queued += 1;
        Ok(())
    }
}

struct PoolState {
    pending: VecDeque<PathBuf>,
    idle: usize,
    stopped: bool,
    failure: Option<Error>,
}

/// Shared pending-directory deque plus idle accounting
struct WorkerPool {
    workers: usize,
    state: Mutex<PoolState>,
    condvar: Condvar,
}

impl WorkerPool {
    fn new(workers: usize, root: PathBuf) -> Self {
        Self {
            workers,
            state: Mutex::new(PoolState {
                pending: VecDeque::from([root]),
                idle: 0,
                stopped: false,
                failure: None,
            }),
            condvar: Condvar::new(),
        }
    }

    /// Wait for a directory; `None` once the crawl is over
    fn next_directory(&self) -> Option<PathBuf> {
        let mut state = self.lock();
        state.idle += 1;
        loop {
            if state.stopped {
                return None;
            }
            if let Some(dir) = state.pending.pop_front() {
                state.idle -= 1;
                return Some(dir);
            }
            if state.idle == self.workers {
                // Nobody is busy, so nobody can produce more work
                state.stopped = true;
                self.condvar.notify_all();
                return None;
            }
            state = self
                .condvar
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Move directories from `local` to idle workers, oldest first
    fn share(&self, local: &mut Vec<PathBuf>) {
        if local.is_empty() {
            return;
        }
        let mut state = self.lock();
        let wanted = state.idle.saturating_sub(state.pending.len()).min(local.len());
        if wanted == 0 {
            return;
        }
        state.pending.extend(local.drain(..wanted));
        drop(state);
        for _ in 0..wanted {
            self.condvar.notify_one();
        }
    }

    fn is_stopped(&self) -> bool {
        self.lock().stopped
    }

    fn stop(&self) {
        self.lock().stopped = true;
        self.condvar.notify_all();
    }

    /// Record the first fatal error and stop everyone
    fn fail(&self, err: Error) {
        let mut state = self.lock();
        if state.failure.is_none() {
            state.failure = Some(err);
        }
        state.stopped = true;
        drop(state);
        self.condvar.notify_all();
    }

    fn take_failure(&self) -> Option<Error> {
        self.lock().failure.take()
    }

    fn lock(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

struct StopOnExit<'a>(&'a WorkerPool);

impl Drop for StopOnExit<'_> {
    fn drop(&mut self) {
        self.0.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Record;
    use std::fs;
    use tempfile::TempDir;

    async fn crawl_tree(
        store: &Store,
        root: PathBuf,
        workers: usize,
        cancel: CancellationToken,
    ) -> (Result<CrawlStats>, Vec<DiscoveredFile>) {
        let crawler = Crawler::new(store.clone(), Handle::current(), workers, cancel);
        tokio::task::spawn_blocking(move || {
            let queue = HandoffQueue::new();
            let result = crawler.crawl(&root, &queue);
            let mut found = Vec::new();
            while let Some(file) = queue.try_pop() {
                found.push(file);
            }
            (result, found)
        })
        .await
        .unwrap()
    }

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"x").unwrap();
    }

    #[test]
    fn test_validate_root() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("kick.wav");
        touch(&file);

        assert!(validate_root(dir.path()).is_ok());
        assert!(matches!(validate_root(&file), Err(ScanError::NotADirectory(_))));
        assert!(matches!(
            validate_root(&dir.path().join("missing")),
            Err(ScanError::PathNotFound(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_crawl_filters_extensions() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("kick.wav"));
        touch(&dir.path().join("LOOP.MP3"));
        touch(&dir.path().join("pad.flac"));
        touch(&dir.path().join("readme.txt"));
        touch(&dir.path().join("noext"));
        touch(&dir.path().join("sub/snare.wav"));

        let store = Store::open_in_memory().await.unwrap();
        let (result, found) =
            crawl_tree(&store, dir.path().to_path_buf(), 4, CancellationToken::new()).await;
        let stats = result.unwrap();

        let mut names: Vec<_> = found
            .iter()
            .map(|f| f.path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, vec!["LOOP.MP3", "kick.wav", "snare.wav"]);
        assert_eq!(stats.files_seen, 6);
        assert_eq!(stats.files_queued, 3);
        assert_eq!(stats.directories, 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_crawl_skips_indexed_paths() {
        let dir = TempDir::new().unwrap();
        let kick = dir.path().join("kick.wav");
        touch(&kick);
        touch(&dir.path().join("snare.wav"));

        let store = Store::open_in_memory().await.unwrap();
        store
            .insert_batch(&[Record::new(kick.to_str().unwrap(), "kick.wav", 1)])
            .await
            .unwrap();

        let (result, found) =
            crawl_tree(&store, dir.path().to_path_buf(), 2, CancellationToken::new()).await;
        let stats = result.unwrap();

        assert_eq!(found.len(), 1);
        assert!(found[0].key.ends_with("snare.wav"));
        assert_eq!(stats.already_indexed, 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_crawl_deep_and_wide_tree_with_few_workers() {
        let dir = TempDir::new().unwrap();
        let mut expected = 0;
        for branch in 0..20 {
            let mut path = dir.path().join(format!("b{}", branch));
            for depth in 0..15 {
                path = path.join(format!("d{}", depth));
                touch(&path.join(format!("s{}_{}.wav", branch, depth)));
                expected += 1;
            }
        }

        let store = Store::open_in_memory().await.unwrap();
        let (result, found) =
            crawl_tree(&store, dir.path().to_path_buf(), 3, CancellationToken::new()).await;
        let stats = result.unwrap();

        assert_eq!(found.len(), expected);
        assert_eq!(stats.directories, 1 + 20 + 20 * 15);

        // No file queued twice
        let mut keys: Vec<_> = found.iter().map(|f| f.key.clone()).collect();
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), expected);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_crawl_single_worker() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("a/b/c/one.wav"));
        touch(&dir.path().join("a/two.wav"));

        let store = Store::open_in_memory().await.unwrap();
        let (result, found) =
            crawl_tree(&store, dir.path().to_path_buf(), 1, CancellationToken::new()).await;

        assert!(result.is_ok());
        assert_eq!(found.len(), 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_unlistable_directory_does_not_stop_siblings() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("good/kick.wav"));
        touch(&dir.path().join("good/deeper/snare.wav"));
        let vanished = dir.path().join("vanished");
        let good = dir.path().join("good");

        let store = Store::open_in_memory().await.unwrap();
        let crawler = Crawler::new(store, Handle::current(), 1, CancellationToken::new());

        let (stats, found) = tokio::task::spawn_blocking(move || {
            // The unlistable directory is handed out first
            let pool = WorkerPool::new(1, vanished);
            pool.lock().pending.push_back(good);

            let queue = HandoffQueue::new();
            let stats = crawler.run_worker(&pool, &queue);
            let mut found = Vec::new();
            while let Some(file) = queue.try_pop() {
                found.push(file);
            }
            (stats, found)
        })
        .await
        .unwrap();

        assert_eq!(stats.directory_errors, 1);
        assert_eq!(stats.directories, 2);
        assert_eq!(stats.files_queued, 2);

        let mut names: Vec<_> = found
            .iter()
            .map(|f| f.path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, vec!["kick.wav", "snare.wav"]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_crawl_cancelled_before_start() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("kick.wav"));

        let cancel = CancellationToken::new();
        cancel.cancel();

        let store = Store::open_in_memory().await.unwrap();
        let (result, found) = crawl_tree(&store, dir.path().to_path_buf(), 4, cancel).await;

        assert!(result.is_ok());
        assert!(found.is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_crawl_store_failure_is_fatal() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("kick.wav"));

        let store = Store::open_in_memory().await.unwrap();
        store.close().await;

        let (result, found) =
            crawl_tree(&store, dir.path().to_path_buf(), 2, CancellationToken::new()).await;

        assert!(matches!(result, Err(Error::Store(_))));
        assert!(found.is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_crawl_missing_root() {
        let dir = TempDir::new().unwrap();
        let store = Store::open_in_memory().await.unwrap();

        let (result, _) =
            crawl_tree(&store, dir.path().join("nope"), 2, CancellationToken::new()).await;

        assert!(matches!(result, Err(Error::Scan(ScanError::PathNotFound(_)))));
    }

    #[cfg(unix)]
    #[tokio::test(flavor = "multi_thread")]
    async fn test_crawl_does_not_follow_symlinks() {
        let dir = TempDir::new().unwrap();
        let real = dir.path().join("real");
        touch(&real.join("kick.wav"));
        std::os::unix::fs::symlink(&real, dir.path().join("link")).unwrap();
        std::os::unix::fs::symlink(real.join("kick.wav"), dir.path().join("alias.wav")).unwrap();

        let store = Store::open_in_memory().await.unwrap();
        let (result, found) =
            crawl_tree(&store, dir.path().to_path_buf(), 2, CancellationToken::new()).await;

        assert!(result.is_ok());
        assert_eq!(found.len(), 1);
        assert!(found[0].key.ends_with("real/kick.wav"));
    }
}
