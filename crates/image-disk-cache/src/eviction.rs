//! Budget-driven eviction
//!
//! [`EvictionTrigger`] counts completed insertions and, every
//! [`SWEEP_THRESHOLD`] of them, posts a sweep request to the [`Sweeper`]
//! task. A sweep walks the whole tree and, when it exceeds the budget,
//! deletes least-recently-touched files until usage is at 90% of budget.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::SystemTime;
use tokio::fs;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Completed insertions between sweep requests
pub const SWEEP_THRESHOLD: u32 = 50;

/// Counts insertions and requests a sweep every `threshold` of them
pub struct EvictionTrigger {
    count: AtomicU32,
    threshold: u32,
    requests: mpsc::Sender<()>,
}

impl EvictionTrigger {
    pub fn new(threshold: u32, requests: mpsc::Sender<()>) -> Self {
        Self {
            count: AtomicU32::new(0),
            threshold: threshold.max(1),
            requests,
        }
    }

    /// Record one insertion. Returns true when this call reset the counter
    /// and posted a sweep request.
    pub fn record_insert(&self) -> bool {
        let threshold = self.threshold;
        let previous = self
            .count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |c| {
                Some(if c + 1 >= threshold { 0 } else { c + 1 })
            })
            .unwrap_or(0);

        if previous + 1 < threshold {
            return false;
        }

        // A full channel means a sweep is already queued
        if self.requests.try_send(()).is_err() {
            debug!("Sweep already pending");
        }
        true
    }

    pub fn pending(&self) -> u32 {
        self.count.load(Ordering::Acquire)
    }
}

/// Outcome of one sweep
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub scanned_files: usize,
    pub total_bytes: u64,
    pub removed_files: usize,
    pub removed_bytes: u64,
}

struct CachedFile {
    path: PathBuf,
    size: u64,
    modified: SystemTime,
}

/// Background task that runs a sweep per request until every sender is gone
pub struct Sweeper {
    root: PathBuf,
    budget: u64,
    requests: mpsc::Receiver<()>,
}

impl Sweeper {
    pub fn new(root: PathBuf, budget: u64, requests: mpsc::Receiver<()>) -> Self {
        Self {
            root,
            budget,
            requests,
        }
    }

    pub async fn run(mut self) {
        while self.requests.recv().await.is_some() {
            let root = self.root.clone();
            let budget = self.budget;

            // Run each sweep as its own task so a panic cannot take the loop down
            match tokio::spawn(async move { sweep(&root, budget).await }).await {
                Ok(Ok(report)) => info!(
                    scanned = report.scanned_files,
                    total_bytes = report.total_bytes,
                    removed = report.removed_files,
                    removed_bytes = report.removed_bytes,
                    "Image cache sweep finished"
                ),
                Ok(Err(e)) => error!(error = %e, "Image cache sweep failed"),
                Err(e) => error!(error = %e, "Image cache sweep task aborted"),
            }
        }
        debug!("Sweeper stopped");
    }
}

/// Walk `root` and, if it holds more than `budget` bytes, delete the oldest
/// files until at most 90% of `budget` remains.
///
/// Files that vanish during the walk are skipped. Individual deletion
/// failures are logged and do not stop the sweep.
pub async fn sweep(root: &Path, budget: u64) -> std::io::Result<SweepReport> {
    let mut files = collect_files(root).await?;
    let total_bytes: u64 = files.iter().map(|f| f.size).sum();

    let mut report = SweepReport {
        scanned_files: files.len(),
        total_bytes,
        ..SweepReport::default()
    };

    if total_bytes <= budget {
        return Ok(report);
    }

    let target = budget - budget / 10;
    let to_free = total_bytes - target;
    files.sort_by_key(|f| f.modified);

    for file in files {
        if report.removed_bytes >= to_free {
            break;
        }
        match fs::remove_file(&file.path).await {
            Ok(()) => {
                report.removed_files += 1;
                report.removed_bytes += file.size;
                debug!(path = ?file.path, size = file.size, "Evicted image");
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                // Already gone; its bytes no longer count against the budget
                report.removed_bytes += file.size;
            }
            Err(e) => warn!(path = ?file.path, error = %e, "Failed to evict image"),
        }
    }

    Ok(report)
}

async fn collect_files(root: &Path) -> std::io::Result<Vec<CachedFile>> {
    let mut files = Vec::new();
    let mut dirs = vec![root.to_path_buf()];

    while let Some(dir) = dirs.pop() {
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => continue,
            Err(e) if dir != root => {
                warn!(dir = ?dir, error = %e, "Skipping unreadable cache directory");
                continue;
            }
            Err(e) => return Err(e),
        };

        while let Some(entry) = entries.next_entry().await? {
            let meta = match entry.metadata().await {
                Ok(meta) => meta,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => {
                    warn!(path = ?entry.path(), error = %e, "Skipping unreadable cache entry");
                    continue;
                }
            };

            if meta.is_dir() {
                dirs.push(entry.path());
            } else if meta.is_file() {
                files.push(CachedFile {
                    path: entry.path(),
                    size: meta.len(),
                    modified: meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
                });
            }
        }
    }

    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::tempdir;

    fn write_aged(path: &Path, size: usize, age_secs: u64) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, vec![0u8; size]).unwrap();
        let file = std::fs::OpenOptions::new().write(true).open(path).unwrap();
        file.set_modified(SystemTime::now() - Duration::from_secs(age_secs))
            .unwrap();
    }

    #[tokio::test]
    async fn test_trigger_fires_every_threshold() {
        let (tx, mut rx) = mpsc::channel(1);
        let trigger = EvictionTrigger::new(3, tx);

        assert!(!trigger.record_insert());
        assert!(!trigger.record_insert());
        assert!(trigger.record_insert());
        assert_eq!(trigger.pending(), 0);
        assert!(rx.try_recv().is_ok());

        assert!(!trigger.record_insert());
        assert_eq!(trigger.pending(), 1);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_trigger_coalesces_pending_requests() {
        let (tx, mut rx) = mpsc::channel(1);
        let trigger = EvictionTrigger::new(1, tx);

        assert!(trigger.record_insert());
        assert!(trigger.record_insert());
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_sweep_under_budget_removes_nothing() {
        let dir = tempdir().unwrap();
        write_aged(&dir.path().join("w500/a.jpg"), 100, 10);

        let report = sweep(dir.path(), 1_000).await.unwrap();
        assert_eq!(report.scanned_files, 1);
        assert_eq!(report.total_bytes, 100);
        assert_eq!(report.removed_files, 0);
        assert!(dir.path().join("w500/a.jpg").exists());
    }

    #[tokio::test]
    async fn test_sweep_removes_oldest_first_down_to_ninety_percent() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        // 5 x 300 bytes = 1500 over a 1000 byte budget; target is 900
        write_aged(&root.join("w500/oldest.jpg"), 300, 500);
        write_aged(&root.join("w92/older.jpg"), 300, 400);
        write_aged(&root.join("w500/old.jpg"), 300, 300);
        write_aged(&root.join("original/new.jpg"), 300, 200);
        write_aged(&root.join("w92/newest.jpg"), 300, 100);

        let report = sweep(root, 1_000).await.unwrap();

        assert_eq!(report.total_bytes, 1_500);
        assert_eq!(report.removed_files, 2);
        assert_eq!(report.removed_bytes, 600);
        assert!(!root.join("w500/oldest.jpg").exists());
        assert!(!root.join("w92/older.jpg").exists());
        assert!(root.join("w500/old.jpg").exists());
        assert!(root.join("original/new.jpg").exists());
        assert!(root.join("w92/newest.jpg").exists());

        let after = sweep(root, 1_000).await.unwrap();
        assert!(after.total_bytes <= 1_000);
        assert_eq!(after.removed_files, 0);
    }

    #[tokio::test]
    async fn test_sweep_missing_root_is_empty() {
        let dir = tempdir().unwrap();
        let report = sweep(&dir.path().join("absent"), 10).await.unwrap();
        assert_eq!(report, SweepReport::default());
    }

    #[tokio::test]
    async fn test_sweeper_runs_on_request_and_stops_when_senders_drop() {
        let dir = tempdir().unwrap();
        write_aged(&dir.path().join("w500/a.jpg"), 200, 50);
        write_aged(&dir.path().join("w500/b.jpg"), 200, 10);

        let (tx, rx) = mpsc::channel(1);
        let handle = tokio::spawn(Sweeper::new(dir.path().to_path_buf(), 300, rx).run());

        tx.send(()).await.unwrap();
        drop(tx);
        handle.await.unwrap();

        assert!(!dir.path().join("w500/a.jpg").exists());
        assert!(dir.path().join("w500/b.jpg").exists());
    }
}
