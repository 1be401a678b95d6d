//! Cross-process concurrency limiter over lock files.
//!
//! Every process in the agent tree shares one lock directory. A slot is
//! a uniquely named file created with `O_EXCL`; the count of files in
//! the directory is the number of agents currently inside an LLM call.
//! Single-file create and unlink are atomic on any POSIX filesystem,
//! which is all the coordination this needs.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// How long to poll before logging the blocked warning, once.
const BLOCKED_WARN_AFTER: Duration = Duration::from_secs(60);

/// Poll interval while the directory is at capacity.
const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// A held slot; dropping it releases the slot by unlinking the file.
#[derive(Debug)]
pub struct SlotGuard {
    path: PathBuf,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to release concurrency slot");
        }
    }
}

/// Filesystem-backed counting semaphore.
#[derive(Debug)]
pub struct Semaphore {
    lock_dir: PathBuf,
    capacity: u32,
    session_id: String,
    counter: AtomicU64,
}

impl Semaphore {
    /// Create a semaphore over `lock_dir` with `capacity` slots.
    #[must_use]
    pub fn new(lock_dir: PathBuf, capacity: u32, session_id: impl Into<String>) -> Self {
        Self {
            lock_dir,
            capacity: capacity.max(1),
            session_id: session_id.into(),
            counter: AtomicU64::new(0),
        }
    }

    /// Acquire one slot, polling while the tree is at capacity.
    ///
    /// Lock names embed the session id and a per-session counter, so one
    /// session can acquire and release repeatedly without ever colliding
    /// with itself or a sibling.
    pub async fn acquire(&self) -> std::io::Result<SlotGuard> {
        std::fs::create_dir_all(&self.lock_dir)?;
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        let path = self
            .lock_dir
            .join(format!("{}-{n}.lock", self.session_id));

        let started = Instant::now();
        let mut warned = false;
        loop {
            if self.held_slots()? < self.capacity as usize {
                std::fs::OpenOptions::new()
                    .write(true)
                    .create_new(true)
                    .open(&path)?;
                // The count check and the create are two steps; recount
                // and back off if a peer squeezed in between them.
                if self.held_slots()? <= self.capacity as usize {
                    return Ok(SlotGuard { path });
                }
                let _ = std::fs::remove_file(&path);
            }
            if !warned && started.elapsed() >= BLOCKED_WARN_AFTER {
                tracing::warn!(
                    lock_dir = %self.lock_dir.display(),
                    capacity = self.capacity,
                    "blocked on concurrency semaphore for over a minute"
                );
                warned = true;
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    fn held_slots(&self) -> std::io::Result<usize> {
        let mut count = 0;
        for entry in std::fs::read_dir(&self.lock_dir)? {
            let entry = entry?;
            if entry.path().extension().is_some_and(|e| e == "lock") {
                count += 1;
            }
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn acquire_creates_and_release_removes() {
        let dir = tempfile::tempdir().unwrap();
        let sem = Semaphore::new(dir.path().to_path_buf(), 2, "sess");
        let guard = sem.acquire().await.unwrap();
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
        drop(guard);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn repeated_acquires_use_distinct_names() {
        let dir = tempfile::tempdir().unwrap();
        let sem = Semaphore::new(dir.path().to_path_buf(), 4, "sess");
        let a = sem.acquire().await.unwrap();
        let b = sem.acquire().await.unwrap();
        assert_ne!(a.path, b.path);
    }

    #[tokio::test]
    async fn capacity_blocks_the_next_acquirer() {
        let dir = tempfile::tempdir().unwrap();
        let sem = Arc::new(Semaphore::new(dir.path().to_path_buf(), 1, "one"));
        let peer = Semaphore::new(dir.path().to_path_buf(), 1, "two");

        let held = sem.acquire().await.unwrap();

        let waiter = tokio::spawn(async move { peer.acquire().await.unwrap() });
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(!waiter.is_finished(), "second acquire must block at capacity");

        drop(held);
        let guard = tokio::time::timeout(Duration::from_secs(5), waiter)
            .await
            .expect("waiter should finish after release")
            .unwrap();
        drop(guard);
    }

    #[tokio::test]
    async fn foreign_files_do_not_count() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("README"), "not a lock").unwrap();
        let sem = Semaphore::new(dir.path().to_path_buf(), 1, "sess");
        let _guard = sem.acquire().await.unwrap();
    }
}
