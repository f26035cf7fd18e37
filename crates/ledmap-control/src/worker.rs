//! Named worker threads with a bounded join

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::error::{ControlError, Result};

/// Signals completion when dropped, including during unwinding
struct DoneGuard(Sender<()>);

impl Drop for DoneGuard {
    fn drop(&mut self) {
        let _ = self.0.try_send(());
    }
}

/// Handle to a spawned worker thread
pub struct Worker {
    name: String,
    handle: JoinHandle<()>,
    done: Receiver<()>,
}

impl Worker {
    /// Spawn a named thread
    pub fn spawn<F>(name: impl Into<String>, f: F) -> Result<Self>
    where
        F: FnOnce() + Send + 'static,
    {
        let name = name.into();
        let (done_tx, done) = bounded(1);
        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                let _guard = DoneGuard(done_tx);
                f();
            })
            .map_err(|e| ControlError::ThreadSpawn(format!("{}: {}", name, e)))?;
        Ok(Self { name, handle, done })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait up to `timeout` for the thread to exit.
    ///
    /// Returns `false` if it did not finish in time; the thread is then
    /// detached and left to run out on its own.
    pub fn join_timeout(self, timeout: Duration) -> bool {
        match self.done.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if self.handle.join().is_err() {
                    tracing::error!("Thread {} panicked", self.name);
                }
                true
            }
            Err(RecvTimeoutError::Timeout) => {
                tracing::warn!(
                    "Thread {} did not stop within {:?}, abandoning it",
                    self.name,
                    timeout
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_join_finished_worker() {
        let ran = Arc::new(AtomicBool::new(false));
        let flag = ran.clone();
        let worker = Worker::spawn("test-worker", move || flag.store(true, Ordering::SeqCst)).unwrap();
        assert_eq!(worker.name(), "test-worker");
        assert!(worker.join_timeout(Duration::from_secs(5)));
        assert!(ran.load(Ordering::SeqCst));
    }

    #[test]
    fn test_join_times_out() {
        let (release_tx, release_rx) = bounded::<()>(1);
        let worker = Worker::spawn("stuck-worker", move || {
            let _ = release_rx.recv();
        })
        .unwrap();
        assert!(!worker.join_timeout(Duration::from_millis(20)));
        release_tx.send(()).unwrap();
    }

    #[test]
    fn test_panicking_worker_still_joins() {
        let worker = Worker::spawn("panicking-worker", || panic!("boom")).unwrap();
        assert!(worker.join_timeout(Duration::from_secs(5)));
    }
}
