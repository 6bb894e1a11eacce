//! Background replication of book files to the mirror
//!
//! `replicate` only enqueues; a single worker thread pushes files to the
//! provider. Mirror failures are logged and counted, never returned to the
//! import.

use std::path::PathBuf;
use std::sync::mpsc::{self, Sender};
use std::sync::Mutex;
use std::thread::{self, JoinHandle};

use markbook_core::Replicator;
use markbook_store::mirror::MirrorProvider;

struct Job {
    book_id: i64,
    relative_path: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplicationStats {
    pub uploaded: usize,
    pub failed: usize,
}

pub struct ReplicationQueue {
    sender: Mutex<Option<Sender<Job>>>,
    worker: Option<JoinHandle<ReplicationStats>>,
}

impl ReplicationQueue {
    /// Start the worker; files are read from `data_folder/<relative_path>`
    pub fn start(provider: Box<dyn MirrorProvider>, data_folder: impl Into<PathBuf>) -> Self {
        let data_folder = data_folder.into();
        let (sender, receiver) = mpsc::channel::<Job>();

        let worker = thread::spawn(move || {
            let mut stats = ReplicationStats::default();
            for job in receiver {
                let local = data_folder.join(&job.relative_path);
                match provider.put(&job.relative_path, &local) {
                    Ok(()) => {
                        stats.uploaded += 1;
                        tracing::debug!(
                            book_id = job.book_id,
                            remote_path = job.relative_path.as_str(),
                            "replicated book file"
                        );
                    }
                    Err(err) => {
                        stats.failed += 1;
                        tracing::warn!(
                            book_id = job.book_id,
                            remote_path = job.relative_path.as_str(),
                            err_code = err.code(),
                            "replication failed: {}",
                            err
                        );
                    }
                }
            }
            stats
        });

        Self {
            sender: Mutex::new(Some(sender)),
            worker: Some(worker),
        }
    }

    /// Close the queue and wait for pending uploads
    pub fn shutdown(mut self) -> ReplicationStats {
        self.finish()
    }

    fn finish(&mut self) -> ReplicationStats {
        if let Ok(mut sender) = self.sender.lock() {
            sender.take();
        }
        match self.worker.take().map(JoinHandle::join) {
            Some(Ok(stats)) => stats,
            Some(Err(_)) => {
                tracing::error!("replication worker panicked");
                ReplicationStats::default()
            }
            None => ReplicationStats::default(),
        }
    }
}

impl Replicator for ReplicationQueue {
    fn replicate(&self, book_id: i64, relative_path: &str) {
        let job = Job {
            book_id,
            relative_path: relative_path.to_string(),
        };
        let sent = match self.sender.lock() {
            Ok(sender) => sender.as_ref().map(|s| s.send(job).is_ok()).unwrap_or(false),
            Err(_) => false,
        };
        if !sent {
            tracing::warn!(book_id, remote_path = relative_path, "replication queue closed");
        }
    }
}

impl Drop for ReplicationQueue {
    fn drop(&mut self) {
        self.finish();
    }
}
