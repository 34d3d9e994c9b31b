//! Background deletion of resource files.
//!
//! Deletes cascading from metadata removal are best effort: they run on a
//! worker thread fed through a channel, failures are logged and never reach
//! the caller, and the metadata change is never rolled back.

use flume::{Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};

use crate::bridge::HostBridge;

#[derive(Debug)]
pub enum CleanupJob {
    DeleteFile { relative_path: String },
    /// Acknowledged once every job queued before it has run
    Flush(Sender<()>),
}

#[derive(Debug)]
pub struct CleanupWorker {
    sender: Option<Sender<CleanupJob>>,
    handle: Option<JoinHandle<()>>,
}

impl CleanupWorker {
    pub fn spawn<B: HostBridge>(bridge: Arc<B>) -> Self {
        let (sender, receiver) = flume::unbounded();
        let handle = thread::spawn(move || run(bridge.as_ref(), receiver));
        Self {
            sender: Some(sender),
            handle: Some(handle),
        }
    }

    /// Queues a file delete and returns immediately
    pub fn schedule_delete(&self, relative_path: impl Into<String>) {
        let relative_path = relative_path.into();
        let Some(sender) = &self.sender else {
            warn!(path = %relative_path, "Cleanup worker stopped, file left in place");
            return;
        };
        if sender
            .send(CleanupJob::DeleteFile {
                relative_path: relative_path.clone(),
            })
            .is_err()
        {
            warn!(path = %relative_path, "Cleanup worker gone, file left in place");
        }
    }

    /// Blocks until everything queued so far has been processed
    pub fn flush(&self) {
        let Some(sender) = &self.sender else {
            return;
        };
        let (ack_tx, ack_rx) = flume::bounded(1);
        if sender.send(CleanupJob::Flush(ack_tx)).is_ok() {
            let _ = ack_rx.recv();
        }
    }

    /// Drains the queue and joins the worker thread
    pub fn shutdown(&mut self) {
        drop(self.sender.take());
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("Cleanup worker panicked");
            }
        }
    }
}

impl Drop for CleanupWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run<B: HostBridge>(bridge: &B, jobs: Receiver<CleanupJob>) {
    for job in jobs.iter() {
        match job {
            CleanupJob::DeleteFile { relative_path } => {
                match bridge.delete_resource_file(&relative_path) {
                    Ok(()) => debug!(path = %relative_path, "Resource file removed"),
                    Err(e) => {
                        let reason = format!("{:#}", e);
                        warn!(path = %relative_path, error = %reason, "Failed to delete resource file");
                    }
                }
            }
            CleanupJob::Flush(ack) => {
                let _ = ack.send(());
            }
        }
    }
    debug!("Cleanup worker stopped");
}
