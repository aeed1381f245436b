use std::sync::Arc;
use std::thread::{self, JoinHandle};

use bytes::Bytes;
use crossbeam_channel::{bounded, Receiver, Sender};
use tracing::trace;

use crate::common::{DbError, Result};

use super::DiskManager;

/// Capacity of the request queue
const REQUEST_QUEUE_SIZE: usize = 128;

/// Represents a disk I/O request.
///
/// Requests own their buffers, and each carries a reply channel on which
/// the worker reports the outcome.
pub enum DiskRequest {
    Read {
        page_no: u32,
        reply: Sender<Result<Vec<u8>>>,
    },
    Write {
        page_no: u32,
        data: Bytes,
        reply: Sender<Result<()>>,
    },
}

/// DiskScheduler manages a background worker thread that processes disk I/O requests.
pub struct DiskScheduler {
    /// The disk manager for actual I/O operations
    disk_manager: Arc<DiskManager>,
    /// Channel sender for queuing requests; dropped to stop the worker
    request_sender: Option<Sender<DiskRequest>>,
    /// Handle to the background worker thread
    worker_handle: Option<JoinHandle<()>>,
}

impl DiskScheduler {
    /// Creates a new DiskScheduler with the given DiskManager.
    /// Spawns a background worker thread to process requests.
    pub fn new(disk_manager: Arc<DiskManager>) -> Self {
        let (sender, receiver) = bounded::<DiskRequest>(REQUEST_QUEUE_SIZE);

        let dm_clone = Arc::clone(&disk_manager);
        let worker_handle = thread::spawn(move || {
            Self::start_worker_thread(dm_clone, receiver);
        });

        Self {
            disk_manager,
            request_sender: Some(sender),
            worker_handle: Some(worker_handle),
        }
    }

    /// Returns the underlying disk manager.
    pub fn disk_manager(&self) -> &Arc<DiskManager> {
        &self.disk_manager
    }

    /// Queues a request for processing by the background worker.
    pub fn schedule(&self, request: DiskRequest) -> Result<()> {
        let sender = self
            .request_sender
            .as_ref()
            .ok_or_else(|| DbError::DiskScheduler("scheduler is shut down".to_string()))?;
        sender
            .send(request)
            .map_err(|e| DbError::DiskScheduler(format!("Failed to schedule request: {}", e)))
    }

    /// Schedules a read of one page and waits for its contents.
    pub fn schedule_read_sync(&self, page_no: u32) -> Result<Vec<u8>> {
        let (tx, rx) = bounded(1);
        self.schedule(DiskRequest::Read { page_no, reply: tx })?;
        rx.recv()
            .map_err(|e| DbError::DiskScheduler(format!("Failed to receive completion: {}", e)))?
    }

    /// Schedules a write of one page and waits for completion.
    pub fn schedule_write_sync(&self, page_no: u32, data: Bytes) -> Result<()> {
        let (tx, rx) = bounded(1);
        self.schedule(DiskRequest::Write {
            page_no,
            data,
            reply: tx,
        })?;
        rx.recv()
            .map_err(|e| DbError::DiskScheduler(format!("Failed to receive completion: {}", e)))?
    }

    /// The worker loop; exits once every sender has been dropped.
    fn start_worker_thread(disk_manager: Arc<DiskManager>, receiver: Receiver<DiskRequest>) {
        trace!(path = %disk_manager.path().display(), "disk scheduler started");

        for request in receiver.iter() {
            match request {
                DiskRequest::Read { page_no, reply } => {
                    let mut data = vec![0u8; disk_manager.page_size()];
                    let result = disk_manager.read_page(page_no, &mut data).map(|_| data);
                    let _ = reply.send(result);
                }
                DiskRequest::Write {
                    page_no,
                    data,
                    reply,
                } => {
                    let _ = reply.send(disk_manager.write_page(page_no, &data));
                }
            }
        }

        trace!(path = %disk_manager.path().display(), "disk scheduler stopped");
    }
}

impl Drop for DiskScheduler {
    fn drop(&mut self) {
        // Closing the queue ends the worker loop
        self.request_sender.take();
        if let Some(handle) = self.worker_handle.take() {
            let _ = handle.join();
        }
    }
}
