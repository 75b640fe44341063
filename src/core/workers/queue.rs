//! Deduplicating per-role work queue.
//!
//! Jobs travel over a crossbeam channel so idle workers block in `recv`
//! rather than polling. A pending set remembers every key that is queued or
//! in flight; enqueueing such a key again is a silent no-op.

use crate::core::store::{BucketKey, Handle};
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Identity of one unit of work
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobKey {
    pub bucket: BucketKey,
    pub generation: u64,
    pub path: String,
}

impl From<&Handle> for JobKey {
    fn from(handle: &Handle) -> Self {
        Self {
            bucket: handle.key().clone(),
            generation: handle.generation(),
            path: handle.path().to_string(),
        }
    }
}

/// Result of an enqueue request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enqueued {
    Queued,
    /// Already queued or in flight
    Duplicate,
    /// Handle from a previous generation
    Stale,
    /// Already enriched, failed earlier or not applicable
    Skipped,
}

pub(crate) enum Job {
    Process(Handle),
    Shutdown,
}

pub struct WorkQueue {
    sender: Sender<Job>,
    receiver: Receiver<Job>,
    pending: Mutex<HashSet<JobKey>>,
}

impl WorkQueue {
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self {
            sender,
            receiver,
            pending: Mutex::new(HashSet::new()),
        }
    }

    fn pending(&self) -> MutexGuard<'_, HashSet<JobKey>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn push(&self, handle: Handle) -> Enqueued {
        if !handle.is_valid() {
            return Enqueued::Stale;
        }

        let mut pending = self.pending();
        if !pending.insert(JobKey::from(&handle)) {
            return Enqueued::Duplicate;
        }
        // The receiver lives in `self`, so the channel cannot be disconnected.
        let _ = self.sender.send(Job::Process(handle));
        Enqueued::Queued
    }

    /// Block until a job is available
    pub(crate) fn pop(&self) -> Option<Job> {
        self.receiver.recv().ok()
    }

    /// Forget a finished job so its key may be queued again
    pub fn release(&self, key: &JobKey) {
        self.pending().remove(key);
    }

    /// Drop every queued job belonging to `bucket`.
    ///
    /// Jobs already taken by a worker keep running; their handles are
    /// stale after the bucket is replaced, so the results are discarded.
    pub fn cancel_bucket(&self, bucket: &BucketKey) -> usize {
        let drained: Vec<Job> = self.receiver.try_iter().collect();
        let mut cancelled = 0;

        for job in drained {
            match job {
                Job::Process(handle) if handle.key() == bucket => {
                    self.release(&JobKey::from(&handle));
                    cancelled += 1;
                }
                other => {
                    let _ = self.sender.send(other);
                }
            }
        }
        cancelled
    }

    /// Drop every queued job
    pub fn clear(&self) -> usize {
        let drained: Vec<Job> = self.receiver.try_iter().collect();
        let mut cancelled = 0;

        for job in drained {
            match job {
                Job::Process(handle) => {
                    self.release(&JobKey::from(&handle));
                    cancelled += 1;
                }
                Job::Shutdown => {
                    let _ = self.sender.send(Job::Shutdown);
                }
            }
        }
        cancelled
    }

    /// Number of jobs queued or in flight
    pub fn len(&self) -> usize {
        self.pending().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending().is_empty()
    }

    pub(crate) fn send_shutdown(&self) {
        let _ = self.sender.send(Job::Shutdown);
    }
}

impl Default for WorkQueue {
    fn default() -> Self {
        Self::new()
    }
}
