//! Fixed-size thread pool driving one [`Enricher`].

use super::queue::{Enqueued, Job, JobKey, WorkQueue};
use super::{Enricher, Outcome, Role};
use crate::core::store::{BucketKey, Handle};
use crate::error::EnrichError;
use crate::events::{BucketEvent, Event, EventSender, WorkerEvent};
use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use tracing::{debug, error, trace, warn};
use uuid::Uuid;

/// Thread counts per role
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    pub info_threads: usize,
    pub thumbnail_threads: usize,
    pub generate_threads: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            info_threads: 2,
            thumbnail_threads: 2,
            generate_threads: 1,
        }
    }
}

impl PoolConfig {
    pub fn threads_for(&self, role: Role) -> usize {
        match role {
            Role::Info => self.info_threads,
            Role::Thumbnail => self.thumbnail_threads,
            Role::ThumbnailGenerate => self.generate_threads,
        }
    }
}

struct Shared<E: Enricher> {
    enricher: E,
    queue: WorkQueue,
    in_progress: Mutex<HashSet<JobKey>>,
    events: EventSender,
    processed: AtomicUsize,
    failed: AtomicUsize,
}

impl<E: Enricher> Shared<E> {
    fn in_progress(&self) -> MutexGuard<'_, HashSet<JobKey>> {
        self.in_progress.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn process_item(&self, handle: &Handle) -> Result<Outcome, EnrichError> {
        let Some(record) = handle.upgrade() else {
            return Ok(Outcome::Stale);
        };
        if self.enricher.is_loaded(&record) {
            return Ok(Outcome::AlreadyLoaded);
        }
        if !self.enricher.wants(&record) {
            return Ok(Outcome::Skipped);
        }

        let output = self.enricher.compute(&record)?;

        if !handle.is_valid() {
            debug!(role = %self.enricher.role(), path = handle.path(), "result discarded, bucket was replaced");
            return Ok(Outcome::Stale);
        }
        self.enricher.publish(&record, output);
        self.processed.fetch_add(1, Ordering::Relaxed);

        self.events.send(Event::Bucket(BucketEvent::RowChanged {
            key: handle.key().clone(),
            row: record.user.row(),
            path: record.status_path.clone(),
        }));
        Ok(Outcome::Updated)
    }

    fn fail(&self, handle: &Handle, message: String) {
        let role = self.enricher.role();
        if let Some(record) = handle.upgrade() {
            record.enriched.mark_failed(role);
        }
        self.failed.fetch_add(1, Ordering::Relaxed);

        warn!(role = %role, path = handle.path(), error = %message, "enrichment failed");
        self.events.send(Event::Worker(WorkerEvent::Failed {
            role,
            path: handle.path().to_string(),
            message,
        }));
    }

    fn run_job(&self, handle: Handle) {
        let key = JobKey::from(&handle);

        if !handle.is_valid() {
            trace!(role = %self.enricher.role(), path = handle.path(), "stale handle skipped");
        } else if self.in_progress().insert(key.clone()) {
            let result = panic::catch_unwind(AssertUnwindSafe(|| self.process_item(&handle)));
            match result {
                Ok(Ok(outcome)) => {
                    trace!(role = %self.enricher.role(), path = handle.path(), ?outcome, "item processed")
                }
                Ok(Err(e)) => self.fail(&handle, e.to_string()),
                Err(_) => self.fail(&handle, "enricher panicked".to_string()),
            }
            self.in_progress().remove(&key);
        }

        self.queue.release(&key);
        if self.queue.is_empty() {
            self.events.send(Event::Worker(WorkerEvent::Idle {
                role: self.enricher.role(),
            }));
        }
    }
}

fn worker_loop<E: Enricher>(shared: Arc<Shared<E>>) {
    while let Some(job) = shared.queue.pop() {
        match job {
            Job::Shutdown => break,
            Job::Process(handle) => shared.run_job(handle),
        }
    }
}

/// A pool of threads enriching records for one role
pub struct WorkerPool<E: Enricher> {
    id: Uuid,
    shared: Arc<Shared<E>>,
    threads: Vec<JoinHandle<()>>,
}

impl<E: Enricher> WorkerPool<E> {
    /// Start `threads` workers (at least one)
    pub fn new(enricher: E, threads: usize, events: EventSender) -> Self {
        let id = Uuid::new_v4();
        let role = enricher.role();
        let shared = Arc::new(Shared {
            enricher,
            queue: WorkQueue::new(),
            in_progress: Mutex::new(HashSet::new()),
            events,
            processed: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
        });

        let mut handles = Vec::with_capacity(threads.max(1));
        for index in 0..threads.max(1) {
            let worker = Arc::clone(&shared);
            let spawned = thread::Builder::new()
                .name(format!("{}-{}", role, index))
                .spawn(move || worker_loop(worker));
            match spawned {
                Ok(handle) => handles.push(handle),
                Err(e) => error!(%role, pool = %id, error = %e, "failed to spawn worker thread"),
            }
        }
        debug!(%role, pool = %id, threads = handles.len(), "worker pool started");

        Self {
            id,
            shared,
            threads: handles,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn role(&self) -> Role {
        self.shared.enricher.role()
    }

    pub fn enricher(&self) -> &E {
        &self.shared.enricher
    }

    pub fn thread_count(&self) -> usize {
        self.threads.len()
    }

    /// Queue a record unless it is stale, loaded, failed or already queued
    pub fn enqueue(&self, handle: Handle) -> Enqueued {
        let Some(record) = handle.upgrade() else {
            return Enqueued::Stale;
        };
        let enricher = &self.shared.enricher;
        if record.enriched.has_failed(enricher.role())
            || enricher.is_loaded(&record)
            || !enricher.wants(&record)
        {
            return Enqueued::Skipped;
        }
        self.shared.queue.push(handle)
    }

    /// Queue many records; returns how many were actually queued
    pub fn enqueue_all<I>(&self, handles: I) -> usize
    where
        I: IntoIterator<Item = Handle>,
    {
        handles
            .into_iter()
            .filter(|handle| self.enqueue(handle.clone()) == Enqueued::Queued)
            .count()
    }

    /// Enrich one record on the calling thread
    pub fn process_item(&self, handle: &Handle) -> Result<Outcome, EnrichError> {
        self.shared.process_item(handle)
    }

    /// Drop the bucket's queued jobs
    pub fn cancel_bucket(&self, key: &BucketKey) -> usize {
        let cancelled = self.shared.queue.cancel_bucket(key);
        if cancelled > 0 {
            debug!(role = %self.role(), bucket = %key, cancelled, "queued jobs cancelled");
        }
        cancelled
    }

    /// Jobs queued or in flight
    pub fn pending(&self) -> usize {
        self.shared.queue.len()
    }

    pub fn is_idle(&self) -> bool {
        self.shared.queue.is_empty()
    }

    pub fn processed(&self) -> usize {
        self.shared.processed.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> usize {
        self.shared.failed.load(Ordering::Relaxed)
    }

    /// Drop queued work, stop every thread and wait for them
    pub fn shutdown(&mut self) {
        if self.threads.is_empty() {
            return;
        }
        self.shared.queue.clear();
        for _ in &self.threads {
            self.shared.queue.send_shutdown();
        }
        let role = self.role();
        for handle in self.threads.drain(..) {
            if handle.join().is_err() {
                error!(role = %role, "worker thread panicked");
            }
        }
        debug!(role = %role, pool = %self.id, "worker pool stopped");
    }
}

impl<E: Enricher> Drop for WorkerPool<E> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
