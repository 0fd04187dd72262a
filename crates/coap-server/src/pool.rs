//! Bounded worker pool with blocking admission.
//!
//! Sizing follows the usual executor rules: start workers up to
//! `min_workers`, then queue, then grow toward `max_workers` once the queue
//! is full. When both the queue and the worker set are full the submitting
//! thread waits for space instead of the item being dropped. Workers above
//! `min_workers` retire after `keep_alive` without work.

use std::collections::VecDeque;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use coap_protocol::{EventListener, PoolConfig, TenantFlow};
use parking_lot::{Condvar, Mutex, MutexGuard};
use tracing::{debug, error, info, warn};

use crate::error::SubmitError;

/// One accepted request body waiting to be delivered.
pub struct WorkItem {
    pub tenant_id: i32,
    pub payload: String,
    pub listener: Arc<dyn EventListener>,
}

impl WorkItem {
    pub fn new(tenant_id: i32, payload: impl Into<String>, listener: Arc<dyn EventListener>) -> Self {
        Self {
            tenant_id,
            payload: payload.into(),
            listener,
        }
    }
}

impl fmt::Debug for WorkItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkItem")
            .field("tenant_id", &self.tenant_id)
            .field("payload", &self.payload)
            .finish_non_exhaustive()
    }
}

struct PoolState {
    queue: VecDeque<WorkItem>,
    workers: usize,
    idle: usize,
    /// Submitters parked waiting for queue space.
    blocked: usize,
    next_worker_id: usize,
    shutdown: bool,
}

struct Shared {
    config: PoolConfig,
    state: Mutex<PoolState>,
    work_available: Condvar,
    space_available: Condvar,
    terminated: Condvar,
}

pub struct WorkerPool {
    shared: Arc<Shared>,
}

impl WorkerPool {
    /// Create a pool. No threads are started until work arrives.
    pub fn new(config: PoolConfig) -> Self {
        info!(
            "Creating worker pool (min: {}, max: {}, keep-alive: {:?}, queue: {})",
            config.min_workers, config.max_workers, config.keep_alive, config.queue_capacity
        );
        let queue = VecDeque::with_capacity(config.queue_capacity.min(1024));
        Self {
            shared: Arc::new(Shared {
                config,
                state: Mutex::new(PoolState {
                    queue,
                    workers: 0,
                    idle: 0,
                    blocked: 0,
                    next_worker_id: 0,
                    shutdown: false,
                }),
                work_available: Condvar::new(),
                space_available: Condvar::new(),
                terminated: Condvar::new(),
            }),
        }
    }

    pub fn config(&self) -> &PoolConfig {
        &self.shared.config
    }

    /// Hand an item to the pool, blocking while the pool is saturated.
    ///
    /// Returns [`SubmitError::Interrupted`] if the pool shuts down while
    /// this call is waiting for space, and [`SubmitError::NoWorkers`] if no
    /// worker is running and none could be started. The item is dropped in
    /// both cases.
    pub fn submit(&self, item: WorkItem) -> Result<(), SubmitError> {
        let config = &self.shared.config;
        let mut state = self.shared.state.lock();
        if state.shutdown {
            return Err(SubmitError::ShutDown);
        }

        let mut item = item;
        if state.workers < config.min_workers {
            match self.spawn_worker(&mut state, item) {
                Ok(()) => return Ok(()),
                Err(returned) => item = returned,
            }
        }

        if state.queue.len() < config.queue_capacity {
            self.enqueue(&mut state, item);
            return Ok(());
        }

        if state.workers < config.max_workers {
            match self.spawn_worker(&mut state, item) {
                Ok(()) => return Ok(()),
                Err(returned) => item = returned,
            }
        }

        if state.workers == 0 {
            error!("No worker available and none could be started; dropping event for tenant {}", item.tenant_id);
            return Err(SubmitError::NoWorkers {
                tenant_id: item.tenant_id,
            });
        }

        debug!(
            "Worker pool saturated ({} workers, {} queued), blocking submitter",
            state.workers,
            state.queue.len()
        );
        state.blocked += 1;
        while state.queue.len() >= config.queue_capacity && !state.shutdown {
            self.shared.space_available.wait(&mut state);
        }
        state.blocked -= 1;
        if state.shutdown {
            warn!("Interrupted while waiting for queue space; event for tenant {} not enqueued", item.tenant_id);
            return Err(SubmitError::Interrupted {
                tenant_id: item.tenant_id,
            });
        }
        self.enqueue(&mut state, item);
        Ok(())
    }

    fn enqueue(&self, state: &mut MutexGuard<'_, PoolState>, item: WorkItem) {
        state.queue.push_back(item);
        self.shared.work_available.notify_one();
    }

    fn spawn_worker(&self, state: &mut MutexGuard<'_, PoolState>, first: WorkItem) -> Result<(), WorkItem> {
        let id = state.next_worker_id;
        let shared = self.shared.clone();
        // The item moves into the thread only if the spawn succeeds.
        let slot = Arc::new(Mutex::new(Some(first)));
        let thread_slot = slot.clone();

        let spawned = thread::Builder::new()
            .name(format!("coap-worker-{id}"))
            .spawn(move || {
                let first = thread_slot.lock().take();
                run_worker(shared, id, first);
            });

        match spawned {
            Ok(_) => {
                state.next_worker_id += 1;
                state.workers += 1;
                debug!("Started worker {id} ({} running)", state.workers);
                Ok(())
            }
            Err(e) => {
                error!("Failed to start worker thread: {e}");
                // The closure was dropped unrun, so the item is still in the slot.
                match slot.lock().take() {
                    Some(item) => Err(item),
                    None => Ok(()),
                }
            }
        }
    }

    pub fn worker_count(&self) -> usize {
        self.shared.state.lock().workers
    }

    pub fn idle_count(&self) -> usize {
        self.shared.state.lock().idle
    }

    pub fn blocked_submitters(&self) -> usize {
        self.shared.state.lock().blocked
    }

    pub fn queued(&self) -> usize {
        self.shared.state.lock().queue.len()
    }

    pub fn is_shutdown(&self) -> bool {
        self.shared.state.lock().shutdown
    }

    /// Stop accepting work. Queued items are still delivered; blocked
    /// submitters are woken with [`SubmitError::Interrupted`].
    pub fn shutdown(&self) {
        let mut state = self.shared.state.lock();
        if state.shutdown {
            return;
        }
        state.shutdown = true;
        info!("Shutting down worker pool ({} workers, {} queued)", state.workers, state.queue.len());
        self.shared.work_available.notify_all();
        self.shared.space_available.notify_all();
    }

    /// Wait until every worker has exited after [`shutdown`](Self::shutdown).
    /// Returns `false` if `timeout` elapsed first.
    pub fn await_termination(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.shared.state.lock();
        while state.workers > 0 {
            if self.shared.terminated.wait_until(&mut state, deadline).timed_out() {
                return state.workers == 0;
            }
        }
        true
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl Shared {
    /// Next queued item for a worker, or `None` when the worker should exit.
    fn next_item(&self) -> Option<WorkItem> {
        let mut state = self.state.lock();
        loop {
            if let Some(item) = state.queue.pop_front() {
                self.space_available.notify_one();
                return Some(item);
            }
            if state.shutdown {
                self.retire(&mut state);
                return None;
            }

            state.idle += 1;
            if state.workers > self.config.min_workers {
                let timed_out = self
                    .work_available
                    .wait_for(&mut state, self.config.keep_alive)
                    .timed_out();
                state.idle -= 1;
                if timed_out && state.queue.is_empty() && state.workers > self.config.min_workers {
                    self.retire(&mut state);
                    return None;
                }
            } else {
                self.work_available.wait(&mut state);
                state.idle -= 1;
            }
        }
    }

    fn retire(&self, state: &mut MutexGuard<'_, PoolState>) {
        state.workers -= 1;
        debug!("Worker retired ({} running)", state.workers);
        if state.workers == 0 {
            self.terminated.notify_all();
        }
    }
}

fn run_worker(shared: Arc<Shared>, id: usize, first: Option<WorkItem>) {
    let mut next = first;
    loop {
        let item = match next.take() {
            Some(item) => item,
            None => match shared.next_item() {
                Some(item) => item,
                None => break,
            },
        };
        execute(id, item);
    }
}

/// Deliver one item with its tenant made current. The tenant flow is
/// closed when this returns, whether the listener succeeded, failed or
/// panicked.
fn execute(worker: usize, item: WorkItem) {
    let WorkItem {
        tenant_id,
        payload,
        listener,
    } = item;

    let _flow = TenantFlow::start(tenant_id);
    if payload.is_empty() {
        warn!("Dropping the empty/null event received for tenant {tenant_id}");
        return;
    }
    debug!("Worker {worker}: event received for tenant {tenant_id} - {payload}");

    match panic::catch_unwind(AssertUnwindSafe(|| listener.on_event(&payload))) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            error!("Worker {worker}: error while processing event for tenant {tenant_id}: {e}");
        }
        Err(panic) => {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".into());
            error!("Worker {worker}: listener panicked for tenant {tenant_id}: {message}");
        }
    }
}
