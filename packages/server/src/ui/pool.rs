//! Bounded worker pool for connection handlers.
//!
//! Handlers are spawned right away but each waits for a semaphore permit
//! before running, so at most `size` handlers execute at once and the rest
//! queue. Spawning never waits, which keeps the accept loop free.
//! Writer tasks are tracked by the same pool but are not gated, so queued
//! connections still receive broadcasts.

use std::{
    future::Future,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
};

use thiserror::Error;
use tokio::{sync::Semaphore, task::JoinSet};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolError {
    #[error("worker pool is shut down")]
    ShutDown,
}

#[derive(Debug)]
pub struct WorkerPool {
    size: usize,
    permits: Arc<Semaphore>,
    accepting: AtomicBool,
    tasks: Mutex<JoinSet<()>>,
}

impl WorkerPool {
    pub fn new(size: usize) -> Self {
        Self {
            size,
            permits: Arc::new(Semaphore::new(size)),
            accepting: AtomicBool::new(true),
            tasks: Mutex::new(JoinSet::new()),
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Handler slots not currently in use
    pub fn idle_workers(&self) -> usize {
        self.permits.available_permits()
    }

    pub fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::Acquire)
    }

    /// Schedule a handler; it runs once a worker slot is free
    pub fn spawn_handler<F>(&self, task: F) -> Result<(), PoolError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let permits = Arc::clone(&self.permits);
        self.spawn_tracked(async move {
            let Ok(_permit) = permits.acquire_owned().await else {
                return;
            };
            task.await;
        })
    }

    /// Schedule a task outside the worker slots
    pub fn spawn_detached<F>(&self, task: F) -> Result<(), PoolError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.spawn_tracked(task)
    }

    /// Stop taking new tasks. Already scheduled tasks keep running.
    pub fn shutdown(&self) {
        self.accepting.store(false, Ordering::Release);
    }

    /// Wait for every scheduled task to finish
    pub async fn drain(&self) {
        let mut tasks = std::mem::take(&mut *self.lock_tasks());
        while let Some(result) = tasks.join_next().await {
            log_task_result(result);
        }
    }

    fn spawn_tracked<F>(&self, task: F) -> Result<(), PoolError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if !self.is_accepting() {
            return Err(PoolError::ShutDown);
        }

        let mut tasks = self.lock_tasks();
        // reap finished tasks so the set does not grow with every connection
        while let Some(result) = tasks.try_join_next() {
            log_task_result(result);
        }
        tasks.spawn(task);
        Ok(())
    }

    fn lock_tasks(&self) -> std::sync::MutexGuard<'_, JoinSet<()>> {
        self.tasks.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn log_task_result(result: Result<(), tokio::task::JoinError>) {
    if let Err(e) = result
        && e.is_panic()
    {
        tracing::error!("Worker task panicked: {}", e);
    }
}
