use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;
use futures::future::{BoxFuture, FutureExt};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use crate::error::{Error, Result};
use tracing::{info, warn};

const RESTART_BACKOFF_BASE: Duration = Duration::from_secs(1);
const RESTART_BACKOFF_MAX: Duration = Duration::from_secs(60);
/// A task that stayed up this long starts over with a clean restart count.
const STABLE_AFTER: Duration = Duration::from_secs(300);

type TaskFactory = Box<dyn FnMut() -> BoxFuture<'static, ()> + Send>;

struct SupervisedTask {
    factory: TaskFactory,
    handle: JoinHandle<()>,
    started_at: Instant,
    restarts: u32,
    down_since: Option<Instant>,
}

fn restart_backoff(restarts: u32) -> Duration {
    RESTART_BACKOFF_BASE
        .saturating_mul(1 << restarts.min(6))
        .min(RESTART_BACKOFF_MAX)
}

/// Task Supervisor - owns the engine's background tasks
///
/// ## Purpose
/// Every exchange poller, the FX poller and the maintenance sweeps run as one
/// named task each, built from a factory so a task that ends while the
/// process is running can be started again. A failing task never takes
/// another down with it.
///
/// ## Usage
/// ```rust,ignore
/// let mut supervisor = TaskSupervisor::new(config.server.max_task_restarts);
///
/// let poller = Arc::new(poller);
/// supervisor.spawn("UPBIT:prices", move || poller.clone().run(shutdown_rx.clone()));
///
/// // on every health tick
/// supervisor.check_health()?;
/// ```
pub struct TaskSupervisor {
    tasks: HashMap<String, SupervisedTask>,
    max_restarts: u32,
}

impl TaskSupervisor {
    pub fn new(max_restarts: u32) -> Self {
        TaskSupervisor {
            tasks: HashMap::new(),
            max_restarts,
        }
    }

    /// Spawn a task from `factory` and keep the factory for restarts
    pub fn spawn<F, Fut>(&mut self, name: impl Into<String>, mut factory: F) -> &mut Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let name = name.into();
        let mut factory: TaskFactory = Box::new(move || factory().boxed());
        let handle = tokio::spawn(factory());

        info!(task = %name, "Spawned background task");
        let task = SupervisedTask {
            factory,
            handle,
            started_at: Instant::now(),
            restarts: 0,
            down_since: None,
        };
        if let Some(previous) = self.tasks.insert(name.clone(), task) {
            warn!(task = %name, "Replacing task with the same name");
            previous.handle.abort();
        }
        self
    }

    /// Restarts tasks that have ended, each after an exponential backoff.
    ///
    /// Returns how many tasks were restarted on this call. A task that has
    /// used up its restarts is dropped and reported as an error.
    pub fn check_health(&mut self) -> Result<usize> {
        let now = Instant::now();
        let max_restarts = self.max_restarts;
        let mut restarted = 0;
        let mut exhausted = Vec::new();

        for (name, task) in self.tasks.iter_mut() {
            if !task.handle.is_finished() {
                continue;
            }

            let down_since = match task.down_since {
                Some(since) => since,
                None => {
                    if now.duration_since(task.started_at) >= STABLE_AFTER {
                        task.restarts = 0;
                    }
                    if task.restarts >= max_restarts {
                        exhausted.push(name.clone());
                        continue;
                    }
                    warn!(
                        task = %name,
                        restarts = task.restarts,
                        backoff_ms = restart_backoff(task.restarts).as_millis() as u64,
                        "Task ended unexpectedly, scheduling restart"
                    );
                    task.down_since = Some(now);
                    now
                }
            };

            if now.duration_since(down_since) < restart_backoff(task.restarts) {
                continue;
            }

            task.handle = tokio::spawn((task.factory)());
            task.restarts += 1;
            task.started_at = now;
            task.down_since = None;
            restarted += 1;
            info!(task = %name, restarts = task.restarts, "Restarted task");
        }

        if exhausted.is_empty() {
            return Ok(restarted);
        }

        exhausted.sort();
        for name in &exhausted {
            self.tasks.remove(name);
        }
        Err(Error::TaskFailed(format!(
            "tasks {:?} ended after {} restarts",
            exhausted, max_restarts
        )))
    }

    /// Waits up to `grace` for tasks to observe shutdown, then aborts the rest.
    pub async fn shutdown_all(&mut self, grace: Duration) {
        info!("Shutting down {} background tasks", self.tasks.len());

        let deadline = Instant::now() + grace;
        for (name, task) in self.tasks.drain() {
            let mut handle = task.handle;
            match tokio::time::timeout_at(deadline, &mut handle).await {
                Ok(Ok(())) => info!(task = %name, "Task stopped"),
                Ok(Err(e)) => warn!(task = %name, error = %e, "Task ended with error"),
                Err(_) => {
                    handle.abort();
                    info!(task = %name, "Aborted task");
                }
            }
        }
    }
}
