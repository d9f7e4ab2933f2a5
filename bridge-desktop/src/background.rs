//! Background Task Execution Implementation

use async_trait::async_trait;
use bridge_traits::{
    background::{BackgroundExecutor, TaskId, TaskStatus},
    error::{BridgeError, Result},
    time::{Clock, SystemClock},
};
use futures_util::{future::BoxFuture, FutureExt};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep, Instant, MissedTickBehavior};
use tracing::{debug, warn};

type TaskHandler = Arc<dyn Fn() -> BoxFuture<'static, Result<()>> + Send + Sync>;
type TaskTable = Arc<RwLock<HashMap<TaskId, TaskInfo>>>;

/// Tokio-based background executor for desktop.
///
/// Handlers are registered by task id before scheduling. A recurring task
/// first fires one full interval after it is scheduled; runs never overlap
/// and a run that overruns its interval delays the next tick.
pub struct TokioBackgroundExecutor {
    tasks: TaskTable,
    handlers: Arc<RwLock<HashMap<String, TaskHandler>>>,
    clock: Arc<dyn Clock>,
}

struct TaskInfo {
    status: TaskStatus,
    handle: Option<JoinHandle<()>>,
    cancel: Option<oneshot::Sender<()>>,
    last_run: Option<i64>,
    next_run: Option<i64>,
}

impl TokioBackgroundExecutor {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create a background executor with a custom clock.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            tasks: Arc::new(RwLock::new(HashMap::new())),
            handlers: Arc::new(RwLock::new(HashMap::new())),
            clock,
        }
    }

    fn duration_to_millis(duration: Duration) -> i64 {
        duration.as_millis().min(i64::MAX as u128) as i64
    }

    fn schedule_after(clock: &dyn Clock, delay: Duration) -> i64 {
        clock
            .unix_timestamp_millis()
            .saturating_add(Self::duration_to_millis(delay))
    }

    fn millis_to_duration(millis: i64) -> Duration {
        if millis <= 0 {
            Duration::from_secs(0)
        } else {
            Duration::from_millis(millis as u64)
        }
    }

    /// Register a handler that will be invoked when the task executes.
    pub async fn register_task_handler<F, Fut>(&self, task_id: &str, handler: F) -> Result<()>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<()>> + Send + 'static,
    {
        let mut handlers = self.handlers.write().await;
        handlers.insert(task_id.to_string(), Arc::new(move || handler().boxed()));
        Ok(())
    }

    async fn handler_for(&self, task_id: &str) -> Result<TaskHandler> {
        let handlers = self.handlers.read().await;
        handlers.get(task_id).cloned().ok_or_else(|| {
            BridgeError::OperationFailed(format!("No handler registered for task: {}", task_id))
        })
    }

    /// Stop a previous schedule for the same id, if any.
    async fn replace_existing(&self, id: &TaskId) {
        let mut tasks = self.tasks.write().await;
        if let Some(mut previous) = tasks.remove(id) {
            debug!(task_id = %id.0, "Replacing existing schedule");
            Self::stop(&mut previous);
        }
    }

    fn stop(info: &mut TaskInfo) {
        if let Some(cancel) = info.cancel.take() {
            let _ = cancel.send(());
        }
        if let Some(handle) = info.handle.take() {
            handle.abort();
        }
    }

    async fn set_status(tasks: &TaskTable, id: &TaskId, status: TaskStatus) {
        let mut tasks = tasks.write().await;
        if let Some(info) = tasks.get_mut(id) {
            if status == TaskStatus::Cancelled {
                info.next_run = None;
            }
            info.status = status;
        }
    }

    async fn record_run(
        tasks: &TaskTable,
        id: &TaskId,
        result: Result<()>,
        now: i64,
        next_run: Option<i64>,
    ) {
        let mut tasks = tasks.write().await;
        if let Some(info) = tasks.get_mut(id) {
            info.last_run = Some(now);
            info.next_run = next_run;
            info.status = match result {
                Ok(()) => TaskStatus::Completed,
                Err(err) => {
                    warn!(task_id = %id.0, error = %err, "Scheduled task failed");
                    TaskStatus::Failed
                }
            };
        }
    }

    async fn run_recurring_task(
        tasks: TaskTable,
        id: TaskId,
        handler: TaskHandler,
        period: Duration,
        mut cancel_rx: oneshot::Receiver<()>,
        clock: Arc<dyn Clock>,
    ) {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let period_millis = Self::duration_to_millis(period);

        loop {
            tokio::select! {
                _ = &mut cancel_rx => {
                    Self::set_status(&tasks, &id, TaskStatus::Cancelled).await;
                    break;
                }
                _ = ticker.tick() => {
                    Self::set_status(&tasks, &id, TaskStatus::Running).await;
                    let result = handler().await;
                    let now = clock.unix_timestamp_millis();
                    Self::record_run(&tasks, &id, result, now, Some(now.saturating_add(period_millis))).await;
                }
            }
        }
    }

    async fn run_one_time_task(
        tasks: TaskTable,
        id: TaskId,
        handler: TaskHandler,
        delay: Duration,
        mut cancel_rx: oneshot::Receiver<()>,
        clock: Arc<dyn Clock>,
    ) {
        let delay_sleep = sleep(delay);
        tokio::pin!(delay_sleep);
        tokio::select! {
            _ = &mut cancel_rx => {
                Self::set_status(&tasks, &id, TaskStatus::Cancelled).await;
                return;
            }
            _ = delay_sleep.as_mut() => {}
        }

        Self::set_status(&tasks, &id, TaskStatus::Running).await;
        let result = handler().await;
        Self::record_run(&tasks, &id, result, clock.unix_timestamp_millis(), None).await;
    }

    async fn spawn_task<F>(&self, id: TaskId, next_run: i64, run: F) -> TaskId
    where
        F: FnOnce(oneshot::Receiver<()>) -> BoxFuture<'static, ()>,
    {
        self.replace_existing(&id).await;

        let (cancel_tx, cancel_rx) = oneshot::channel();
        // Hold the write lock across spawn so the task cannot observe a
        // missing entry.
        let mut tasks = self.tasks.write().await;
        let handle = tokio::spawn(run(cancel_rx));
        tasks.insert(
            id.clone(),
            TaskInfo {
                status: TaskStatus::Scheduled,
                handle: Some(handle),
                cancel: Some(cancel_tx),
                last_run: None,
                next_run: Some(next_run),
            },
        );
        id
    }
}

impl Default for TokioBackgroundExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BackgroundExecutor for TokioBackgroundExecutor {
    async fn schedule_task(&self, task_id: &str, interval: Duration) -> Result<TaskId> {
        if interval.is_zero() {
            return Err(BridgeError::OperationFailed(format!(
                "Recurring task {} needs a non-zero interval",
                task_id
            )));
        }

        debug!(
            task_id = task_id,
            interval_secs = interval.as_secs(),
            "Scheduling recurring task"
        );

        let handler = self.handler_for(task_id).await?;
        let tasks = Arc::clone(&self.tasks);
        let clock = Arc::clone(&self.clock);
        let id = TaskId::new(task_id);
        let task_id_clone = id.clone();
        let next_run = Self::schedule_after(self.clock.as_ref(), interval);

        Ok(self
            .spawn_task(id, next_run, move |cancel_rx| {
                Self::run_recurring_task(tasks, task_id_clone, handler, interval, cancel_rx, clock)
                    .boxed()
            })
            .await)
    }

    async fn schedule_once(&self, task_id: &str, delay: Duration) -> Result<TaskId> {
        debug!(
            task_id = task_id,
            delay_secs = delay.as_secs(),
            "Scheduling one-time task"
        );

        let handler = self.handler_for(task_id).await?;
        let tasks = Arc::clone(&self.tasks);
        let clock = Arc::clone(&self.clock);
        let id = TaskId::new(task_id);
        let task_id_clone = id.clone();
        let next_run = Self::schedule_after(self.clock.as_ref(), delay);

        Ok(self
            .spawn_task(id, next_run, move |cancel_rx| {
                Self::run_one_time_task(tasks, task_id_clone, handler, delay, cancel_rx, clock)
                    .boxed()
            })
            .await)
    }

    async fn cancel_task(&self, task_id: &TaskId) -> Result<()> {
        debug!(task_id = %task_id.0, "Cancelling task");

        let mut tasks = self.tasks.write().await;
        match tasks.remove(task_id) {
            Some(mut info) => {
                Self::stop(&mut info);
                Ok(())
            }
            None => Err(BridgeError::NotFound(format!("Task not found: {}", task_id.0))),
        }
    }

    async fn get_task_status(&self, task_id: &TaskId) -> Result<TaskStatus> {
        let tasks = self.tasks.read().await;
        tasks
            .get(task_id)
            .map(|info| info.status.clone())
            .ok_or_else(|| BridgeError::NotFound(format!("Task not found: {}", task_id.0)))
    }

    async fn list_tasks(&self) -> Result<Vec<TaskId>> {
        let tasks = self.tasks.read().await;
        Ok(tasks.keys().cloned().collect())
    }

    async fn next_execution_time(&self, task_id: &TaskId) -> Result<Option<Duration>> {
        let tasks = self.tasks.read().await;
        let info = tasks
            .get(task_id)
            .ok_or_else(|| BridgeError::NotFound(format!("Task not found: {}", task_id.0)))?;

        Ok(info.next_run.map(|next| {
            Self::millis_to_duration(next - self.clock.unix_timestamp_millis())
        }))
    }
}
