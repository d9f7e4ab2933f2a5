//! Background Execution and Task Scheduling
//!
//! Provides host-driven recurring and one-shot task scheduling. The sync
//! service registers its recurring pass through this trait.

use std::time::Duration;

use crate::error::Result;

/// Scheduled task identifier
///
/// The identifier doubles as the payload tag handed back to the task
/// handler when the task fires.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaskId(pub String);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Task execution status
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    /// Task is scheduled but not yet running
    Scheduled,
    /// Task is currently executing
    Running,
    /// Last execution completed successfully
    Completed,
    /// Last execution failed
    Failed,
    /// Task was cancelled
    Cancelled,
}

/// Background task executor trait
///
/// Abstracts host task scheduling:
/// - **Desktop**: in-process Tokio timers (`bridge-desktop`)
/// - **Plugin hosts**: the host scheduler, invoking the registered tag
///
/// # Example
///
/// ```ignore
/// use bridge_traits::background::BackgroundExecutor;
/// use std::time::Duration;
///
/// async fn schedule_sync(executor: &dyn BackgroundExecutor) -> Result<()> {
///     executor
///         .schedule_task("nd_sync_spotify", Duration::from_secs(6 * 3600))
///         .await?;
///     Ok(())
/// }
/// ```
#[async_trait::async_trait]
pub trait BackgroundExecutor: Send + Sync {
    /// Schedule a recurring task
    ///
    /// Re-scheduling an id that is already active replaces the previous
    /// schedule.
    async fn schedule_task(&self, task_id: &str, interval: Duration) -> Result<TaskId>;

    /// Schedule a one-time delayed task
    async fn schedule_once(&self, task_id: &str, delay: Duration) -> Result<TaskId>;

    /// Cancel a scheduled task
    async fn cancel_task(&self, task_id: &TaskId) -> Result<()>;

    /// Get status of a task
    async fn get_task_status(&self, task_id: &TaskId) -> Result<TaskStatus>;

    /// List all scheduled tasks
    async fn list_tasks(&self) -> Result<Vec<TaskId>>;

    /// Get estimated time until next execution
    ///
    /// Returns `None` if the task has no pending execution.
    async fn next_execution_time(&self, task_id: &TaskId) -> Result<Option<Duration>>;
}
