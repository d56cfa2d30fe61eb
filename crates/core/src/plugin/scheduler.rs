//! Per-plugin tick based task scheduler

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use thiserror::Error;

/// Identifier of a scheduled task, unique within its scheduler
pub type TaskId = u64;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("Cannot schedule task for plugin {0} while its scheduler is disabled")]
    Disabled(String),
}

/// Unit of work run by a [`TaskScheduler`]
pub trait Task: Send {
    /// Run the task; an error cancels it
    fn run(&mut self, current_tick: u64) -> anyhow::Result<()>;

    /// Called once when the task is cancelled
    fn on_cancel(&mut self) {}
}

/// Task backed by a closure
pub struct ClosureTask<F> {
    closure: F,
}

impl<F> ClosureTask<F>
where
    F: FnMut(u64) -> anyhow::Result<()> + Send,
{
    pub fn new(closure: F) -> Self {
        Self { closure }
    }
}

impl<F> Task for ClosureTask<F>
where
    F: FnMut(u64) -> anyhow::Result<()> + Send,
{
    fn run(&mut self, current_tick: u64) -> anyhow::Result<()> {
        (self.closure)(current_tick)
    }
}

struct ScheduledTask {
    task: Box<dyn Task>,
    next_run: u64,
    period: Option<u64>,
}

/// Schedules tasks of a single plugin against server ticks
///
/// Tasks are driven by [`TaskScheduler::heartbeat`], which the plugin manager
/// calls once per tick for every enabled plugin. A task scheduled with a delay
/// of `n` ticks runs on the first heartbeat at least `n` ticks later.
pub struct TaskScheduler {
    owner: String,
    enabled: bool,
    current_tick: u64,
    next_id: TaskId,
    queue: BinaryHeap<Reverse<(u64, TaskId)>>,
    tasks: HashMap<TaskId, ScheduledTask>,
}

impl TaskScheduler {
    /// Create a new, disabled scheduler
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            enabled: false,
            current_tick: 0,
            next_id: 1,
            queue: BinaryHeap::new(),
            tasks: HashMap::new(),
        }
    }

    /// Run a task on the next heartbeat
    pub fn schedule_task(&mut self, task: impl Task + 'static) -> Result<TaskId, SchedulerError> {
        self.add_task(Box::new(task), 0, None)
    }

    /// Run a task once after `delay` ticks
    pub fn schedule_delayed_task(
        &mut self,
        task: impl Task + 'static,
        delay: u64,
    ) -> Result<TaskId, SchedulerError> {
        self.add_task(Box::new(task), delay, None)
    }

    /// Run a task every `period` ticks, starting on the next heartbeat
    pub fn schedule_repeating_task(
        &mut self,
        task: impl Task + 'static,
        period: u64,
    ) -> Result<TaskId, SchedulerError> {
        self.add_task(Box::new(task), 0, Some(period))
    }

    /// Run a task every `period` ticks after an initial `delay`
    pub fn schedule_delayed_repeating_task(
        &mut self,
        task: impl Task + 'static,
        delay: u64,
        period: u64,
    ) -> Result<TaskId, SchedulerError> {
        self.add_task(Box::new(task), delay, Some(period))
    }

    fn add_task(
        &mut self,
        task: Box<dyn Task>,
        delay: u64,
        period: Option<u64>,
    ) -> Result<TaskId, SchedulerError> {
        if !self.enabled {
            return Err(SchedulerError::Disabled(self.owner.clone()));
        }

        let id = self.next_id;
        self.next_id += 1;

        let next_run = self.current_tick.saturating_add(delay);
        self.queue.push(Reverse((next_run, id)));
        self.tasks.insert(
            id,
            ScheduledTask {
                task,
                next_run,
                period: period.map(|period| period.max(1)),
            },
        );
        Ok(id)
    }

    /// Cancel a queued task
    pub fn cancel_task(&mut self, id: TaskId) -> bool {
        match self.tasks.remove(&id) {
            Some(mut scheduled) => {
                scheduled.task.on_cancel();
                self.compact_queue();
                true
            }
            None => false,
        }
    }

    /// Drop queue entries of cancelled tasks once they outnumber the live ones
    fn compact_queue(&mut self) {
        if self.queue.len() <= 2 * self.tasks.len() + 16 {
            return;
        }

        self.queue = self
            .tasks
            .iter()
            .map(|(&id, scheduled)| Reverse((scheduled.next_run, id)))
            .collect();
    }

    /// Cancel every queued task
    pub fn cancel_all_tasks(&mut self) {
        for (_, mut scheduled) in self.tasks.drain() {
            scheduled.task.on_cancel();
        }
        self.queue.clear();
    }

    pub fn is_queued(&self, id: TaskId) -> bool {
        self.tasks.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Cancel every task and refuse new ones until re-enabled
    pub fn shutdown(&mut self) {
        self.enabled = false;
        self.cancel_all_tasks();
    }

    /// Run every task that is due at `current_tick`
    pub fn heartbeat(&mut self, current_tick: u64) {
        self.current_tick = current_tick;

        while let Some(Reverse((next_run, id))) = self.queue.peek().copied() {
            if next_run > current_tick {
                break;
            }
            self.queue.pop();

            // Cancelled tasks leave their queue entry behind
            let Some(mut scheduled) = self.tasks.remove(&id) else {
                continue;
            };

            if let Err(error) = scheduled.task.run(current_tick) {
                tracing::error!(
                    "Task {} of plugin {} failed and was cancelled: {:#}",
                    id,
                    self.owner,
                    error
                );
                scheduled.task.on_cancel();
                continue;
            }

            if let Some(period) = scheduled.period {
                scheduled.next_run = current_tick.saturating_add(period);
                self.queue.push(Reverse((scheduled.next_run, id)));
                self.tasks.insert(id, scheduled);
            }
        }
    }
}

impl std::fmt::Debug for TaskScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskScheduler")
            .field("owner", &self.owner)
            .field("enabled", &self.enabled)
            .field("current_tick", &self.current_tick)
            .field("tasks", &self.tasks.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counter_task(
        counter: &Arc<AtomicUsize>,
    ) -> ClosureTask<impl FnMut(u64) -> anyhow::Result<()> + Send> {
        let counter = Arc::clone(counter);
        ClosureTask::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }

    fn enabled_scheduler() -> TaskScheduler {
        let mut scheduler = TaskScheduler::new("Test");
        scheduler.set_enabled(true);
        scheduler
    }

    #[test]
    fn test_disabled_scheduler_rejects_tasks() {
        let mut scheduler = TaskScheduler::new("Test");
        let counter = Arc::new(AtomicUsize::new(0));

        let err = scheduler.schedule_task(counter_task(&counter)).unwrap_err();
        assert!(matches!(err, SchedulerError::Disabled(ref owner) if owner == "Test"));
    }

    #[test]
    fn test_delayed_task_runs_once() {
        let mut scheduler = enabled_scheduler();
        let counter = Arc::new(AtomicUsize::new(0));
        let id = scheduler.schedule_delayed_task(counter_task(&counter), 5).unwrap();

        scheduler.heartbeat(4);
        assert_eq!(counter.load(Ordering::SeqCst), 0);
        assert!(scheduler.is_queued(id));

        scheduler.heartbeat(5);
        scheduler.heartbeat(6);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(!scheduler.is_queued(id));
    }

    #[test]
    fn test_repeating_task() {
        let mut scheduler = enabled_scheduler();
        let counter = Arc::new(AtomicUsize::new(0));
        let id = scheduler.schedule_repeating_task(counter_task(&counter), 2).unwrap();

        for tick in 1..=6 {
            scheduler.heartbeat(tick);
        }
        // Runs at ticks 1, 3 and 5
        assert_eq!(counter.load(Ordering::SeqCst), 3);

        assert!(scheduler.cancel_task(id));
        scheduler.heartbeat(7);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_failing_task_is_cancelled() {
        let mut scheduler = enabled_scheduler();
        let runs = Arc::new(AtomicUsize::new(0));
        let r = Arc::clone(&runs);
        let id = scheduler
            .schedule_repeating_task(
                ClosureTask::new(move |_| {
                    r.fetch_add(1, Ordering::SeqCst);
                    anyhow::bail!("boom")
                }),
                1,
            )
            .unwrap();

        scheduler.heartbeat(1);
        scheduler.heartbeat(2);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(!scheduler.is_queued(id));
    }

    #[test]
    fn test_shutdown_cancels_everything() {
        struct Flagged(Arc<AtomicUsize>);

        impl Task for Flagged {
            fn run(&mut self, _: u64) -> anyhow::Result<()> {
                Ok(())
            }

            fn on_cancel(&mut self) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let mut scheduler = enabled_scheduler();
        let cancelled = Arc::new(AtomicUsize::new(0));
        scheduler.schedule_delayed_task(Flagged(Arc::clone(&cancelled)), 10).unwrap();
        scheduler.schedule_repeating_task(Flagged(Arc::clone(&cancelled)), 1).unwrap();

        scheduler.shutdown();
        assert!(scheduler.is_empty());
        assert!(!scheduler.is_enabled());
        assert_eq!(cancelled.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_huge_delay_saturates() {
        let mut scheduler = enabled_scheduler();
        let counter = Arc::new(AtomicUsize::new(0));
        scheduler.heartbeat(1);

        let delayed = scheduler.schedule_delayed_task(counter_task(&counter), u64::MAX).unwrap();
        let repeating = scheduler
            .schedule_delayed_repeating_task(counter_task(&counter), 0, u64::MAX)
            .unwrap();

        scheduler.heartbeat(2);
        scheduler.heartbeat(3);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(scheduler.is_queued(delayed));
        assert!(scheduler.is_queued(repeating));
    }

    #[test]
    fn test_cancelled_tasks_do_not_pile_up() {
        let mut scheduler = enabled_scheduler();
        let counter = Arc::new(AtomicUsize::new(0));
        let kept = scheduler.schedule_delayed_task(counter_task(&counter), 10).unwrap();

        for _ in 0..1000 {
            let id = scheduler.schedule_delayed_task(counter_task(&counter), 1_000_000).unwrap();
            assert!(scheduler.cancel_task(id));
        }

        assert_eq!(scheduler.len(), 1);
        assert!(scheduler.queue.len() <= 2 * scheduler.len() + 17);

        scheduler.heartbeat(10);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(!scheduler.is_queued(kept));
    }
}
