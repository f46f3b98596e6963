use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};

#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("failed to spawn render worker thread: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("render worker is no longer accepting tasks")]
    Closed,
    #[error("render task was discarded before it could run")]
    Abandoned,
    #[error("render task panicked: {0}")]
    Panicked(String),
    #[error("render task failed: {0}")]
    Task(anyhow::Error),
}

type Job = Box<dyn FnOnce() -> anyhow::Result<()> + Send + 'static>;

enum Message {
    Run {
        job: Job,
        done: Sender<Result<(), SchedulerError>>,
    },
    Shutdown,
}

/// Completion handle for one enqueued task.
///
/// Waiting observes the task's outcome, including errors returned by the task
/// body and panics caught inside it. Dropping the handle turns the submission
/// into fire-and-forget; the task itself still runs.
pub struct TaskHandle {
    done: Receiver<Result<(), SchedulerError>>,
}

impl TaskHandle {
    /// Blocks until the task has finished on the worker thread.
    pub fn wait(self) -> Result<(), SchedulerError> {
        match self.done.recv() {
            Ok(outcome) => outcome,
            // The worker dropped the queue (shutdown raced the submission)
            // before reaching this task.
            Err(_) => Err(SchedulerError::Abandoned),
        }
    }
}

/// Task scheduler bound to exactly one background worker thread.
///
/// Every enqueued task executes on that thread, in submission order, never
/// concurrently with another task. Enqueueing is safe from any number of
/// caller threads; ordering is by enqueue time across all of them.
pub struct RenderScheduler {
    queue: Sender<Message>,
    worker: Option<JoinHandle<()>>,
}

impl RenderScheduler {
    /// Spawns the worker thread under the given name.
    pub fn spawn(thread_name: &str) -> Result<Self, SchedulerError> {
        let (queue, incoming) = unbounded();
        let worker = thread::Builder::new()
            .name(thread_name.to_string())
            .spawn(move || run_worker(incoming))?;
        Ok(Self {
            queue,
            worker: Some(worker),
        })
    }

    /// Appends a task to the worker queue and returns its completion handle.
    ///
    /// Fails with [`SchedulerError::Closed`] once the worker has shut down.
    pub fn enqueue<F>(&self, job: F) -> Result<TaskHandle, SchedulerError>
    where
        F: FnOnce() -> anyhow::Result<()> + Send + 'static,
    {
        let (done, handle) = bounded(1);
        self.queue
            .send(Message::Run {
                job: Box::new(job),
                done,
            })
            .map_err(|_| SchedulerError::Closed)?;
        Ok(TaskHandle { done: handle })
    }

    /// Stops the worker after it has drained everything enqueued so far.
    ///
    /// Tasks enqueued from other threads after this call starts are not
    /// guaranteed to run; their handles resolve to
    /// [`SchedulerError::Abandoned`].
    pub fn shutdown(mut self) -> Result<(), SchedulerError> {
        self.join_worker()
    }

    fn join_worker(&mut self) -> Result<(), SchedulerError> {
        let Some(worker) = self.worker.take() else {
            return Ok(());
        };
        let _ = self.queue.send(Message::Shutdown);
        worker
            .join()
            .map_err(|_| SchedulerError::Panicked("render worker thread died".to_string()))
    }
}

impl Drop for RenderScheduler {
    fn drop(&mut self) {
        if let Err(err) = self.join_worker() {
            tracing::warn!(%err, "render worker did not shut down cleanly");
        }
    }
}

fn run_worker(incoming: Receiver<Message>) {
    while let Ok(message) = incoming.recv() {
        match message {
            Message::Run { job, done } => {
                let outcome = match catch_unwind(AssertUnwindSafe(job)) {
                    Ok(Ok(())) => Ok(()),
                    Ok(Err(err)) => Err(SchedulerError::Task(err)),
                    Err(payload) => {
                        let message = panic_message(payload.as_ref());
                        tracing::error!(%message, "render task panicked");
                        Err(SchedulerError::Panicked(message))
                    }
                };
                // Fire-and-forget submitters have dropped their handle.
                let _ = done.send(outcome);
            }
            Message::Shutdown => break,
        }
    }
    tracing::debug!("render worker exited");
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
