// Cancellable one-shot timers
use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;

/// A task that runs once after a delay.
///
/// Cancelling (or dropping) the handle before the delay elapses prevents the
/// task from firing. Once fired, the task runs detached, so rescheduling from
/// inside the task itself cannot abort it halfway.
#[derive(Debug)]
pub struct ScheduledTask {
    handle: Option<JoinHandle<()>>,
}

impl ScheduledTask {
    pub fn after<F>(delay: Duration, task: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            tokio::spawn(task);
        });
        Self {
            handle: Some(handle),
        }
    }

    pub fn cancel(mut self) {
        self.abort();
    }

    pub fn is_pending(&self) -> bool {
        self.handle.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    fn abort(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl Drop for ScheduledTask {
    fn drop(&mut self) {
        self.abort();
    }
}
