use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;

pub type TimerId = u64;

/// A one-shot deferred task. Firing handlers must re-check that their
/// timer is still the registered one, since `cancel` is best-effort.
#[derive(Debug)]
pub struct TimerHandle {
    id: TimerId,
    task: JoinHandle<()>,
}

impl TimerHandle {
    pub fn schedule<F>(id: TimerId, delay: Duration, on_fire: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            on_fire.await;
        });
        Self { id, task }
    }

    pub fn id(&self) -> TimerId {
        self.id
    }

    /// Safe to call any number of times, before or after the timer fired.
    pub fn cancel(&self) {
        self.task.abort();
    }
}
