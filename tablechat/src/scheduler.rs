//! Delayed background work.

use std::{future::Future, pin::Pin, time::Duration};

/// A unit of deferred work
pub type Task = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Runs a task after a delay, independently of the caller.
///
/// Scheduled tasks cannot be cancelled; they must re-check their
/// preconditions when they run.
pub trait Scheduler: Send + Sync {
    fn schedule(&self, delay: Duration, task: Task);
}

/// Scheduler that spawns onto the current tokio runtime
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioScheduler;

impl Scheduler for TokioScheduler {
    fn schedule(&self, delay: Duration, task: Task) {
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            task.await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    };

    #[tokio::test(start_paused = true)]
    async fn runs_after_delay() {
        let ran = Arc::new(AtomicBool::new(false));
        let flag = ran.clone();
        TokioScheduler.schedule(
            Duration::from_secs(2),
            Box::pin(async move {
                flag.store(true, Ordering::SeqCst);
            }),
        );

        tokio::time::sleep(Duration::from_millis(1999)).await;
        assert!(!ran.load(Ordering::SeqCst));

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert!(ran.load(Ordering::SeqCst));
    }
}
