use std::future::Future;
use tokio::task::JoinHandle;

/// The single poll task a dialog may own.
///
/// Arming replaces (aborts) any previous task. The task is aborted on release and on drop, so
/// client-side observation never outlives the dialog. Releasing twice is a no-op.
#[derive(Debug, Default)]
pub struct PollTimer {
    handle: Option<JoinHandle<()>>,
}

impl PollTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arm<F>(&mut self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.release();
        self.handle = Some(tokio::spawn(task));
    }

    /// True while a poll task is still running.
    pub fn is_active(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    pub fn release(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    /// Waits for the poll task to finish on its own. Returns immediately when none is armed.
    pub async fn finished(&mut self) {
        if let Some(handle) = self.handle.as_mut() {
            if let Err(err) = handle.await {
                if !err.is_cancelled() {
                    tracing::error!(error = %err, "poll task panicked");
                }
            }
            self.handle = None;
        }
    }
}

impl Drop for PollTimer {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn ticking(counter: Arc<AtomicUsize>) -> impl Future<Output = ()> + Send + 'static {
        async move {
            loop {
                tokio::time::sleep(Duration::from_secs(1)).await;
                counter.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn rearming_stops_the_previous_task() {
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));
        let mut timer = PollTimer::new();

        timer.arm(ticking(first.clone()));
        tokio::time::sleep(Duration::from_millis(2500)).await;
        timer.arm(ticking(second.clone()));
        let frozen = first.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(frozen, 2);
        assert_eq!(first.load(Ordering::SeqCst), frozen);
        assert!(second.load(Ordering::SeqCst) >= 4);
        assert!(timer.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn release_is_idempotent_and_drop_releases() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut timer = PollTimer::new();
        timer.arm(ticking(counter.clone()));
        timer.release();
        timer.release();
        assert!(!timer.is_active());
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);

        let dropped = Arc::new(AtomicUsize::new(0));
        {
            let mut scoped = PollTimer::new();
            scoped.arm(ticking(dropped.clone()));
        }
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(dropped.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn finished_waits_for_self_terminating_task() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut timer = PollTimer::new();
        let c = counter.clone();
        timer.arm(async move {
            tokio::time::sleep(Duration::from_secs(2)).await;
            c.fetch_add(1, Ordering::SeqCst);
        });
        timer.finished().await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(!timer.is_active());
        // No task armed: returns at once.
        timer.finished().await;
    }
}
