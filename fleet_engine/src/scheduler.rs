use parking_lot::Mutex;
use std::any::Any;
use std::collections::HashMap;
use std::fmt::Display;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Owns a cancellable timer for one periodic job.
#[derive(Debug, Clone)]
pub struct SubscriptionHandle {
    id: u64,
    label: Arc<str>,
    token: CancellationToken,
}

impl SubscriptionHandle {
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Stops future invocations. Safe to call from inside the subscription's own callback.
    pub fn cancel(&self) {
        if !self.token.is_cancelled() {
            self.token.cancel();
            debug!(subscription = %self.label, "subscription cancelled");
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Runs periodic callbacks on the tokio runtime. Every subscription is a child of the
/// scheduler's token, so cancelling that token (or calling [`RefreshScheduler::shutdown`])
/// stops all of them.
pub struct RefreshScheduler {
    root: CancellationToken,
    next_id: AtomicU64,
    tasks: Arc<Mutex<HashMap<u64, JoinHandle<()>>>>,
}

impl RefreshScheduler {
    pub fn new(shutdown: CancellationToken) -> Self {
        Self {
            root: shutdown,
            next_id: AtomicU64::new(0),
            tasks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Invokes `callback` immediately and then every `interval` until cancelled. Errors
    /// and panics from the callback are logged and the timer keeps running. Must be
    /// called from within a tokio runtime.
    pub fn subscribe<F, E>(
        &self,
        label: &str,
        interval: Duration,
        mut callback: F,
    ) -> SubscriptionHandle
    where
        F: FnMut(&SubscriptionHandle) -> Result<(), E> + Send + 'static,
        E: Display,
    {
        let handle = SubscriptionHandle {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            label: Arc::from(label),
            token: self.root.child_token(),
        };
        let period = interval.max(Duration::from_millis(1));

        let task_handle = handle.clone();
        let tasks = Arc::clone(&self.tasks);
        let task = async move {
            let handle = task_handle;
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    () = handle.token.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                if handle.token.is_cancelled() {
                    break;
                }

                match catch_unwind(AssertUnwindSafe(|| callback(&handle))) {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        warn!(subscription = %handle.label, error = %e, "refresh callback failed");
                    }
                    Err(panic) => {
                        error!(
                            subscription = %handle.label,
                            panic = panic_message(panic.as_ref()),
                            "refresh callback panicked"
                        );
                    }
                }
            }

            tasks.lock().remove(&handle.id);
            debug!(subscription = %handle.label, "subscription stopped");
        };

        // Held while spawning so the task cannot remove its entry before it is inserted.
        let mut tasks = self.tasks.lock();
        tasks.insert(handle.id, tokio::spawn(task));
        info!(
            subscription = %handle.label,
            interval = %humantime::format_duration(period),
            "subscribed refresh callback"
        );
        handle
    }

    pub fn unsubscribe(&self, handle: &SubscriptionHandle) {
        handle.cancel();
    }

    /// Number of subscriptions whose task has not exited yet.
    pub fn active(&self) -> usize {
        self.tasks.lock().len()
    }

    /// Cancels every subscription and waits for their tasks to exit.
    pub async fn shutdown(&self) {
        self.root.cancel();
        let handles: Vec<JoinHandle<()>> = self.tasks.lock().drain().map(|(_, h)| h).collect();
        let count = handles.len();
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = ?e, "subscription task did not exit cleanly");
            }
        }
        info!(subscriptions = count, "refresh scheduler stopped");
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        *message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counter() -> (Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        (Arc::clone(&count), count)
    }

    #[tokio::test(start_paused = true)]
    async fn failing_callback_keeps_firing() {
        let scheduler = RefreshScheduler::new(CancellationToken::new());
        let (calls, seen) = counter();
        scheduler.subscribe("failing", Duration::from_secs(1), move |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            Err("store unavailable")
        });

        tokio::time::sleep(Duration::from_millis(3500)).await;
        assert_eq!(seen.load(Ordering::SeqCst), 4);
        scheduler.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_callback_keeps_firing() {
        let scheduler = RefreshScheduler::new(CancellationToken::new());
        let (calls, seen) = counter();
        scheduler.subscribe("panicking", Duration::from_secs(1), move |_| {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                panic!("first tick blew up");
            }
            Ok::<(), String>(())
        });

        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert_eq!(seen.load(Ordering::SeqCst), 3);
        scheduler.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn cancelling_from_inside_the_callback_stops_the_timer() {
        let scheduler = RefreshScheduler::new(CancellationToken::new());
        let (calls, seen) = counter();
        scheduler.subscribe("self-cancelling", Duration::from_secs(1), move |handle| {
            if calls.fetch_add(1, Ordering::SeqCst) == 2 {
                handle.cancel();
            }
            Ok::<(), String>(())
        });

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(seen.load(Ordering::SeqCst), 3);
        assert_eq!(scheduler.active(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn unsubscribe_only_stops_its_own_subscription() {
        let scheduler = RefreshScheduler::new(CancellationToken::new());
        let (positions, positions_seen) = counter();
        let (alerts, alerts_seen) = counter();
        let position_handle = scheduler.subscribe("positions", Duration::from_secs(5), move |_| {
            positions.fetch_add(1, Ordering::SeqCst);
            Ok::<(), String>(())
        });
        scheduler.subscribe("alerts", Duration::from_secs(30), move |_| {
            alerts.fetch_add(1, Ordering::SeqCst);
            Ok::<(), String>(())
        });

        tokio::time::sleep(Duration::from_secs(12)).await;
        assert_eq!(positions_seen.load(Ordering::SeqCst), 3);
        scheduler.unsubscribe(&position_handle);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(positions_seen.load(Ordering::SeqCst), 3);
        assert_eq!(alerts_seen.load(Ordering::SeqCst), 3);
        assert_eq!(scheduler.active(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_token_stops_everything() {
        let shutdown = CancellationToken::new();
        let scheduler = RefreshScheduler::new(shutdown.clone());
        let (calls, seen) = counter();
        let handle = scheduler.subscribe("positions", Duration::from_secs(1), move |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<(), String>(())
        });

        tokio::time::sleep(Duration::from_millis(1500)).await;
        shutdown.cancel();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(seen.load(Ordering::SeqCst), 2);
        assert!(handle.is_cancelled());
        assert_eq!(scheduler.active(), 0);
    }
}
