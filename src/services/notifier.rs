//! History change notifications.
//!
//! A single "history changed" signal with many subscribers. Bursts of
//! publishes coalesce: a subscriber that has not looked in a while sees one
//! change, never a backlog.

use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Publisher side of the change signal.
pub struct ChangeNotifier {
    tx: watch::Sender<u64>,
}

impl ChangeNotifier {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(0);
        Self { tx }
    }

    /// Signal that the history changed.
    pub fn publish(&self) {
        self.tx.send_modify(|generation| *generation = generation.wrapping_add(1));
    }

    /// Register a new subscriber. Changes published before this call are
    /// not reported to it.
    pub fn subscribe(&self) -> Subscription {
        Subscription {
            rx: self.tx.subscribe(),
        }
    }

    /// Run `handler` on a background task once per observed change.
    ///
    /// Must be called from within a tokio runtime. The handler stops when
    /// the returned guard is dropped or the notifier goes away.
    pub fn listen<F>(&self, mut handler: F) -> ListenerGuard
    where
        F: FnMut() + Send + 'static,
    {
        let mut subscription = self.subscribe();
        let task = tokio::spawn(async move {
            while subscription.changed().await {
                handler();
            }
        });
        ListenerGuard { task }
    }

    /// Number of live subscribers.
    #[cfg(test)]
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiving side of the change signal. Dropping it unsubscribes.
pub struct Subscription {
    rx: watch::Receiver<u64>,
}

impl Subscription {
    /// Non-blocking check, for render loops: true if anything was published
    /// since the previous call.
    pub fn take(&mut self) -> bool {
        if self.rx.has_changed().unwrap_or(false) {
            self.rx.borrow_and_update();
            true
        } else {
            false
        }
    }

    /// Wait for the next change. Returns false once the notifier is gone.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }
}

/// Keeps a [`ChangeNotifier::listen`] handler alive.
pub struct ListenerGuard {
    task: JoinHandle<()>,
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn take_reports_once_per_burst() {
        let notifier = ChangeNotifier::new();
        let mut sub = notifier.subscribe();
        assert!(!sub.take());

        notifier.publish();
        notifier.publish();
        notifier.publish();

        assert!(sub.take());
        assert!(!sub.take());
    }

    #[test]
    fn every_subscriber_sees_the_change() {
        let notifier = ChangeNotifier::new();
        let mut a = notifier.subscribe();
        let mut b = notifier.subscribe();

        notifier.publish();

        assert!(a.take());
        assert!(b.take());
    }

    #[test]
    fn dropping_subscription_unsubscribes() {
        let notifier = ChangeNotifier::new();
        let sub = notifier.subscribe();
        assert_eq!(notifier.subscriber_count(), 1);
        drop(sub);
        assert_eq!(notifier.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn changed_ends_when_notifier_dropped() {
        let notifier = ChangeNotifier::new();
        let mut sub = notifier.subscribe();
        drop(notifier);
        assert!(!sub.changed().await);
    }

    #[tokio::test]
    async fn listener_runs_handler_and_stops_on_drop() {
        let notifier = ChangeNotifier::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let guard = notifier.listen(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        notifier.publish();
        for _ in 0..50 {
            if calls.load(Ordering::SeqCst) > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        drop(guard);
        tokio::task::yield_now().await;
        for _ in 0..50 {
            if notifier.subscriber_count() == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(notifier.subscriber_count(), 0);
    }
}
