//! Process-wide session activity monitoring.

use std::sync::{Arc, Mutex, OnceLock};

use log::debug;
use tokio::sync::mpsc;

/// Counts requests in flight across sessions and exposes the count as a
/// single active/inactive signal.
///
/// The externally visible state is the derived boolean `count > 0`; the
/// observer callback fires only when that boolean changes value, never on
/// every increment or decrement, so overlapping requests don't cause a
/// loading indicator to flicker.
///
/// Increments and decrements are serialized through one mutex, and each
/// transition is enqueued for the observer before that mutex is released, so
/// concurrent sessions sharing a monitor never lose updates and the observer
/// always sees the edges in the order they occurred. In synchronous mode the
/// handler runs inline under that lock and must not call back into the
/// monitor.
pub struct SessionActivityMonitor {
    count: Mutex<i64>,
    handler: Arc<Mutex<Option<Arc<dyn Fn(bool) + Send + Sync>>>>,
    events: OnceLock<mpsc::UnboundedSender<bool>>,
    asynchronous: bool,
}

impl SessionActivityMonitor {
    /// Creates a monitor that delivers observer callbacks in transition
    /// order on the current tokio runtime.
    pub fn new() -> Self {
        Self::with_initial_count(0, true)
    }

    /// Creates a monitor that invokes observer callbacks inline on the
    /// calling thread, for deterministic tests.
    pub fn synchronous() -> Self {
        Self::with_initial_count(0, false)
    }

    fn with_initial_count(initial: i64, asynchronous: bool) -> Self {
        SessionActivityMonitor {
            count: Mutex::new(initial),
            handler: Arc::new(Mutex::new(None)),
            events: OnceLock::new(),
            asynchronous,
        }
    }

    /// The process-wide default instance used by sessions unless a scoped
    /// monitor is substituted.
    pub fn shared() -> Arc<SessionActivityMonitor> {
        static SHARED: OnceLock<Arc<SessionActivityMonitor>> = OnceLock::new();
        Arc::clone(SHARED.get_or_init(|| Arc::new(SessionActivityMonitor::new())))
    }

    /// Registers the observer called with `true` when activity starts and
    /// `false` when the last in-flight request finishes.
    pub fn set_activity_handler(&self, handler: impl Fn(bool) + Send + Sync + 'static) {
        *self
            .handler
            .lock()
            .expect("activity handler lock poisoned") = Some(Arc::new(handler));
    }

    /// Records one more request in flight.
    pub fn increment_count(&self) {
        self.adjust(1);
    }

    /// Records one request finished.
    pub fn decrement_count(&self) {
        self.adjust(-1);
    }

    /// Whether any request is currently in flight.
    pub fn is_active(&self) -> bool {
        *self.count.lock().expect("activity count lock poisoned") > 0
    }

    fn adjust(&self, delta: i64) {
        let mut count = self.count.lock().expect("activity count lock poisoned");
        let was_active = *count > 0;
        *count += delta;
        let is_active = *count > 0;
        if was_active != is_active {
            debug!("session activity changed: active={is_active}");
            // Enqueued while the count lock is still held, so the observer
            // cannot see a falling and a rising edge swapped.
            self.notify(is_active);
        }
    }

    fn notify(&self, active: bool) {
        if self.asynchronous {
            if let Some(events) = self.event_sender() {
                let _ = events.send(active);
                return;
            }
        }
        let handler = self
            .handler
            .lock()
            .expect("activity handler lock poisoned")
            .clone();
        if let Some(handler) = handler {
            handler(active);
        }
    }

    /// Lazily starts the single consumer task that delivers events in FIFO
    /// order. Returns `None` outside a tokio runtime, in which case the
    /// caller falls back to inline delivery.
    fn event_sender(&self) -> Option<mpsc::UnboundedSender<bool>> {
        if let Some(sender) = self.events.get() {
            return Some(sender.clone());
        }
        let runtime = tokio::runtime::Handle::try_current().ok()?;
        let sender = self.events.get_or_init(|| {
            let (sender, mut receiver) = mpsc::unbounded_channel();
            let handler = Arc::clone(&self.handler);
            runtime.spawn(async move {
                while let Some(active) = receiver.recv().await {
                    let handler = handler
                        .lock()
                        .expect("activity handler lock poisoned")
                        .clone();
                    if let Some(handler) = handler {
                        handler(active);
                    }
                }
            });
            sender
        });
        Some(sender.clone())
    }
}

impl Default for SessionActivityMonitor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recording_monitor() -> (SessionActivityMonitor, Arc<Mutex<Vec<bool>>>) {
        let monitor = SessionActivityMonitor::synchronous();
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        monitor.set_activity_handler(move |active| sink.lock().unwrap().push(active));
        (monitor, events)
    }

    #[test]
    fn test_increment_from_zero_fires_true_once() {
        let (monitor, events) = recording_monitor();
        monitor.increment_count();
        assert_eq!(*events.lock().unwrap(), vec![true]);
    }

    #[test]
    fn test_consecutive_increments_fire_once() {
        let (monitor, events) = recording_monitor();
        monitor.increment_count();
        monitor.increment_count();
        assert_eq!(*events.lock().unwrap(), vec![true]);
    }

    #[test]
    fn test_decrement_back_to_zero_fires_false_once() {
        let (monitor, events) = recording_monitor();
        monitor.increment_count();
        monitor.decrement_count();
        assert_eq!(*events.lock().unwrap(), vec![true, false]);
        assert!(!monitor.is_active());
    }

    #[test]
    fn test_decrements_through_negative_fire_once_at_zero_crossing() {
        let (monitor, events) = recording_monitor();
        monitor.increment_count();
        monitor.increment_count();
        events.lock().unwrap().clear();
        monitor.decrement_count();
        monitor.decrement_count();
        monitor.decrement_count();
        assert_eq!(*events.lock().unwrap(), vec![false]);
    }

    #[test]
    fn test_handler_registered_late_misses_earlier_edges() {
        let monitor = SessionActivityMonitor::synchronous();
        monitor.increment_count();
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        monitor.set_activity_handler(move |active| sink.lock().unwrap().push(active));
        monitor.decrement_count();
        assert_eq!(*events.lock().unwrap(), vec![false]);
    }

    #[test]
    fn test_concurrent_edges_are_observed_in_transition_order() {
        let monitor = Arc::new(SessionActivityMonitor::synchronous());
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        monitor.set_activity_handler(move |active| sink.lock().unwrap().push(active));

        let threads: Vec<_> = (0..4)
            .map(|_| {
                let monitor = Arc::clone(&monitor);
                std::thread::spawn(move || {
                    for _ in 0..250 {
                        monitor.increment_count();
                        monitor.decrement_count();
                    }
                })
            })
            .collect();
        for thread in threads {
            thread.join().unwrap();
        }

        // Transitions alternate by construction; a delivery reordering would
        // show up as two equal values in a row.
        let events = events.lock().unwrap();
        assert_eq!(events.first(), Some(&true));
        assert_eq!(events.last(), Some(&false));
        for pair in events.windows(2) {
            assert_ne!(pair[0], pair[1]);
        }
        assert!(!monitor.is_active());
    }

    #[tokio::test]
    async fn test_asynchronous_delivery_preserves_edge_order() {
        let monitor = Arc::new(SessionActivityMonitor::new());
        let (tx, mut rx) = mpsc::unbounded_channel();
        monitor.set_activity_handler(move |active| {
            let _ = tx.send(active);
        });

        monitor.increment_count();
        monitor.decrement_count();
        monitor.increment_count();
        monitor.decrement_count();

        let mut seen = Vec::new();
        for _ in 0..4 {
            seen.push(rx.recv().await.unwrap());
        }
        assert_eq!(seen, vec![true, false, true, false]);
    }
}
