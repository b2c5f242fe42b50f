// src/events.rs
//
// In-process fan-out for live clients of the same team. Not a durable
// queue: listeners registered after an emit never see it, and nothing
// survives a restart. It only drives soft, re-fetchable UI notifications.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use log::{error, warn};
use serde::Serialize;

use crate::models::TaskStatus;

/// A domain event scoped to one team.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TeamEvent {
    /// An activity-log row was appended.
    Activity {
        team_id: i64,
        actor_id: String,
        action_type: String,
        target_type: String,
        target_id: String,
    },
    /// Someone asked to join the team; admins should refresh their queue.
    JoinRequested {
        team_id: i64,
        request_id: i64,
        user_id: String,
    },
    /// A notification row was created for a specific user.
    NotificationCreated {
        team_id: i64,
        user_id: String,
        notification_id: i64,
    },
    /// A task changed status.
    TaskStatusChanged {
        team_id: i64,
        task_id: i64,
        from: TaskStatus,
        to: TaskStatus,
    },
}

impl TeamEvent {
    pub fn team_id(&self) -> i64 {
        match self {
            TeamEvent::Activity { team_id, .. }
            | TeamEvent::JoinRequested { team_id, .. }
            | TeamEvent::NotificationCreated { team_id, .. }
            | TeamEvent::TaskStatusChanged { team_id, .. } => *team_id,
        }
    }
}

/// Handle returned by [`EventBus::on`], used to deregister.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = std::sync::Arc<dyn Fn(&TeamEvent) + Send + Sync>;

/// Explicitly constructed pub/sub registry. One instance lives in
/// `AppState` for the lifetime of the server; handlers emit, the live
/// notifier subscribes.
pub struct EventBus {
    listeners: Mutex<HashMap<u64, Listener>>,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        EventBus {
            listeners: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a listener; it receives every subsequent emit until `off`.
    pub fn on<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&TeamEvent) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut listeners = match self.listeners.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        listeners.insert(id, std::sync::Arc::new(listener));
        ListenerId(id)
    }

    /// Deregister. Returns false if the id was already gone.
    pub fn off(&self, id: ListenerId) -> bool {
        let mut listeners = match self.listeners.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        listeners.remove(&id.0).is_some()
    }

    /// Deliver `event` to every currently registered listener. A panicking
    /// listener is logged and skipped; it cannot block the others.
    pub fn emit(&self, event: &TeamEvent) {
        let snapshot: Vec<Listener> = {
            let listeners = match self.listeners.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            listeners.values().cloned().collect()
        };

        for listener in snapshot {
            if catch_unwind(AssertUnwindSafe(|| listener(event))).is_err() {
                error!("event listener panicked on {:?}", event);
            }
        }
    }

    pub fn listener_count(&self) -> usize {
        match self.listeners.lock() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    /// Drop all listeners. Called on shutdown so late emits go nowhere.
    pub fn shutdown(&self) {
        let mut listeners = match self.listeners.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if !listeners.is_empty() {
            warn!("shutting down event bus with {} listeners", listeners.len());
        }
        listeners.clear();
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    fn activity(team_id: i64) -> TeamEvent {
        TeamEvent::Activity {
            team_id,
            actor_id: "u1".into(),
            action_type: "task_updated".into(),
            target_type: "task".into(),
            target_id: "42".into(),
        }
    }

    #[test]
    fn delivers_to_all_listeners() {
        let bus = EventBus::new();
        let hits = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let hits = hits.clone();
            bus.on(move |_| {
                hits.fetch_add(1, Ordering::SeqCst);
            });
        }
        bus.emit(&activity(1));
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn off_stops_delivery() {
        let bus = EventBus::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let id = {
            let hits = hits.clone();
            bus.on(move |_| {
                hits.fetch_add(1, Ordering::SeqCst);
            })
        };
        assert!(bus.off(id));
        assert!(!bus.off(id));
        bus.emit(&activity(1));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn panicking_listener_is_isolated() {
        let bus = EventBus::new();
        let hits = Arc::new(AtomicUsize::new(0));
        bus.on(|_| panic!("boom"));
        {
            let hits = hits.clone();
            bus.on(move |_| {
                hits.fetch_add(1, Ordering::SeqCst);
            });
        }
        bus.emit(&activity(1));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn late_listeners_miss_past_events() {
        let bus = EventBus::new();
        bus.emit(&activity(1));
        let hits = Arc::new(AtomicUsize::new(0));
        {
            let hits = hits.clone();
            bus.on(move |_| {
                hits.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        bus.emit(&activity(2));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn shutdown_clears_registry() {
        let bus = EventBus::new();
        bus.on(|_| {});
        bus.on(|_| {});
        assert_eq!(bus.listener_count(), 2);
        bus.shutdown();
        assert_eq!(bus.listener_count(), 0);
    }
}
