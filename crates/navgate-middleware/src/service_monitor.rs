//! [`ServiceMonitor`] – readiness of the truncation configuration service.
//!
//! The navigation backend exposes a service that accepts the distance at
//! which a goal may be truncated.  Before any goal is dispatched the node
//! checks that this service is reachable.  Whoever bridges the service calls
//! [`ServiceMonitor::heartbeat`] whenever it sees the service alive; the
//! service is considered *up* while the latest heartbeat is younger than the
//! liveness window.
//!
//! [`ConfigService::wait_ready`] polls that state for at most the given
//! timeout and never blocks longer.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::debug;

/// Interval between readiness polls inside [`ConfigService::wait_ready`].
const POLL_INTERVAL: Duration = Duration::from_millis(10);

// ────────────────────────────────────────────────────────────────────────────
// Contract
// ────────────────────────────────────────────────────────────────────────────

/// A prerequisite service that must be up before goals are sent.
pub trait ConfigService: Send + Sync {
    /// Block for at most `timeout` waiting for the service.  Returns `true`
    /// as soon as it is reachable, `false` if the wait ran out.
    fn wait_ready(&self, timeout: Duration) -> bool;
}

/// Health state reported for the monitored service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceHealth {
    /// A heartbeat arrived within the liveness window.
    Up,
    /// No heartbeat yet, or the last one is too old.
    Down,
}

// ────────────────────────────────────────────────────────────────────────────
// ServiceMonitor
// ────────────────────────────────────────────────────────────────────────────

/// Heartbeat-driven [`ConfigService`].
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use navgate_middleware::service_monitor::{ConfigService, ServiceHealth, ServiceMonitor};
///
/// let monitor = ServiceMonitor::new("navigation_system_node/set_truncate_distance",
///     Duration::from_secs(2));
/// assert_eq!(monitor.health(), ServiceHealth::Down);
///
/// monitor.heartbeat();
/// assert!(monitor.wait_ready(Duration::from_millis(50)));
/// ```
#[derive(Debug)]
pub struct ServiceMonitor {
    service_name: String,
    liveness: Duration,
    last_heartbeat: Mutex<Option<Instant>>,
}

impl ServiceMonitor {
    /// Monitor `service_name`, treating it as up for `liveness` after each
    /// heartbeat.  Starts [`ServiceHealth::Down`].
    pub fn new(service_name: impl Into<String>, liveness: Duration) -> Self {
        Self {
            service_name: service_name.into(),
            liveness,
            last_heartbeat: Mutex::new(None),
        }
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Record that the service was just seen alive.
    pub fn heartbeat(&self) {
        let mut last = match self.last_heartbeat.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *last = Some(Instant::now());
    }

    /// Forget every heartbeat, e.g. after the bridge lost its connection.
    pub fn mark_down(&self) {
        let mut last = match self.last_heartbeat.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *last = None;
    }

    pub fn health(&self) -> ServiceHealth {
        let last = match self.last_heartbeat.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        };
        match last {
            Some(seen) if seen.elapsed() <= self.liveness => ServiceHealth::Up,
            _ => ServiceHealth::Down,
        }
    }
}

impl ConfigService for ServiceMonitor {
    fn wait_ready(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.health() == ServiceHealth::Up {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                debug!(service = %self.service_name, ?timeout, "service not ready before deadline");
                return false;
            }
            std::thread::sleep(POLL_INTERVAL.min(deadline - now));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn fresh_monitor_is_down() {
        let monitor = ServiceMonitor::new("svc", Duration::from_secs(5));
        assert_eq!(monitor.health(), ServiceHealth::Down);
    }

    #[test]
    fn heartbeat_brings_service_up() {
        let monitor = ServiceMonitor::new("svc", Duration::from_secs(5));
        monitor.heartbeat();
        assert_eq!(monitor.health(), ServiceHealth::Up);
        assert!(monitor.wait_ready(Duration::ZERO));
    }

    #[test]
    fn service_goes_down_when_silent() {
        let monitor = ServiceMonitor::new("svc", Duration::from_millis(20));
        monitor.heartbeat();
        thread::sleep(Duration::from_millis(30));
        assert_eq!(monitor.health(), ServiceHealth::Down);
    }

    #[test]
    fn mark_down_clears_heartbeat() {
        let monitor = ServiceMonitor::new("svc", Duration::from_secs(5));
        monitor.heartbeat();
        monitor.mark_down();
        assert_eq!(monitor.health(), ServiceHealth::Down);
    }

    #[test]
    fn wait_ready_gives_up_after_timeout() {
        let monitor = ServiceMonitor::new("svc", Duration::from_secs(5));
        let started = Instant::now();
        assert!(!monitor.wait_ready(Duration::from_millis(30)));
        let waited = started.elapsed();
        assert!(waited >= Duration::from_millis(30));
        assert!(waited < Duration::from_secs(1), "waited {waited:?}");
    }

    #[test]
    fn wait_ready_returns_once_heartbeat_arrives() {
        let monitor = Arc::new(ServiceMonitor::new("svc", Duration::from_secs(5)));
        let bridge = Arc::clone(&monitor);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            bridge.heartbeat();
        });
        assert!(monitor.wait_ready(Duration::from_secs(2)));
        handle.join().unwrap();
    }
}
