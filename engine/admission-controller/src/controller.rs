//! Sliding window admission per client identity

use dashmap::DashMap;
use serde::Serialize;
use std::collections::VecDeque;
use std::time::Instant;
use tracing::{debug, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::AdmissionConfig;
use crate::error::AdmissionError;

/// In-flight admissions of one client identity
#[derive(Debug)]
struct ClientWindow {
    /// Expiry instant of every unexpired admission, oldest first
    expiries: VecDeque<Instant>,

    /// Last time this identity asked for admission
    last_seen: Instant,
}

impl ClientWindow {
    fn new(now: Instant) -> Self {
        Self { expiries: VecDeque::new(), last_seen: now }
    }

    /// Drop admissions whose expiry has been reached, returning how many were dropped
    fn expire(&mut self, now: Instant) -> usize {
        let before = self.expiries.len();
        while self.expiries.front().is_some_and(|&expiry| expiry <= now) {
            self.expiries.pop_front();
        }
        before - self.expiries.len()
    }

    fn count(&self) -> usize {
        self.expiries.len()
    }

    fn in_flight_at(&self, now: Instant) -> usize {
        self.expiries.iter().filter(|&&expiry| expiry > now).count()
    }

    fn is_idle(&self, now: Instant, grace: std::time::Duration) -> bool {
        self.expiries.is_empty() && now.saturating_duration_since(self.last_seen) >= grace
    }
}

/// Outcome of one sweep over all identities
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Admissions whose window elapsed
    pub expired: usize,

    /// Identities removed for being idle
    pub evicted: usize,
}

/// Point-in-time view of the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AdmissionStats {
    pub tracked_identities: usize,
    pub in_flight: usize,
    pub limit_per_window: u32,
}

/// Per-identity request admission over a sliding window
///
/// Every accepted request holds one unit of its identity's budget until
/// `window` has passed since it was accepted. Rejected requests hold nothing.
pub struct AdmissionController<C: Clock = SystemClock> {
    config: AdmissionConfig,
    clock: C,
    clients: DashMap<String, ClientWindow>,
}

impl AdmissionController<SystemClock> {
    /// Create a controller driven by the system clock
    pub fn new(config: AdmissionConfig) -> Result<Self, AdmissionError> {
        Self::with_clock(config, SystemClock)
    }
}

impl<C: Clock> AdmissionController<C> {
    /// Create a controller driven by `clock`
    pub fn with_clock(config: AdmissionConfig, clock: C) -> Result<Self, AdmissionError> {
        config.validate()?;
        Ok(Self { config, clock, clients: DashMap::new() })
    }

    pub fn config(&self) -> &AdmissionConfig {
        &self.config
    }

    /// Admit one request from `identity` if its window has room.
    pub fn try_admit(&self, identity: &str) -> bool {
        let now = self.clock.now();

        if let Some(mut window) = self.clients.get_mut(identity) {
            return self.admit(identity, window.value_mut(), now);
        }

        // Concurrent first requests may overshoot the cap by a few entries.
        if self.clients.len() >= self.config.max_tracked_identities && !self.make_room(now) {
            warn!(
                identity,
                tracked = self.clients.len(),
                "admission table full of active clients, refusing new identity"
            );
            return false;
        }

        let mut window =
            self.clients.entry(identity.to_owned()).or_insert_with(|| ClientWindow::new(now));
        self.admit(identity, window.value_mut(), now)
    }

    /// Expire-check-increment, run while the caller holds the entry lock
    fn admit(&self, identity: &str, window: &mut ClientWindow, now: Instant) -> bool {
        window.expire(now);
        window.last_seen = now;

        if window.count() >= self.config.limit_per_window as usize {
            debug!(identity, in_flight = window.count(), "admission rejected");
            return false;
        }

        window.expiries.push_back(now + self.config.window);
        true
    }

    /// Expire elapsed admissions for every identity and evict idle ones
    pub fn sweep(&self) -> SweepReport {
        self.sweep_at(self.clock.now())
    }

    fn sweep_at(&self, now: Instant) -> SweepReport {
        let grace = self.config.idle_grace;
        let mut report = SweepReport::default();

        self.clients.retain(|_, window| {
            report.expired += window.expire(now);
            let idle = window.is_idle(now, grace);
            if idle {
                report.evicted += 1;
            }
            !idle
        });

        if report.evicted > 0 {
            debug!(evicted = report.evicted, expired = report.expired, "admission sweep");
        }
        report
    }

    /// Free one slot for a new identity, preferring idle entries past their grace period
    fn make_room(&self, now: Instant) -> bool {
        self.sweep_at(now);
        if self.clients.len() < self.config.max_tracked_identities {
            return true;
        }

        let victim = self
            .clients
            .iter()
            .filter(|entry| entry.value().count() == 0)
            .min_by_key(|entry| entry.value().last_seen)
            .map(|entry| entry.key().clone());

        match victim {
            Some(key) => {
                let removed = self.clients.remove_if(&key, |_, window| window.count() == 0);
                debug!(identity = %key, "evicted least recently seen idle identity");
                removed.is_some()
            }
            None => false,
        }
    }

    /// Admissions currently held by `identity`
    pub fn in_flight(&self, identity: &str) -> u32 {
        let now = self.clock.now();
        self.clients.get(identity).map_or(0, |window| window.in_flight_at(now) as u32)
    }

    pub fn tracked_identities(&self) -> usize {
        self.clients.len()
    }

    pub fn stats(&self) -> AdmissionStats {
        let now = self.clock.now();
        let in_flight = self.clients.iter().map(|entry| entry.value().in_flight_at(now)).sum();
        AdmissionStats {
            tracked_identities: self.clients.len(),
            in_flight,
            limit_per_window: self.config.limit_per_window,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::sync::Arc;
    use std::time::Duration;

    fn controller(config: AdmissionConfig) -> (AdmissionController<Arc<ManualClock>>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let controller = AdmissionController::with_clock(config, clock.clone()).unwrap();
        (controller, clock)
    }

    #[test]
    fn test_rapid_admissions_up_to_limit() {
        let (controller, clock) = controller(AdmissionConfig::per_minute(3));

        let mut outcomes = Vec::new();
        for _ in 0..4 {
            outcomes.push(controller.try_admit("10.0.0.1"));
            clock.advance(Duration::from_millis(200));
        }

        assert_eq!(outcomes, vec![true, true, true, false]);
        assert_eq!(controller.in_flight("10.0.0.1"), 3);
    }

    #[test]
    fn test_rejections_do_not_consume_budget() {
        let (controller, clock) = controller(AdmissionConfig::per_minute(2));

        assert!(controller.try_admit("a"));
        assert!(controller.try_admit("a"));
        for _ in 0..5 {
            assert!(!controller.try_admit("a"));
        }
        assert_eq!(controller.in_flight("a"), 2);

        clock.advance(Duration::from_secs(60));

        assert!(controller.try_admit("a"));
        assert!(controller.try_admit("a"));
        assert!(!controller.try_admit("a"));
    }

    #[test]
    fn test_expiry_at_exactly_one_window() {
        let (controller, clock) = controller(AdmissionConfig::per_minute(1));

        assert!(controller.try_admit("a"));
        clock.advance(Duration::from_millis(59_999));
        assert!(!controller.try_admit("a"));
        clock.advance(Duration::from_millis(1));
        assert!(controller.try_admit("a"));
    }

    #[test]
    fn test_each_admission_expires_independently() {
        let (controller, clock) = controller(AdmissionConfig::per_minute(2));

        assert!(controller.try_admit("a")); // t=0, expires 60
        clock.advance(Duration::from_secs(30));
        assert!(controller.try_admit("a")); // t=30, expires 90
        assert!(!controller.try_admit("a"));

        clock.advance(Duration::from_secs(30)); // t=60
        assert_eq!(controller.in_flight("a"), 1);
        assert!(controller.try_admit("a")); // expires 120
        assert!(!controller.try_admit("a"));

        clock.advance(Duration::from_secs(30)); // t=90
        assert_eq!(controller.in_flight("a"), 1);
        assert!(controller.try_admit("a"));
        assert!(!controller.try_admit("a"));
    }

    #[test]
    fn test_repeated_cycles_do_not_leak() {
        let (controller, clock) = controller(AdmissionConfig::per_minute(2));

        for _ in 0..100 {
            assert!(controller.try_admit("a"));
            assert!(controller.try_admit("a"));
            assert!(!controller.try_admit("a"));
            assert_eq!(controller.in_flight("a"), 2);
            clock.advance(Duration::from_secs(60));
            assert_eq!(controller.in_flight("a"), 0);
        }
    }

    #[test]
    fn test_identities_are_independent() {
        let (controller, _clock) = controller(AdmissionConfig::per_minute(1));

        assert!(controller.try_admit("a"));
        assert!(controller.try_admit("b"));
        assert!(!controller.try_admit("a"));
        assert!(!controller.try_admit("b"));
        assert_eq!(controller.tracked_identities(), 2);
    }

    #[test]
    fn test_sweep_expires_then_evicts_after_grace() {
        let config = AdmissionConfig {
            idle_grace: Duration::from_secs(300),
            ..AdmissionConfig::per_minute(5)
        };
        let (controller, clock) = controller(config);

        assert!(controller.try_admit("a"));
        assert!(controller.try_admit("a"));

        clock.advance(Duration::from_secs(60));
        assert_eq!(controller.sweep(), SweepReport { expired: 2, evicted: 0 });
        assert_eq!(controller.tracked_identities(), 1);

        clock.advance(Duration::from_secs(240));
        assert_eq!(controller.sweep(), SweepReport { expired: 0, evicted: 1 });
        assert_eq!(controller.tracked_identities(), 0);
    }

    #[test]
    fn test_sweep_keeps_identities_with_admissions_in_flight() {
        let config =
            AdmissionConfig { idle_grace: Duration::from_secs(1), ..AdmissionConfig::per_minute(5) };
        let (controller, clock) = controller(config);

        assert!(controller.try_admit("a"));
        clock.advance(Duration::from_secs(30));

        assert_eq!(controller.sweep(), SweepReport::default());
        assert_eq!(controller.in_flight("a"), 1);
    }

    #[test]
    fn test_full_table_evicts_least_recently_seen_idle_identity() {
        let config = AdmissionConfig {
            max_tracked_identities: 2,
            idle_grace: Duration::from_secs(3600),
            ..AdmissionConfig::per_minute(1)
        };
        let (controller, clock) = controller(config);

        assert!(controller.try_admit("a"));
        clock.advance(Duration::from_secs(1));
        assert!(controller.try_admit("b"));
        clock.advance(Duration::from_secs(60));

        assert!(controller.try_admit("c"));
        assert_eq!(controller.tracked_identities(), 2);
        assert_eq!(controller.in_flight("a"), 0);
        assert_eq!(controller.in_flight("c"), 1);
        // b survived and still has its budget
        assert!(controller.try_admit("b"));
    }

    #[test]
    fn test_full_table_of_active_identities_refuses_newcomers() {
        let config = AdmissionConfig { max_tracked_identities: 2, ..AdmissionConfig::per_minute(1) };
        let (controller, _clock) = controller(config);

        assert!(controller.try_admit("a"));
        assert!(controller.try_admit("b"));
        assert!(!controller.try_admit("c"));
        assert_eq!(controller.tracked_identities(), 2);
        assert_eq!(controller.in_flight("a"), 1);
    }

    #[test]
    fn test_concurrent_admissions_never_exceed_limit() {
        let (controller, _clock) = controller(AdmissionConfig::per_minute(50));

        let accepted: usize = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    scope.spawn(|| (0..20).filter(|_| controller.try_admit("shared")).count())
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).sum()
        });

        assert_eq!(accepted, 50);
        assert_eq!(controller.in_flight("shared"), 50);
    }

    #[test]
    fn test_stats() {
        let (controller, clock) = controller(AdmissionConfig::per_minute(3));

        controller.try_admit("a");
        controller.try_admit("a");
        controller.try_admit("b");
        clock.advance(Duration::from_secs(10));

        let stats = controller.stats();
        assert_eq!(stats.tracked_identities, 2);
        assert_eq!(stats.in_flight, 3);
        assert_eq!(stats.limit_per_window, 3);
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(AdmissionController::new(AdmissionConfig::per_minute(0)).is_err());
    }
}
