//! Fixed-period telemetry simulation.
//!
//! The simulator runs on its own cadence, decoupled from the frame rate. Each period it
//! ticks the [`EntityStore`] in place and occasionally raises an alert. Renderers read the
//! store directly, so UI snapshots trail the real state by at most one period.

use tracing::debug;

use crate::config::SimulationConfig;
use crate::entity::{AlertEvent, AlertKind, Timestamp};
use crate::prng::Prng;
use crate::store::EntityStore;

const ALERT_MESSAGES: [&str; 5] = [
    "CPU usage high",
    "Memory spike detected",
    "Node disconnected",
    "New update available",
    "No recent errors",
];

pub struct Simulator {
    cfg: SimulationConfig,
    rng: Prng,
    next_due: Option<Timestamp>,
    ticks: u64,
}

impl Simulator {
    pub fn new(cfg: SimulationConfig, rng: Prng) -> Self {
        Self {
            cfg,
            rng,
            next_due: None,
            ticks: 0,
        }
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Whether a period has elapsed. The first call arms the schedule and returns false.
    ///
    /// For hosts that drive everything from one loop instead of a dedicated timer.
    pub fn due(&mut self, now: Timestamp) -> bool {
        match self.next_due {
            None => {
                self.next_due = Some(now + self.cfg.period_ms);
                false
            }
            Some(due) if now >= due => {
                // Skip missed periods rather than bursting to catch up.
                let behind = (now - due) / self.cfg.period_ms;
                self.next_due = Some(due + (behind + 1) * self.cfg.period_ms);
                true
            }
            Some(_) => false,
        }
    }

    /// One simulation period: tick the store, maybe raise an alert.
    pub fn run_period(&mut self, store: &mut EntityStore, now: Timestamp) -> Option<AlertEvent> {
        store.tick(now);
        self.ticks += 1;

        if !self.rng.chance(self.cfg.alert_probability) {
            return None;
        }
        let alert = self.generate_alert(now);
        debug!(kind = %alert.kind, message = %alert.message, "alert raised");
        store.push_alert(alert.clone());
        Some(alert)
    }

    fn generate_alert(&mut self, now: Timestamp) -> AlertEvent {
        let kind = AlertKind::ALL[self.rng.gen_index(AlertKind::ALL.len())];
        let message = ALERT_MESSAGES[self.rng.gen_index(ALERT_MESSAGES.len())];
        AlertEvent::new(kind, message, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(alert_probability: f32) -> SimulationConfig {
        SimulationConfig {
            alert_probability,
            ..SimulationConfig::default()
        }
    }

    #[test]
    fn due_follows_fixed_period() {
        let mut sim = Simulator::new(cfg(0.0), Prng::new(1));
        assert!(!sim.due(0));
        assert!(!sim.due(2_999));
        assert!(sim.due(3_000));
        assert!(!sim.due(3_001));
        // Long stall: one tick, then back on the 3s grid.
        assert!(sim.due(10_500));
        assert!(!sim.due(11_999));
        assert!(sim.due(12_000));
    }

    #[test]
    fn alerts_respect_probability() {
        let mut store = EntityStore::new(4, cfg(1.0), Prng::new(2), 0);
        let mut always = Simulator::new(cfg(1.0), Prng::new(5));
        for t in 1..=10 {
            let alert = always.run_period(&mut store, t);
            assert!(alert.is_some());
        }
        assert_eq!(store.alerts().len(), 6);
        assert_eq!(store.alerts().latest().map(|a| a.timestamp), Some(10));
        assert!(ALERT_MESSAGES.contains(&store.alerts().latest().unwrap().message.as_str()));

        let mut never = Simulator::new(cfg(0.0), Prng::new(5));
        assert!(never.run_period(&mut store, 11).is_none());
        assert_eq!(store.alerts().latest().map(|a| a.timestamp), Some(10));
        assert_eq!(never.ticks(), 1);
    }

    #[test]
    fn period_mutates_in_place() {
        let mut store = EntityStore::new(3, cfg(0.0), Prng::new(9), 0);
        let ids: Vec<u32> = store.snapshot().iter().map(|n| n.id).collect();
        let mut sim = Simulator::new(cfg(0.0), Prng::new(4));
        sim.run_period(&mut store, 42);
        let after: Vec<u32> = store.snapshot().iter().map(|n| n.id).collect();
        assert_eq!(ids, after);
        assert!(store.snapshot().iter().all(|n| n.last_seen == 42));
    }
}
