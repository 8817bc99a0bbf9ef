//! Entity store: the single owner of the node set and the alert log.
//!
//! Index stability is a standing invariant here: entity `i` lives in instance slot `i` for
//! as long as it exists. Growth appends, shrinking truncates, nothing is ever reordered.

use std::f32::consts::{PI, TAU};

use crate::config::SimulationConfig;
use crate::entity::{
    AlertEvent, AlertKind, AlertLog, NodeDetails, NodeEntity, NodeId, NodeStatus, Timestamp,
};
use crate::prng::Prng;

const ONE_HOUR_MS: u64 = 60 * 60 * 1000;

pub struct EntityStore {
    entities: Vec<NodeEntity>,
    alerts: AlertLog,
    next_id: NodeId,
    rng: Prng,
    sim: SimulationConfig,
}

impl EntityStore {
    /// Create a store holding `count` freshly generated nodes and the seed alert.
    pub fn new(count: usize, sim: SimulationConfig, rng: Prng, now: Timestamp) -> Self {
        let mut store = Self {
            entities: Vec::with_capacity(count),
            alerts: AlertLog::new(),
            next_id: 1,
            rng,
            sim,
        };
        store.append_fresh(count, now);
        store
            .alerts
            .push(AlertEvent::new(AlertKind::Info, "No recent errors", now));
        store
    }

    fn append_fresh(&mut self, count: usize, now: Timestamp) {
        for _ in 0..count {
            let id = self.next_id;
            self.next_id = self.next_id.wrapping_add(1);
            let node = self.generate(id, now);
            self.entities.push(node);
        }
    }

    fn generate(&mut self, id: NodeId, now: Timestamp) -> NodeEntity {
        let rng = &mut self.rng;
        let status = if rng.chance(self.sim.initial_online_ratio) {
            NodeStatus::Online
        } else {
            NodeStatus::Offline
        };
        let phi = rng.gen_range_f32(0.0, PI);
        let theta = rng.gen_range_f32(0.0, TAU);
        let age = rng.next_u32() as u64 % ONE_HOUR_MS;
        let major = rng.gen_range_u32(1, 3);
        let minor = rng.gen_range_u32(0, 9);
        NodeEntity {
            id,
            name: format!("Node-{id}"),
            status,
            phi,
            theta,
            last_seen: now.saturating_sub(age),
            details: NodeDetails {
                cpu_percent: rng.gen_range_u32(10, 90) as u8,
                mem_percent: rng.gen_range_u32(10, 80) as u8,
                version: format!("v{major}.{minor}"),
            },
        }
    }

    /// Advance every entity one simulation step, in place.
    pub fn tick(&mut self, now: Timestamp) {
        let jitter = self.sim.angle_jitter;
        let flip_p = self.sim.status_flip_probability;
        for node in &mut self.entities {
            node.phi += self.rng.jitter(jitter);
            node.theta += self.rng.jitter(jitter);
            if self.rng.chance(flip_p) {
                node.status = node.status.flipped();
            }
            node.last_seen = now;
            node.details.cpu_percent = self.rng.gen_range_u32(10, 90) as u8;
            node.details.mem_percent = self.rng.gen_range_u32(10, 80) as u8;
        }
    }

    /// Read-only view for rendering and UI.
    pub fn snapshot(&self) -> &[NodeEntity] {
        &self.entities
    }

    /// Grow by appending fresh nodes or shrink by truncating the tail.
    pub fn resize(&mut self, new_count: usize, now: Timestamp) {
        let len = self.entities.len();
        if new_count > len {
            self.entities.reserve(new_count - len);
            self.append_fresh(new_count - len, now);
        } else {
            self.entities.truncate(new_count);
        }
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&NodeEntity> {
        self.entities.get(index)
    }

    pub fn index_of(&self, id: NodeId) -> Option<usize> {
        self.entities.iter().position(|n| n.id == id)
    }

    pub fn push_alert(&mut self, alert: AlertEvent) {
        self.alerts.push(alert);
    }

    pub fn alerts(&self) -> &AlertLog {
        &self.alerts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(count: usize) -> EntityStore {
        EntityStore::new(count, SimulationConfig::default(), Prng::new(11), 10 * ONE_HOUR_MS)
    }

    #[test]
    fn fresh_nodes_are_in_range() {
        let s = store(64);
        assert_eq!(s.len(), 64);
        for (i, n) in s.snapshot().iter().enumerate() {
            assert_eq!(n.id, i as NodeId + 1);
            assert_eq!(n.name, format!("Node-{}", n.id));
            assert!((0.0..PI).contains(&n.phi));
            assert!((0.0..TAU).contains(&n.theta));
            assert!((10..=90).contains(&n.details.cpu_percent));
            assert!((10..=80).contains(&n.details.mem_percent));
            assert!(n.details.version.starts_with('v'));
            assert!(n.last_seen <= 10 * ONE_HOUR_MS);
        }
        assert_eq!(s.alerts().len(), 1);
        assert_eq!(s.alerts().latest().map(|a| a.kind), Some(AlertKind::Info));
    }

    #[test]
    fn tick_moves_angles_by_bounded_delta() {
        let mut s = store(32);
        let before: Vec<(f32, f32, String)> = s
            .snapshot()
            .iter()
            .map(|n| (n.phi, n.theta, n.details.version.clone()))
            .collect();
        s.tick(99);
        for (n, (phi, theta, version)) in s.snapshot().iter().zip(before) {
            assert!((n.phi - phi).abs() <= 0.005 + 1e-6);
            assert!((n.theta - theta).abs() <= 0.005 + 1e-6);
            assert_eq!(n.last_seen, 99);
            assert_eq!(n.details.version, version);
        }
    }

    #[test]
    fn flips_happen_with_certain_probability() {
        let sim = SimulationConfig {
            status_flip_probability: 1.0,
            ..SimulationConfig::default()
        };
        let mut s = EntityStore::new(8, sim, Prng::new(3), 0);
        let before: Vec<NodeStatus> = s.snapshot().iter().map(|n| n.status).collect();
        s.tick(1);
        for (n, st) in s.snapshot().iter().zip(before) {
            assert_eq!(n.status, st.flipped());
        }
    }

    #[test]
    fn resize_preserves_survivor_order() {
        let mut s = store(12);
        let ids: Vec<NodeId> = s.snapshot().iter().map(|n| n.id).collect();

        s.resize(5, 0);
        let shrunk: Vec<NodeId> = s.snapshot().iter().map(|n| n.id).collect();
        assert_eq!(shrunk, ids[..5]);

        s.resize(9, 0);
        let grown: Vec<NodeId> = s.snapshot().iter().map(|n| n.id).collect();
        assert_eq!(grown[..5], ids[..5]);
        // Truncated ids are not reused.
        assert_eq!(grown[5..], [13, 14, 15, 16]);
        assert_eq!(s.index_of(14), Some(6));
        assert_eq!(s.index_of(7), None);
    }
}
