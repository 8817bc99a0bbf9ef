//! Node entities and the bounded alert log.

use std::collections::VecDeque;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use glam::Vec3;

/// Stable node identifier. Ids are never reused within one store.
pub type NodeId = u32;

/// Milliseconds since the Unix epoch.
pub type Timestamp = u64;

/// Maximum number of alerts retained (newest first).
pub const ALERT_LOG_CAPACITY: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum NodeStatus {
    Online,
    Offline,
}

impl NodeStatus {
    pub fn flipped(self) -> Self {
        match self {
            NodeStatus::Online => NodeStatus::Offline,
            NodeStatus::Offline => NodeStatus::Online,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            NodeStatus::Online => "online",
            NodeStatus::Offline => "offline",
        }
    }
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NodeDetails {
    pub cpu_percent: u8,
    pub mem_percent: u8,
    pub version: String,
}

/// A monitored node placed on the sphere by its spherical angles.
///
/// The Cartesian position is never stored; it is derived from `(phi, theta)` every frame
/// with [`spherical_to_cartesian`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NodeEntity {
    pub id: NodeId,
    pub name: String,
    pub status: NodeStatus,
    /// Polar angle (radians). Unbounded; wraps through the trig functions.
    pub phi: f32,
    /// Azimuth (radians). Unbounded.
    pub theta: f32,
    pub last_seen: Timestamp,
    pub details: NodeDetails,
}

impl NodeEntity {
    pub fn position(&self, radius: f32) -> Vec3 {
        spherical_to_cartesian(self.phi, self.theta, radius)
    }

    pub fn is_online(&self) -> bool {
        self.status == NodeStatus::Online
    }

    /// One-line tooltip label, e.g. `Node-3 — ONLINE`.
    pub fn tooltip_label(&self) -> String {
        format!("{} — {}", self.name, self.status.as_str().to_uppercase())
    }
}

/// `(r·sinφ·cosθ, r·cosφ, r·sinφ·sinθ)`: y is the polar axis.
#[inline]
pub fn spherical_to_cartesian(phi: f32, theta: f32, radius: f32) -> Vec3 {
    let (sin_phi, cos_phi) = phi.sin_cos();
    let (sin_theta, cos_theta) = theta.sin_cos();
    Vec3::new(
        radius * sin_phi * cos_theta,
        radius * cos_phi,
        radius * sin_phi * sin_theta,
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum AlertKind {
    Error,
    Warning,
    Info,
}

impl AlertKind {
    pub const ALL: [AlertKind; 3] = [AlertKind::Error, AlertKind::Warning, AlertKind::Info];
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AlertKind::Error => "error",
            AlertKind::Warning => "warning",
            AlertKind::Info => "info",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AlertEvent {
    pub kind: AlertKind,
    pub message: String,
    pub timestamp: Timestamp,
}

impl AlertEvent {
    pub fn new(kind: AlertKind, message: impl Into<String>, timestamp: Timestamp) -> Self {
        Self {
            kind,
            message: message.into(),
            timestamp,
        }
    }
}

/// Newest-first alert log capped at [`ALERT_LOG_CAPACITY`].
#[derive(Debug, Clone, Default)]
pub struct AlertLog {
    entries: VecDeque<AlertEvent>,
}

impl AlertLog {
    pub fn new() -> Self {
        Self {
            entries: VecDeque::with_capacity(ALERT_LOG_CAPACITY + 1),
        }
    }

    /// Prepend `alert`, evicting the oldest entries beyond the cap.
    pub fn push(&mut self, alert: AlertEvent) {
        self.entries.push_front(alert);
        self.entries.truncate(ALERT_LOG_CAPACITY);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn latest(&self) -> Option<&AlertEvent> {
        self.entries.front()
    }

    /// Newest first.
    pub fn iter(&self) -> impl Iterator<Item = &AlertEvent> {
        self.entries.iter()
    }

    pub fn to_vec(&self) -> Vec<AlertEvent> {
        self.entries.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::{FRAC_PI_2, PI};

    #[test]
    fn cartesian_matches_formula() {
        let r = 50.0;
        for &(phi, theta) in &[(0.3f32, 1.1f32), (2.9, -4.0), (7.5, 13.0), (-1.0, 0.0)] {
            let p = spherical_to_cartesian(phi, theta, r);
            assert_eq!(p.x, r * phi.sin() * theta.cos());
            assert_eq!(p.y, r * phi.cos());
            assert_eq!(p.z, r * phi.sin() * theta.sin());
        }
    }

    #[test]
    fn cartesian_is_idempotent() {
        let a = spherical_to_cartesian(1.234, 5.678, 50.0);
        let b = spherical_to_cartesian(1.234, 5.678, 50.0);
        assert_eq!(a.to_array().map(f32::to_bits), b.to_array().map(f32::to_bits));
    }

    #[test]
    fn cardinal_points() {
        let north = spherical_to_cartesian(0.0, 0.0, 50.0);
        assert!((north - Vec3::new(0.0, 50.0, 0.0)).length() < 1e-4);
        let front = spherical_to_cartesian(FRAC_PI_2, FRAC_PI_2, 50.0);
        assert!((front - Vec3::new(0.0, 0.0, 50.0)).length() < 1e-4);
        let south = spherical_to_cartesian(PI, 0.0, 50.0);
        assert!((south.y + 50.0).abs() < 1e-4);
    }

    #[test]
    fn alert_log_keeps_six_newest_first() {
        let mut log = AlertLog::new();
        for i in 0..10u64 {
            log.push(AlertEvent::new(AlertKind::Info, format!("alert {i}"), i));
        }
        assert_eq!(log.len(), ALERT_LOG_CAPACITY);
        let stamps: Vec<u64> = log.iter().map(|a| a.timestamp).collect();
        assert_eq!(stamps, vec![9, 8, 7, 6, 5, 4]);
        assert_eq!(log.latest().map(|a| a.message.as_str()), Some("alert 9"));
    }

    #[test]
    fn tooltip_uses_upper_status() {
        let node = NodeEntity {
            id: 3,
            name: "Node-3".into(),
            status: NodeStatus::Offline,
            phi: 0.0,
            theta: 0.0,
            last_seen: 0,
            details: NodeDetails {
                cpu_percent: 20,
                mem_percent: 30,
                version: "v1.0".into(),
            },
        };
        assert_eq!(node.tooltip_label(), "Node-3 — OFFLINE");
        assert_eq!(NodeStatus::Offline.flipped(), NodeStatus::Online);
    }
}
