//! Engine configuration.
//!
//! Every field has a default matching the stock globe panel, so a partial JSON document
//! (or none at all) yields a usable configuration.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::backend::BackendKind;

/// Linear RGBA color in `[0,1]`.
pub type Rgba = [f32; 4];

/// Convert a `0xRRGGBB` literal into an opaque [`Rgba`].
pub fn hex_rgba(hex: u32) -> Rgba {
    [
        ((hex >> 16) & 0xff) as f32 / 255.0,
        ((hex >> 8) & 0xff) as f32 / 255.0,
        (hex & 0xff) as f32 / 255.0,
        1.0,
    ]
}

/// `#38c0fc`
pub const ONLINE_COLOR: Rgba = [56.0 / 255.0, 192.0 / 255.0, 252.0 / 255.0, 1.0];
/// `#e04c4c`
pub const OFFLINE_COLOR: Rgba = [224.0 / 255.0, 76.0 / 255.0, 76.0 / 255.0, 1.0];

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SimulationConfig {
    /// Period between simulation ticks, independent of frame rate.
    pub period_ms: u64,
    /// Full width of the per-tick angular jitter (radians).
    pub angle_jitter: f32,
    pub status_flip_probability: f32,
    pub alert_probability: f32,
    /// Share of freshly generated nodes that start online.
    pub initial_online_ratio: f32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            period_ms: 3_000,
            angle_jitter: 0.01,
            status_flip_probability: 0.08,
            alert_probability: 0.25,
            initial_online_ratio: 0.8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct CameraConfig {
    pub fov_y_degrees: f32,
    pub distance: f32,
    pub near: f32,
    pub far: f32,
    /// Orbit damping factor applied per frame (0 = no motion, 1 = no damping).
    pub damping: f32,
    /// Radians of orbit per dragged pixel.
    pub rotate_speed: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov_y_degrees: 45.0,
            distance: 200.0,
            near: 0.1,
            far: 1000.0,
            damping: 0.07,
            rotate_speed: 0.005,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct EngineConfig {
    pub initial_node_count: usize,
    pub globe_radius: f32,
    pub globe_segments: u32,
    /// Radius of each node marker; also the picking bounding sphere.
    pub node_radius: f32,
    pub node_segments: u32,
    /// Decorative globe spin per rendered frame (radians).
    pub globe_spin_per_frame: f32,
    pub online_color: Rgba,
    pub offline_color: Rgba,
    pub viewport_width: f32,
    pub viewport_height: f32,
    pub seed: Option<u64>,
    pub backend: BackendKind,
    pub simulation: SimulationConfig,
    pub camera: CameraConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            initial_node_count: 12,
            globe_radius: 50.0,
            globe_segments: 32,
            node_radius: 3.2,
            node_segments: 12,
            globe_spin_per_frame: 0.0018,
            online_color: ONLINE_COLOR,
            offline_color: OFFLINE_COLOR,
            viewport_width: 220.0,
            viewport_height: 200.0,
            seed: None,
            backend: BackendKind::Headless,
            simulation: SimulationConfig::default(),
            camera: CameraConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Upper bound on the fleet size (keeps instance buffers within a sane GPU budget).
    pub const MAX_NODES: usize = 1 << 20;
    pub const MIN_SEGMENTS: u32 = 3;

    pub fn with_node_count(mut self, count: usize) -> Self {
        self.initial_node_count = count;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Seed used when none is configured.
    pub fn effective_seed(&self) -> u64 {
        self.seed.unwrap_or(0x5EED_0F_6C0BE)
    }

    /// Validate the configuration, returning an error message if invalid.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.initial_node_count > Self::MAX_NODES {
            return Err("initial_node_count too large");
        }
        if !self.globe_radius.is_finite() || self.globe_radius <= 0.0 {
            return Err("globe_radius must be finite and > 0");
        }
        if !self.node_radius.is_finite() || self.node_radius <= 0.0 {
            return Err("node_radius must be finite and > 0");
        }
        if self.globe_segments < Self::MIN_SEGMENTS || self.node_segments < Self::MIN_SEGMENTS {
            return Err("mesh segments must be >= 3");
        }
        if !self.globe_spin_per_frame.is_finite() {
            return Err("globe_spin_per_frame must be finite");
        }
        if !(self.viewport_width > 0.0 && self.viewport_height > 0.0) {
            return Err("viewport dimensions must be > 0");
        }

        let sim = &self.simulation;
        if sim.period_ms == 0 {
            return Err("simulation.period_ms must be > 0");
        }
        if !sim.angle_jitter.is_finite() || sim.angle_jitter < 0.0 {
            return Err("simulation.angle_jitter must be finite and >= 0");
        }
        for p in [
            sim.status_flip_probability,
            sim.alert_probability,
            sim.initial_online_ratio,
        ] {
            if !(0.0..=1.0).contains(&p) {
                return Err("simulation probabilities must be in [0, 1]");
            }
        }

        let cam = &self.camera;
        if !(cam.fov_y_degrees > 0.0 && cam.fov_y_degrees < 180.0) {
            return Err("camera.fov_y_degrees must be in (0, 180)");
        }
        if !(cam.near > 0.0 && cam.far > cam.near) {
            return Err("camera clip planes must satisfy 0 < near < far");
        }
        if !(cam.distance > self.globe_radius) {
            return Err("camera.distance must be outside the globe");
        }
        if !(0.0..=1.0).contains(&cam.damping) {
            return Err("camera.damping must be in [0, 1]");
        }
        Ok(())
    }

    #[cfg(feature = "serde")]
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert_eq!(EngineConfig::default().validate(), Ok(()));
    }

    #[test]
    fn hex_conversion() {
        assert_eq!(hex_rgba(0xff0000), [1.0, 0.0, 0.0, 1.0]);
        assert_eq!(hex_rgba(0x38c0fc), ONLINE_COLOR);
        assert_eq!(hex_rgba(0xe04c4c), OFFLINE_COLOR);
    }

    #[test]
    fn rejects_bad_values() {
        let mut cfg = EngineConfig::default();
        cfg.simulation.alert_probability = 1.5;
        assert!(cfg.validate().is_err());

        let mut cfg = EngineConfig::default();
        cfg.camera.distance = 10.0;
        assert!(cfg.validate().is_err());

        let mut cfg = EngineConfig::default();
        cfg.simulation.period_ms = 0;
        assert!(cfg.validate().is_err());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn partial_json_fills_defaults() {
        let cfg = EngineConfig::from_json(r#"{"initial_node_count": 40, "simulation": {"period_ms": 500}}"#)
            .unwrap();
        assert_eq!(cfg.initial_node_count, 40);
        assert_eq!(cfg.simulation.period_ms, 500);
        assert_eq!(cfg.simulation.alert_probability, 0.25);
        assert_eq!(cfg.globe_radius, 50.0);
    }
}
