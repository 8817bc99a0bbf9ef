//! Ray-based hit testing against the node instances.

use glam::Vec2;

use crate::camera::Camera;
use crate::instances::InstanceBuffer;

/// Resolves pointer positions (NDC) to instance indices.
#[derive(Debug, Clone, Copy)]
pub struct Picker {
    /// Bounding-sphere radius of each marker.
    radius: f32,
}

impl Picker {
    pub fn new(radius: f32) -> Self {
        Self { radius }
    }

    /// Nearest instance hit by the camera ray through `ndc`.
    ///
    /// Only slots `0..min(buffer.len(), entity_count)` are considered.
    pub fn pick(
        &self,
        camera: &Camera,
        ndc: Vec2,
        buffer: &InstanceBuffer,
        entity_count: usize,
    ) -> Option<usize> {
        let ray = camera.ray_from_ndc(ndc)?;
        let n = buffer.len().min(entity_count);
        buffer.transforms()[..n]
            .iter()
            .enumerate()
            .filter_map(|(i, t)| {
                ray.intersect_sphere(t.translation(), self.radius)
                    .map(|d| (i, d))
            })
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(i, _)| i)
    }
}

/// Remembers the hovered index and reports only transitions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HoverTracker {
    current: Option<usize>,
}

impl HoverTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_initial(current: Option<usize>) -> Self {
        Self { current }
    }

    /// Record the latest pick. Returns true when it differs from the remembered one.
    pub fn update(&mut self, picked: Option<usize>) -> bool {
        if picked == self.current {
            return false;
        }
        self.current = picked;
        true
    }

    pub fn current(&self) -> Option<usize> {
        self.current
    }

    /// Forget the hovered index if it no longer addresses a live entity.
    pub fn clear_if_stale(&mut self, entity_count: usize) -> bool {
        match self.current {
            Some(i) if i >= entity_count => {
                self.current = None;
                true
            }
            _ => false,
        }
    }

    pub fn clear(&mut self) -> bool {
        self.current.take().is_some()
    }
}
