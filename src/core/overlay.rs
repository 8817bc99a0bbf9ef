//! Screen-space anchors for the selected node's overlay panel.

use glam::Vec2;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::camera::{Camera, Viewport};
use crate::instances::InstanceBuffer;

/// Client-pixel position the overlay attaches to.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Anchor {
    pub x: f32,
    pub y: f32,
}

impl From<Vec2> for Anchor {
    fn from(v: Vec2) -> Self {
        Self { x: v.x, y: v.y }
    }
}

/// Project instance `index` to client pixels. `None` if the slot is stale or unprojectable.
pub fn anchor_for(
    index: usize,
    buffer: &InstanceBuffer,
    entity_count: usize,
    camera: &Camera,
    viewport: &Viewport,
) -> Option<Anchor> {
    if index >= buffer.len().min(entity_count) {
        return None;
    }
    let world = buffer.transform(index)?.translation();
    let ndc = camera.project(world)?;
    Some(viewport.ndc_to_client(ndc.truncate()).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CameraConfig;
    use crate::instances::{ColorChannel, InstanceTransform};
    use glam::Vec3;

    #[test]
    fn origin_anchors_at_viewport_center() {
        let vp = Viewport::new(100.0, 40.0, 220.0, 200.0);
        let cam = Camera::new(&CameraConfig::default(), vp.aspect());
        let mut buf = InstanceBuffer::allocate(2, ColorChannel::PerInstance);
        buf.write(0, InstanceTransform::from_translation(Vec3::ZERO), [1.0; 4]);
        buf.write(1, InstanceTransform::from_translation(Vec3::new(0.0, 50.0, 0.0)), [1.0; 4]);

        let a = anchor_for(0, &buf, 2, &cam, &vp).unwrap();
        assert!((a.x - 210.0).abs() < 1e-3);
        assert!((a.y - 140.0).abs() < 1e-3);

        // Above the center on screen means a smaller client y.
        let b = anchor_for(1, &buf, 2, &cam, &vp).unwrap();
        assert!((b.x - 210.0).abs() < 1e-3);
        assert!(b.y < a.y);
    }

    #[test]
    fn stale_index_has_no_anchor() {
        let vp = Viewport::new(0.0, 0.0, 220.0, 200.0);
        let cam = Camera::new(&CameraConfig::default(), vp.aspect());
        let buf = InstanceBuffer::allocate(4, ColorChannel::PerInstance);
        assert!(anchor_for(3, &buf, 3, &cam, &vp).is_none());
        assert!(anchor_for(9, &buf, 12, &cam, &vp).is_none());
        assert!(anchor_for(2, &buf, 3, &cam, &vp).is_some());
    }
}
