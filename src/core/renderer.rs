//! Frame renderer: the render-loop state machine.
//!
//! ```text
//! Uninitialized --mount--> Running <--visibility--> Paused
//!        \                    |                       |
//!         `------------------dispose-----------------'--> Disposed
//! ```
//!
//! Each running frame recomputes every node's Cartesian position from its angles, writes the
//! translation and status color into the matching instance slot, spins the decorative globe
//! and issues one batched draw.

use glam::Mat4;
use tracing::{debug, warn};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::backend::{DrawFrame, RenderBackend, SceneMeshes};
use crate::config::{EngineConfig, Rgba};
use crate::entity::{NodeEntity, NodeStatus};
use crate::error::EngineError;
use crate::instances::{InstanceBuffer, InstanceColor, InstanceTransform};
use crate::mesh::SphereMesh;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum RenderState {
    Uninitialized,
    Running,
    Paused,
    Disposed,
}

/// What a frame callback did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Instances written and drawn.
    Drawn { instances: usize },
    /// Paused, not mounted or disposed: nothing happened.
    Idle,
}

/// Per-instance write parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InstanceStyle {
    pub radius: f32,
    pub online: Rgba,
    pub offline: Rgba,
}

impl InstanceStyle {
    pub fn from_config(cfg: &EngineConfig) -> Self {
        Self {
            radius: cfg.globe_radius,
            online: cfg.online_color,
            offline: cfg.offline_color,
        }
    }

    #[inline]
    pub fn color_for(&self, status: NodeStatus) -> Rgba {
        match status {
            NodeStatus::Online => self.online,
            NodeStatus::Offline => self.offline,
        }
    }
}

/// Write slots `0..min(buffer.len(), entities.len())`. Returns the number written.
pub fn write_instances(
    buffer: &mut InstanceBuffer,
    entities: &[NodeEntity],
    style: &InstanceStyle,
) -> usize {
    let n = buffer.len().min(entities.len());
    let (transforms, colors) = buffer.slots_mut();
    let entities = &entities[..n];
    let transforms = &mut transforms[..n];
    // Empty under the material-only channel.
    let color_len = colors.len().min(n);
    let colors = &mut colors[..color_len];

    #[cfg(feature = "parallel")]
    {
        transforms
            .par_iter_mut()
            .zip(entities.par_iter())
            .for_each(|(slot, node)| {
                *slot = InstanceTransform::from_translation(node.position(style.radius));
            });
        colors
            .par_iter_mut()
            .zip(entities.par_iter())
            .for_each(|(slot, node)| {
                *slot = InstanceColor {
                    rgba: style.color_for(node.status),
                };
            });
    }

    #[cfg(not(feature = "parallel"))]
    {
        for (slot, node) in transforms.iter_mut().zip(entities) {
            *slot = InstanceTransform::from_translation(node.position(style.radius));
        }
        for (slot, node) in colors.iter_mut().zip(entities) {
            *slot = InstanceColor {
                rgba: style.color_for(node.status),
            };
        }
    }

    n
}

pub struct FrameRenderer {
    state: RenderState,
    backend: Box<dyn RenderBackend>,
    buffer: Option<InstanceBuffer>,
    node_mesh: Option<SphereMesh>,
    globe_mesh: Option<SphereMesh>,
    style: InstanceStyle,
    node_radius: f32,
    node_segments: u32,
    globe_segments: u32,
    spin_per_frame: f32,
    globe_rotation: f32,
    frames: u64,
}

impl FrameRenderer {
    pub fn new(cfg: &EngineConfig, backend: Box<dyn RenderBackend>) -> Self {
        Self {
            state: RenderState::Uninitialized,
            backend,
            buffer: None,
            node_mesh: None,
            globe_mesh: None,
            style: InstanceStyle::from_config(cfg),
            node_radius: cfg.node_radius,
            node_segments: cfg.node_segments,
            globe_segments: cfg.globe_segments,
            spin_per_frame: cfg.globe_spin_per_frame,
            globe_rotation: 0.0,
            frames: 0,
        }
    }

    /// Allocate the instance buffer, build and upload the static meshes, start running.
    ///
    /// Only valid from `Uninitialized`; later calls are ignored. On a backend failure the
    /// renderer stays partially initialized and [`dispose`](Self::dispose) still cleans up.
    pub fn mount(&mut self, entity_count: usize) -> Result<(), EngineError> {
        if self.state != RenderState::Uninitialized {
            warn!(state = ?self.state, "mount ignored");
            return Ok(());
        }
        let channel = self.backend.capabilities().color_channel();
        self.buffer = Some(InstanceBuffer::allocate(entity_count, channel));

        let node = SphereMesh::uv(self.node_radius, self.node_segments, self.node_segments);
        let globe = SphereMesh::uv(self.style.radius, self.globe_segments, self.globe_segments);
        self.backend.upload_meshes(SceneMeshes {
            node: &node,
            globe: &globe,
        })?;
        self.node_mesh = Some(node);
        self.globe_mesh = Some(globe);

        self.state = RenderState::Running;
        debug!(entity_count, ?channel, backend = ?self.backend.kind(), "renderer mounted");
        Ok(())
    }

    /// One frame callback. A no-op unless running.
    pub fn frame(
        &mut self,
        entities: &[NodeEntity],
        view_projection: Mat4,
        viewport: (u32, u32),
    ) -> FrameOutcome {
        if self.state != RenderState::Running {
            return FrameOutcome::Idle;
        }
        let Some(buffer) = self.buffer.as_mut() else {
            return FrameOutcome::Idle;
        };

        let written = write_instances(buffer, entities, &self.style);
        self.globe_rotation += self.spin_per_frame;
        self.frames += 1;

        let draw = DrawFrame {
            view_projection,
            globe_rotation: self.globe_rotation,
            instance_count: written,
            material_color: self.style.online,
            viewport,
        };
        let result = self
            .backend
            .sync_instances(buffer)
            .and_then(|()| self.backend.draw(&draw));
        if let Err(e) = result {
            warn!("frame draw failed: {e}");
        }
        FrameOutcome::Drawn { instances: written }
    }

    /// Resize the instance buffer, keeping the surviving prefix.
    pub fn resize_instances(&mut self, new_count: usize) {
        if self.state == RenderState::Disposed {
            return;
        }
        if let Some(buffer) = self.buffer.as_mut() {
            buffer.resize(new_count);
        }
    }

    /// Visibility change: Running <-> Paused. Ignored in other states.
    pub fn set_visible(&mut self, visible: bool) {
        let next = match (self.state, visible) {
            (RenderState::Running, false) => RenderState::Paused,
            (RenderState::Paused, true) => RenderState::Running,
            _ => return,
        };
        debug!(from = ?self.state, to = ?next, "renderer visibility");
        self.state = next;
    }

    /// Release buffers, meshes and device resources. Idempotent; returns whether anything ran.
    pub fn dispose(&mut self) -> bool {
        if self.state == RenderState::Disposed {
            return false;
        }
        if let Some(buffer) = self.buffer.as_mut() {
            buffer.dispose();
        }
        self.node_mesh = None;
        self.globe_mesh = None;
        self.backend.release();
        debug!(from = ?self.state, frames = self.frames, "renderer disposed");
        self.state = RenderState::Disposed;
        true
    }

    pub fn state(&self) -> RenderState {
        self.state
    }

    pub fn buffer(&self) -> Option<&InstanceBuffer> {
        self.buffer.as_ref().filter(|b| !b.is_disposed())
    }

    pub fn globe_rotation(&self) -> f32 {
        self.globe_rotation
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn backend(&self) -> &dyn RenderBackend {
        self.backend.as_ref()
    }
}
