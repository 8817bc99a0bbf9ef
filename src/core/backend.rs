//! Render backend seam.
//!
//! The engine never talks to a graphics API directly. It hands the instance buffer and the
//! per-frame draw parameters to a [`RenderBackend`], chosen once at startup:
//!
//! - `Headless`: records uploads and draw calls; works everywhere (tests, servers, CI).
//! - `Gpu`: wgpu offscreen renderer (requires the `gpu` feature and a usable adapter).
//!
//! Asking for `Gpu` when it is not compiled in, or when no adapter is found, falls back to
//! `Headless` once, at selection time.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use glam::Mat4;
use tracing::{debug, warn};

use crate::error::BackendError;
use crate::instances::{ColorChannel, InstanceBuffer};
use crate::mesh::SphereMesh;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum BackendKind {
    #[default]
    Headless,
    Gpu,
}

/// What the backend can do, queried once at mount.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendCapabilities {
    pub instance_colors: bool,
}

impl BackendCapabilities {
    pub fn color_channel(&self) -> ColorChannel {
        if self.instance_colors {
            ColorChannel::PerInstance
        } else {
            ColorChannel::MaterialOnly
        }
    }
}

/// Static geometry uploaded once at mount.
pub struct SceneMeshes<'a> {
    pub node: &'a SphereMesh,
    pub globe: &'a SphereMesh,
}

/// Everything one draw call needs besides the instance buffer.
#[derive(Debug, Clone, Copy)]
pub struct DrawFrame {
    pub view_projection: Mat4,
    pub globe_rotation: f32,
    /// Instances to draw, `<= buffer.len()`.
    pub instance_count: usize,
    pub material_color: [f32; 4],
    pub viewport: (u32, u32),
}

pub trait RenderBackend {
    fn kind(&self) -> BackendKind;

    fn capabilities(&self) -> BackendCapabilities;

    /// Upload static meshes. Called once per mount.
    fn upload_meshes(&mut self, meshes: SceneMeshes<'_>) -> Result<(), BackendError>;

    /// Mirror the instance buffer. Reallocates device storage when the generation changed.
    fn sync_instances(&mut self, buffer: &InstanceBuffer) -> Result<(), BackendError>;

    /// One batched draw of all instances plus the globe.
    fn draw(&mut self, frame: &DrawFrame) -> Result<(), BackendError>;

    /// Release device resources. Must be idempotent.
    fn release(&mut self);
}

/// Counters kept by [`HeadlessBackend`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeadlessStats {
    pub mesh_uploads: u64,
    pub instance_syncs: u64,
    pub reallocations: u64,
    pub draw_calls: u64,
    pub last_instance_count: usize,
    pub releases: u64,
}

/// Backend with no device: tracks what would have been sent.
#[derive(Debug, Clone)]
pub struct HeadlessBackend {
    caps: BackendCapabilities,
    stats: HeadlessStats,
    generation: u64,
    released: bool,
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self::with_capabilities(BackendCapabilities {
            instance_colors: true,
        })
    }

    pub fn with_capabilities(caps: BackendCapabilities) -> Self {
        Self {
            caps,
            stats: HeadlessStats::default(),
            generation: 0,
            released: false,
        }
    }

    pub fn stats(&self) -> HeadlessStats {
        self.stats
    }
}

impl Default for HeadlessBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderBackend for HeadlessBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Headless
    }

    fn capabilities(&self) -> BackendCapabilities {
        self.caps
    }

    fn upload_meshes(&mut self, _meshes: SceneMeshes<'_>) -> Result<(), BackendError> {
        self.released = false;
        self.stats.mesh_uploads += 1;
        Ok(())
    }

    fn sync_instances(&mut self, buffer: &InstanceBuffer) -> Result<(), BackendError> {
        if self.released {
            return Err(BackendError::Released);
        }
        if buffer.generation() != self.generation {
            self.generation = buffer.generation();
            self.stats.reallocations += 1;
        }
        self.stats.instance_syncs += 1;
        Ok(())
    }

    fn draw(&mut self, frame: &DrawFrame) -> Result<(), BackendError> {
        if self.released {
            return Err(BackendError::Released);
        }
        self.stats.draw_calls += 1;
        self.stats.last_instance_count = frame.instance_count;
        Ok(())
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.stats.releases += 1;
        }
    }
}

/// Resolve the requested kind against what is compiled in and what the machine offers.
pub fn select_backend(requested: BackendKind, max_instances: usize) -> Box<dyn RenderBackend> {
    match requested {
        BackendKind::Headless => Box::new(HeadlessBackend::new()),
        BackendKind::Gpu => {
            #[cfg(feature = "gpu")]
            {
                match crate::gpu::GpuBackend::new(max_instances) {
                    Ok(gpu) => {
                        debug!("gpu backend selected");
                        return Box::new(gpu);
                    }
                    Err(e) => warn!("gpu backend unavailable ({e}); using headless"),
                }
            }
            #[cfg(not(feature = "gpu"))]
            {
                let _ = max_instances;
                warn!("gpu backend requested but the `gpu` feature is disabled; using headless");
            }
            debug!("headless backend selected");
            Box::new(HeadlessBackend::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capability_picks_color_channel() {
        let with = BackendCapabilities {
            instance_colors: true,
        };
        let without = BackendCapabilities {
            instance_colors: false,
        };
        assert_eq!(with.color_channel(), ColorChannel::PerInstance);
        assert_eq!(without.color_channel(), ColorChannel::MaterialOnly);
    }

    #[test]
    fn headless_tracks_generations() {
        let mut backend = HeadlessBackend::new();
        let mut buf = InstanceBuffer::allocate(4, ColorChannel::PerInstance);
        backend.sync_instances(&buf).unwrap();
        backend.sync_instances(&buf).unwrap();
        buf.resize(8);
        backend.sync_instances(&buf).unwrap();
        let stats = backend.stats();
        assert_eq!(stats.instance_syncs, 3);
        assert_eq!(stats.reallocations, 2);

        backend.release();
        backend.release();
        assert_eq!(backend.stats().releases, 1);
        assert!(matches!(
            backend.sync_instances(&buf),
            Err(BackendError::Released)
        ));
    }

    #[cfg(not(feature = "gpu"))]
    #[test]
    fn gpu_request_falls_back_without_feature() {
        let backend = select_backend(BackendKind::Gpu, 16);
        assert_eq!(backend.kind(), BackendKind::Headless);
    }
}
