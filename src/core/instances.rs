//! Per-instance transform/color arrays backing the batched node draw.
//!
//! Slot `i` always belongs to entity index `i`. A resize copies the surviving prefix into a
//! fresh pair of arrays and drops the old pair; nothing is remapped by id.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};
use tracing::debug;

use crate::config::Rgba;

/// Column-major 4x4 transform, laid out for a vertex buffer (4 x `Float32x4`).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct InstanceTransform {
    pub cols: [[f32; 4]; 4],
}

impl InstanceTransform {
    pub const IDENTITY: Self = Self {
        cols: [
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ],
    };

    pub fn from_translation(t: Vec3) -> Self {
        Self {
            cols: Mat4::from_translation(t).to_cols_array_2d(),
        }
    }

    pub fn translation(&self) -> Vec3 {
        let c = self.cols[3];
        Vec3::new(c[0], c[1], c[2])
    }

    pub fn to_mat4(&self) -> Mat4 {
        Mat4::from_cols_array_2d(&self.cols)
    }
}

impl Default for InstanceTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct InstanceColor {
    pub rgba: Rgba,
}

impl InstanceColor {
    /// Neutral white, what a renderer shows for slots that were never written.
    pub const DEFAULT: Self = Self {
        rgba: [1.0, 1.0, 1.0, 1.0],
    };
}

impl Default for InstanceColor {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// How per-instance color reaches the renderer. Chosen once when the buffer is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorChannel {
    /// A color array parallel to the transforms.
    PerInstance,
    /// No color array; the material color is used and color writes are dropped.
    MaterialOnly,
}

#[derive(Debug)]
pub struct InstanceBuffer {
    transforms: Vec<InstanceTransform>,
    colors: Vec<InstanceColor>,
    channel: ColorChannel,
    /// Bumped on every (re)allocation so GPU mirrors know to recreate their buffers.
    generation: u64,
    disposed: bool,
}

impl InstanceBuffer {
    /// Allocate a fresh pair of arrays sized `max(1, count)`.
    pub fn allocate(count: usize, channel: ColorChannel) -> Self {
        let capacity = count.max(1);
        debug!(capacity, ?channel, "instance buffer allocated");
        Self {
            transforms: vec![InstanceTransform::IDENTITY; capacity],
            colors: match channel {
                ColorChannel::PerInstance => vec![InstanceColor::DEFAULT; capacity],
                ColorChannel::MaterialOnly => Vec::new(),
            },
            channel,
            generation: 1,
            disposed: false,
        }
    }

    /// Reallocate to `max(1, new_count)` slots, keeping the first `min(old, new)` slots.
    ///
    /// Resizing a disposed buffer revives it with default contents.
    pub fn resize(&mut self, new_count: usize) {
        let capacity = new_count.max(1);
        let old = self.len();
        if capacity == old && !self.disposed {
            return;
        }
        let keep = old.min(capacity);

        let mut transforms = vec![InstanceTransform::IDENTITY; capacity];
        transforms[..keep].copy_from_slice(&self.transforms[..keep]);

        let colors = match self.channel {
            ColorChannel::PerInstance => {
                let mut colors = vec![InstanceColor::DEFAULT; capacity];
                let keep_colors = keep.min(self.colors.len());
                colors[..keep_colors].copy_from_slice(&self.colors[..keep_colors]);
                colors
            }
            ColorChannel::MaterialOnly => Vec::new(),
        };

        // Old arrays are released here.
        self.transforms = transforms;
        self.colors = colors;
        self.generation += 1;
        self.disposed = false;
        debug!(from = old, to = capacity, kept = keep, "instance buffer resized");
    }

    /// Release the arrays. Safe to call any number of times; returns whether anything was freed.
    pub fn dispose(&mut self) -> bool {
        if self.disposed {
            return false;
        }
        self.transforms = Vec::new();
        self.colors = Vec::new();
        self.disposed = true;
        self.generation += 1;
        debug!("instance buffer disposed");
        true
    }

    /// Current capacity; 0 only after [`dispose`](Self::dispose).
    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn channel(&self) -> ColorChannel {
        self.channel
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn transforms(&self) -> &[InstanceTransform] {
        &self.transforms
    }

    pub fn transforms_mut(&mut self) -> &mut [InstanceTransform] {
        &mut self.transforms
    }

    /// Empty when the color channel is [`ColorChannel::MaterialOnly`].
    pub fn colors(&self) -> &[InstanceColor] {
        &self.colors
    }

    /// Transforms and colors together, for bulk per-frame writes.
    pub fn slots_mut(&mut self) -> (&mut [InstanceTransform], &mut [InstanceColor]) {
        (&mut self.transforms, &mut self.colors)
    }

    pub fn transform(&self, index: usize) -> Option<&InstanceTransform> {
        self.transforms.get(index)
    }

    pub fn color(&self, index: usize) -> Option<&InstanceColor> {
        self.colors.get(index)
    }

    /// Write a slot. Out-of-range indices are ignored (a handler may run mid-resize).
    pub fn write(&mut self, index: usize, transform: InstanceTransform, color: Rgba) {
        if let Some(slot) = self.transforms.get_mut(index) {
            *slot = transform;
        }
        if let Some(slot) = self.colors.get_mut(index) {
            slot.rgba = color;
        }
    }
}
