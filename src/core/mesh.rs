//! Static UV-sphere geometry for the node markers and the decorative globe.

use std::f32::consts::{PI, TAU};

use bytemuck::{Pod, Zeroable};

use crate::entity::spherical_to_cartesian;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
}

/// Indexed sphere with both a triangle list (solid markers) and a line list (wireframe globe).
#[derive(Debug, Clone)]
pub struct SphereMesh {
    pub radius: f32,
    pub vertices: Vec<MeshVertex>,
    pub triangles: Vec<u32>,
    pub lines: Vec<u32>,
}

impl SphereMesh {
    /// `segments` columns around the y axis, `rings` rows from pole to pole.
    pub fn uv(radius: f32, segments: u32, rings: u32) -> Self {
        let segments = segments.max(3);
        let rings = rings.max(2);
        let stride = segments + 1;

        let mut vertices = Vec::with_capacity(((rings + 1) * stride) as usize);
        for ring in 0..=rings {
            let phi = PI * ring as f32 / rings as f32;
            for seg in 0..=segments {
                let theta = TAU * seg as f32 / segments as f32;
                let n = spherical_to_cartesian(phi, theta, 1.0);
                vertices.push(MeshVertex {
                    position: (n * radius).to_array(),
                    normal: n.to_array(),
                });
            }
        }

        let mut triangles = Vec::with_capacity((rings * segments * 6) as usize);
        let mut lines = Vec::with_capacity((rings * segments * 4) as usize);
        for ring in 0..rings {
            for seg in 0..segments {
                let a = ring * stride + seg;
                let b = a + stride;
                // Degenerate triangles at the poles are skipped.
                if ring != 0 {
                    triangles.extend_from_slice(&[a, b, a + 1]);
                }
                if ring != rings - 1 {
                    triangles.extend_from_slice(&[a + 1, b, b + 1]);
                }
                // Meridian and parallel edges.
                lines.extend_from_slice(&[a, b]);
                if ring != 0 {
                    lines.extend_from_slice(&[a, a + 1]);
                }
            }
        }

        Self {
            radius,
            vertices,
            triangles,
            lines,
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }
}
