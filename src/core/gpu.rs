//! GPU render backend using wgpu.
//!
//! Draws the node instances and the wireframe globe into an offscreen target. Instance
//! transforms and colors live in two vertex buffers stepped per instance; when the CPU-side
//! buffer is resized the device buffers are reallocated and the surviving prefix is copied
//! on the GPU before the old buffers are destroyed.
//!
//! Enable with the `gpu` feature flag.

use std::borrow::Cow;
use std::mem::size_of;

use bytemuck::{Pod, Zeroable};
use tracing::debug;
use wgpu::util::DeviceExt;

use crate::backend::{BackendCapabilities, BackendKind, DrawFrame, RenderBackend, SceneMeshes};
use crate::error::BackendError;
use crate::instances::{InstanceBuffer, InstanceColor, InstanceTransform};
use crate::mesh::MeshVertex;

const COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;
const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
const CLEAR: wgpu::Color = wgpu::Color {
    r: 0.0435,
    g: 0.0941,
    b: 0.1529,
    a: 0.0,
};
const GLOBE_COLOR: [f32; 4] = [0.2196, 0.7529, 0.9882, 0.22];

/// Per-frame uniforms (aligned to 16 bytes).
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct FrameUniforms {
    view_proj: [[f32; 4]; 4],
    globe_model: [[f32; 4]; 4],
    globe_color: [f32; 4],
    material_color: [f32; 4],
    /// x: 1.0 when per-instance colors are bound.
    flags: [f32; 4],
}

struct MeshBuffers {
    vertices: wgpu::Buffer,
    indices: wgpu::Buffer,
    index_count: u32,
}

struct InstanceStorage {
    transforms: wgpu::Buffer,
    colors: wgpu::Buffer,
    capacity: usize,
    generation: u64,
}

impl InstanceStorage {
    fn destroy(self) {
        self.transforms.destroy();
        self.colors.destroy();
    }
}

struct Target {
    color: wgpu::Texture,
    depth: wgpu::Texture,
    size: (u32, u32),
}

pub struct GpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    node_pipeline: wgpu::RenderPipeline,
    globe_pipeline: wgpu::RenderPipeline,
    uniforms: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    node_mesh: Option<MeshBuffers>,
    globe_mesh: Option<MeshBuffers>,
    instances: Option<InstanceStorage>,
    target: Option<Target>,
    instance_colors: bool,
    max_instances: usize,
    released: bool,
}

impl GpuBackend {
    /// Create a headless device. Blocks until the GPU is ready.
    pub fn new(max_instances: usize) -> Result<Self, BackendError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::LowPower,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .ok_or(BackendError::Unavailable)?;

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("nodesphere"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::downlevel_defaults(),
                memory_hints: wgpu::MemoryHints::Performance,
            },
            None,
        ))
        .map_err(|e| BackendError::Device(e.to_string()))?;

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Globe Shader"),
            source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(GLOBE_SHADER)),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Frame Bind Group Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let uniforms = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Frame Uniforms"),
            size: size_of::<FrameUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Frame Bind Group"),
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniforms.as_entire_binding(),
            }],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Globe Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        const VERTEX_ATTRS: [wgpu::VertexAttribute; 2] =
            wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3];
        const TRANSFORM_ATTRS: [wgpu::VertexAttribute; 4] =
            wgpu::vertex_attr_array![2 => Float32x4, 3 => Float32x4, 4 => Float32x4, 5 => Float32x4];
        const COLOR_ATTRS: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![6 => Float32x4];

        let vertex_layout = wgpu::VertexBufferLayout {
            array_stride: size_of::<MeshVertex>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &VERTEX_ATTRS,
        };
        let transform_layout = wgpu::VertexBufferLayout {
            array_stride: size_of::<InstanceTransform>() as u64,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &TRANSFORM_ATTRS,
        };
        let color_layout = wgpu::VertexBufferLayout {
            array_stride: size_of::<InstanceColor>() as u64,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &COLOR_ATTRS,
        };

        let node_buffers = [vertex_layout.clone(), transform_layout, color_layout];
        let globe_buffers = [vertex_layout];

        let node_pipeline = create_pipeline(
            &device,
            &pipeline_layout,
            &shader,
            "vs_node",
            &node_buffers,
            wgpu::PrimitiveTopology::TriangleList,
            "Node Pipeline",
        );
        let globe_pipeline = create_pipeline(
            &device,
            &pipeline_layout,
            &shader,
            "vs_globe",
            &globe_buffers,
            wgpu::PrimitiveTopology::LineList,
            "Globe Pipeline",
        );

        debug!(adapter = ?adapter.get_info().name, "gpu backend ready");

        Ok(Self {
            device,
            queue,
            node_pipeline,
            globe_pipeline,
            uniforms,
            bind_group,
            node_mesh: None,
            globe_mesh: None,
            instances: None,
            target: None,
            // Vertex-stepped color attributes are core wgpu; no downlevel flag gates them.
            instance_colors: true,
            max_instances,
            released: false,
        })
    }

    fn upload_mesh(&self, label: &str, vertices: &[MeshVertex], indices: &[u32]) -> MeshBuffers {
        let vertex_buf = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents: bytemuck::cast_slice(vertices),
                usage: wgpu::BufferUsages::VERTEX,
            });
        let index_buf = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents: bytemuck::cast_slice(indices),
                usage: wgpu::BufferUsages::INDEX,
            });
        MeshBuffers {
            vertices: vertex_buf,
            indices: index_buf,
            index_count: indices.len() as u32,
        }
    }

    fn create_instance_storage(&self, capacity: usize, generation: u64) -> InstanceStorage {
        let usage = wgpu::BufferUsages::VERTEX
            | wgpu::BufferUsages::COPY_DST
            | wgpu::BufferUsages::COPY_SRC;
        let transforms = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Instance Transforms"),
            size: (capacity * size_of::<InstanceTransform>()) as u64,
            usage,
            mapped_at_creation: false,
        });
        let colors = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Instance Colors"),
            size: (capacity * size_of::<InstanceColor>()) as u64,
            usage,
            mapped_at_creation: false,
        });
        InstanceStorage {
            transforms,
            colors,
            capacity,
            generation,
        }
    }

    /// New device storage for `capacity` instances, carrying over the surviving prefix.
    fn reallocate_instances(&mut self, capacity: usize, generation: u64) {
        let fresh = self.create_instance_storage(capacity, generation);
        if let Some(old) = self.instances.take() {
            let keep = old.capacity.min(capacity);
            if keep > 0 {
                let mut encoder = self
                    .device
                    .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                        label: Some("Instance Resize Encoder"),
                    });
                encoder.copy_buffer_to_buffer(
                    &old.transforms,
                    0,
                    &fresh.transforms,
                    0,
                    (keep * size_of::<InstanceTransform>()) as u64,
                );
                encoder.copy_buffer_to_buffer(
                    &old.colors,
                    0,
                    &fresh.colors,
                    0,
                    (keep * size_of::<InstanceColor>()) as u64,
                );
                self.queue.submit(std::iter::once(encoder.finish()));
            }
            old.destroy();
        }
        debug!(capacity, "gpu instance storage reallocated");
        self.instances = Some(fresh);
    }

    fn ensure_target(&mut self, size: (u32, u32)) {
        let size = (size.0.max(1), size.1.max(1));
        if self.target.as_ref().is_some_and(|t| t.size == size) {
            return;
        }
        if let Some(old) = self.target.take() {
            old.color.destroy();
            old.depth.destroy();
        }
        let extent = wgpu::Extent3d {
            width: size.0,
            height: size.1,
            depth_or_array_layers: 1,
        };
        let make = |label: &str, format: wgpu::TextureFormat| {
            self.device.create_texture(&wgpu::TextureDescriptor {
                label: Some(label),
                size: extent,
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format,
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
                view_formats: &[],
            })
        };
        let color = make("Offscreen Color", COLOR_FORMAT);
        let depth = make("Offscreen Depth", DEPTH_FORMAT);
        self.target = Some(Target { color, depth, size });
    }
}

impl RenderBackend for GpuBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Gpu
    }

    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities {
            instance_colors: self.instance_colors,
        }
    }

    fn upload_meshes(&mut self, meshes: SceneMeshes<'_>) -> Result<(), BackendError> {
        self.node_mesh = Some(self.upload_mesh(
            "Node Mesh",
            &meshes.node.vertices,
            &meshes.node.triangles,
        ));
        self.globe_mesh = Some(self.upload_mesh(
            "Globe Mesh",
            &meshes.globe.vertices,
            &meshes.globe.lines,
        ));
        self.released = false;
        Ok(())
    }

    fn sync_instances(&mut self, buffer: &InstanceBuffer) -> Result<(), BackendError> {
        if self.released {
            return Err(BackendError::Released);
        }
        let capacity = buffer.len().min(self.max_instances.max(1));
        if capacity == 0 {
            return Ok(());
        }
        let stale = self
            .instances
            .as_ref()
            .map_or(true, |s| s.generation != buffer.generation());
        if stale {
            self.reallocate_instances(capacity, buffer.generation());
        }
        if let Some(storage) = &self.instances {
            let n = capacity.min(storage.capacity);
            self.queue.write_buffer(
                &storage.transforms,
                0,
                bytemuck::cast_slice(&buffer.transforms()[..n]),
            );
            let colors = buffer.colors();
            if colors.len() >= n {
                self.queue
                    .write_buffer(&storage.colors, 0, bytemuck::cast_slice(&colors[..n]));
            }
        }
        Ok(())
    }

    fn draw(&mut self, frame: &DrawFrame) -> Result<(), BackendError> {
        if self.released {
            return Err(BackendError::Released);
        }
        self.ensure_target(frame.viewport);

        let globe_model = glam::Mat4::from_rotation_y(frame.globe_rotation);
        let uniforms = FrameUniforms {
            view_proj: frame.view_projection.to_cols_array_2d(),
            globe_model: globe_model.to_cols_array_2d(),
            globe_color: GLOBE_COLOR,
            material_color: frame.material_color,
            flags: [if self.instance_colors { 1.0 } else { 0.0 }, 0.0, 0.0, 0.0],
        };
        self.queue
            .write_buffer(&self.uniforms, 0, bytemuck::bytes_of(&uniforms));

        let (Some(target), Some(node_mesh), Some(globe_mesh)) =
            (&self.target, &self.node_mesh, &self.globe_mesh)
        else {
            // Meshes not uploaded yet: nothing to draw.
            return Ok(());
        };
        let color_view = target
            .color
            .create_view(&wgpu::TextureViewDescriptor::default());
        let depth_view = target
            .depth
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Frame Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &color_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(CLEAR),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_bind_group(0, &self.bind_group, &[]);

            pass.set_pipeline(&self.globe_pipeline);
            pass.set_vertex_buffer(0, globe_mesh.vertices.slice(..));
            pass.set_index_buffer(globe_mesh.indices.slice(..), wgpu::IndexFormat::Uint32);
            pass.draw_indexed(0..globe_mesh.index_count, 0, 0..1);

            if let Some(storage) = &self.instances {
                let count = frame.instance_count.min(storage.capacity) as u32;
                if count > 0 {
                    pass.set_pipeline(&self.node_pipeline);
                    pass.set_vertex_buffer(0, node_mesh.vertices.slice(..));
                    pass.set_vertex_buffer(1, storage.transforms.slice(..));
                    pass.set_vertex_buffer(2, storage.colors.slice(..));
                    pass.set_index_buffer(node_mesh.indices.slice(..), wgpu::IndexFormat::Uint32);
                    pass.draw_indexed(0..node_mesh.index_count, 0, 0..count);
                }
            }
        }
        self.queue.submit(std::iter::once(encoder.finish()));
        let _ = self.device.poll(wgpu::Maintain::Poll);
        Ok(())
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        if let Some(storage) = self.instances.take() {
            storage.destroy();
        }
        for mesh in [self.node_mesh.take(), self.globe_mesh.take()]
            .into_iter()
            .flatten()
        {
            mesh.vertices.destroy();
            mesh.indices.destroy();
        }
        if let Some(target) = self.target.take() {
            target.color.destroy();
            target.depth.destroy();
        }
        self.released = true;
        debug!("gpu backend released");
    }
}

fn create_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    shader: &wgpu::ShaderModule,
    vertex_entry: &str,
    buffers: &[wgpu::VertexBufferLayout<'_>],
    topology: wgpu::PrimitiveTopology,
    label: &str,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: Some(vertex_entry),
            compilation_options: Default::default(),
            buffers,
        },
        primitive: wgpu::PrimitiveState {
            topology,
            ..Default::default()
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: Default::default(),
            bias: Default::default(),
        }),
        multisample: wgpu::MultisampleState::default(),
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: Some("fs_main"),
            compilation_options: Default::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format: COLOR_FORMAT,
                blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        multiview: None,
        cache: None,
    })
}

/// WGSL for the instanced node markers and the wireframe globe.
const GLOBE_SHADER: &str = r#"
struct Frame {
    view_proj: mat4x4<f32>,
    globe_model: mat4x4<f32>,
    globe_color: vec4<f32>,
    material_color: vec4<f32>,
    flags: vec4<f32>,
}

@group(0) @binding(0) var<uniform> frame: Frame;

struct VertexOut {
    @builtin(position) clip: vec4<f32>,
    @location(0) color: vec4<f32>,
}

@vertex
fn vs_node(
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) m0: vec4<f32>,
    @location(3) m1: vec4<f32>,
    @location(4) m2: vec4<f32>,
    @location(5) m3: vec4<f32>,
    @location(6) color: vec4<f32>,
) -> VertexOut {
    let model = mat4x4<f32>(m0, m1, m2, m3);
    var out: VertexOut;
    out.clip = frame.view_proj * model * vec4<f32>(position, 1.0);
    let base = select(frame.material_color, color, frame.flags.x > 0.5);
    // Cheap head-on shading so markers read as spheres.
    let shade = 0.65 + 0.35 * max(normal.z, 0.0);
    out.color = vec4<f32>(base.rgb * shade, base.a);
    return out;
}

@vertex
fn vs_globe(
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
) -> VertexOut {
    var out: VertexOut;
    out.clip = frame.view_proj * frame.globe_model * vec4<f32>(position, 1.0);
    out.color = frame.globe_color;
    return out;
}

@fragment
fn fs_main(in: VertexOut) -> @location(0) vec4<f32> {
    return in.color;
}
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instances::ColorChannel;

    #[test]
    fn gpu_backend_creation() {
        // This test may fail on systems without GPU support
        match GpuBackend::new(64) {
            Ok(mut gpu) => {
                let mut buf = InstanceBuffer::allocate(4, ColorChannel::PerInstance);
                gpu.sync_instances(&buf).unwrap();
                buf.resize(8);
                gpu.sync_instances(&buf).unwrap();
                gpu.release();
                gpu.release();
            }
            Err(e) => println!("No GPU available (expected in some CI environments): {e}"),
        }
    }
}
