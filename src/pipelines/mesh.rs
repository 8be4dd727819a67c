use cgmath::{Matrix, Matrix4, SquareMatrix};
use wgpu::util::DeviceExt;

use crate::{
    data_structures::{
        model::{MeshData, ModelVertex, Vertex},
        texture::Texture,
    },
    pipelines::{DepthMode, TargetDesc, mk_render_pipeline, sampler_entry, texture_entry, uniform_entry},
    render::Dispose,
};

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MaterialUniform {
    pub base_color: [f32; 4],
    // x: unlit
    pub flags: [f32; 4],
}

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ModelUniform {
    pub model: [[f32; 4]; 4],
    pub normal: [[f32; 4]; 4],
}

impl ModelUniform {
    pub fn new(world: Matrix4<f32>) -> Self {
        let normal = world
            .invert()
            .map(|inverse| inverse.transpose())
            .unwrap_or(world);
        Self {
            model: world.into(),
            normal: normal.into(),
        }
    }
}

pub fn material_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[
            uniform_entry(0, wgpu::ShaderStages::FRAGMENT),
            texture_entry(1),
            sampler_entry(2),
        ],
        label: Some("material_bind_group_layout"),
    })
}

pub fn model_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[uniform_entry(0, wgpu::ShaderStages::VERTEX)],
        label: Some("model_bind_group_layout"),
    })
}

/// Vertex and index buffers plus the per-object transform uniform (group 3).
#[derive(Debug)]
pub struct GpuGeometry {
    pub vertex_buffer: wgpu::Buffer,
    pub index_buffer: wgpu::Buffer,
    pub num_indices: u32,
    pub model_buffer: wgpu::Buffer,
    pub model_bind_group: wgpu::BindGroup,
    disposed: bool,
}

impl GpuGeometry {
    pub fn new(device: &wgpu::Device, layout: &wgpu::BindGroupLayout, mesh: &MeshData) -> Self {
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{:?} Vertex Buffer", mesh.name)),
            contents: bytemuck::cast_slice(&mesh.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{:?} Index Buffer", mesh.name)),
            contents: bytemuck::cast_slice(&mesh.indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        let model_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{:?} Model Buffer", mesh.name)),
            contents: bytemuck::cast_slice(&[ModelUniform::new(Matrix4::identity())]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let model_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: model_buffer.as_entire_binding(),
            }],
            label: Some("model_bind_group"),
        });
        Self {
            vertex_buffer,
            index_buffer,
            num_indices: mesh.indices.len() as u32,
            model_buffer,
            model_bind_group,
            disposed: false,
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }
}

impl Dispose for GpuGeometry {
    fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.vertex_buffer.destroy();
        self.index_buffer.destroy();
        self.model_buffer.destroy();
        self.disposed = true;
    }
}

#[derive(Debug)]
pub struct GpuMaterial {
    pub uniform_buffer: wgpu::Buffer,
    pub base_color: Texture,
    pub bind_group: wgpu::BindGroup,
    disposed: bool,
}

impl GpuMaterial {
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        layout: &wgpu::BindGroupLayout,
        mesh: &MeshData,
    ) -> Self {
        let material = &mesh.material;
        let base_color = match &material.base_color_texture {
            Some(image) => {
                let fitted = image.fit_within(device.limits().max_texture_dimension_2d);
                Texture::from_image(device, queue, fitted.as_ref().unwrap_or(image), &material.name)
            }
            None => Texture::create_solid(device, queue, [255; 4], "white"),
        };
        let uniform = MaterialUniform {
            base_color: material.base_color,
            flags: [if material.unlit { 1.0 } else { 0.0 }, 0.0, 0.0, 0.0],
        };
        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{:?} Material Buffer", material.name)),
            contents: bytemuck::cast_slice(&[uniform]),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let sampler = base_color
            .sampler
            .clone()
            .unwrap_or_else(|| crate::data_structures::texture::create_default_sampler(device));
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&base_color.view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&sampler),
                },
            ],
            label: Some(&format!("{:?} material_bind_group", material.name)),
        });
        Self {
            uniform_buffer,
            base_color,
            bind_group,
            disposed: false,
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }
}

impl Dispose for GpuMaterial {
    fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.uniform_buffer.destroy();
        self.base_color.destroy();
        self.disposed = true;
    }
}

pub fn mk_mesh_pipeline(
    device: &wgpu::Device,
    target: &TargetDesc,
    layouts: [&wgpu::BindGroupLayout; 4],
) -> wgpu::RenderPipeline {
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("Mesh Pipeline Layout"),
        bind_group_layouts: &layouts,
        push_constant_ranges: &[],
    });
    let shader = wgpu::ShaderModuleDescriptor {
        label: Some("Mesh Shader"),
        source: wgpu::ShaderSource::Wgsl(
            concat!(include_str!("common.wgsl"), include_str!("mesh.wgsl")).into(),
        ),
    };
    mk_render_pipeline(
        device,
        "Mesh Pipeline",
        &layout,
        target,
        DepthMode {
            write: true,
            compare: wgpu::CompareFunction::Less,
        },
        Some(wgpu::Face::Back),
        &[ModelVertex::desc()],
        shader,
    )
}
