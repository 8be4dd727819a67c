use crate::{
    data_structures::{environment::EnvironmentMap, texture::Texture},
    pipelines::{DepthMode, TargetDesc, mk_render_pipeline},
    render::Dispose,
};

/// An uploaded environment map with its bind group (group 1).
#[derive(Debug)]
pub struct GpuEnvironment {
    pub texture: Texture,
    pub bind_group: wgpu::BindGroup,
    disposed: bool,
}

impl GpuEnvironment {
    pub fn new(device: &wgpu::Device, layout: &wgpu::BindGroupLayout, texture: Texture) -> Self {
        let sampler = texture
            .sampler
            .clone()
            .unwrap_or_else(|| crate::data_structures::texture::create_environment_sampler(device));
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&texture.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&sampler),
                },
            ],
            label: Some("environment_bind_group"),
        });
        Self {
            texture,
            bind_group,
            disposed: false,
        }
    }

    pub fn upload(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        layout: &wgpu::BindGroupLayout,
        map: &EnvironmentMap,
    ) -> Self {
        let max = device.limits().max_texture_dimension_2d;
        let texture = match map.fit_within(max) {
            Some(smaller) => Texture::from_environment(device, queue, &smaller),
            None => Texture::from_environment(device, queue, map),
        };
        Self::new(device, layout, texture)
    }
}

impl Dispose for GpuEnvironment {
    fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.texture.destroy();
        self.disposed = true;
    }
}

pub fn mk_background_pipeline(
    device: &wgpu::Device,
    target: &TargetDesc,
    camera_layout: &wgpu::BindGroupLayout,
    environment_layout: &wgpu::BindGroupLayout,
) -> wgpu::RenderPipeline {
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("Background Pipeline Layout"),
        bind_group_layouts: &[camera_layout, environment_layout],
        push_constant_ranges: &[],
    });
    let shader = wgpu::ShaderModuleDescriptor {
        label: Some("Background Shader"),
        source: wgpu::ShaderSource::Wgsl(
            concat!(include_str!("common.wgsl"), include_str!("background.wgsl")).into(),
        ),
    };
    mk_render_pipeline(
        device,
        "Background Pipeline",
        &layout,
        target,
        // Drawn first, behind everything, without touching depth.
        DepthMode {
            write: false,
            compare: wgpu::CompareFunction::Always,
        },
        None,
        &[],
        shader,
    )
}
