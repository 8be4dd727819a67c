//! The wgpu render surface.
//!
//! [`Context`] owns the surface, device and queue plus everything derived from
//! them: render targets, the two pipelines and the shared bind groups. It is
//! the production [`Renderer`]; the viewer only ever talks to it through that
//! trait.

use std::{iter, sync::Arc};

use thiserror::Error;
use wgpu::util::DeviceExt;
use winit::window::Window;

use crate::{
    camera::{Camera, CameraUniform, Projection},
    config::SurfaceSettings,
    data_structures::{
        environment::EnvironmentMap, model::MeshData, scene_graph::Scene, texture::Texture,
    },
    pipelines::{
        self, GlobalsUniform, TargetDesc,
        background::{GpuEnvironment, mk_background_pipeline},
        mesh::{GpuGeometry, GpuMaterial, ModelUniform, mk_mesh_pipeline},
    },
    render::{Dispose, RenderError, Renderer},
};

const MSAA_SAMPLES: u32 = 4;

/// Why no render surface could be created. Fatal for startup.
#[derive(Debug, Error)]
pub enum InitError {
    #[error("could not create a window: {0}")]
    Window(String),
    #[error("could not create a render surface: {0}")]
    CreateSurface(#[from] wgpu::CreateSurfaceError),
    #[error("no compatible graphics adapter: {0}")]
    NoAdapter(String),
    #[error("could not open the graphics device: {0}")]
    RequestDevice(String),
    #[error("the render surface supports no usable format")]
    UnsupportedSurface,
}

#[derive(Debug)]
pub struct Context {
    pub(crate) window: Arc<Window>,
    pub surface: wgpu::Surface<'static>,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
    pub(crate) settings: SurfaceSettings,
    sample_count: u32,
    depth_texture: Texture,
    msaa_target: Option<Texture>,
    camera_uniform: CameraUniform,
    camera_buffer: wgpu::Buffer,
    globals: GlobalsUniform,
    globals_buffer: wgpu::Buffer,
    camera_bind_group: wgpu::BindGroup,
    environment_layout: wgpu::BindGroupLayout,
    material_layout: wgpu::BindGroupLayout,
    model_layout: wgpu::BindGroupLayout,
    // Bound to group 1 while the scene has no environment of its own.
    empty_environment: GpuEnvironment,
    background_pipeline: wgpu::RenderPipeline,
    mesh_pipeline: wgpu::RenderPipeline,
    disposed: bool,
}

impl Context {
    pub async fn new(window: Arc<Window>, settings: &SurfaceSettings) -> Result<Self, InitError> {
        let size = window.inner_size();

        log::info!("WGPU setup");
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            #[cfg(not(target_arch = "wasm32"))]
            backends: wgpu::Backends::PRIMARY,
            #[cfg(target_arch = "wasm32")]
            backends: wgpu::Backends::GL,
            ..Default::default()
        });

        let surface = instance.create_surface(window.clone())?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: settings.power_preference.into(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| InitError::NoAdapter(e.to_string()))?;
        log::info!("Adapter: {:?}", adapter.get_info());

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: None,
                required_features: wgpu::Features::empty(),
                // WebGL doesn't support all of wgpu's features, so if
                // we're building for the web we'll have to disable some.
                required_limits: if cfg!(target_arch = "wasm32") {
                    wgpu::Limits::downlevel_webgl2_defaults()
                } else {
                    wgpu::Limits::default()
                },
                memory_hints: Default::default(),
                trace: wgpu::Trace::Off,
            })
            .await
            .map_err(|e| InitError::RequestDevice(e.to_string()))?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .ok_or(InitError::UnsupportedSurface)?;
        let alpha_mode = surface_caps
            .alpha_modes
            .first()
            .copied()
            .ok_or(InitError::UnsupportedSurface)?;

        let mut usage = wgpu::TextureUsages::RENDER_ATTACHMENT;
        if settings.preserve_drawing_buffer {
            if surface_caps.usages.contains(wgpu::TextureUsages::COPY_SRC) {
                usage |= wgpu::TextureUsages::COPY_SRC;
            } else {
                log::info!("Surface cannot be read back, presenting without COPY_SRC");
            }
        }

        let sample_count = if settings.antialias
            && adapter
                .get_texture_format_features(surface_format)
                .flags
                .sample_count_supported(MSAA_SAMPLES)
        {
            MSAA_SAMPLES
        } else {
            1
        };
        log::info!("Surface {surface_format:?}, {sample_count}x MSAA");

        let config = wgpu::SurfaceConfiguration {
            usage,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let camera_uniform = CameraUniform::new();
        let camera_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Camera Buffer"),
            contents: bytemuck::cast_slice(&[camera_uniform]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let globals = GlobalsUniform::new(settings, surface_format.is_srgb());
        let globals_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Globals Buffer"),
            contents: bytemuck::cast_slice(&[globals]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let camera_layout = pipelines::camera_layout(&device);
        let camera_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &camera_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: camera_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: globals_buffer.as_entire_binding(),
                },
            ],
            label: Some("camera_bind_group"),
        });
        let environment_layout = pipelines::environment_layout(&device);
        let material_layout = pipelines::mesh::material_layout(&device);
        let model_layout = pipelines::mesh::model_layout(&device);

        let target = TargetDesc {
            format: surface_format,
            depth_format: Texture::DEPTH_FORMAT,
            sample_count,
        };
        let background_pipeline =
            mk_background_pipeline(&device, &target, &camera_layout, &environment_layout);
        let mesh_pipeline = mk_mesh_pipeline(
            &device,
            &target,
            [&camera_layout, &environment_layout, &material_layout, &model_layout],
        );

        let empty_environment = GpuEnvironment::new(
            &device,
            &environment_layout,
            Texture::create_empty_environment(&device, &queue),
        );
        let depth_texture = Texture::create_depth_texture(
            &device,
            [config.width, config.height],
            sample_count,
            "depth_texture",
        );
        let msaa_target = (sample_count > 1)
            .then(|| Texture::create_msaa_target(&device, &config, sample_count));

        Ok(Self {
            window,
            surface,
            device,
            queue,
            config,
            settings: settings.clone(),
            sample_count,
            depth_texture,
            msaa_target,
            camera_uniform,
            camera_buffer,
            globals,
            globals_buffer,
            camera_bind_group,
            environment_layout,
            material_layout,
            model_layout,
            empty_environment,
            background_pipeline,
            mesh_pipeline,
            disposed: false,
        })
    }

    fn recreate_targets(&mut self) {
        self.depth_texture.destroy();
        self.depth_texture = Texture::create_depth_texture(
            &self.device,
            [self.config.width, self.config.height],
            self.sample_count,
            "depth_texture",
        );
        if let Some(old) = self.msaa_target.take() {
            old.destroy();
            self.msaa_target = Some(Texture::create_msaa_target(
                &self.device,
                &self.config,
                self.sample_count,
            ));
        }
    }

    fn acquire(&mut self) -> Result<wgpu::SurfaceTexture, RenderError> {
        match self.surface.get_current_texture() {
            Ok(output) => Ok(output),
            Err(wgpu::SurfaceError::Lost) => Err(RenderError::SurfaceLost),
            Err(wgpu::SurfaceError::Outdated) => {
                log::debug!(
                    "Surface outdated, reconfiguring at {}x{}",
                    self.config.width,
                    self.config.height
                );
                self.surface.configure(&self.device, &self.config);
                Err(RenderError::Outdated)
            }
            Err(e) => Err(RenderError::Surface(e)),
        }
    }
}

impl Renderer for Context {
    type Geometry = GpuGeometry;
    type Material = GpuMaterial;
    type Environment = GpuEnvironment;

    fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 || self.disposed {
            return;
        }
        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&self.device, &self.config);
        self.recreate_targets();
    }

    fn size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    fn upload_mesh(
        &mut self,
        mesh: &MeshData,
    ) -> Result<(Self::Geometry, Self::Material), RenderError> {
        if mesh.vertices.is_empty() || mesh.indices.is_empty() {
            return Err(RenderError::Upload {
                name: mesh.name.clone(),
                reason: "mesh has no triangles".to_string(),
            });
        }
        if let Some(image) = &mesh.material.base_color_texture {
            if !image.is_complete() {
                return Err(RenderError::Upload {
                    name: mesh.name.clone(),
                    reason: format!(
                        "base colour texture has {} bytes for {}x{} pixels",
                        image.rgba.len(),
                        image.width,
                        image.height
                    ),
                });
            }
        }
        let geometry = GpuGeometry::new(&self.device, &self.model_layout, mesh);
        let material = GpuMaterial::new(&self.device, &self.queue, &self.material_layout, mesh);
        Ok((geometry, material))
    }

    fn upload_environment(
        &mut self,
        map: &EnvironmentMap,
    ) -> Result<Self::Environment, RenderError> {
        if map.width() == 0 || map.height() == 0 {
            return Err(RenderError::Upload {
                name: map.name.clone(),
                reason: "environment map is empty".to_string(),
            });
        }
        Ok(GpuEnvironment::upload(
            &self.device,
            &self.queue,
            &self.environment_layout,
            map,
        ))
    }

    fn render(
        &mut self,
        scene: &Scene<Self>,
        camera: &Camera,
        projection: &Projection,
    ) -> Result<(), RenderError> {
        if self.disposed {
            return Err(RenderError::SurfaceLost);
        }
        let output = self.acquire()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        self.camera_uniform.update_view_proj(camera, projection);
        self.queue.write_buffer(
            &self.camera_buffer,
            0,
            bytemuck::cast_slice(&[self.camera_uniform]),
        );
        self.globals.set_has_environment(scene.environment().is_some());
        self.queue
            .write_buffer(&self.globals_buffer, 0, bytemuck::cast_slice(&[self.globals]));
        scene.for_each_renderable(|renderable, world| {
            self.queue.write_buffer(
                &renderable.geometry.model_buffer,
                0,
                bytemuck::cast_slice(&[ModelUniform::new(world)]),
            );
        });

        let environment = scene.environment().unwrap_or(&self.empty_environment);
        let [r, g, b, a] = self.settings.clear_colour;

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });
        {
            let (target, resolve_target) = match &self.msaa_target {
                Some(msaa) => (&msaa.view, Some(&view)),
                None => (&view, None),
            };
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: target,
                    resolve_target,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color { r, g, b, a }),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_texture.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            render_pass.set_bind_group(0, &self.camera_bind_group, &[]);
            render_pass.set_bind_group(1, &environment.bind_group, &[]);

            if scene.environment().is_some() {
                render_pass.set_pipeline(&self.background_pipeline);
                render_pass.draw(0..3, 0..1);
            }

            render_pass.set_pipeline(&self.mesh_pipeline);
            scene.for_each_renderable(|renderable, _| {
                let geometry = &renderable.geometry;
                if geometry.is_disposed() || renderable.material.is_disposed() {
                    log::warn!("Skipping disposed renderable {:?}", renderable.name);
                    return;
                }
                render_pass.set_bind_group(2, &renderable.material.bind_group, &[]);
                render_pass.set_bind_group(3, &geometry.model_bind_group, &[]);
                render_pass.set_vertex_buffer(0, geometry.vertex_buffer.slice(..));
                render_pass
                    .set_index_buffer(geometry.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                render_pass.draw_indexed(0..geometry.num_indices, 0, 0..1);
            });
        }

        self.queue.submit(iter::once(encoder.finish()));
        self.window.pre_present_notify();
        output.present();
        Ok(())
    }

    fn recover(&mut self) -> bool {
        // The page signals restoration itself with `webglcontextrestored`.
        if self.disposed || cfg!(target_arch = "wasm32") {
            return false;
        }
        self.surface.configure(&self.device, &self.config);
        match self.surface.get_current_texture() {
            // Dropping the texture without presenting hands it back to the swapchain.
            Ok(_) => true,
            Err(e) => {
                log::debug!("Surface still unavailable: {e}");
                false
            }
        }
    }

    fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        log::info!("Releasing render surface");
        self.empty_environment.dispose();
        self.depth_texture.destroy();
        if let Some(msaa) = self.msaa_target.take() {
            msaa.destroy();
        }
        self.camera_buffer.destroy();
        self.globals_buffer.destroy();
        self.disposed = true;
    }
}
