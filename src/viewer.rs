//! The application context of a running viewer.
//!
//! [`bootstrap`] turns the outcome of surface creation into either a running
//! [`Viewer`] or a reported, fatal [`InitError`]. The viewer owns the render
//! surface, scene, camera and controls, and exposes one method per host
//! signal: window input, a debounced resize, a frame tick, surface loss and
//! restoration, asset completion and teardown. None of it depends on winit's
//! event loop, so every path can be driven with test doubles.

use cgmath::{Matrix4, Rad};
use instant::{Duration, Instant};
use winit::event::WindowEvent;

use crate::{
    banner::{Banner, ErrorReporter},
    camera::{Camera, Projection},
    config::ViewerConfig,
    context::InitError,
    controls::OrbitController,
    data_structures::{
        environment::EnvironmentMap,
        model::{MaterialData, MeshData, ModelData, ModelNode},
        scene_graph::{Node, NodeId, Scene},
    },
    lifecycle::{Lifecycle, LifecycleAction},
    render::{RenderError, Renderer},
    resize::{Debouncer, ViewportSize},
    resources::LoadError,
};

/// Asks the host for another frame.
pub trait FrameScheduler {
    fn request_frame(&self);
}

/// Starts a loader whose result comes back through the event loop.
pub trait LoaderSpawner {
    fn spawn(&mut self, request: AssetRequest);
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AssetRequest {
    Environment(String),
    Model(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameOutcome {
    Rendered,
    /// Nothing was drawn because the surface is lost or outdated.
    Skipped,
    /// The frame failed; the loop keeps going.
    Faulted,
    /// The surface came back and the host has to rebuild everything.
    Reload,
}

/// Start a viewer on top of the result of surface creation.
///
/// A failed surface is logged and reported once, and nothing else starts:
/// no loaders, no controls, no frames.
pub fn bootstrap<R: Renderer>(
    config: &ViewerConfig,
    surface: Result<R, InitError>,
    viewport: ViewportSize,
    reporter: &mut dyn ErrorReporter,
    loaders: &mut dyn LoaderSpawner,
    scheduler: &dyn FrameScheduler,
) -> Result<Viewer<R>, InitError> {
    let renderer = match surface {
        Ok(renderer) => renderer,
        Err(e) => {
            log::error!("Graphics initialization failed: {e}");
            reporter.report(&Banner::graphics_unavailable(&e));
            return Err(e);
        }
    };

    let viewer = Viewer::new(config.clone(), renderer, viewport);

    if let Some(environment) = &config.assets.environment {
        loaders.spawn(AssetRequest::Environment(environment.clone()));
    }
    if let Some(model) = &config.assets.model {
        loaders.spawn(AssetRequest::Model(model.clone()));
    }
    scheduler.request_frame();
    Ok(viewer)
}

pub struct Viewer<R: Renderer> {
    config: ViewerConfig,
    renderer: R,
    scene: Scene<R>,
    camera: Camera,
    projection: Projection,
    controls: Option<OrbitController>,
    lifecycle: Lifecycle,
    resize: Debouncer<ViewportSize>,
    viewport: ViewportSize,
    cube: Option<NodeId>,
    elapsed: Duration,
    frames: u64,
    faults: u64,
}

impl<R: Renderer> Viewer<R> {
    pub fn new(config: ViewerConfig, mut renderer: R, viewport: ViewportSize) -> Self {
        let (width, height) = viewport.surface_size(config.surface.max_pixel_ratio);
        renderer.resize(width, height);

        let camera = Camera::from(&config.camera);
        let projection = Projection::from_settings(&config.camera, viewport.width, viewport.height);
        let controls = config
            .controls
            .enabled
            .then(|| OrbitController::new(config.controls.clone(), viewport.height));

        let mut scene = Scene::new();
        let cube = config.cube.as_ref().and_then(|cube| {
            let mut root = ModelNode::new("cube");
            root.meshes.push(MeshData::cuboid(
                "cube",
                cube.size,
                cube.size,
                cube.size,
                MaterialData::basic("cube", cube.color),
            ));
            match Node::from_model(&ModelData { root }, &mut renderer) {
                Ok(node) => Some(scene.add(node)),
                Err(e) => {
                    log::error!("Could not create the cube: {e}");
                    None
                }
            }
        });

        Self {
            resize: Debouncer::new(config.resize_debounce()),
            config,
            renderer,
            scene,
            camera,
            projection,
            controls,
            lifecycle: Lifecycle::new(),
            viewport,
            cube,
            elapsed: Duration::ZERO,
            frames: 0,
            faults: 0,
        }
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn scene(&self) -> &Scene<R> {
        &self.scene
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    pub fn controls(&self) -> Option<&OrbitController> {
        self.controls.as_ref()
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    pub fn viewport(&self) -> ViewportSize {
        self.viewport
    }

    /// Frames that reached the surface.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn faults(&self) -> u64 {
        self.faults
    }

    pub fn on_environment_loaded(&mut self, result: Result<EnvironmentMap, LoadError>) -> bool {
        let map = match result {
            Ok(map) => map,
            Err(e) => {
                log::error!("Environment failed to load: {e}");
                return false;
            }
        };
        match self.renderer.upload_environment(&map) {
            Ok(environment) => {
                self.scene.set_environment(environment);
                log::info!("Environment {} applied", map.name);
                true
            }
            Err(e) => {
                log::error!("Environment failed to upload: {e}");
                false
            }
        }
    }

    pub fn on_model_loaded(&mut self, result: Result<ModelData, LoadError>) -> bool {
        let model = match result {
            Ok(model) => model,
            Err(e) => {
                log::error!("Model failed to load: {e}");
                return false;
            }
        };
        match Node::from_model(&model, &mut self.renderer) {
            Ok(node) => {
                log::info!(
                    "Model {} added ({} renderables)",
                    node.name,
                    node.renderable_count()
                );
                self.scene.add(node);
                true
            }
            Err(e) => {
                log::error!("Model failed to upload: {e}");
                false
            }
        }
    }

    /// Queue a resize. Only the latest size survives the quiet period.
    pub fn on_resize(&mut self, size: ViewportSize, now: Instant) {
        if size.is_empty() {
            log::debug!("Ignoring empty viewport {size:?}");
            return;
        }
        self.resize.push(size, now);
    }

    /// Apply the pending resize once its quiet period is over.
    pub fn poll_resize(&mut self, now: Instant) -> bool {
        let Some(size) = self.resize.poll(now) else {
            return false;
        };
        self.viewport = size;
        self.projection.resize(size.width, size.height);
        if let Some(controls) = &mut self.controls {
            controls.set_viewport_height(size.height);
        }
        let (width, height) = size.surface_size(self.config.surface.max_pixel_ratio);
        self.renderer.resize(width, height);
        log::debug!(
            "Viewport {}x{} at {:.2}, surface {}x{}",
            size.width,
            size.height,
            size.scale_factor,
            width,
            height
        );
        true
    }

    pub fn resize_deadline(&self) -> Option<Instant> {
        self.resize.deadline()
    }

    /// Feed input to the orbit controls. Returns whether it was consumed.
    pub fn handle_window_event(&mut self, event: &WindowEvent) -> bool {
        match &mut self.controls {
            Some(controls) => controls.handle_window_event(event),
            None => false,
        }
    }

    /// One tick of the render loop.
    ///
    /// The next frame is requested before anything else so that a failing
    /// draw cannot stop the loop.
    pub fn frame(&mut self, scheduler: &dyn FrameScheduler, dt: Duration) -> FrameOutcome {
        scheduler.request_frame();

        self.elapsed += dt;
        if let Some(controls) = &mut self.controls {
            controls.update(&mut self.camera);
        }
        self.animate();

        if !self.lifecycle.can_draw() {
            if self.renderer.recover() {
                return match self.lifecycle.surface_restored() {
                    LifecycleAction::Reload => FrameOutcome::Reload,
                    LifecycleAction::None => FrameOutcome::Skipped,
                };
            }
            return FrameOutcome::Skipped;
        }

        match self
            .renderer
            .render(&self.scene, &self.camera, &self.projection)
        {
            Ok(()) => {
                self.frames += 1;
                FrameOutcome::Rendered
            }
            Err(RenderError::SurfaceLost) => {
                self.lifecycle.surface_lost();
                FrameOutcome::Skipped
            }
            Err(RenderError::Outdated) => FrameOutcome::Skipped,
            Err(e) => {
                self.faults += 1;
                log::error!("Frame failed: {e}");
                FrameOutcome::Faulted
            }
        }
    }

    fn animate(&mut self) {
        let Some(id) = self.cube else {
            return;
        };
        let t = Rad(self.elapsed.as_secs_f32());
        if let Some(node) = self.scene.node_mut(id) {
            node.transform = Matrix4::from_angle_x(t) * Matrix4::from_angle_y(t);
        }
    }

    pub fn on_surface_lost(&mut self) {
        self.lifecycle.surface_lost();
    }

    pub fn on_surface_restored(&mut self) -> LifecycleAction {
        self.lifecycle.surface_restored()
    }

    /// Dispose every renderable and the environment, then the surface itself.
    pub fn teardown(mut self) {
        log::info!(
            "Tearing down ({} renderables, {} frames, {} faults)",
            self.scene.renderable_count(),
            self.frames,
            self.faults
        );
        self.resize.cancel();
        self.scene.dispose();
        self.renderer.dispose();
    }
}
