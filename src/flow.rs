//! Application event loop.
//!
//! [`App`] is the winit side of the viewer. It creates the window, builds the
//! render surface, forwards window input and redraw signals to the
//! [`Viewer`], and receives everything that finishes asynchronously (surface
//! creation on the web, asset loaders, page lifecycle events) as
//! [`ViewerEvent`]s through the event loop proxy. The scene is therefore only
//! ever touched on the event-loop thread.
//!
//! # Lifecycle
//!
//! 1. `resumed` creates the window and starts surface creation
//! 2. on success the viewer starts its loaders and requests the first frame;
//!    on failure a banner is shown and nothing else runs
//! 3. every `RedrawRequested` runs one [`Viewer::frame`]
//! 4. surface loss pauses drawing, restoration reloads the whole application
//! 5. `exiting` (or `beforeunload` on the web) tears everything down

use std::sync::Arc;

use instant::Instant;
use winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop, EventLoopProxy},
    window::{Window, WindowId},
};

use crate::{
    banner::ErrorReporter,
    config::ViewerConfig,
    context::{Context, InitError},
    data_structures::{environment::EnvironmentMap, model::ModelData},
    lifecycle::LifecycleAction,
    resize::ViewportSize,
    resources::{self, AssetRoot, LoadError},
    viewer::{self, AssetRequest, FrameOutcome, FrameScheduler, LoaderSpawner, Viewer},
};

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

pub enum ViewerEvent {
    /// Surface creation finished (web only, natively it is awaited in place).
    #[allow(dead_code)]
    Initialized(Box<Result<Context, InitError>>),
    EnvironmentLoaded {
        generation: u32,
        result: Result<EnvironmentMap, LoadError>,
    },
    ModelLoaded {
        generation: u32,
        result: Result<ModelData, LoadError>,
    },
    #[allow(dead_code)]
    SurfaceLost,
    #[allow(dead_code)]
    SurfaceRestored,
    #[allow(dead_code)]
    Teardown,
}

impl std::fmt::Debug for ViewerEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Initialized(result) => f
                .debug_tuple("Initialized")
                .field(&result.as_ref().as_ref().map(|_| "Context"))
                .finish(),
            Self::EnvironmentLoaded { generation, result } => f
                .debug_struct("EnvironmentLoaded")
                .field("generation", generation)
                .field("ok", &result.is_ok())
                .finish(),
            Self::ModelLoaded { generation, result } => f
                .debug_struct("ModelLoaded")
                .field("generation", generation)
                .field("ok", &result.is_ok())
                .finish(),
            Self::SurfaceLost => f.write_str("SurfaceLost"),
            Self::SurfaceRestored => f.write_str("SurfaceRestored"),
            Self::Teardown => f.write_str("Teardown"),
        }
    }
}

struct WindowScheduler<'a>(&'a Window);

impl FrameScheduler for WindowScheduler<'_> {
    fn request_frame(&self) {
        self.0.request_redraw();
    }
}

/// Runs loaders on the async runtime and posts their results back.
///
/// Results carry the generation of the viewer that asked for them, so loads
/// that finish after a reload are dropped instead of landing in the new scene.
struct AssetSpawner {
    proxy: EventLoopProxy<ViewerEvent>,
    root: AssetRoot,
    generation: u32,
    #[cfg(not(target_arch = "wasm32"))]
    runtime: tokio::runtime::Handle,
}

impl LoaderSpawner for AssetSpawner {
    fn spawn(&mut self, request: AssetRequest) {
        log::info!("Loading {request:?}");
        let proxy = self.proxy.clone();
        let root = self.root.clone();
        let generation = self.generation;
        let task = async move {
            let event = match request {
                AssetRequest::Environment(path) => ViewerEvent::EnvironmentLoaded {
                    generation,
                    result: resources::load_environment(&root, &path).await,
                },
                AssetRequest::Model(path) => ViewerEvent::ModelLoaded {
                    generation,
                    result: resources::load_model(&root, &path).await,
                },
            };
            if proxy.send_event(event).is_err() {
                log::debug!("Event loop closed before a loader finished");
            }
        };

        #[cfg(not(target_arch = "wasm32"))]
        self.runtime.spawn(task);
        #[cfg(target_arch = "wasm32")]
        wasm_bindgen_futures::spawn_local(task);
    }
}

fn reporter() -> Box<dyn ErrorReporter> {
    #[cfg(target_arch = "wasm32")]
    return Box::new(crate::banner::DomReporter);
    #[cfg(not(target_arch = "wasm32"))]
    return Box::new(crate::banner::LogReporter);
}

pub struct App {
    #[cfg(not(target_arch = "wasm32"))]
    async_runtime: tokio::runtime::Runtime,
    proxy: EventLoopProxy<ViewerEvent>,
    config: ViewerConfig,
    window: Option<Arc<Window>>,
    viewer: Option<Viewer<Context>>,
    // Bumped on every (re)initialization.
    generation: u32,
    failure: Option<InitError>,
    last_time: Instant,
    #[cfg(target_arch = "wasm32")]
    listeners: Vec<Closure<dyn FnMut(web_sys::Event)>>,
}

impl App {
    pub fn new(event_loop: &EventLoop<ViewerEvent>, config: ViewerConfig) -> anyhow::Result<Self> {
        Ok(Self {
            #[cfg(not(target_arch = "wasm32"))]
            async_runtime: tokio::runtime::Runtime::new()?,
            proxy: event_loop.create_proxy(),
            config,
            window: None,
            viewer: None,
            generation: 0,
            failure: None,
            last_time: Instant::now(),
            #[cfg(target_arch = "wasm32")]
            listeners: Vec::new(),
        })
    }

    /// The error that stopped startup, if any.
    pub fn failure(&self) -> Option<&InitError> {
        self.failure.as_ref()
    }

    fn start_context(&mut self, event_loop: &ActiveEventLoop, window: Arc<Window>) {
        let settings = self.config.surface.clone();

        #[cfg(not(target_arch = "wasm32"))]
        {
            let result = self
                .async_runtime
                .block_on(Context::new(window, &settings));
            self.on_initialized(event_loop, result);
        }

        #[cfg(target_arch = "wasm32")]
        {
            let _ = event_loop;
            let proxy = self.proxy.clone();
            wasm_bindgen_futures::spawn_local(async move {
                let result = Context::new(window, &settings).await;
                if proxy
                    .send_event(ViewerEvent::Initialized(Box::new(result)))
                    .is_err()
                {
                    log::error!("Event loop closed during initialization");
                }
            });
        }
    }

    fn on_initialized(&mut self, event_loop: &ActiveEventLoop, result: Result<Context, InitError>) {
        let Some(window) = self.window.clone() else {
            return;
        };
        self.generation += 1;

        let viewport = ViewportSize::from_physical(window.inner_size(), window.scale_factor());
        let mut loaders = AssetSpawner {
            proxy: self.proxy.clone(),
            root: AssetRoot::new(self.config.assets.root.clone()),
            generation: self.generation,
            #[cfg(not(target_arch = "wasm32"))]
            runtime: self.async_runtime.handle().clone(),
        };
        let mut reporter = reporter();

        match viewer::bootstrap(
            &self.config,
            result,
            viewport,
            reporter.as_mut(),
            &mut loaders,
            &WindowScheduler(&window),
        ) {
            Ok(viewer) => {
                log::info!("Viewer running (generation {})", self.generation);
                self.viewer = Some(viewer);
                self.last_time = Instant::now();
            }
            Err(e) => {
                self.failure = Some(e);
                // The page keeps showing the banner; a native window has nothing left to show.
                if !cfg!(target_arch = "wasm32") {
                    event_loop.exit();
                }
            }
        }
    }

    fn teardown(&mut self) {
        if let Some(viewer) = self.viewer.take() {
            viewer.teardown();
        }
    }

    /// Throw everything away and start again on a fresh surface.
    fn reload(&mut self, event_loop: &ActiveEventLoop) {
        self.teardown();

        #[cfg(target_arch = "wasm32")]
        {
            let _ = event_loop;
            let reloaded = web_sys::window().map(|w| w.location().reload());
            if !matches!(reloaded, Some(Ok(()))) {
                log::error!("Could not reload the page");
            }
        }

        #[cfg(not(target_arch = "wasm32"))]
        if let Some(window) = self.window.clone() {
            log::info!("Rebuilding the render surface");
            self.start_context(event_loop, window);
        }
    }

    #[cfg(target_arch = "wasm32")]
    fn attach_page_listeners(&mut self, window: &Window) {
        use winit::platform::web::WindowExtWebSys;

        let Some(canvas) = window.canvas() else {
            log::warn!("Window has no canvas");
            return;
        };
        let style = canvas.style();
        for (property, value) in [("width", "100vw"), ("height", "100vh"), ("display", "block")] {
            if style.set_property(property, value).is_err() {
                log::warn!("Could not set canvas {property}");
            }
        }

        let listen = |target: &web_sys::EventTarget,
                      name: &str,
                      event: fn() -> ViewerEvent,
                      prevent_default: bool,
                      proxy: EventLoopProxy<ViewerEvent>| {
            let closure = Closure::<dyn FnMut(web_sys::Event)>::new(move |e: web_sys::Event| {
                if prevent_default {
                    e.prevent_default();
                }
                if proxy.send_event(event()).is_err() {
                    log::debug!("Event loop closed before a page event was delivered");
                }
            });
            if target
                .add_event_listener_with_callback(name, closure.as_ref().unchecked_ref())
                .is_err()
            {
                log::warn!("Could not listen for {name}");
            }
            closure
        };

        // Preventing the default is what allows the context to be restored later.
        self.listeners.push(listen(
            &canvas,
            "webglcontextlost",
            || ViewerEvent::SurfaceLost,
            true,
            self.proxy.clone(),
        ));
        self.listeners.push(listen(
            &canvas,
            "webglcontextrestored",
            || ViewerEvent::SurfaceRestored,
            false,
            self.proxy.clone(),
        ));
        if let Some(page) = web_sys::window() {
            self.listeners.push(listen(
                &page,
                "beforeunload",
                || ViewerEvent::Teardown,
                false,
                self.proxy.clone(),
            ));
        }
    }
}

impl ApplicationHandler<ViewerEvent> for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        #[allow(unused_mut)]
        let mut window_attributes = Window::default_attributes().with_title(&self.config.title);

        #[cfg(target_arch = "wasm32")]
        {
            use winit::platform::web::WindowAttributesExtWebSys;
            window_attributes = window_attributes.with_append(true);
        }

        let window = match event_loop.create_window(window_attributes) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                let error = InitError::Window(e.to_string());
                log::error!("Graphics initialization failed: {error}");
                reporter().report(&crate::banner::Banner::graphics_unavailable(&error));
                self.failure = Some(error);
                event_loop.exit();
                return;
            }
        };

        #[cfg(target_arch = "wasm32")]
        self.attach_page_listeners(&window);

        self.window = Some(window.clone());
        self.start_context(event_loop, window);
    }

    fn user_event(&mut self, event_loop: &ActiveEventLoop, event: ViewerEvent) {
        log::debug!("{event:?}");
        match event {
            ViewerEvent::Initialized(result) => self.on_initialized(event_loop, *result),
            ViewerEvent::EnvironmentLoaded { generation, result } => {
                match self.viewer.as_mut() {
                    Some(viewer) if generation == self.generation => {
                        viewer.on_environment_loaded(result);
                    }
                    _ => log::debug!("Dropping environment from generation {generation}"),
                }
            }
            ViewerEvent::ModelLoaded { generation, result } => match self.viewer.as_mut() {
                Some(viewer) if generation == self.generation => {
                    viewer.on_model_loaded(result);
                }
                _ => log::debug!("Dropping model from generation {generation}"),
            },
            ViewerEvent::SurfaceLost => {
                if let Some(viewer) = self.viewer.as_mut() {
                    viewer.on_surface_lost();
                }
            }
            ViewerEvent::SurfaceRestored => {
                let action = self
                    .viewer
                    .as_mut()
                    .map(Viewer::on_surface_restored)
                    .unwrap_or(LifecycleAction::None);
                if action == LifecycleAction::Reload {
                    self.reload(event_loop);
                }
            }
            ViewerEvent::Teardown => self.teardown(),
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        let (Some(window), Some(viewer)) = (self.window.clone(), self.viewer.as_mut()) else {
            if let WindowEvent::CloseRequested = event {
                event_loop.exit();
            }
            return;
        };

        viewer.handle_window_event(&event);

        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => {
                viewer.on_resize(
                    ViewportSize::from_physical(size, window.scale_factor()),
                    Instant::now(),
                );
            }
            WindowEvent::ScaleFactorChanged { scale_factor, .. } => {
                viewer.on_resize(
                    ViewportSize::from_physical(window.inner_size(), scale_factor),
                    Instant::now(),
                );
            }
            WindowEvent::RedrawRequested => {
                let now = Instant::now();
                viewer.poll_resize(now);
                let dt = now - self.last_time;
                self.last_time = now;
                if viewer.frame(&WindowScheduler(&window), dt) == FrameOutcome::Reload {
                    self.reload(event_loop);
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        let Some(viewer) = self.viewer.as_mut() else {
            return;
        };
        viewer.poll_resize(Instant::now());

        // `instant::Instant` is not winit's clock on the web; there the redraw
        // loop polls the debouncer instead.
        #[cfg(not(target_arch = "wasm32"))]
        match viewer.resize_deadline() {
            Some(deadline) => event_loop.set_control_flow(winit::event_loop::ControlFlow::WaitUntil(deadline)),
            None => event_loop.set_control_flow(winit::event_loop::ControlFlow::Wait),
        }
        #[cfg(target_arch = "wasm32")]
        let _ = event_loop;
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        self.teardown();
    }
}

pub fn init_logger() {
    #[cfg(not(target_arch = "wasm32"))]
    {
        if let Err(e) = env_logger::try_init() {
            println!("Warning: Could not initialize logger: {}", e);
        };
    }

    #[cfg(target_arch = "wasm32")]
    {
        if let Err(e) = console_log::init_with_level(log::Level::Info) {
            web_sys::console::warn_1(&format!("Could not initialize logger: {e}").into());
        }
    }
}

/// Run the viewer until the window closes.
///
/// Natively this blocks and returns the startup error if the surface could not
/// be created. On the web the event loop is handed to the browser and this
/// returns immediately.
pub fn run(config: ViewerConfig) -> anyhow::Result<()> {
    init_logger();

    let event_loop: EventLoop<ViewerEvent> = EventLoop::with_user_event().build()?;
    #[allow(unused_mut)]
    let mut app = App::new(&event_loop, config)?;

    #[cfg(not(target_arch = "wasm32"))]
    {
        event_loop.run_app(&mut app)?;
        if let Some(e) = app.failure.take() {
            return Err(e.into());
        }
    }

    #[cfg(target_arch = "wasm32")]
    {
        use winit::platform::web::EventLoopExtWebSys;
        event_loop.spawn_app(app);
    }

    Ok(())
}
