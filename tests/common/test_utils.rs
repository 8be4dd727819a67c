#![allow(dead_code)]

use std::{
    cell::{Cell, RefCell},
    rc::Rc,
};

use hdri_viewer::{
    banner::{Banner, ErrorReporter},
    camera::{Camera, Projection},
    config::ViewerConfig,
    context::InitError,
    data_structures::{environment::EnvironmentMap, model::MeshData, scene_graph::Scene},
    render::{Dispose, RenderError, Renderer},
    resize::ViewportSize,
    viewer::{self, AssetRequest, FrameScheduler, LoaderSpawner, Viewer},
};

/// Everything the mock backend did, in order.
#[derive(Clone, Default)]
pub struct Journal(Rc<RefCell<Vec<String>>>);

impl Journal {
    pub fn push(&self, entry: String) {
        self.0.borrow_mut().push(entry);
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.borrow().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.0
            .borrow()
            .iter()
            .filter(|e| e.starts_with(prefix))
            .count()
    }

    pub fn position(&self, entry: &str) -> Option<usize> {
        self.0.borrow().iter().position(|e| e == entry)
    }

    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }
}

/// Behaviour switches that stay reachable after the renderer moved into a viewer.
#[derive(Default)]
pub struct Knobs {
    pub fail_frames: Cell<u32>,
    pub outdated_frames: Cell<u32>,
    pub lost: Cell<bool>,
    pub recovers: Cell<bool>,
    pub fail_mesh: RefCell<Option<String>>,
}

pub struct MockGeometry {
    name: String,
    journal: Journal,
}

impl Dispose for MockGeometry {
    fn dispose(&mut self) {
        self.journal.push(format!("dispose geometry {}", self.name));
    }
}

pub struct MockMaterial {
    name: String,
    journal: Journal,
}

impl Dispose for MockMaterial {
    fn dispose(&mut self) {
        self.journal.push(format!("dispose material {}", self.name));
    }
}

pub struct MockEnvironment {
    name: String,
    journal: Journal,
}

impl Dispose for MockEnvironment {
    fn dispose(&mut self) {
        self.journal.push(format!("dispose environment {}", self.name));
    }
}

pub struct MockRenderer {
    journal: Journal,
    knobs: Rc<Knobs>,
    size: (u32, u32),
}

impl MockRenderer {
    pub fn new() -> (Self, Journal, Rc<Knobs>) {
        let journal = Journal::default();
        let knobs = Rc::new(Knobs::default());
        let renderer = Self {
            journal: journal.clone(),
            knobs: knobs.clone(),
            size: (0, 0),
        };
        (renderer, journal, knobs)
    }
}

impl Renderer for MockRenderer {
    type Geometry = MockGeometry;
    type Material = MockMaterial;
    type Environment = MockEnvironment;

    fn resize(&mut self, width: u32, height: u32) {
        self.size = (width, height);
        self.journal.push(format!("resize {width}x{height}"));
    }

    fn size(&self) -> (u32, u32) {
        self.size
    }

    fn upload_mesh(
        &mut self,
        mesh: &MeshData,
    ) -> Result<(Self::Geometry, Self::Material), RenderError> {
        if self.knobs.fail_mesh.borrow().as_deref() == Some(mesh.name.as_str()) {
            return Err(RenderError::Upload {
                name: mesh.name.clone(),
                reason: "rejected by test".to_string(),
            });
        }
        self.journal.push(format!("upload mesh {}", mesh.name));
        Ok((
            MockGeometry {
                name: mesh.name.clone(),
                journal: self.journal.clone(),
            },
            MockMaterial {
                name: mesh.name.clone(),
                journal: self.journal.clone(),
            },
        ))
    }

    fn upload_environment(
        &mut self,
        map: &EnvironmentMap,
    ) -> Result<Self::Environment, RenderError> {
        self.journal.push(format!("upload environment {}", map.name));
        Ok(MockEnvironment {
            name: map.name.clone(),
            journal: self.journal.clone(),
        })
    }

    fn render(
        &mut self,
        scene: &Scene<Self>,
        _camera: &Camera,
        _projection: &Projection,
    ) -> Result<(), RenderError> {
        if self.knobs.lost.get() {
            return Err(RenderError::SurfaceLost);
        }
        let outdated = self.knobs.outdated_frames.get();
        if outdated > 0 {
            self.knobs.outdated_frames.set(outdated - 1);
            return Err(RenderError::Outdated);
        }
        let failing = self.knobs.fail_frames.get();
        if failing > 0 {
            self.knobs.fail_frames.set(failing - 1);
            return Err(RenderError::Surface(wgpu::SurfaceError::Timeout));
        }
        self.journal.push(format!(
            "render {} renderables, environment: {}",
            scene.renderable_count(),
            scene.environment().is_some()
        ));
        Ok(())
    }

    fn recover(&mut self) -> bool {
        let recovered = self.knobs.recovers.get();
        if recovered {
            self.knobs.lost.set(false);
        }
        recovered
    }

    fn dispose(&mut self) {
        self.journal.push("dispose surface".to_string());
    }
}

#[derive(Default)]
pub struct CountingScheduler {
    requests: Cell<u32>,
}

impl CountingScheduler {
    pub fn requests(&self) -> u32 {
        self.requests.get()
    }
}

impl FrameScheduler for CountingScheduler {
    fn request_frame(&self) {
        self.requests.set(self.requests.get() + 1);
    }
}

#[derive(Default)]
pub struct RecordingReporter {
    pub banners: Vec<Banner>,
}

impl ErrorReporter for RecordingReporter {
    fn report(&mut self, banner: &Banner) {
        self.banners.push(banner.clone());
    }
}

#[derive(Default)]
pub struct RecordingSpawner {
    pub requests: Vec<AssetRequest>,
}

impl LoaderSpawner for RecordingSpawner {
    fn spawn(&mut self, request: AssetRequest) {
        self.requests.push(request);
    }
}

/// A viewer on a mock backend together with all its observers.
pub struct Harness {
    pub viewer: Viewer<MockRenderer>,
    pub journal: Journal,
    pub knobs: Rc<Knobs>,
    pub scheduler: CountingScheduler,
    pub reporter: RecordingReporter,
    pub spawner: RecordingSpawner,
}

impl Harness {
    pub fn start(config: ViewerConfig, viewport: ViewportSize) -> Self {
        let (renderer, journal, knobs) = MockRenderer::new();
        let scheduler = CountingScheduler::default();
        let mut reporter = RecordingReporter::default();
        let mut spawner = RecordingSpawner::default();
        let viewer = viewer::bootstrap(
            &config,
            Ok::<_, InitError>(renderer),
            viewport,
            &mut reporter,
            &mut spawner,
            &scheduler,
        )
        .expect("mock surface never fails");
        Self {
            viewer,
            journal,
            knobs,
            scheduler,
            reporter,
            spawner,
        }
    }

    pub fn showcase() -> Self {
        Self::start(ViewerConfig::showcase(), ViewportSize::new(800, 600, 1.0))
    }

    pub fn spinning_cube() -> Self {
        Self::start(ViewerConfig::spinning_cube(), ViewportSize::new(800, 600, 1.0))
    }
}

pub fn environment(name: &str) -> EnvironmentMap {
    EnvironmentMap::new(
        name,
        image::Rgb32FImage::from_pixel(4, 2, image::Rgb([1.0, 1.0, 1.0])),
    )
}
