//! The seam between the viewer's control logic and the GPU backend.
//!
//! [`Renderer`] is what the viewer holds as its render surface. The wgpu
//! implementation lives on [`crate::context::Context`]; anything else that
//! implements the trait (a headless recorder in tests, for instance) can drive
//! the same lifecycle.
//!
//! GPU objects are not reclaimed by dropping a scene node alone: buffers and
//! textures stay alive as long as any in-flight command references them. Every
//! backend resource therefore implements [`Dispose`], and the viewer calls it
//! explicitly during teardown.

use thiserror::Error;

use crate::{
    camera::{Camera, Projection},
    data_structures::{environment::EnvironmentMap, model::MeshData, scene_graph::Scene},
};

/// Explicit release of backend resources.
pub trait Dispose {
    fn dispose(&mut self);
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("the render surface was lost")]
    SurfaceLost,
    #[error("the render surface was outdated and has been reconfigured")]
    Outdated,
    #[error("could not acquire the next frame: {0}")]
    Surface(#[from] wgpu::SurfaceError),
    #[error("could not upload `{name}`: {reason}")]
    Upload { name: String, reason: String },
}

pub trait Renderer: Sized {
    type Geometry: Dispose;
    type Material: Dispose;
    type Environment: Dispose;

    /// Resize the drawing buffer, in physical pixels.
    fn resize(&mut self, width: u32, height: u32);

    fn size(&self) -> (u32, u32);

    fn upload_mesh(
        &mut self,
        mesh: &MeshData,
    ) -> Result<(Self::Geometry, Self::Material), RenderError>;

    fn upload_environment(
        &mut self,
        map: &EnvironmentMap,
    ) -> Result<Self::Environment, RenderError>;

    /// Draw one frame. [`RenderError::SurfaceLost`] means no draw is possible
    /// until the surface comes back, [`RenderError::Outdated`] that this frame
    /// was dropped while the surface got reconfigured.
    fn render(
        &mut self,
        scene: &Scene<Self>,
        camera: &Camera,
        projection: &Projection,
    ) -> Result<(), RenderError>;

    /// Try to reacquire a lost surface. Returns `true` once drawing works again.
    fn recover(&mut self) -> bool {
        false
    }

    /// Release the surface itself. Called after every scene object was disposed.
    fn dispose(&mut self);
}
