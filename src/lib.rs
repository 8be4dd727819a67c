//! hdri-viewer
//!
//! A small cross-platform viewer that shows a 3D model in front of an
//! equirectangular HDR environment, with orbit controls, debounced resizing
//! and explicit handling of a lost render surface. Runs natively and in the
//! browser (WebGL2 via wasm).
//!
//! High-level modules
//! - `banner`: user-facing report when graphics cannot start
//! - `camera`: camera, projection and their GPU uniform
//! - `config`: viewer configuration and presets, optionally read from TOML
//! - `context`: the wgpu render surface, the production `Renderer`
//! - `controls`: orbit camera controls with damping
//! - `data_structures`: decoded assets, textures and the scene graph
//! - `flow`: the winit event loop that drives everything
//! - `lifecycle`: surface loss and restoration
//! - `pipelines`: background and mesh pipelines plus their shaders
//! - `render`: the `Renderer` seam and explicit resource disposal
//! - `resize`: viewport sizes and the resize debouncer
//! - `resources`: asynchronous loading of HDR and glTF files
//! - `viewer`: the application context tying it all together
//!

pub mod banner;
pub mod camera;
pub mod config;
pub mod context;
pub mod controls;
pub mod data_structures;
pub mod flow;
pub mod lifecycle;
pub mod pipelines;
pub mod render;
pub mod resize;
pub mod resources;
pub mod viewer;

pub use config::ViewerConfig;
pub use flow::run;

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

/// Browser entry point: the showcase scene.
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn start() -> Result<(), JsValue> {
    run(ViewerConfig::showcase()).map_err(|e| JsValue::from_str(&e.to_string()))
}
