//! Viewer data structures: decoded assets, textures and the scene graph.
//!
//! - `model` holds CPU-side meshes, materials and glTF node hierarchies
//! - `environment` holds the decoded HDR map and its packed texel format
//! - `texture` contains the GPU texture wrapper and creation utilities
//! - `scene_graph` owns what is drawn, parameterized over the renderer backend

pub mod environment;
pub mod model;
pub mod scene_graph;
pub mod texture;
