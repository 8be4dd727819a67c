//! CPU-side model data.
//!
//! Loaders produce these plain structs off the event-loop thread. They carry no
//! GPU handles, so they can cross threads and be inspected in tests; the
//! renderer turns them into buffers and textures when they are merged into the
//! scene.

use std::sync::Arc;

use cgmath::{InnerSpace, Matrix4, SquareMatrix, Vector3};

/// Anything that can describe its vertex layout to a render pipeline.
pub trait Vertex {
    fn desc() -> wgpu::VertexBufferLayout<'static>;
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ModelVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub tex_coords: [f32; 2],
}

impl Vertex for ModelVertex {
    fn desc() -> wgpu::VertexBufferLayout<'static> {
        const ATTRIBUTES: [wgpu::VertexAttribute; 3] =
            wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3, 2 => Float32x2];
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<ModelVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &ATTRIBUTES,
        }
    }
}

/// Decoded 8-bit RGBA pixels.
#[derive(Clone, Debug, PartialEq)]
pub struct ImageData {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl ImageData {
    /// True when `rgba` holds exactly `width * height` pixels.
    pub fn is_complete(&self) -> bool {
        self.width > 0
            && self.height > 0
            && self.rgba.len() as u64 == self.width as u64 * self.height as u64 * 4
    }

    /// Downscale, keeping the aspect ratio, until both sides fit `max_dimension`.
    /// `None` when the image already fits or its pixel data is incomplete.
    pub fn fit_within(&self, max_dimension: u32) -> Option<Self> {
        if self.width <= max_dimension && self.height <= max_dimension {
            return None;
        }
        let pixels = image::RgbaImage::from_raw(self.width, self.height, self.rgba.clone())?;
        let scale = max_dimension as f64 / self.width.max(self.height) as f64;
        let width = ((self.width as f64 * scale).floor() as u32).clamp(1, max_dimension);
        let height = ((self.height as f64 * scale).floor() as u32).clamp(1, max_dimension);
        log::info!(
            "Downscaling texture from {}x{} to {}x{}",
            self.width,
            self.height,
            width,
            height
        );
        let resized = image::imageops::resize(&pixels, width, height, image::imageops::FilterType::Triangle);
        Some(Self {
            width,
            height,
            rgba: resized.into_raw(),
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct MaterialData {
    pub name: String,
    pub base_color: [f32; 4],
    pub base_color_texture: Option<Arc<ImageData>>,
    /// Skip lighting and tone mapping, like a basic material.
    pub unlit: bool,
}

impl Default for MaterialData {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            base_color: [1.0; 4],
            base_color_texture: None,
            unlit: false,
        }
    }
}

impl MaterialData {
    pub fn basic(name: &str, color: [f32; 3]) -> Self {
        Self {
            name: name.to_string(),
            base_color: [color[0], color[1], color[2], 1.0],
            base_color_texture: None,
            unlit: true,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct MeshData {
    pub name: String,
    pub vertices: Vec<ModelVertex>,
    pub indices: Vec<u32>,
    pub material: MaterialData,
}

impl MeshData {
    /// An axis-aligned box centred on the origin with per-face normals.
    pub fn cuboid(name: &str, width: f32, height: f32, depth: f32, material: MaterialData) -> Self {
        let (x, y, z) = (width / 2.0, height / 2.0, depth / 2.0);
        // normal, then the four corners counter-clockwise seen from outside
        let faces: [([f32; 3], [[f32; 3]; 4]); 6] = [
            ([1.0, 0.0, 0.0], [[x, -y, z], [x, -y, -z], [x, y, -z], [x, y, z]]),
            ([-1.0, 0.0, 0.0], [[-x, -y, -z], [-x, -y, z], [-x, y, z], [-x, y, -z]]),
            ([0.0, 1.0, 0.0], [[-x, y, z], [x, y, z], [x, y, -z], [-x, y, -z]]),
            ([0.0, -1.0, 0.0], [[-x, -y, -z], [x, -y, -z], [x, -y, z], [-x, -y, z]]),
            ([0.0, 0.0, 1.0], [[-x, -y, z], [x, -y, z], [x, y, z], [-x, y, z]]),
            ([0.0, 0.0, -1.0], [[x, -y, -z], [-x, -y, -z], [-x, y, -z], [x, y, -z]]),
        ];
        let uvs = [[0.0, 1.0], [1.0, 1.0], [1.0, 0.0], [0.0, 0.0]];

        let mut vertices = Vec::with_capacity(24);
        let mut indices = Vec::with_capacity(36);
        for (normal, corners) in faces {
            let base = vertices.len() as u32;
            for (corner, uv) in corners.into_iter().zip(uvs) {
                vertices.push(ModelVertex {
                    position: corner,
                    normal,
                    tex_coords: uv,
                });
            }
            indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }

        Self {
            name: name.to_string(),
            vertices,
            indices,
            material,
        }
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// Area-weighted smooth normals for vertices that came without any.
pub fn compute_normals(vertices: &mut [ModelVertex], indices: &[u32]) {
    let mut accumulated = vec![Vector3::new(0.0_f32, 0.0, 0.0); vertices.len()];
    for triangle in indices.chunks_exact(3) {
        let [a, b, c] = [triangle[0], triangle[1], triangle[2]].map(|i| i as usize);
        if a >= vertices.len() || b >= vertices.len() || c >= vertices.len() {
            continue;
        }
        let pa: Vector3<f32> = vertices[a].position.into();
        let pb: Vector3<f32> = vertices[b].position.into();
        let pc: Vector3<f32> = vertices[c].position.into();
        let face = (pb - pa).cross(pc - pa);
        accumulated[a] += face;
        accumulated[b] += face;
        accumulated[c] += face;
    }
    for (vertex, normal) in vertices.iter_mut().zip(accumulated) {
        vertex.normal = if normal.magnitude2() > 0.0 {
            normal.normalize().into()
        } else {
            [0.0, 1.0, 0.0]
        };
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ModelNode {
    pub name: String,
    pub transform: Matrix4<f32>,
    pub meshes: Vec<MeshData>,
    pub children: Vec<ModelNode>,
}

impl ModelNode {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            transform: Matrix4::identity(),
            meshes: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn mesh_count(&self) -> usize {
        self.meshes.len() + self.children.iter().map(ModelNode::mesh_count).sum::<usize>()
    }
}

/// A decoded model. `root` holds the nodes of the model's default scene.
#[derive(Clone, Debug, PartialEq)]
pub struct ModelData {
    pub root: ModelNode,
}

impl ModelData {
    pub fn mesh_count(&self) -> usize {
        self.root.mesh_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cuboid_has_closed_faces() {
        let cube = MeshData::cuboid("cube", 1.0, 1.0, 1.0, MaterialData::basic("red", [1.0, 0.0, 0.0]));
        assert_eq!(cube.vertices.len(), 24);
        assert_eq!(cube.triangle_count(), 12);
        assert!(cube.indices.iter().all(|&i| (i as usize) < cube.vertices.len()));
        assert!(cube.material.unlit);
    }

    #[test]
    fn cuboid_winding_faces_outwards() {
        let cube = MeshData::cuboid("cube", 2.0, 2.0, 2.0, MaterialData::default());
        for triangle in cube.indices.chunks_exact(3) {
            let [a, b, c] = [triangle[0], triangle[1], triangle[2]]
                .map(|i| Vector3::from(cube.vertices[i as usize].position));
            let normal: Vector3<f32> = cube.vertices[triangle[0] as usize].normal.into();
            assert!((b - a).cross(c - a).dot(normal) > 0.0);
        }
    }

    #[test]
    fn generated_normals_follow_counter_clockwise_winding() {
        let mut vertices = vec![
            ModelVertex {
                position: [0.0, 0.0, 0.0],
                ..Default::default()
            },
            ModelVertex {
                position: [1.0, 0.0, 0.0],
                ..Default::default()
            },
            ModelVertex {
                position: [0.0, 1.0, 0.0],
                ..Default::default()
            },
            ModelVertex {
                position: [5.0, 5.0, 5.0],
                ..Default::default()
            },
        ];
        compute_normals(&mut vertices, &[0, 1, 2]);
        for vertex in &vertices[..3] {
            assert_eq!(vertex.normal, [0.0, 0.0, 1.0]);
        }
        // unreferenced vertices get a usable default
        assert_eq!(vertices[3].normal, [0.0, 1.0, 0.0]);
    }

    #[test]
    fn oversized_texture_is_downscaled_to_the_limit() {
        let image = ImageData {
            width: 64,
            height: 16,
            rgba: [10, 20, 30, 255].repeat(64 * 16),
        };
        assert!(image.fit_within(64).is_none());

        let small = image.fit_within(16).unwrap();
        assert_eq!((small.width, small.height), (16, 4));
        assert!(small.is_complete());
        assert_eq!(&small.rgba[..4], &[10, 20, 30, 255]);
    }

    #[test]
    fn incomplete_pixel_data_is_detected() {
        let image = ImageData {
            width: 4096,
            height: 4096,
            rgba: vec![0; 16],
        };
        assert!(!image.is_complete());
        assert!(image.fit_within(2048).is_none());
    }
}
