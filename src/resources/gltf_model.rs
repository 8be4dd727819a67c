//! glTF / GLB decoding into [`ModelData`].
//!
//! Only triangle lists are kept. Missing normals are generated from the
//! faces, missing indices are generated in vertex order. Materials carry the
//! base colour factor and texture; everything else in the PBR model is
//! ignored.

use std::sync::Arc;

use cgmath::Matrix4;

use crate::{
    data_structures::model::{
        ImageData, MaterialData, MeshData, ModelData, ModelNode, ModelVertex, compute_normals,
    },
    resources::{AssetRoot, LoadError, load_binary, sibling},
};

pub async fn decode(
    root: &AssetRoot,
    file_name: &str,
    data: &[u8],
) -> Result<ModelData, LoadError> {
    let gltf = gltf::Gltf::from_slice(data).map_err(|source| LoadError::Gltf {
        path: file_name.to_string(),
        source,
    })?;

    // Load buffers
    let mut buffer_data = Vec::new();
    for buffer in gltf.buffers() {
        match buffer.source() {
            gltf::buffer::Source::Bin => {
                buffer_data.push(gltf.blob.clone().unwrap_or_default());
            }
            gltf::buffer::Source::Uri(uri) => {
                let bin = load_binary(root, &sibling(file_name, uri)).await?;
                buffer_data.push(bin);
            }
        }
    }

    // Load images referenced by base colour textures
    let mut images: Vec<Option<Arc<ImageData>>> = vec![None; gltf.images().len()];
    for material in gltf.materials() {
        let Some(info) = material.pbr_metallic_roughness().base_color_texture() else {
            continue;
        };
        let source_image = info.texture().source();
        let index = source_image.index();
        if images[index].is_some() {
            continue;
        }
        let bytes = match source_image.source() {
            gltf::image::Source::View { view, .. } => {
                let Some(buffer) = buffer_data.get(view.buffer().index()) else {
                    log::warn!("Image {} in {} points past its buffers", index, file_name);
                    continue;
                };
                let start = view.offset();
                let end = start + view.length();
                match buffer.get(start..end) {
                    Some(bytes) => bytes.to_vec(),
                    None => {
                        log::warn!("Image {} in {} is truncated", index, file_name);
                        continue;
                    }
                }
            }
            gltf::image::Source::Uri { uri, .. } => {
                load_binary(root, &sibling(file_name, uri)).await?
            }
        };
        let decoded = image::load_from_memory(&bytes).map_err(|source| LoadError::Decode {
            path: format!("{}#image{}", file_name, index),
            source,
        })?;
        let rgba = decoded.to_rgba8();
        images[index] = Some(Arc::new(ImageData {
            width: rgba.width(),
            height: rgba.height(),
            rgba: rgba.into_raw(),
        }));
    }

    let scene = gltf
        .default_scene()
        .or_else(|| gltf.scenes().next())
        .ok_or_else(|| LoadError::EmptyModel {
            path: file_name.to_string(),
        })?;

    let mut root_node = ModelNode::new(file_name);
    for node in scene.nodes() {
        root_node
            .children
            .push(to_model_node(&node, &buffer_data, &images, file_name));
    }

    let model = ModelData { root: root_node };
    if model.mesh_count() == 0 {
        return Err(LoadError::EmptyModel {
            path: file_name.to_string(),
        });
    }
    log::info!("Decoded model {} ({} meshes)", file_name, model.mesh_count());
    Ok(model)
}

fn to_model_node(
    node: &gltf::Node,
    buffers: &[Vec<u8>],
    images: &[Option<Arc<ImageData>>],
    file_name: &str,
) -> ModelNode {
    let name = node
        .name()
        .map(str::to_string)
        .unwrap_or_else(|| format!("node{}", node.index()));
    let mut model_node = ModelNode::new(&name);
    model_node.transform = Matrix4::from(node.transform().matrix());

    if let Some(mesh) = node.mesh() {
        for primitive in mesh.primitives() {
            let mesh_name = match mesh.name() {
                Some(n) => format!("{}#{}", n, primitive.index()),
                None => format!("{}#mesh{}.{}", name, mesh.index(), primitive.index()),
            };
            match to_mesh_data(&primitive, buffers, images, &mesh_name) {
                Some(mesh) => model_node.meshes.push(mesh),
                None => log::warn!("Skipping primitive {} in {}", mesh_name, file_name),
            }
        }
    }

    for child in node.children() {
        model_node
            .children
            .push(to_model_node(&child, buffers, images, file_name));
    }
    model_node
}

fn to_mesh_data(
    primitive: &gltf::Primitive,
    buffers: &[Vec<u8>],
    images: &[Option<Arc<ImageData>>],
    name: &str,
) -> Option<MeshData> {
    if primitive.mode() != gltf::mesh::Mode::Triangles {
        log::warn!("{} is not a triangle list ({:?})", name, primitive.mode());
        return None;
    }
    let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(Vec::as_slice));

    let positions: Vec<[f32; 3]> = reader.read_positions()?.collect();
    let normals: Option<Vec<[f32; 3]>> = reader.read_normals().map(Iterator::collect);
    let tex_coords: Vec<[f32; 2]> = reader
        .read_tex_coords(0)
        .map(|tc| tc.into_f32().collect())
        .unwrap_or_default();
    let indices: Vec<u32> = match reader.read_indices() {
        Some(indices) => indices.into_u32().collect(),
        None => (0..positions.len() as u32).collect(),
    };
    if indices.len() % 3 != 0 || indices.iter().any(|&i| i as usize >= positions.len()) {
        log::warn!("{} has out of range or incomplete indices", name);
        return None;
    }

    let mut vertices: Vec<ModelVertex> = positions
        .iter()
        .enumerate()
        .map(|(i, position)| ModelVertex {
            position: *position,
            normal: normals
                .as_ref()
                .and_then(|n| n.get(i).copied())
                .unwrap_or([0.0; 3]),
            tex_coords: tex_coords.get(i).copied().unwrap_or([0.0; 2]),
        })
        .collect();
    if normals.is_none() {
        compute_normals(&mut vertices, &indices);
    }

    let material = primitive.material();
    let pbr = material.pbr_metallic_roughness();
    let base_color_texture = pbr
        .base_color_texture()
        .and_then(|info| images.get(info.texture().source().index()).cloned().flatten());
    let material = MaterialData {
        name: material.name().unwrap_or("default").to_string(),
        base_color: pbr.base_color_factor(),
        base_color_texture,
        unlit: false,
    };

    Some(MeshData {
        name: name.to_string(),
        vertices,
        indices,
        material,
    })
}
