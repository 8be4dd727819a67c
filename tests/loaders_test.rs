use hdri_viewer::{
    data_structures::model::{MaterialData, MeshData, ModelData, ModelNode},
    resources::{self, AssetRoot, LoadError},
};

use crate::common::test_utils::{Harness, environment};

mod common;

fn fixtures() -> AssetRoot {
    AssetRoot::new("tests/fixtures")
}

fn two_cubes() -> ModelData {
    let mut root = ModelNode::new("pair");
    root.meshes.push(MeshData::cuboid(
        "left",
        1.0,
        1.0,
        1.0,
        MaterialData::basic("left", [1.0, 0.0, 0.0]),
    ));
    let mut child = ModelNode::new("child");
    child.meshes.push(MeshData::cuboid(
        "right",
        1.0,
        1.0,
        1.0,
        MaterialData::basic("right", [0.0, 0.0, 1.0]),
    ));
    root.children.push(child);
    ModelData { root }
}

#[tokio::test]
async fn gltf_with_external_buffer_loads() {
    let model = resources::load_model(&fixtures(), "triangle.gltf").await.unwrap();
    assert_eq!(model.mesh_count(), 1);
    assert_eq!(model.root.name, "triangle.gltf");

    let node = &model.root.children[0];
    assert_eq!(node.name, "Triangle");
    assert_eq!(node.transform.w.y, 0.5);

    let mesh = &node.meshes[0];
    assert_eq!(mesh.triangle_count(), 1);
    assert_eq!(mesh.material.name, "Green");
    assert_eq!(mesh.material.base_color, [0.0, 1.0, 0.0, 1.0]);
    assert!(mesh.material.base_color_texture.is_none());
    // no normals in the file, so they were generated from the face
    for vertex in &mesh.vertices {
        assert_eq!(vertex.normal, [0.0, 0.0, 1.0]);
    }
}

#[tokio::test]
async fn binary_gltf_loads() {
    let model = resources::load_model(&fixtures(), "triangle.glb").await.unwrap();
    assert_eq!(model.mesh_count(), 1);
    assert_eq!(model.root.children[0].meshes[0].indices, vec![0, 1, 2]);
}

#[tokio::test]
async fn radiance_hdr_loads_as_float_pixels() {
    let map = resources::load_environment(&fixtures(), "tiny.hdr").await.unwrap();
    assert_eq!((map.width(), map.height()), (4, 2));
    let close = |actual: [f32; 3], expected: [f32; 3]| {
        actual
            .iter()
            .zip(expected)
            .all(|(a, e)| (a - e).abs() < 0.01)
    };
    assert!(close(map.image.get_pixel(0, 0).0, [1.0, 1.0, 1.0]));
    assert!(close(map.image.get_pixel(1, 0).0, [1.0, 0.0, 0.0]));
    assert!(close(map.image.get_pixel(3, 1).0, [0.0, 0.0, 1.0]));
}

#[tokio::test]
async fn missing_and_corrupt_files_are_errors() {
    let missing = resources::load_environment(&fixtures(), "missing.hdr").await;
    assert!(matches!(missing, Err(LoadError::Fetch { .. })));

    let corrupt = resources::load_environment(&fixtures(), "invalid.hdr").await;
    assert!(matches!(corrupt, Err(LoadError::Decode { .. })));

    let not_a_model = resources::load_model(&fixtures(), "invalid.hdr").await;
    assert!(matches!(not_a_model, Err(LoadError::Gltf { .. })));
}

#[tokio::test]
async fn failed_environment_leaves_the_model_in_place() {
    let mut harness = Harness::showcase();

    let environment = resources::load_environment(&fixtures(), "missing.hdr").await;
    let model = resources::load_model(&fixtures(), "triangle.glb").await;

    assert!(!harness.viewer.on_environment_loaded(environment));
    assert!(harness.viewer.on_model_loaded(model));

    assert!(harness.viewer.scene().environment().is_none());
    assert_eq!(harness.viewer.scene().renderable_count(), 1);
    assert!(harness.viewer.scene().find("Triangle").is_some());
    assert_eq!(harness.journal.count("upload environment"), 0);
}

#[test]
fn loaded_environment_is_applied() {
    let mut harness = Harness::showcase();
    assert!(harness.viewer.on_environment_loaded(Ok(environment("sky.hdr"))));
    assert!(harness.viewer.scene().environment().is_some());
    assert_eq!(harness.journal.count("upload environment sky.hdr"), 1);
}

#[test]
fn failed_model_upload_releases_partial_work() {
    let mut harness = Harness::showcase();
    *harness.knobs.fail_mesh.borrow_mut() = Some("right".to_string());

    assert!(!harness.viewer.on_model_loaded(Ok(two_cubes())));

    assert_eq!(harness.viewer.scene().renderable_count(), 0);
    assert_eq!(harness.journal.count("upload mesh left"), 1);
    assert_eq!(harness.journal.count("dispose geometry left"), 1);
    assert_eq!(harness.journal.count("dispose material left"), 1);
}

#[test]
fn nested_model_keeps_its_hierarchy() {
    let mut harness = Harness::showcase();
    assert!(harness.viewer.on_model_loaded(Ok(two_cubes())));

    let scene = harness.viewer.scene();
    assert_eq!(scene.renderable_count(), 2);
    let pair = scene.find("pair").unwrap();
    assert_eq!(pair.children.len(), 1);
    assert_eq!(pair.children[0].renderables[0].name, "right");
}
