//! Scene graph.
//!
//! A [`Scene`] owns a forest of [`Node`]s and an optional environment. Nodes
//! carry a local transform, zero or more [`Renderable`] objects and children.
//! Loaders never touch the scene directly; their decoded [`ModelData`] is
//! turned into nodes by [`Node::from_model`] on the event-loop thread.

use cgmath::{Matrix4, SquareMatrix};

use crate::{
    data_structures::model::{ModelData, ModelNode},
    render::{Dispose, RenderError, Renderer},
};

/// A geometry and material pair owned by the renderer backend.
pub struct Renderable<R: Renderer> {
    pub name: String,
    pub geometry: R::Geometry,
    pub material: R::Material,
}

impl<R: Renderer> Renderable<R> {
    /// Geometry first, then material.
    pub fn dispose(&mut self) {
        self.geometry.dispose();
        self.material.dispose();
    }
}

pub struct Node<R: Renderer> {
    pub name: String,
    pub transform: Matrix4<f32>,
    pub renderables: Vec<Renderable<R>>,
    pub children: Vec<Node<R>>,
}

impl<R: Renderer> Node<R> {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            transform: Matrix4::identity(),
            renderables: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Upload a decoded model. If any mesh fails, everything uploaded so far
    /// is disposed again before the error is returned.
    pub fn from_model(model: &ModelData, renderer: &mut R) -> Result<Self, RenderError> {
        Self::from_model_node(&model.root, renderer)
    }

    fn from_model_node(model: &ModelNode, renderer: &mut R) -> Result<Self, RenderError> {
        let mut node = Node::new(&model.name);
        node.transform = model.transform;
        for mesh in &model.meshes {
            match renderer.upload_mesh(mesh) {
                Ok((geometry, material)) => node.renderables.push(Renderable {
                    name: mesh.name.clone(),
                    geometry,
                    material,
                }),
                Err(e) => {
                    node.dispose();
                    return Err(e);
                }
            }
        }
        for child in &model.children {
            match Self::from_model_node(child, renderer) {
                Ok(child) => node.children.push(child),
                Err(e) => {
                    node.dispose();
                    return Err(e);
                }
            }
        }
        Ok(node)
    }

    pub fn renderable_count(&self) -> usize {
        self.renderables.len()
            + self
                .children
                .iter()
                .map(Node::renderable_count)
                .sum::<usize>()
    }

    /// Depth-first walk with the accumulated world transform of each node.
    pub fn traverse<'a>(&'a self, parent: Matrix4<f32>, f: &mut dyn FnMut(&'a Node<R>, Matrix4<f32>)) {
        let world = parent * self.transform;
        f(self, world);
        for child in &self.children {
            child.traverse(world, f);
        }
    }

    pub fn find(&self, name: &str) -> Option<&Node<R>> {
        if self.name == name {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(name))
    }

    fn dispose(&mut self) {
        for renderable in &mut self.renderables {
            renderable.dispose();
        }
        for child in &mut self.children {
            child.dispose();
        }
    }
}

/// Index of a top-level node inside its [`Scene`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

pub struct Scene<R: Renderer> {
    nodes: Vec<Node<R>>,
    environment: Option<R::Environment>,
}

impl<R: Renderer> Default for Scene<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Renderer> Scene<R> {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            environment: None,
        }
    }

    pub fn add(&mut self, node: Node<R>) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    pub fn node(&self, id: NodeId) -> Option<&Node<R>> {
        self.nodes.get(id.0)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node<R>> {
        self.nodes.get_mut(id.0)
    }

    pub fn nodes(&self) -> &[Node<R>] {
        &self.nodes
    }

    pub fn find(&self, name: &str) -> Option<&Node<R>> {
        self.nodes.iter().find_map(|node| node.find(name))
    }

    /// Used as both background and reflection source.
    pub fn environment(&self) -> Option<&R::Environment> {
        self.environment.as_ref()
    }

    /// Install a new environment, disposing the one it replaces.
    pub fn set_environment(&mut self, environment: R::Environment) {
        if let Some(mut previous) = self.environment.replace(environment) {
            previous.dispose();
        }
    }

    pub fn renderable_count(&self) -> usize {
        self.nodes.iter().map(Node::renderable_count).sum()
    }

    /// Visit every renderable with its world transform.
    pub fn for_each_renderable<'a>(&'a self, mut f: impl FnMut(&'a Renderable<R>, Matrix4<f32>)) {
        for node in &self.nodes {
            node.traverse(Matrix4::identity(), &mut |node, world| {
                for renderable in &node.renderables {
                    f(renderable, world);
                }
            });
        }
    }

    /// Dispose every renderable (geometry, then material) and the environment,
    /// leaving an empty scene behind.
    pub fn dispose(&mut self) {
        for mut node in self.nodes.drain(..) {
            node.dispose();
        }
        if let Some(mut environment) = self.environment.take() {
            environment.dispose();
        }
    }
}
