//! Shader node graphs attached to materials.
//!
//! Only the node types the material ID tool builds are modeled: material
//! output, principled BSDF and image texture. Socket order follows the
//! principled BSDF layout so `BASE_COLOR`/`ROUGHNESS` index the same inputs
//! a user would see in a node editor.

use glam::{Vec3, Vec4};
use serde::{Deserialize, Serialize};

use crate::error::SceneError;

pub const BASE_COLOR: usize = 0;
pub const ROUGHNESS: usize = 7;
/// `Surface` input of the material output node.
pub const SURFACE: usize = 0;
/// `BSDF` output of the principled node.
pub const BSDF: usize = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u32);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeKind {
    OutputMaterial,
    BsdfPrincipled,
    TexImage { image: Option<String> },
}

impl NodeKind {
    pub fn label(&self) -> &'static str {
        match self {
            NodeKind::OutputMaterial => "Material Output",
            NodeKind::BsdfPrincipled => "Principled BSDF",
            NodeKind::TexImage { .. } => "Image Texture",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SocketValue {
    Float(f32),
    Color(Vec4),
    Vector(Vec3),
    Shader,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Socket {
    pub name: String,
    pub value: SocketValue,
}

fn socket(name: &str, value: SocketValue) -> Socket { Socket { name: name.to_string(), value } }

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    pub kind: NodeKind,
    pub inputs: Vec<Socket>,
    pub outputs: Vec<String>,
}

fn default_inputs(kind: &NodeKind) -> Vec<Socket> {
    use SocketValue::*;
    let grey = Vec4::new(0.8, 0.8, 0.8, 1.0);
    match kind {
        NodeKind::OutputMaterial => vec![
            socket("Surface", Shader),
            socket("Volume", Shader),
            socket("Displacement", Vector(Vec3::ZERO)),
        ],
        NodeKind::BsdfPrincipled => vec![
            socket("Base Color", Color(grey)),
            socket("Subsurface", Float(0.0)),
            socket("Subsurface Radius", Vector(Vec3::new(1.0, 0.2, 0.1))),
            socket("Subsurface Color", Color(grey)),
            socket("Metallic", Float(0.0)),
            socket("Specular", Float(0.5)),
            socket("Specular Tint", Float(0.0)),
            socket("Roughness", Float(0.5)),
            socket("Anisotropic", Float(0.0)),
            socket("Anisotropic Rotation", Float(0.0)),
            socket("Sheen", Float(0.0)),
            socket("Sheen Tint", Float(0.5)),
            socket("Clearcoat", Float(0.0)),
            socket("Clearcoat Roughness", Float(0.03)),
            socket("IOR", Float(1.45)),
            socket("Transmission", Float(0.0)),
            socket("Transmission Roughness", Float(0.0)),
            socket("Emission", Color(Vec4::new(0.0, 0.0, 0.0, 1.0))),
            socket("Alpha", Float(1.0)),
            socket("Normal", Vector(Vec3::ZERO)),
            socket("Clearcoat Normal", Vector(Vec3::ZERO)),
            socket("Tangent", Vector(Vec3::ZERO)),
        ],
        NodeKind::TexImage { .. } => vec![socket("Vector", Vector(Vec3::ZERO))],
    }
}

fn default_outputs(kind: &NodeKind) -> Vec<String> {
    match kind {
        NodeKind::OutputMaterial => Vec::new(),
        NodeKind::BsdfPrincipled => vec!["BSDF".to_string()],
        NodeKind::TexImage { .. } => vec!["Color".to_string(), "Alpha".to_string()],
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub from_node: NodeId,
    pub from_socket: usize,
    pub to_node: NodeId,
    pub to_socket: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeTree {
    pub nodes: Vec<Node>,
    pub links: Vec<Link>,
    pub active: Option<NodeId>,
}

impl NodeTree {
    pub fn new() -> Self { Self::default() }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.links.clear();
        self.active = None;
    }

    pub fn add(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.iter().map(|n| n.id.0 + 1).max().unwrap_or(0));
        let name = self.unique_name(kind.label());
        let inputs = default_inputs(&kind);
        let outputs = default_outputs(&kind);
        self.nodes.push(Node { id, name, kind, inputs, outputs });
        id
    }

    fn unique_name(&self, base: &str) -> String {
        if !self.nodes.iter().any(|n| n.name == base) {
            return base.to_string();
        }
        (1..)
            .map(|i| format!("{}.{:03}", base, i))
            .find(|cand| !self.nodes.iter().any(|n| &n.name == cand))
            .unwrap_or_else(|| base.to_string())
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> { self.nodes.iter().find(|n| n.id == id) }
    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> { self.nodes.iter_mut().find(|n| n.id == id) }

    pub fn nodes_of(&self, pred: impl Fn(&NodeKind) -> bool) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(move |n| pred(&n.kind))
    }

    pub fn set_input(&mut self, id: NodeId, index: usize, value: SocketValue) -> Result<(), SceneError> {
        let node = self.node_mut(id).ok_or(SceneError::UnknownNode(id.0))?;
        let name = node.name.clone();
        let slot = node
            .inputs
            .get_mut(index)
            .ok_or(SceneError::NodeSocket { node: name, side: "input", socket: index })?;
        slot.value = value;
        Ok(())
    }

    pub fn input(&self, id: NodeId, index: usize) -> Option<&SocketValue> {
        self.node(id)?.inputs.get(index).map(|s| &s.value)
    }

    /// Connect an output socket to an input socket. An input accepts one
    /// link, so an existing link into it is replaced.
    pub fn link(&mut self, from: NodeId, from_socket: usize, to: NodeId, to_socket: usize) -> Result<(), SceneError> {
        let src = self.node(from).ok_or(SceneError::UnknownNode(from.0))?;
        if from_socket >= src.outputs.len() {
            return Err(SceneError::NodeSocket { node: src.name.clone(), side: "output", socket: from_socket });
        }
        let dst = self.node(to).ok_or(SceneError::UnknownNode(to.0))?;
        if to_socket >= dst.inputs.len() {
            return Err(SceneError::NodeSocket { node: dst.name.clone(), side: "input", socket: to_socket });
        }
        self.links.retain(|l| !(l.to_node == to && l.to_socket == to_socket));
        self.links.push(Link { from_node: from, from_socket, to_node: to, to_socket });
        Ok(())
    }

    pub fn set_active(&mut self, id: NodeId) { self.active = Some(id); }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bsdf_links_into_surface() {
        let mut tree = NodeTree::new();
        let bsdf = tree.add(NodeKind::BsdfPrincipled);
        let out = tree.add(NodeKind::OutputMaterial);
        tree.link(bsdf, BSDF, out, SURFACE).unwrap();
        assert_eq!(tree.nodes.len(), 2);
        assert_eq!(tree.links.len(), 1);
        let l = tree.links[0];
        assert_eq!(tree.node(l.from_node).unwrap().kind, NodeKind::BsdfPrincipled);
        assert_eq!(tree.node(l.to_node).unwrap().kind, NodeKind::OutputMaterial);
    }

    #[test]
    fn principled_socket_indices() {
        let mut tree = NodeTree::new();
        let id = tree.add(NodeKind::BsdfPrincipled);
        let node = tree.node(id).unwrap();
        assert_eq!(node.inputs[BASE_COLOR].name, "Base Color");
        assert_eq!(node.inputs[ROUGHNESS].name, "Roughness");
        tree.set_input(id, ROUGHNESS, SocketValue::Float(1.0)).unwrap();
        assert_eq!(tree.input(id, ROUGHNESS), Some(&SocketValue::Float(1.0)));
    }

    #[test]
    fn duplicate_labels_get_suffix() {
        let mut tree = NodeTree::new();
        tree.add(NodeKind::BsdfPrincipled);
        let b = tree.add(NodeKind::BsdfPrincipled);
        assert_eq!(tree.node(b).unwrap().name, "Principled BSDF.001");
    }

    #[test]
    fn link_rejects_missing_socket_and_replaces_existing() {
        let mut tree = NodeTree::new();
        let out = tree.add(NodeKind::OutputMaterial);
        let a = tree.add(NodeKind::BsdfPrincipled);
        let b = tree.add(NodeKind::BsdfPrincipled);
        assert!(tree.link(out, 0, a, 0).is_err());
        tree.link(a, BSDF, out, SURFACE).unwrap();
        tree.link(b, BSDF, out, SURFACE).unwrap();
        assert_eq!(tree.links.len(), 1);
        assert_eq!(tree.links[0].from_node, b);
    }

    #[test]
    fn clear_resets_everything() {
        let mut tree = NodeTree::new();
        let bsdf = tree.add(NodeKind::BsdfPrincipled);
        let out = tree.add(NodeKind::OutputMaterial);
        tree.link(bsdf, BSDF, out, SURFACE).unwrap();
        tree.set_active(bsdf);
        tree.clear();
        assert!(tree.nodes.is_empty() && tree.links.is_empty() && tree.active.is_none());
        assert_eq!(tree.add(NodeKind::OutputMaterial), NodeId(0));
    }
}
