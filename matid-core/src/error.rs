use thiserror::Error;

use crate::scene::{MaterialId, MeshId, Mode, ObjectId};

#[derive(Debug, Error)]
pub enum SceneError {
    #[error("unknown object {0:?}")] UnknownObject(ObjectId),
    #[error("unknown mesh {0:?}")] UnknownMesh(MeshId),
    #[error("unknown material {0:?}")] UnknownMaterial(MaterialId),
    #[error("no object named '{0}'")] ObjectNotFound(String),
    #[error("no mesh named '{0}'")] MeshNotFound(String),
    #[error("no material named '{0}'")] MaterialNotFound(String),
    #[error("no image named '{0}'")] ImageNotFound(String),
    #[error("duplicate {kind} name '{name}'")] DuplicateName { kind: &'static str, name: String },
    #[error("object '{0}' is its own ancestor")] ParentCycle(String),
    #[error("triangle {index} of mesh '{mesh}' references vertex {vertex} but mesh has {len} vertices")]
    TriangleOutOfRange { mesh: String, index: usize, vertex: u32, len: usize },
    #[error("operation requires object mode, scene is in {0:?} mode")] WrongMode(Mode),
    #[error("object '{0}' is not a mesh")] NotAMesh(String),
    #[error("object '{0}' has no modifier named '{1}'")] ModifierNotFound(String, String),
    #[error("node '{node}' has no {side} socket {socket}")] NodeSocket { node: String, side: &'static str, socket: usize },
    #[error("unknown shader node {0}")] UnknownNode(u32),
    #[error("mesh data of '{0}' is shared with other objects")] MultiUserData(String),
    #[error("join needs a selected active mesh object")] NoActiveMesh,
    #[error("image resolution must be between 1 and {max}, got {got}")] InvalidResolution { got: u64, max: u64 },
    #[error("image fill color components must be within 0..=1, got {0}")] InvalidColor(glam::Vec4),
    #[error("cannot open image '{path}': {reason}")] ImageOpen { path: String, reason: String },
    #[error("invalid scene document: {0}")] Parse(String),
    #[error("i/o error: {0}")] Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("nothing is selected")] NothingSelected,
    #[error("selected object '{0}' is not a mesh")] NotAllMeshes(String),
    #[error("No image selected")] NoImageSelected,
    #[error(transparent)] Scene(#[from] SceneError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")] Io(#[from] std::io::Error),
    #[error("invalid config: {0}")] Yaml(#[from] serde_yaml::Error),
}
