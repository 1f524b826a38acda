//! Scene documents (YAML or JSON). Objects, meshes and materials reference
//! each other by name; loading resolves and validates every reference.

use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::{Image, MeshData, Modifier, Mode, ObjectId, ObjectKind, Scene, MASTER_COLLECTION};
use crate::error::SceneError;
use crate::shader::NodeTree;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneFile {
    pub mode: Mode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active: Option<String>,
    pub objects: Vec<ObjectEntry>,
    pub meshes: Vec<MeshEntry>,
    pub materials: Vec<MaterialEntry>,
    pub images: Vec<Image>,
    pub collections: Vec<CollectionEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectEntry {
    pub name: String,
    pub kind: ObjectKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(default)]
    pub location: Vec3,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mesh: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub modifiers: Vec<Modifier>,
    /// Material per slot; `null` keeps an empty slot.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub materials: Vec<Option<String>>,
    #[serde(default)]
    pub selected: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeshEntry {
    pub name: String,
    #[serde(flatten)]
    pub geometry: MeshData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaterialEntry {
    pub name: String,
    #[serde(default)]
    pub use_nodes: bool,
    #[serde(default)]
    pub node_tree: NodeTree,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionEntry {
    pub name: String,
    /// Parent collection; the master collection when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(default)]
    pub objects: Vec<String>,
}

fn check_unique<'a>(kind: &'static str, names: impl Iterator<Item = &'a str>) -> Result<(), SceneError> {
    let mut seen = BTreeSet::new();
    for n in names {
        if !seen.insert(n) {
            return Err(SceneError::DuplicateName { kind, name: n.to_string() });
        }
    }
    Ok(())
}

impl Scene {
    pub fn from_file(file: SceneFile) -> Result<Scene, SceneError> {
        check_unique("mesh", file.meshes.iter().map(|m| m.name.as_str()))?;
        check_unique("material", file.materials.iter().map(|m| m.name.as_str()))?;
        check_unique("image", file.images.iter().map(|i| i.name.as_str()))?;
        check_unique("object", file.objects.iter().map(|o| o.name.as_str()))?;

        let mut scene = Scene::new();
        scene.mode = file.mode;

        let mut meshes = HashMap::new();
        for m in file.meshes {
            if let Some((index, vertex)) = m.geometry.first_out_of_range() {
                return Err(SceneError::TriangleOutOfRange {
                    mesh: m.name,
                    index,
                    vertex,
                    len: m.geometry.vertex_count(),
                });
            }
            let tris = m.geometry.triangle_count();
            if !m.geometry.material_indices.is_empty() && m.geometry.material_indices.len() != tris {
                return Err(SceneError::Parse(format!(
                    "mesh '{}' has {} material indices for {} triangles",
                    m.name,
                    m.geometry.material_indices.len(),
                    tris
                )));
            }
            let id = scene.add_mesh(&m.name, m.geometry);
            meshes.insert(m.name, id);
        }

        let mut materials = HashMap::new();
        for m in file.materials {
            let id = scene.add_material(&m.name);
            let mat = scene.material_mut(id)?;
            mat.use_nodes = m.use_nodes;
            mat.node_tree = m.node_tree;
            materials.insert(m.name, id);
        }

        for img in file.images {
            scene.images.insert(img.name.clone(), img);
        }

        let mut objects = HashMap::new();
        for o in &file.objects {
            let id = scene.add_object(&o.name, o.kind);
            objects.insert(o.name.clone(), id);
            scene.set_location(id, o.location)?;
            if let Some(mesh) = &o.mesh {
                let m = *meshes.get(mesh).ok_or_else(|| SceneError::MeshNotFound(mesh.clone()))?;
                scene.set_mesh(id, m)?;
            }
            for slot in &o.materials {
                let m = match slot {
                    Some(name) => Some(*materials.get(name).ok_or_else(|| SceneError::MaterialNotFound(name.clone()))?),
                    None => None,
                };
                scene.add_material_slot(id, m)?;
            }
            for m in &o.modifiers {
                scene.add_modifier(id, m.clone())?;
            }
            scene.select(id, o.selected)?;
        }
        let lookup = |name: &str| objects.get(name).copied().ok_or_else(|| SceneError::ObjectNotFound(name.to_string()));
        for o in &file.objects {
            if let Some(parent) = &o.parent {
                scene.set_parent(lookup(&o.name)?, Some(lookup(parent)?))?;
            }
        }

        let mut in_child = BTreeSet::new();
        let mut in_master = BTreeSet::new();
        for c in &file.collections {
            let ids = c.objects.iter().map(|n| lookup(n)).collect::<Result<Vec<_>, _>>()?;
            if c.name == MASTER_COLLECTION {
                in_master.extend(ids);
                continue;
            }
            scene.add_collection(&c.name, c.parent.as_deref())?;
            for id in ids {
                scene.link_to_collection(id, &c.name)?;
                in_child.insert(id);
            }
        }
        scene.collections[0].objects.retain(|id| in_master.contains(id) || !in_child.contains(id));

        if let Some(active) = &file.active {
            scene.active = Some(lookup(active)?);
        }
        Ok(scene)
    }

    pub fn to_file(&self) -> SceneFile {
        let obj_name = |id: ObjectId| self.objects.get(&id).map(|o| o.name.clone());
        let objects = self
            .objects
            .values()
            .map(|o| ObjectEntry {
                name: o.name.clone(),
                kind: o.kind,
                parent: o.parent.and_then(obj_name),
                location: o.location,
                mesh: o.data.and_then(|m| self.meshes.get(&m)).map(|m| m.name.clone()),
                modifiers: o.modifiers.clone(),
                materials: o
                    .material_slots
                    .iter()
                    .map(|s| s.and_then(|m| self.materials.get(&m)).map(|m| m.name.clone()))
                    .collect(),
                selected: o.selected,
            })
            .collect();
        let collections = self
            .collections
            .iter()
            .map(|c| CollectionEntry {
                name: c.name.clone(),
                parent: self
                    .collections
                    .iter()
                    .find(|p| p.children.contains(&c.name) && p.name != MASTER_COLLECTION)
                    .map(|p| p.name.clone()),
                objects: c.objects.iter().filter_map(|id| obj_name(*id)).collect(),
            })
            .collect();
        SceneFile {
            mode: self.mode,
            active: self.active.and_then(obj_name),
            objects,
            meshes: self
                .meshes
                .values()
                .map(|m| MeshEntry { name: m.name.clone(), geometry: m.geometry.clone() })
                .collect(),
            materials: self
                .materials
                .values()
                .map(|m| MaterialEntry { name: m.name.clone(), use_nodes: m.use_nodes, node_tree: m.node_tree.clone() })
                .collect(),
            images: self.images.values().cloned().collect(),
            collections,
        }
    }
}

pub fn load_from_yaml_str(s: &str) -> Result<Scene, SceneError> {
    let file: SceneFile = serde_yaml::from_str(s).map_err(|e| SceneError::Parse(e.to_string()))?;
    Scene::from_file(file)
}

pub fn load_from_json_str(s: &str) -> Result<Scene, SceneError> {
    let file: SceneFile = serde_json::from_str(s).map_err(|e| SceneError::Parse(e.to_string()))?;
    Scene::from_file(file)
}

fn is_json(path: &Path) -> bool {
    path.extension().is_some_and(|e| e.eq_ignore_ascii_case("json"))
}

/// Load a scene, picking JSON for `.json` files and YAML otherwise.
pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Scene, SceneError> {
    let path = path.as_ref();
    let data = std::fs::read_to_string(path)?;
    if is_json(path) { load_from_json_str(&data) } else { load_from_yaml_str(&data) }
}

pub fn to_yaml_string(scene: &Scene) -> Result<String, SceneError> {
    serde_yaml::to_string(&scene.to_file()).map_err(|e| SceneError::Parse(e.to_string()))
}

pub fn to_json_string(scene: &Scene) -> Result<String, SceneError> {
    serde_json::to_string_pretty(&scene.to_file()).map_err(|e| SceneError::Parse(e.to_string()))
}

pub fn save_to_path<P: AsRef<Path>>(scene: &Scene, path: P) -> Result<(), SceneError> {
    let path = path.as_ref();
    let text = if is_json(path) { to_json_string(scene)? } else { to_yaml_string(scene)? };
    std::fs::write(path, text)?;
    Ok(())
}
