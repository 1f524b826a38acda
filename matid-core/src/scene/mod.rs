//! In-memory scene: objects, hierarchy, selection, collections and the
//! mesh/material/image datablocks the tools operate on.
//!
//! Parent/child relations are kept twice: each object stores its parent and
//! the scene keeps an ordered adjacency list of children per object. Both are
//! only changed through `set_parent`, which refuses to create cycles.
//!
//! Object locations are world-space; parenting does not compose transforms.

pub mod image;
pub mod mesh;
pub mod schema;
pub mod walk;

use std::collections::{BTreeMap, BTreeSet};

use glam::Vec3;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::SceneError;
use crate::shader::NodeTree;
pub use image::{Image, NewImage};
pub use mesh::{Axis, MeshData, Modifier, ModifierKind};

pub const MASTER_COLLECTION: &str = "Scene Collection";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MeshId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MaterialId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    Mesh,
    Curve,
    Surface,
    Meta,
    Font,
    Armature,
    Lattice,
    Empty,
    Light,
    Camera,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    #[default]
    Object,
    Edit,
    Sculpt,
    VertexPaint,
    WeightPaint,
    TexturePaint,
    Pose,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Object {
    pub id: ObjectId,
    pub name: String,
    pub kind: ObjectKind,
    pub parent: Option<ObjectId>,
    pub location: Vec3,
    pub data: Option<MeshId>,
    pub modifiers: Vec<Modifier>,
    pub material_slots: Vec<Option<MaterialId>>,
    pub selected: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    pub id: MeshId,
    pub name: String,
    pub geometry: MeshData,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub id: MaterialId,
    pub name: String,
    pub use_nodes: bool,
    pub node_tree: NodeTree,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Collection {
    pub name: String,
    pub objects: Vec<ObjectId>,
    pub children: Vec<String>,
}

/// Unique datablock name: `base` if free, otherwise `base.001`,
/// `base.002`, ... with any existing numeric suffix stripped first.
pub fn unique_name(base: &str, taken: impl Fn(&str) -> bool) -> String {
    if !taken(base) {
        return base.to_string();
    }
    let stem = match base.rsplit_once('.') {
        Some((stem, num)) if num.len() == 3 && num.bytes().all(|b| b.is_ascii_digit()) => stem,
        _ => base,
    };
    numbered(stem, base, taken)
}

/// Like [`unique_name`] but never strips a suffix, so a requested
/// `MaterialID.100` that is taken becomes `MaterialID.100.001`.
pub fn unique_name_verbatim(base: &str, taken: impl Fn(&str) -> bool) -> String {
    if !taken(base) {
        return base.to_string();
    }
    numbered(base, base, taken)
}

fn numbered(stem: &str, fallback: &str, taken: impl Fn(&str) -> bool) -> String {
    (1u32..)
        .map(|i| format!("{}.{:03}", stem, i))
        .find(|cand| !taken(cand))
        .unwrap_or_else(|| fallback.to_string())
}

#[derive(Debug, Clone)]
pub struct Scene {
    objects: BTreeMap<ObjectId, Object>,
    children: BTreeMap<ObjectId, Vec<ObjectId>>,
    meshes: BTreeMap<MeshId, Mesh>,
    materials: BTreeMap<MaterialId, Material>,
    images: BTreeMap<String, Image>,
    collections: Vec<Collection>,
    active: Option<ObjectId>,
    mode: Mode,
    next_id: u32,
}

impl Default for Scene {
    fn default() -> Self { Self::new() }
}

impl Scene {
    pub fn new() -> Self {
        Self {
            objects: BTreeMap::new(),
            children: BTreeMap::new(),
            meshes: BTreeMap::new(),
            materials: BTreeMap::new(),
            images: BTreeMap::new(),
            collections: vec![Collection { name: MASTER_COLLECTION.to_string(), ..Default::default() }],
            active: None,
            mode: Mode::Object,
            next_id: 0,
        }
    }

    fn alloc(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    // ---- objects -------------------------------------------------------

    /// Add an unparented object linked into the master collection.
    pub fn add_object(&mut self, name: &str, kind: ObjectKind) -> ObjectId {
        let id = ObjectId(self.alloc());
        let name = self.unique_object_name(name);
        self.objects.insert(id, Object {
            id,
            name,
            kind,
            parent: None,
            location: Vec3::ZERO,
            data: None,
            modifiers: Vec::new(),
            material_slots: Vec::new(),
            selected: false,
        });
        self.collections[0].objects.push(id);
        id
    }

    fn unique_object_name(&self, base: &str) -> String {
        unique_name(base, |n| self.objects.values().any(|o| o.name == n))
    }

    pub fn object(&self, id: ObjectId) -> Option<&Object> { self.objects.get(&id) }

    fn obj(&self, id: ObjectId) -> Result<&Object, SceneError> {
        self.objects.get(&id).ok_or(SceneError::UnknownObject(id))
    }

    fn obj_mut(&mut self, id: ObjectId) -> Result<&mut Object, SceneError> {
        self.objects.get_mut(&id).ok_or(SceneError::UnknownObject(id))
    }

    pub fn objects(&self) -> impl Iterator<Item = &Object> { self.objects.values() }
    pub fn object_count(&self) -> usize { self.objects.len() }

    pub fn find_object(&self, name: &str) -> Option<ObjectId> {
        self.objects.values().find(|o| o.name == name).map(|o| o.id)
    }

    pub fn kind_of(&self, id: ObjectId) -> Option<ObjectKind> { self.objects.get(&id).map(|o| o.kind) }

    pub fn set_location(&mut self, id: ObjectId, location: Vec3) -> Result<(), SceneError> {
        self.obj_mut(id)?.location = location;
        Ok(())
    }

    pub fn set_mesh(&mut self, id: ObjectId, mesh: MeshId) -> Result<(), SceneError> {
        if !self.meshes.contains_key(&mesh) {
            return Err(SceneError::UnknownMesh(mesh));
        }
        self.obj_mut(id)?.data = Some(mesh);
        Ok(())
    }

    pub fn add_modifier(&mut self, id: ObjectId, modifier: Modifier) -> Result<(), SceneError> {
        self.obj_mut(id)?.modifiers.push(modifier);
        Ok(())
    }

    pub fn add_material_slot(&mut self, id: ObjectId, material: Option<MaterialId>) -> Result<(), SceneError> {
        if let Some(m) = material {
            if !self.materials.contains_key(&m) {
                return Err(SceneError::UnknownMaterial(m));
            }
        }
        self.obj_mut(id)?.material_slots.push(material);
        Ok(())
    }

    // ---- hierarchy -----------------------------------------------------

    pub fn children(&self, id: ObjectId) -> &[ObjectId] {
        self.children.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn roots(&self) -> Vec<ObjectId> {
        self.objects.values().filter(|o| o.parent.is_none()).map(|o| o.id).collect()
    }

    /// True when `ancestor` is reachable from `id` by following parents.
    pub fn is_ancestor(&self, ancestor: ObjectId, id: ObjectId) -> bool {
        let mut cur = self.objects.get(&id).and_then(|o| o.parent);
        while let Some(p) = cur {
            if p == ancestor {
                return true;
            }
            cur = self.objects.get(&p).and_then(|o| o.parent);
        }
        false
    }

    pub fn set_parent(&mut self, child: ObjectId, parent: Option<ObjectId>) -> Result<(), SceneError> {
        let name = self.obj(child)?.name.clone();
        if let Some(p) = parent {
            self.obj(p)?;
            if p == child || self.is_ancestor(child, p) {
                return Err(SceneError::ParentCycle(name));
            }
        }
        let old = self.obj(child)?.parent;
        if let Some(old) = old {
            if let Some(list) = self.children.get_mut(&old) {
                list.retain(|c| *c != child);
                if list.is_empty() {
                    self.children.remove(&old);
                }
            }
        }
        if let Some(p) = parent {
            self.children.entry(p).or_default().push(child);
        }
        self.obj_mut(child)?.parent = parent;
        Ok(())
    }

    // ---- selection and mode -------------------------------------------

    pub fn mode(&self) -> Mode { self.mode }
    pub fn set_mode(&mut self, mode: Mode) {
        debug!("mode {:?} -> {:?}", self.mode, mode);
        self.mode = mode;
    }

    pub fn is_selected(&self, id: ObjectId) -> bool { self.objects.get(&id).is_some_and(|o| o.selected) }

    pub fn select(&mut self, id: ObjectId, state: bool) -> Result<(), SceneError> {
        self.obj_mut(id)?.selected = state;
        Ok(())
    }

    pub fn deselect_all(&mut self) {
        for o in self.objects.values_mut() {
            o.selected = false;
        }
    }

    /// Selected objects in creation order.
    pub fn selected(&self) -> Vec<ObjectId> {
        self.objects.values().filter(|o| o.selected).map(|o| o.id).collect()
    }

    pub fn active(&self) -> Option<ObjectId> { self.active }

    pub fn set_active(&mut self, id: Option<ObjectId>) -> Result<(), SceneError> {
        if let Some(id) = id {
            self.obj(id)?;
        }
        self.active = id;
        Ok(())
    }

    // ---- datablocks ----------------------------------------------------

    pub fn add_mesh(&mut self, name: &str, geometry: MeshData) -> MeshId {
        let id = MeshId(self.alloc());
        let name = unique_name(name, |n| self.meshes.values().any(|m| m.name == n));
        self.meshes.insert(id, Mesh { id, name, geometry });
        id
    }

    pub fn mesh(&self, id: MeshId) -> Option<&Mesh> { self.meshes.get(&id) }
    pub fn meshes(&self) -> impl Iterator<Item = &Mesh> { self.meshes.values() }

    pub fn mesh_of(&self, id: ObjectId) -> Option<&Mesh> {
        self.objects.get(&id).and_then(|o| o.data).and_then(|m| self.meshes.get(&m))
    }

    fn mesh_users(&self, mesh: MeshId) -> usize {
        self.objects.values().filter(|o| o.data == Some(mesh)).count()
    }

    pub fn add_material(&mut self, name: &str) -> MaterialId {
        let id = MaterialId(self.alloc());
        let name = self.unique_material_name(name);
        self.materials.insert(id, Material { id, name, use_nodes: false, node_tree: NodeTree::new() });
        id
    }

    fn unique_material_name(&self, base: &str) -> String {
        unique_name(base, |n| self.materials.values().any(|m| m.name == n))
    }

    pub fn material(&self, id: MaterialId) -> Option<&Material> { self.materials.get(&id) }
    pub fn materials(&self) -> impl Iterator<Item = &Material> { self.materials.values() }

    pub fn material_mut(&mut self, id: MaterialId) -> Result<&mut Material, SceneError> {
        self.materials.get_mut(&id).ok_or(SceneError::UnknownMaterial(id))
    }

    pub fn find_material(&self, name: &str) -> Option<MaterialId> {
        self.materials.values().find(|m| m.name == name).map(|m| m.id)
    }

    /// Rename a material. A name taken by another material gets a `.001`
    /// style suffix appended; its own digits are kept.
    pub fn rename_material(&mut self, id: MaterialId, name: &str) -> Result<String, SceneError> {
        let unique = unique_name_verbatim(name, |n| self.materials.values().any(|m| m.id != id && m.name == n));
        self.material_mut(id)?.name = unique.clone();
        Ok(unique)
    }

    fn material_users(&self, material: MaterialId) -> usize {
        self.objects
            .values()
            .filter(|o| o.material_slots.contains(&Some(material)))
            .count()
    }

    fn copy_material(&mut self, id: MaterialId) -> Result<MaterialId, SceneError> {
        let src = self.materials.get(&id).cloned().ok_or(SceneError::UnknownMaterial(id))?;
        let new_id = MaterialId(self.alloc());
        let name = self.unique_material_name(&src.name);
        self.materials.insert(new_id, Material { id: new_id, name, ..src });
        Ok(new_id)
    }

    /// Point one material slot at a fresh copy of the material it holds.
    pub fn separate_slot_material(&mut self, id: ObjectId, slot: usize) -> Result<MaterialId, SceneError> {
        let obj = self.obj(id)?;
        let material = obj
            .material_slots
            .get(slot)
            .copied()
            .flatten()
            .ok_or_else(|| SceneError::MaterialNotFound(format!("{} slot {}", obj.name, slot)))?;
        let copy = self.copy_material(material)?;
        self.obj_mut(id)?.material_slots[slot] = Some(copy);
        Ok(copy)
    }

    fn copy_mesh(&mut self, id: MeshId) -> Result<MeshId, SceneError> {
        let src = self.meshes.get(&id).cloned().ok_or(SceneError::UnknownMesh(id))?;
        Ok(self.add_mesh(&src.name, src.geometry))
    }

    pub fn images(&self) -> impl Iterator<Item = &Image> { self.images.values() }
    pub fn image(&self, name: &str) -> Option<&Image> { self.images.get(name) }

    /// Register an image under a unique name and return that name.
    pub fn add_image(&mut self, mut image: Image) -> String {
        image.name = unique_name(&image.name, |n| self.images.contains_key(n));
        let name = image.name.clone();
        self.images.insert(name.clone(), image);
        name
    }

    // ---- collections ---------------------------------------------------

    pub fn collections(&self) -> &[Collection] { &self.collections }

    pub fn collection(&self, name: &str) -> Option<&Collection> {
        self.collections.iter().find(|c| c.name == name)
    }

    /// Names of the collections an object is linked into.
    pub fn users_collection(&self, id: ObjectId) -> Vec<&str> {
        self.collections
            .iter()
            .filter(|c| c.objects.contains(&id))
            .map(|c| c.name.as_str())
            .collect()
    }

    /// Return the child collection `name` of the master collection,
    /// creating it when missing.
    pub fn ensure_collection(&mut self, name: &str) -> String {
        if self.collections[0].children.iter().any(|c| c == name) {
            return name.to_string();
        }
        let unique = unique_name(name, |n| self.collections.iter().any(|c| c.name == n));
        debug!("creating collection '{}'", unique);
        self.collections.push(Collection { name: unique.clone(), ..Default::default() });
        self.collections[0].children.push(unique.clone());
        unique
    }

    pub(crate) fn add_collection(&mut self, name: &str, parent: Option<&str>) -> Result<(), SceneError> {
        if self.collection(name).is_some() {
            return Err(SceneError::DuplicateName { kind: "collection", name: name.to_string() });
        }
        self.collections.push(Collection { name: name.to_string(), ..Default::default() });
        let parent = parent.unwrap_or(MASTER_COLLECTION);
        match self.collections.iter_mut().find(|c| c.name == parent) {
            Some(p) => p.children.push(name.to_string()),
            None => return Err(SceneError::Parse(format!("collection parent '{}' not found", parent))),
        }
        Ok(())
    }

    pub fn unlink_from_all_collections(&mut self, id: ObjectId) {
        for c in &mut self.collections {
            c.objects.retain(|o| *o != id);
        }
    }

    pub fn link_to_collection(&mut self, id: ObjectId, collection: &str) -> Result<(), SceneError> {
        self.obj(id)?;
        let c = self
            .collections
            .iter_mut()
            .find(|c| c.name == collection)
            .ok_or_else(|| SceneError::Parse(format!("collection '{}' not found", collection)))?;
        if !c.objects.contains(&id) {
            c.objects.push(id);
        }
        Ok(())
    }

    // ---- object operators ---------------------------------------------

    /// Duplicate every selected object. Mesh data is copied, materials stay
    /// shared. Duplicates replace the originals in the selection, keep their
    /// originals' collections, and are parented under the duplicate of their
    /// parent when that parent was duplicated too. Returns (original,
    /// duplicate) pairs in selection order.
    pub fn duplicate_selected(&mut self) -> Result<Vec<(ObjectId, ObjectId)>, SceneError> {
        let originals = self.selected();
        let mut pairs = Vec::with_capacity(originals.len());
        for &orig in &originals {
            let src = self.obj(orig)?.clone();
            let data = match src.data {
                Some(m) => Some(self.copy_mesh(m)?),
                None => None,
            };
            let id = ObjectId(self.alloc());
            let name = self.unique_object_name(&src.name);
            self.objects.insert(id, Object { id, name, parent: None, data, selected: true, ..src });
            for c in &mut self.collections {
                if c.objects.contains(&orig) {
                    c.objects.push(id);
                }
            }
            pairs.push((orig, id));
        }
        let map: BTreeMap<ObjectId, ObjectId> = pairs.iter().copied().collect();
        for &(orig, dup) in &pairs {
            let parent = self.obj(orig)?.parent.map(|p| map.get(&p).copied().unwrap_or(p));
            self.set_parent(dup, parent)?;
            self.select(orig, false)?;
        }
        if let Some(dup) = self.active.and_then(|a| map.get(&a).copied()) {
            self.active = Some(dup);
        }
        debug!("duplicated {} object(s)", pairs.len());
        Ok(pairs)
    }

    /// Give an object its own copies of shared mesh data and materials.
    pub fn make_single_user(&mut self, id: ObjectId) -> Result<(), SceneError> {
        let obj = self.obj(id)?.clone();
        if let Some(m) = obj.data {
            if self.mesh_users(m) > 1 {
                let copy = self.copy_mesh(m)?;
                self.obj_mut(id)?.data = Some(copy);
            }
        }
        for (slot, mat) in obj.material_slots.iter().enumerate() {
            if let Some(m) = *mat {
                if self.material_users(m) > 1 {
                    let copy = self.copy_material(m)?;
                    self.obj_mut(id)?.material_slots[slot] = Some(copy);
                }
            }
        }
        Ok(())
    }

    /// Bake a modifier into the object's mesh and drop it from the stack.
    pub fn apply_modifier(&mut self, id: ObjectId, modifier: &str) -> Result<(), SceneError> {
        if self.mode != Mode::Object {
            return Err(SceneError::WrongMode(self.mode));
        }
        let obj = self.obj(id)?;
        if obj.kind != ObjectKind::Mesh {
            return Err(SceneError::NotAMesh(obj.name.clone()));
        }
        let index = obj
            .modifiers
            .iter()
            .position(|m| m.name == modifier)
            .ok_or_else(|| SceneError::ModifierNotFound(obj.name.clone(), modifier.to_string()))?;
        if let Some(mesh) = obj.data {
            if self.mesh_users(mesh) > 1 {
                return Err(SceneError::MultiUserData(obj.name.clone()));
            }
            let kind = obj.modifiers[index].kind.clone();
            let m = self.meshes.get_mut(&mesh).ok_or(SceneError::UnknownMesh(mesh))?;
            m.geometry = kind.bake(&m.geometry);
        }
        let removed = self.obj_mut(id)?.modifiers.remove(index);
        debug!("applied {} modifier '{}'", removed.kind.type_name(), removed.name);
        Ok(())
    }

    /// Merge every other selected mesh into the active one. Joined objects
    /// are removed; their remaining children move under the target, except
    /// the target's own ancestors which climb to the nearest kept ancestor.
    pub fn join_selected(&mut self) -> Result<ObjectId, SceneError> {
        if self.mode != Mode::Object {
            return Err(SceneError::WrongMode(self.mode));
        }
        let target = self
            .active
            .filter(|a| self.is_selected(*a) && self.kind_of(*a) == Some(ObjectKind::Mesh))
            .ok_or(SceneError::NoActiveMesh)?;
        let sources: Vec<ObjectId> = self
            .selected()
            .into_iter()
            .filter(|id| *id != target && self.kind_of(*id) == Some(ObjectKind::Mesh))
            .collect();
        if sources.is_empty() {
            return Ok(target);
        }

        let target_mesh = match self.obj(target)?.data {
            Some(m) if self.mesh_users(m) > 1 => self.copy_mesh(m)?,
            Some(m) => m,
            None => {
                let name = self.obj(target)?.name.clone();
                self.add_mesh(&name, MeshData::default())
            }
        };
        self.obj_mut(target)?.data = Some(target_mesh);

        let origin = self.obj(target)?.location;
        for &src in &sources {
            let obj = self.obj(src)?.clone();
            let mut slot_map = Vec::with_capacity(obj.material_slots.len());
            for mat in &obj.material_slots {
                let slots = &mut self.obj_mut(target)?.material_slots;
                let index = match mat.and_then(|m| slots.iter().position(|s| *s == Some(m))) {
                    Some(i) => i,
                    None => {
                        slots.push(*mat);
                        slots.len() - 1
                    }
                };
                slot_map.push(index as u32);
            }
            let geometry = obj.data.and_then(|m| self.meshes.get(&m)).map(|m| m.geometry.clone());
            if let Some(geometry) = geometry {
                let offset = obj.location - origin;
                let dst = self.meshes.get_mut(&target_mesh).ok_or(SceneError::UnknownMesh(target_mesh))?;
                dst.geometry.append(&geometry, offset, &slot_map);
            }
        }

        let removed: BTreeSet<ObjectId> = sources.iter().copied().collect();
        let mut reparent = Vec::new();
        for &src in &sources {
            for &child in self.children(src) {
                if removed.contains(&child) {
                    continue;
                }
                let new_parent = if child == target || self.is_ancestor(child, target) {
                    let mut up = self.obj(src)?.parent;
                    while let Some(p) = up.filter(|p| removed.contains(p)) {
                        up = self.obj(p)?.parent;
                    }
                    up
                } else {
                    Some(target)
                };
                reparent.push((child, new_parent));
            }
        }
        // detach from removed parents first so the new edges cannot close a cycle
        for &(child, _) in &reparent {
            self.set_parent(child, None)?;
        }
        for &(child, parent) in &reparent {
            self.set_parent(child, parent)?;
        }
        for &src in &sources {
            self.remove_object(src)?;
        }
        debug!("joined {} object(s) into '{}'", sources.len(), self.obj(target)?.name);
        Ok(target)
    }

    /// Remove an object, orphaning its children and dropping mesh data
    /// nothing else uses.
    pub fn remove_object(&mut self, id: ObjectId) -> Result<(), SceneError> {
        for child in self.children(id).to_vec() {
            self.set_parent(child, None)?;
        }
        self.set_parent(id, None)?;
        self.unlink_from_all_collections(id);
        let obj = self.objects.remove(&id).ok_or(SceneError::UnknownObject(id))?;
        self.children.remove(&id);
        if let Some(m) = obj.data {
            if self.mesh_users(m) == 0 {
                self.meshes.remove(&m);
            }
        }
        if self.active == Some(id) {
            self.active = None;
        }
        Ok(())
    }
}
