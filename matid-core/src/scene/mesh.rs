//! Triangle mesh data, modifier baking and joining.

use glam::Vec3;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshData {
    pub positions: Vec<Vec3>,
    pub triangles: Vec<[u32; 3]>,
    /// Material slot per triangle. Empty means every triangle uses slot 0.
    pub material_indices: Vec<u32>,
}

impl MeshData {
    pub fn vertex_count(&self) -> usize { self.positions.len() }
    pub fn triangle_count(&self) -> usize { self.triangles.len() }

    pub fn material_index(&self, tri: usize) -> u32 { self.material_indices.get(tri).copied().unwrap_or(0) }

    /// First triangle index that points past the vertex list, if any.
    pub fn first_out_of_range(&self) -> Option<(usize, u32)> {
        let len = self.positions.len() as u64;
        self.triangles.iter().enumerate().find_map(|(i, t)| {
            t.iter().find(|&&v| u64::from(v) >= len).map(|&v| (i, v))
        })
    }

    /// Append `other`, shifting its positions by `offset` and remapping its
    /// material slots through `slot_map` (unmapped slots fall back to 0).
    pub fn append(&mut self, other: &MeshData, offset: Vec3, slot_map: &[u32]) {
        let base = self.positions.len() as u32;
        self.fill_material_indices();
        self.positions.extend(other.positions.iter().map(|p| *p + offset));
        for (i, t) in other.triangles.iter().enumerate() {
            self.triangles.push([t[0] + base, t[1] + base, t[2] + base]);
            let slot = other.material_index(i) as usize;
            self.material_indices.push(slot_map.get(slot).copied().unwrap_or(0));
        }
    }

    fn fill_material_indices(&mut self) {
        if self.material_indices.len() < self.triangles.len() {
            self.material_indices.resize(self.triangles.len(), 0);
        }
    }

    /// Mesh plus its reflection across `axis`, with mirrored triangles
    /// wound the other way so normals keep facing outward.
    pub fn mirrored(&self, axis: Axis) -> MeshData {
        let mut out = self.clone();
        out.fill_material_indices();
        let base = self.positions.len() as u32;
        let flip = axis.flip();
        out.positions.extend(self.positions.iter().map(|p| *p * flip));
        for (i, t) in self.triangles.iter().enumerate() {
            out.triangles.push([t[0] + base, t[2] + base, t[1] + base]);
            out.material_indices.push(self.material_index(i));
        }
        out
    }

    /// `count` copies spaced by a constant `offset`. A count of zero is
    /// treated as one.
    pub fn arrayed(&self, count: u32, offset: Vec3) -> MeshData {
        let mut out = MeshData::default();
        for i in 0..count.max(1) {
            out.append(self, offset * i as f32, &[]);
        }
        // keep the original slot assignment instead of the fallback
        out.material_indices = (0..count.max(1))
            .flat_map(|_| (0..self.triangles.len()).map(|t| self.material_index(t)))
            .collect();
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    #[default]
    X,
    Y,
    Z,
}

impl Axis {
    fn flip(self) -> Vec3 {
        match self {
            Axis::X => Vec3::new(-1.0, 1.0, 1.0),
            Axis::Y => Vec3::new(1.0, -1.0, 1.0),
            Axis::Z => Vec3::new(1.0, 1.0, -1.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ModifierKind {
    /// Deformation driven by a skeleton; baking it needs a pose, so applying
    /// only drops it from the stack.
    Armature,
    Mirror {
        #[serde(default)]
        axis: Axis,
    },
    Array {
        count: u32,
        #[serde(default)]
        offset: Vec3,
    },
    /// Any other modifier; applying removes it without changing geometry.
    Generic { type_name: String },
}

impl ModifierKind {
    pub fn type_name(&self) -> &str {
        match self {
            ModifierKind::Armature => "armature",
            ModifierKind::Mirror { .. } => "mirror",
            ModifierKind::Array { .. } => "array",
            ModifierKind::Generic { type_name } => type_name,
        }
    }

    pub fn bake(&self, mesh: &MeshData) -> MeshData {
        match self {
            ModifierKind::Mirror { axis } => mesh.mirrored(*axis),
            ModifierKind::Array { count, offset } => mesh.arrayed(*count, *offset),
            ModifierKind::Armature | ModifierKind::Generic { .. } => mesh.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Modifier {
    pub name: String,
    #[serde(flatten)]
    pub kind: ModifierKind,
}

impl Modifier {
    pub fn new(name: &str, kind: ModifierKind) -> Self { Self { name: name.to_string(), kind } }
}

#[cfg(test)]
pub(crate) fn unit_triangle() -> MeshData {
    MeshData {
        positions: vec![Vec3::new(1.0, 0.0, 0.0), Vec3::new(2.0, 0.0, 0.0), Vec3::new(1.0, 1.0, 0.0)],
        triangles: vec![[0, 1, 2]],
        material_indices: Vec::new(),
    }
}
