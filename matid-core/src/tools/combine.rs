//! Combine an object hierarchy into one mesh.
//!
//! Works on duplicates: the selected objects and their mesh descendants are
//! duplicated, every duplicate gets its modifiers applied (armatures are
//! kept by default) and the duplicated meshes are joined into the last one.
//! The originals are left as they were.

use log::{debug, info};
use serde::Serialize;

use crate::config::CombineConfig;
use crate::error::ToolError;
use crate::scene::walk::select_all_children;
use crate::scene::{Mode, ObjectId, ObjectKind, Scene};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CombineReport {
    pub duplicates: Vec<ObjectId>,
    /// Mesh holding the combined geometry, if any mesh was duplicated.
    pub combined: Option<ObjectId>,
    pub meshes_joined: usize,
    pub modifiers_applied: usize,
}

/// Apply every modifier on `id` that `cfg` does not keep. Leaves nothing
/// selected. Returns the number of modifiers applied.
pub fn apply_all_mesh_modifiers(scene: &mut Scene, id: ObjectId, cfg: &CombineConfig) -> Result<usize, ToolError> {
    scene.deselect_all();
    scene.set_active(Some(id))?;
    scene.select(id, true)?;

    let mut applied = 0;
    if let Some(obj) = scene.object(id) {
        if obj.kind == ObjectKind::Mesh {
            let names: Vec<String> = obj
                .modifiers
                .iter()
                .filter(|m| !cfg.keeps(m.kind.type_name()))
                .map(|m| m.name.clone())
                .collect();
            for name in names {
                scene.apply_modifier(id, &name)?;
                applied += 1;
            }
        } else if !obj.modifiers.is_empty() {
            debug!("'{}' is not a mesh, leaving its modifiers", obj.name);
        }
    }

    scene.deselect_all();
    Ok(applied)
}

pub fn combine_children(scene: &mut Scene, cfg: &CombineConfig) -> Result<CombineReport, ToolError> {
    let originals = scene.selected();
    if originals.is_empty() {
        return Err(ToolError::NothingSelected);
    }
    if scene.mode() != Mode::Object {
        scene.set_mode(Mode::Object);
    }

    let opts = cfg.selection();
    for &id in &originals {
        select_all_children(scene, id, &opts)?;
    }

    let duplicates: Vec<ObjectId> = scene.duplicate_selected()?.into_iter().map(|(_, dup)| dup).collect();

    let mut modifiers_applied = 0;
    for &dup in &duplicates {
        modifiers_applied += apply_all_mesh_modifiers(scene, dup, cfg)?;
    }

    scene.deselect_all();
    let mut meshes = Vec::new();
    for &dup in &duplicates {
        if scene.kind_of(dup) == Some(ObjectKind::Mesh) {
            scene.set_active(Some(dup))?;
            scene.select(dup, true)?;
            meshes.push(dup);
        }
    }

    let combined = if meshes.len() > 1 {
        Some(scene.join_selected()?)
    } else {
        meshes.first().copied()
    };

    for &dup in &duplicates {
        if scene.object(dup).is_some() {
            scene.select(dup, true)?;
        }
    }

    info!(
        "combined {} mesh(es) from {} selected object(s), {} modifier(s) applied",
        meshes.len(),
        originals.len(),
        modifiers_applied
    );
    Ok(CombineReport { duplicates, combined, meshes_joined: meshes.len(), modifiers_applied })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::tests::rig;
    use crate::scene::{Axis, Modifier, ModifierKind};

    fn rigged() -> (Scene, [ObjectId; 5]) {
        let (mut s, ids) = rig();
        let [_, a, _, _, b] = ids;
        s.add_modifier(a, Modifier::new("Mirror", ModifierKind::Mirror { axis: Axis::X })).unwrap();
        s.add_modifier(a, Modifier::new("Rig", ModifierKind::Armature)).unwrap();
        s.add_modifier(b, Modifier::new("Rig", ModifierKind::Armature)).unwrap();
        (s, ids)
    }

    #[test]
    fn hierarchy_becomes_one_mesh() {
        let (mut s, [root, a, a1, lamp, b]) = rigged();
        s.set_mode(Mode::Edit);
        s.select(root, true).unwrap();

        let report = combine_children(&mut s, &CombineConfig::default()).unwrap();
        assert_eq!(s.mode(), Mode::Object);
        assert_eq!(report.duplicates.len(), 4);
        assert_eq!(report.meshes_joined, 3);
        assert_eq!(report.modifiers_applied, 1);

        let combined = report.combined.unwrap();
        let obj = s.object(combined).unwrap();
        assert_eq!(obj.name, "B.001");
        assert_eq!(obj.parent, Some(lamp));
        // armature survives on the join target
        assert_eq!(obj.modifiers, vec![Modifier::new("Rig", ModifierKind::Armature)]);
        // mirrored copy of A (2) + A1 (1) + B (1)
        assert_eq!(s.mesh_of(combined).unwrap().geometry.triangle_count(), 4);

        // 5 originals + the duplicated root + the combined mesh
        assert_eq!(s.object_count(), 7);
        let root_dup = s.find_object("Root.001").unwrap();
        assert_eq!(s.selected(), vec![root_dup, combined]);

        // originals untouched
        assert_eq!(s.object(a).unwrap().modifiers.len(), 2);
        assert_eq!(s.mesh_of(a).unwrap().geometry.triangle_count(), 1);
        assert_eq!(s.children(root), &[a, lamp]);
        assert_eq!(s.children(a), &[a1]);
        assert_eq!(s.children(lamp), &[b, combined]);
    }

    #[test]
    fn matched_only_skips_meshes_under_other_kinds() {
        let (mut s, [root, ..]) = rigged();
        s.select(root, true).unwrap();
        let cfg = CombineConfig { descend_through_unmatched: false, ..Default::default() };
        let report = combine_children(&mut s, &cfg).unwrap();
        assert_eq!(report.meshes_joined, 2);
        let combined = s.object(report.combined.unwrap()).unwrap();
        assert_eq!(combined.name, "A1.001");
        assert_eq!(s.mesh_of(combined.id).unwrap().geometry.triangle_count(), 3);
    }

    #[test]
    fn single_mesh_is_not_joined() {
        let (mut s, [_, _, a1, ..]) = rigged();
        s.select(a1, true).unwrap();
        let report = combine_children(&mut s, &CombineConfig::default()).unwrap();
        assert_eq!(report.meshes_joined, 1);
        assert_eq!(report.combined, Some(report.duplicates[0]));
    }

    #[test]
    fn nothing_selected_is_an_error() {
        let (mut s, _) = rigged();
        assert!(matches!(combine_children(&mut s, &CombineConfig::default()), Err(ToolError::NothingSelected)));
    }

    #[test]
    fn keep_list_controls_applied_modifiers() {
        let (mut s, [_, a, ..]) = rigged();
        let cfg = CombineConfig { keep_modifiers: Vec::new(), ..Default::default() };
        assert_eq!(apply_all_mesh_modifiers(&mut s, a, &cfg).unwrap(), 2);
        assert!(s.object(a).unwrap().modifiers.is_empty());
        assert!(s.selected().is_empty());
        assert_eq!(s.active(), Some(a));
    }
}
