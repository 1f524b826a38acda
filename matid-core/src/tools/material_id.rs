//! Material ID generation: one flat, uniquely colored shader per material
//! slot of the selected meshes, for object masks at render time.

use std::collections::HashSet;

use log::{info, warn};
use serde::Serialize;

use crate::color::{color_for, Rgba};
use crate::config::{MaterialIdConfig, MaterialIdMode};
use crate::error::{SceneError, ToolError};
use crate::scene::{Material, ObjectId, ObjectKind, Scene};
use crate::shader::{NodeKind, SocketValue, BASE_COLOR, BSDF, ROUGHNESS, SURFACE};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssignedMaterial {
    pub object: String,
    pub material: String,
    pub iteration: u64,
    pub color: Rgba,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MaterialIdReport {
    pub objects: Vec<ObjectId>,
    /// Collection the duplicates were moved into.
    pub collection: Option<String>,
    pub assigned: Vec<AssignedMaterial>,
}

/// The tool needs a non-empty selection made only of meshes.
pub fn can_run(scene: &Scene) -> Result<(), ToolError> {
    let selected = scene.selected();
    if selected.is_empty() {
        return Err(ToolError::NothingSelected);
    }
    for id in selected {
        if let Some(obj) = scene.object(id) {
            if obj.kind != ObjectKind::Mesh {
                return Err(ToolError::NotAllMeshes(obj.name.clone()));
            }
        }
    }
    Ok(())
}

/// Replace a material's node tree with output <- principled BSDF, flat
/// colored and fully rough, plus an active image texture node when an
/// image is given.
pub fn build_flat_shader(material: &mut Material, color: Rgba, roughness: f32, image: Option<&str>) -> Result<(), SceneError> {
    material.use_nodes = true;
    let tree = &mut material.node_tree;
    tree.clear();

    let output = tree.add(NodeKind::OutputMaterial);
    let bsdf = tree.add(NodeKind::BsdfPrincipled);
    tree.set_input(bsdf, BASE_COLOR, SocketValue::Color(color.to_vec4()))?;
    tree.set_input(bsdf, ROUGHNESS, SocketValue::Float(roughness))?;
    tree.link(bsdf, BSDF, output, SURFACE)?;

    if let Some(image) = image {
        let tex = tree.add(NodeKind::TexImage { image: Some(image.to_string()) });
        tree.set_active(tex);
    }
    Ok(())
}

pub fn generate_material_ids(scene: &mut Scene, cfg: &MaterialIdConfig) -> Result<MaterialIdReport, ToolError> {
    can_run(scene)?;

    let texture = match cfg.mode {
        MaterialIdMode::NoImage => None,
        MaterialIdMode::Image => {
            let name = cfg.image.as_deref().ok_or(ToolError::NoImageSelected)?;
            if scene.image(name).is_none() {
                return Err(SceneError::ImageNotFound(name.to_string()).into());
            }
            Some(name.to_string())
        }
    };

    let collection = if cfg.create_duplicate {
        scene.duplicate_selected()?;
        Some(scene.ensure_collection(&cfg.collection))
    } else {
        None
    };

    let mut report = MaterialIdReport { collection: collection.clone(), ..Default::default() };
    let mut iteration = 0u64;
    for id in scene.selected() {
        if let Some(c) = &collection {
            scene.unlink_from_all_collections(id);
            scene.link_to_collection(id, c)?;
        }
        scene.make_single_user(id)?;
        scene.set_active(Some(id))?;

        let (object, slots) = match scene.object(id) {
            Some(o) => (o.name.clone(), o.material_slots.clone()),
            None => continue,
        };
        let mut seen = HashSet::new();
        for (index, slot) in slots.into_iter().enumerate() {
            let Some(mut material) = slot else {
                warn!("'{}' slot {} has no material, skipping", object, index);
                continue;
            };
            // each slot gets its own ID color even when the object repeats a material
            if !seen.insert(material) {
                material = scene.separate_slot_material(id, index)?;
                seen.insert(material);
            }
            let color = color_for(iteration);
            let name = scene.rename_material(material, &format!("{}.{}", cfg.material_prefix, iteration))?;
            build_flat_shader(scene.material_mut(material)?, color, cfg.roughness, texture.as_deref())?;
            report.assigned.push(AssignedMaterial { object: object.clone(), material: name, iteration, color });
            iteration += 1;
        }
        report.objects.push(id);
    }

    info!("generated {} material ID(s) on {} object(s)", report.assigned.len(), report.objects.len());
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::tests::rig;
    use crate::scene::{NewImage, MASTER_COLLECTION};

    /// A and A1 share "Paint"; B has "Glass" and an empty slot.
    fn painted() -> (Scene, [ObjectId; 5]) {
        let (mut s, ids) = rig();
        let [_, a, a1, _, b] = ids;
        let paint = s.add_material("Paint");
        let glass = s.add_material("Glass");
        s.add_material_slot(a, Some(paint)).unwrap();
        s.add_material_slot(a1, Some(paint)).unwrap();
        s.add_material_slot(b, Some(glass)).unwrap();
        s.add_material_slot(b, None).unwrap();
        (s, ids)
    }

    fn names(s: &Scene) -> Vec<String> {
        let mut v: Vec<_> = s.materials().map(|m| m.name.clone()).collect();
        v.sort();
        v
    }

    #[test]
    fn duplicates_get_sequential_flat_materials() {
        let (mut s, [_, a, a1, _, b]) = painted();
        for id in [a, a1, b] {
            s.select(id, true).unwrap();
        }
        let report = generate_material_ids(&mut s, &MaterialIdConfig::default()).unwrap();

        assert_eq!(report.collection.as_deref(), Some("MID"));
        assert_eq!(report.objects.len(), 3);
        let got: Vec<_> = report.assigned.iter().map(|m| (m.object.as_str(), m.material.as_str(), m.iteration)).collect();
        assert_eq!(got, vec![("A.001", "MaterialID.0", 0), ("A1.001", "MaterialID.1", 1), ("B.001", "MaterialID.2", 2)]);

        for (i, assigned) in report.assigned.iter().enumerate() {
            assert_eq!(assigned.color, color_for(i as u64));
            let mat = s.material(s.find_material(&assigned.material).unwrap()).unwrap();
            assert!(mat.use_nodes);
            let tree = &mat.node_tree;
            assert_eq!(tree.nodes.len(), 2);
            let bsdf = tree.nodes_of(|k| *k == NodeKind::BsdfPrincipled).next().unwrap().id;
            let out = tree.nodes_of(|k| *k == NodeKind::OutputMaterial).next().unwrap().id;
            assert_eq!(tree.input(bsdf, BASE_COLOR), Some(&SocketValue::Color(color_for(i as u64).to_vec4())));
            assert_eq!(tree.input(bsdf, ROUGHNESS), Some(&SocketValue::Float(1.0)));
            assert_eq!(tree.links.len(), 1);
            assert_eq!((tree.links[0].from_node, tree.links[0].to_node), (bsdf, out));
        }

        // originals keep their materials and stay out of MID
        assert!(names(&s).contains(&"Paint".to_string()));
        assert!(names(&s).contains(&"Glass".to_string()));
        assert_eq!(s.users_collection(a), vec![MASTER_COLLECTION]);
        for id in &report.objects {
            assert_eq!(s.users_collection(*id), vec!["MID"]);
        }
        assert_eq!(s.active(), report.objects.last().copied());
    }

    #[test]
    fn in_place_splits_shared_materials() {
        let (mut s, [_, a, a1, ..]) = painted();
        s.select(a, true).unwrap();
        s.select(a1, true).unwrap();
        let cfg = MaterialIdConfig { create_duplicate: false, ..Default::default() };
        let report = generate_material_ids(&mut s, &cfg).unwrap();
        assert_eq!(report.collection, None);
        assert_eq!(report.objects, vec![a, a1]);
        assert!(s.collection("MID").is_none());
        let slot_a = s.object(a).unwrap().material_slots[0];
        let slot_a1 = s.object(a1).unwrap().material_slots[0];
        assert_ne!(slot_a, slot_a1);
        assert_eq!(names(&s), vec!["Glass", "MaterialID.0", "MaterialID.1"]);
    }

    #[test]
    fn image_mode_adds_active_texture_node() {
        let (mut s, [_, a, ..]) = painted();
        let image = s.new_image(&NewImage { name: "Mask".into(), resolution: 64, ..Default::default() }).unwrap();
        s.select(a, true).unwrap();
        let cfg = MaterialIdConfig { mode: MaterialIdMode::Image, image: Some(image.clone()), ..Default::default() };
        let report = generate_material_ids(&mut s, &cfg).unwrap();
        let mat = s.material(s.find_material(&report.assigned[0].material).unwrap()).unwrap();
        let tree = &mat.node_tree;
        assert_eq!(tree.nodes.len(), 3);
        let tex = tree.node(tree.active.unwrap()).unwrap();
        assert_eq!(tex.kind, NodeKind::TexImage { image: Some(image) });
    }

    #[test]
    fn image_mode_without_image_changes_nothing() {
        let (mut s, [_, a, ..]) = painted();
        s.select(a, true).unwrap();
        let before = (s.object_count(), names(&s));
        let cfg = MaterialIdConfig { mode: MaterialIdMode::Image, ..Default::default() };
        let err = generate_material_ids(&mut s, &cfg).unwrap_err();
        assert!(matches!(err, ToolError::NoImageSelected));
        assert_eq!(err.to_string(), "No image selected");
        assert_eq!((s.object_count(), names(&s)), before);

        let cfg = MaterialIdConfig { image: Some("Ghost".into()), ..cfg };
        assert!(matches!(generate_material_ids(&mut s, &cfg), Err(ToolError::Scene(SceneError::ImageNotFound(_)))));
        assert_eq!(s.object_count(), before.0);
    }

    #[test]
    fn selection_must_be_meshes_only() {
        let (mut s, [root, a, ..]) = painted();
        assert!(matches!(can_run(&s), Err(ToolError::NothingSelected)));
        s.select(a, true).unwrap();
        s.select(root, true).unwrap();
        assert!(matches!(generate_material_ids(&mut s, &MaterialIdConfig::default()), Err(ToolError::NotAllMeshes(n)) if n == "Root"));
        assert_eq!(s.object_count(), 5);
    }

    #[test]
    fn empty_slots_do_not_consume_iterations() {
        let (mut s, [_, _, _, _, b]) = painted();
        s.select(b, true).unwrap();
        let cfg = MaterialIdConfig { create_duplicate: false, ..Default::default() };
        let report = generate_material_ids(&mut s, &cfg).unwrap();
        assert_eq!(report.assigned.len(), 1);
        assert_eq!(report.assigned[0].material, "MaterialID.0");
    }

    #[test]
    fn repeated_material_on_one_object_gets_one_id_per_slot() {
        let (mut s, [_, _, _, _, b]) = painted();
        let glass = s.find_material("Glass").unwrap();
        s.add_material_slot(b, Some(glass)).unwrap();
        s.select(b, true).unwrap();
        let cfg = MaterialIdConfig { create_duplicate: false, ..Default::default() };
        let report = generate_material_ids(&mut s, &cfg).unwrap();

        let got: Vec<_> = report.assigned.iter().map(|m| m.material.as_str()).collect();
        assert_eq!(got, vec!["MaterialID.0", "MaterialID.1"]);
        let slots = &s.object(b).unwrap().material_slots;
        assert_ne!(slots[0], slots[2]);
        for assigned in &report.assigned {
            let mat = s.material(s.find_material(&assigned.material).unwrap()).unwrap();
            let bsdf = mat.node_tree.nodes_of(|k| *k == NodeKind::BsdfPrincipled).next().unwrap().id;
            let expected = SocketValue::Color(color_for(assigned.iteration).to_vec4());
            assert_eq!(mat.node_tree.input(bsdf, BASE_COLOR), Some(&expected));
        }
    }
}
