//! Child selection over the object hierarchy.

use log::trace;

use super::{ObjectId, ObjectKind, Scene};
use crate::error::SceneError;

/// Which descendants `select_all_children` marks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectChildren {
    pub kind: ObjectKind,
    /// Keep walking below children of another kind. When false, a subtree
    /// is only entered through a child that matched.
    pub descend_through_unmatched: bool,
}

impl Default for SelectChildren {
    fn default() -> Self { Self { kind: ObjectKind::Mesh, descend_through_unmatched: true } }
}

impl SelectChildren {
    pub fn of_kind(kind: ObjectKind) -> Self { Self { kind, ..Default::default() } }
    pub fn matched_only(mut self) -> Self {
        self.descend_through_unmatched = false;
        self
    }
}

/// Descendants of `root` (root excluded) of the requested kind, depth-first
/// pre-order. Uses an explicit stack so deep hierarchies cannot overflow.
pub fn descendants_matching(scene: &Scene, root: ObjectId, opts: &SelectChildren) -> Vec<ObjectId> {
    let mut out = Vec::new();
    let mut stack: Vec<ObjectId> = scene.children(root).iter().rev().copied().collect();
    while let Some(id) = stack.pop() {
        let matched = scene.kind_of(id) == Some(opts.kind);
        if matched {
            out.push(id);
        }
        if matched || opts.descend_through_unmatched {
            stack.extend(scene.children(id).iter().rev().copied());
        }
    }
    out
}

/// Select every matching descendant of `root`; returns what was selected.
pub fn select_all_children(scene: &mut Scene, root: ObjectId, opts: &SelectChildren) -> Result<Vec<ObjectId>, SceneError> {
    if scene.object(root).is_none() {
        return Err(SceneError::UnknownObject(root));
    }
    let found = descendants_matching(scene, root, opts);
    for &id in &found {
        scene.select(id, true)?;
    }
    trace!("selected {} {:?} descendant(s) of {:?}", found.len(), opts.kind, root);
    Ok(found)
}
