//! Tool settings passed explicitly to each tool run, loadable from YAML.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::scene::walk::SelectChildren;
use crate::scene::ObjectKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaterialIdMode {
    /// Flat colors only.
    #[default]
    NoImage,
    /// Flat colors plus an image texture node bound to `image`.
    Image,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaterialIdConfig {
    pub mode: MaterialIdMode,
    pub create_duplicate: bool,
    /// Image used by `MaterialIdMode::Image`.
    pub image: Option<String>,
    /// Collection that receives the duplicates.
    pub collection: String,
    pub material_prefix: String,
    pub roughness: f32,
}

impl Default for MaterialIdConfig {
    fn default() -> Self {
        Self {
            mode: MaterialIdMode::NoImage,
            create_duplicate: true,
            image: None,
            collection: "MID".to_string(),
            material_prefix: "MaterialID".to_string(),
            roughness: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombineConfig {
    pub child_kind: ObjectKind,
    pub descend_through_unmatched: bool,
    /// Modifier types left on the stack instead of applied.
    pub keep_modifiers: Vec<String>,
}

impl Default for CombineConfig {
    fn default() -> Self {
        Self { child_kind: ObjectKind::Mesh, descend_through_unmatched: true, keep_modifiers: vec!["armature".to_string()] }
    }
}

impl CombineConfig {
    pub fn selection(&self) -> SelectChildren {
        let opts = SelectChildren::of_kind(self.child_kind);
        if self.descend_through_unmatched {
            opts
        } else {
            opts.matched_only()
        }
    }

    pub fn keeps(&self, type_name: &str) -> bool { self.keep_modifiers.iter().any(|k| k == type_name) }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolConfig {
    pub material_id: MaterialIdConfig,
    pub combine: CombineConfig,
}

pub fn load_from_yaml_str(s: &str) -> Result<ToolConfig, ConfigError> {
    let cfg: ToolConfig = serde_yaml::from_str(s)?;
    Ok(cfg)
}

pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<ToolConfig, ConfigError> {
    let data = std::fs::read_to_string(path)?;
    load_from_yaml_str(&data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_gives_defaults() {
        let cfg = load_from_yaml_str("{}").unwrap();
        assert_eq!(cfg, ToolConfig::default());
        assert_eq!(cfg.material_id.collection, "MID");
        assert!(cfg.material_id.create_duplicate);
        assert!(cfg.combine.keeps("armature"));
        assert_eq!(cfg.combine.selection(), SelectChildren::default());
    }

    #[test]
    fn combine_child_kind_is_configurable() {
        let cfg = load_from_yaml_str("combine: { child_kind: curve }").unwrap();
        let opts = cfg.combine.selection();
        assert_eq!(opts.kind, ObjectKind::Curve);
        assert!(opts.descend_through_unmatched);
    }

    #[test]
    fn partial_sections_override_fields() {
        let cfg = load_from_yaml_str(
            "material_id:\n  mode: image\n  image: mask.png\n  create_duplicate: false\ncombine:\n  descend_through_unmatched: false\n",
        )
        .unwrap();
        assert_eq!(cfg.material_id.mode, MaterialIdMode::Image);
        assert_eq!(cfg.material_id.image.as_deref(), Some("mask.png"));
        assert!(!cfg.material_id.create_duplicate);
        assert_eq!(cfg.material_id.roughness, 1.0);
        assert_eq!(cfg.combine.selection(), SelectChildren::default().matched_only());
    }

    #[test]
    fn unknown_mode_is_an_error() {
        assert!(matches!(load_from_yaml_str("material_id: { mode: sepia }"), Err(ConfigError::Yaml(_))));
    }
}
