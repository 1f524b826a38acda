//! Image datablocks used by textured material IDs.

use std::path::{Path, PathBuf};

use glam::Vec4;
use log::info;
use serde::{Deserialize, Serialize};

use super::Scene;
use crate::error::SceneError;

pub const MAX_RESOLUTION: u64 = 2_147_483_647;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Image {
    pub name: String,
    pub width: u32,
    pub height: u32,
    #[serde(default = "default_true")]
    pub alpha: bool,
    #[serde(default = "default_fill")]
    pub color: Vec4,
    #[serde(default)]
    pub float_buffer: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filepath: Option<PathBuf>,
}

fn default_true() -> bool { true }
fn default_fill() -> Vec4 { Vec4::new(0.0, 0.0, 0.0, 1.0) }

/// Parameters for a blank square image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewImage {
    pub name: String,
    pub resolution: u64,
    pub alpha: bool,
    pub color: Vec4,
    pub float32: bool,
}

impl Default for NewImage {
    fn default() -> Self {
        Self { name: "Untitled".to_string(), resolution: 2048, alpha: true, color: default_fill(), float32: false }
    }
}

impl Scene {
    /// Create a blank image and return the name it was registered under.
    pub fn new_image(&mut self, opts: &NewImage) -> Result<String, SceneError> {
        if opts.resolution == 0 || opts.resolution > MAX_RESOLUTION {
            return Err(SceneError::InvalidResolution { got: opts.resolution, max: MAX_RESOLUTION });
        }
        if !opts.color.to_array().iter().all(|c| (0.0..=1.0).contains(c)) {
            return Err(SceneError::InvalidColor(opts.color));
        }
        let size = opts.resolution as u32;
        let name = self.add_image(Image {
            name: opts.name.clone(),
            width: size,
            height: size,
            alpha: opts.alpha,
            color: opts.color,
            float_buffer: opts.float32,
            filepath: None,
        });
        info!("new image '{}' ({}x{})", name, size, size);
        Ok(name)
    }

    /// Register an image file. The image is named after the file; a second
    /// open of the same file gets a suffixed name. `dimensions` comes from
    /// whoever decoded the file, and is zero when unknown.
    pub fn open_image(&mut self, path: &Path, dimensions: Option<(u32, u32)>) -> Result<String, SceneError> {
        let meta = std::fs::metadata(path).map_err(|e| SceneError::ImageOpen {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        if !meta.is_file() {
            return Err(SceneError::ImageOpen { path: path.display().to_string(), reason: "not a file".to_string() });
        }
        let file_name = path
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let (width, height) = dimensions.unwrap_or((0, 0));
        let name = self.add_image(Image {
            name: file_name,
            width,
            height,
            alpha: true,
            color: default_fill(),
            float_buffer: false,
            filepath: Some(path.to_path_buf()),
        });
        info!("opened image '{}' from {}", name, path.display());
        Ok(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_image_uses_defaults_and_unique_names() {
        let mut s = Scene::new();
        let a = s.new_image(&NewImage::default()).unwrap();
        let b = s.new_image(&NewImage::default()).unwrap();
        assert_eq!(a, "Untitled");
        assert_eq!(b, "Untitled.001");
        let img = s.image(&a).unwrap();
        assert_eq!((img.width, img.height), (2048, 2048));
        assert!(img.alpha && !img.float_buffer);
    }

    #[test]
    fn new_image_rejects_bad_resolution() {
        let mut s = Scene::new();
        for r in [0, MAX_RESOLUTION + 1] {
            let opts = NewImage { resolution: r, ..Default::default() };
            assert!(matches!(s.new_image(&opts), Err(SceneError::InvalidResolution { .. })));
        }
        assert_eq!(s.images().count(), 0);
    }

    #[test]
    fn new_image_rejects_fill_outside_unit_range() {
        let mut s = Scene::new();
        for color in [Vec4::new(2.0, -1.0, 0.0, 1.0), Vec4::new(0.0, 0.0, 0.0, 1.5), Vec4::new(-0.01, 0.5, 0.5, 1.0)] {
            let opts = NewImage { color, ..Default::default() };
            assert!(matches!(s.new_image(&opts), Err(SceneError::InvalidColor(c)) if c == color));
        }
        assert_eq!(s.images().count(), 0);

        let white = NewImage { color: Vec4::ONE, ..Default::default() };
        assert_eq!(s.new_image(&white).unwrap(), "Untitled");
    }

    #[test]
    fn open_image_names_after_file() {
        let dir = std::env::temp_dir().join(format!("matid-open-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("mask.png");
        std::fs::write(&path, b"not really a png").unwrap();

        let mut s = Scene::new();
        let name = s.open_image(&path, Some((4, 2))).unwrap();
        assert_eq!(name, "mask.png");
        assert_eq!(s.image(&name).unwrap().filepath.as_deref(), Some(path.as_path()));
        assert_eq!(s.open_image(&path, None).unwrap(), "mask.png.001");

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn open_missing_image_fails() {
        let mut s = Scene::new();
        let err = s.open_image(Path::new("/definitely/not/here.png"), None).unwrap_err();
        assert!(matches!(err, SceneError::ImageOpen { .. }));
    }
}
