pub mod color;
pub mod config;
pub mod error;
pub mod scene;
pub mod shader;
pub mod tools;

pub use color::{color_for, ColorSequence, Rgba};
pub use error::{ConfigError, SceneError, ToolError};
pub use scene::Scene;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
