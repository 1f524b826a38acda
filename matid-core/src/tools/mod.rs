//! The two scene tools. Each runs to completion on a `&mut Scene`.

pub mod combine;
pub mod material_id;

pub use combine::{combine_children, CombineReport};
pub use material_id::{generate_material_ids, AssignedMaterial, MaterialIdReport};
