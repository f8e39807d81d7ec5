//! Model System - registration surface for database entities
//!
//! - `core_trait`: the `Model` trait (describe / get_field / set_field)
//! - `descriptor`: `ModelDescriptor`, `FieldDef` and `FieldKind`

pub mod core_trait;
pub mod descriptor;

pub use core_trait::{unknown_field, Model};
pub use descriptor::{FieldDef, FieldKind, HasFieldKind, ModelDescriptor};
