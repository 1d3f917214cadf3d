//! Schema collaborator types.
//!
//! The mapping layer never owns entity metadata. It consumes a read-only
//! schema interface made of two value types: [`Field`], the path vocabulary
//! every constraint is written in, and [`EntityDescriptor`], which supplies
//! the relation/collection name and the declared fields for one entity type.

mod descriptor;
mod field;

pub use descriptor::{EntityDescriptor, FieldDef, FieldType};
pub use field::Field;
