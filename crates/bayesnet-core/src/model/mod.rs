//! Model definition files.
//!
//! - **definition**: serde schema of a network and its conversion to and from
//!   [`crate::Network`]

pub mod definition;

pub use definition::{CpdDef, DefinitionError, EdgeDef, ModelDefinition, VariableDef};
