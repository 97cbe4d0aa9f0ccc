//! Structural elements module

mod material;
mod node;
mod section;
mod support;

pub use material::Material;
pub use node::{Element, Node};
pub use section::Section;
pub use support::{Restraints, Support, SupportKind};
