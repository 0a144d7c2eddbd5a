pub mod binary;
mod compare;
mod error;
mod index;
mod node;
mod tree;

pub use compare::*;
pub use error::{IndexError, Result};
pub use index::*;
pub use node::*;
pub use tree::*;
