pub mod binary;
pub mod loader;
pub mod xml;

pub use binary::*;
pub use loader::*;
pub use xml::*;
