pub mod frame;
pub mod raw;
pub mod record;
pub mod types;

pub use frame::*;
pub use raw::*;
pub use record::*;
pub use types::*;
