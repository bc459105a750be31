pub mod assembler;
pub mod options;
pub mod solution;
pub mod steps;

pub use assembler::*;
pub use options::*;
pub use solution::*;
pub use steps::*;
