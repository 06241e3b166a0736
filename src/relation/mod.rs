pub mod pivot;
pub mod spec;

pub use pivot::*;
pub use spec::*;
