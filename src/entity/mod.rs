pub mod config;
pub mod registry;

pub use config::*;
pub use registry::*;
