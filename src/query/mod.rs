pub mod builder;
pub mod engine;
pub mod request;

pub use builder::*;
pub use engine::*;
pub use request::*;
