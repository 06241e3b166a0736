pub mod cache;
pub mod source;
pub mod store;
pub mod types;
pub mod view;

pub use cache::*;
pub use source::*;
pub use store::*;
pub use types::*;
pub use view::*;
