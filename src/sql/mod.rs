pub mod ident;
pub mod params;
pub mod row;

pub use ident::*;
pub use params::*;
pub use row::*;
