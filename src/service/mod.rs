pub mod crud;
pub mod validation;

pub use crud::EntityService;
pub use validation::RequestValidator;
