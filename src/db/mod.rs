pub mod property_repo;
pub use property_repo::{HttpPropertyRepository, PropertyRepository};
pub mod token_repo;
pub use token_repo::{FileTokenStore, MemoryTokenStore, TokenStore};
