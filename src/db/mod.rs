pub mod entities;
pub mod enums;
pub mod memory_store;
pub mod models;
pub mod repository;
pub mod schema;
pub mod services;

pub use memory_store::MemoryStore;
pub use repository::{Store, StoreError};
pub use services::SeaOrmStore;
