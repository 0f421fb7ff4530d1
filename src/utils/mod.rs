//! In-memory storage backend and the validation and authorization helpers
//! shared by the managers

pub mod memory_storage;
pub mod validation;

pub use memory_storage::MemoryStorage;
pub use validation::*;
