pub mod artifact;
pub mod file_store;
pub mod memory_store;
pub mod record_store;
