pub mod config;
pub mod credential_store;
pub mod error;
pub mod in_memory_gateway;
pub mod record_gateway;
pub mod task_records;
