//! Adapters for the domain ports.

pub mod in_memory;
pub mod openpix;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;
pub mod smtp;
