#![doc = include_str!("../README.md")]

pub mod memory;

pub use memory::{MemoryStore, ProcessAccessCount, StoreStats, StoredAccess};
