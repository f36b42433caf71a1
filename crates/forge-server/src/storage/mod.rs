//! Storage layer
//!
//! Published documents live in memory (DashMap) for the life of the process.

pub mod memory;

pub use memory::PublishStore;
