//! HTTP handlers

pub mod chat;
pub mod health;
pub mod publish;

pub use health::health;
