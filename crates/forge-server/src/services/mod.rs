//! Business logic services

pub mod quotas;

pub use quotas::QuotaRegistry;
