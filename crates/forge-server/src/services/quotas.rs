//! Per-user daily quotas

use dashmap::DashMap;
use forge_core::{MemoryQuota, Unlimited, UsageGate};
use std::sync::Arc;
use tracing::debug;

/// Hands out one in-memory quota per user id
pub struct QuotaRegistry {
    daily_limit: u32,
    enabled: bool,
    quotas: DashMap<String, Arc<MemoryQuota>>,
}

impl QuotaRegistry {
    pub fn new(daily_limit: u32, enabled: bool) -> Self {
        Self {
            daily_limit,
            enabled,
            quotas: DashMap::new(),
        }
    }

    /// Gate for a user; every user shares [`Unlimited`] when quotas are off
    pub fn gate_for(&self, user_id: &str) -> Arc<dyn UsageGate> {
        if !self.enabled {
            return Arc::new(Unlimited);
        }
        self.quotas
            .entry(user_id.to_string())
            .or_insert_with(|| {
                debug!("New quota for user {}", user_id);
                Arc::new(MemoryQuota::new(self.daily_limit))
            })
            .clone()
    }

    pub fn tracked_users(&self) -> usize {
        self.quotas.len()
    }
}
