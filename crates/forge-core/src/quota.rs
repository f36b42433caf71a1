//! Usage gate: is a generation request currently permitted?

use crate::error::{ForgeError, Result};
use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use forge_types::QuotaStatus;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Quota file name inside `$FORGE_HOME`
pub const QUOTA_FILE: &str = "quota.json";

fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Boolean gate consulted before calling the text-generation provider
#[async_trait]
pub trait UsageGate: Send + Sync {
    async fn is_permitted(&self) -> Result<bool>;

    /// Count one generation against the allowance
    async fn record_use(&self) -> Result<()>;

    /// Check and count one generation in a single step, so concurrent
    /// callers cannot both take the last slot. Fails with
    /// [`ForgeError::QuotaExceeded`] when not permitted.
    async fn reserve(&self) -> Result<()>;

    /// Give back a reservation whose generation did not happen
    async fn release(&self) -> Result<()>;

    /// Current allowance, `None` for gates without one
    async fn status(&self) -> Result<Option<QuotaStatus>>;
}

/// Prompts used today; resets when the date changes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyQuota {
    pub count: u32,
    pub last_reset: NaiveDate,
}

impl DailyQuota {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            count: 0,
            last_reset: today,
        }
    }

    /// Reset the counter if `today` is a new day. Returns true on reset.
    pub fn roll_over(&mut self, today: NaiveDate) -> bool {
        if self.last_reset != today {
            self.count = 0;
            self.last_reset = today;
            return true;
        }
        false
    }

    pub fn is_permitted(&mut self, limit: u32, today: NaiveDate) -> bool {
        self.roll_over(today);
        self.count < limit
    }

    pub fn record(&mut self, today: NaiveDate) {
        self.roll_over(today);
        self.count = self.count.saturating_add(1);
    }

    /// Record a use if one is still permitted. Returns false otherwise.
    pub fn try_reserve(&mut self, limit: u32, today: NaiveDate) -> bool {
        if !self.is_permitted(limit, today) {
            return false;
        }
        self.count += 1;
        true
    }

    /// Undo one recorded use. A reservation from an earlier day is already
    /// gone after the reset.
    pub fn release(&mut self, today: NaiveDate) {
        if !self.roll_over(today) {
            self.count = self.count.saturating_sub(1);
        }
    }

    pub fn status(&mut self, limit: u32, today: NaiveDate) -> QuotaStatus {
        self.roll_over(today);
        QuotaStatus {
            limit,
            used: self.count,
            remaining: limit.saturating_sub(self.count),
            last_reset: self.last_reset,
        }
    }
}

/// Gate that always permits
#[derive(Debug, Clone, Copy, Default)]
pub struct Unlimited;

#[async_trait]
impl UsageGate for Unlimited {
    async fn is_permitted(&self) -> Result<bool> {
        Ok(true)
    }

    async fn record_use(&self) -> Result<()> {
        Ok(())
    }

    async fn reserve(&self) -> Result<()> {
        Ok(())
    }

    async fn release(&self) -> Result<()> {
        Ok(())
    }

    async fn status(&self) -> Result<Option<QuotaStatus>> {
        Ok(None)
    }
}

/// Daily quota held in memory
#[derive(Debug)]
pub struct MemoryQuota {
    limit: u32,
    state: Mutex<DailyQuota>,
}

impl MemoryQuota {
    pub fn new(limit: u32) -> Self {
        Self {
            limit,
            state: Mutex::new(DailyQuota::new(today())),
        }
    }
}

#[async_trait]
impl UsageGate for MemoryQuota {
    async fn is_permitted(&self) -> Result<bool> {
        Ok(self.state.lock().await.is_permitted(self.limit, today()))
    }

    async fn record_use(&self) -> Result<()> {
        self.state.lock().await.record(today());
        Ok(())
    }

    async fn reserve(&self) -> Result<()> {
        if self.state.lock().await.try_reserve(self.limit, today()) {
            Ok(())
        } else {
            Err(ForgeError::QuotaExceeded { limit: self.limit })
        }
    }

    async fn release(&self) -> Result<()> {
        self.state.lock().await.release(today());
        Ok(())
    }

    async fn status(&self) -> Result<Option<QuotaStatus>> {
        Ok(Some(self.state.lock().await.status(self.limit, today())))
    }
}

/// Daily quota persisted as JSON, e.g. `$FORGE_HOME/quota.json`
#[derive(Debug)]
pub struct FileQuota {
    path: PathBuf,
    limit: u32,
    lock: Mutex<()>,
}

impl FileQuota {
    pub fn new(path: impl Into<PathBuf>, limit: u32) -> Self {
        Self {
            path: path.into(),
            limit,
            lock: Mutex::new(()),
        }
    }

    pub fn in_home(home: &Path, limit: u32) -> Self {
        Self::new(home.join(QUOTA_FILE), limit)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read(&self) -> Result<DailyQuota> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(quota) => Ok(quota),
                Err(e) => {
                    warn!("Corrupt quota file {}, starting fresh: {}", self.path.display(), e);
                    Ok(DailyQuota::new(today()))
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(DailyQuota::new(today())),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, quota: &DailyQuota) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, serde_json::to_string_pretty(quota)?).await?;
        Ok(())
    }

    /// Clear today's usage
    pub async fn reset(&self) -> Result<()> {
        let _guard = self.lock.lock().await;
        self.write(&DailyQuota::new(today())).await
    }
}

#[async_trait]
impl UsageGate for FileQuota {
    async fn is_permitted(&self) -> Result<bool> {
        let _guard = self.lock.lock().await;
        let mut quota = self.read().await?;
        let permitted = quota.is_permitted(self.limit, today());
        debug!("Quota {}/{} used, permitted: {}", quota.count, self.limit, permitted);
        Ok(permitted)
    }

    async fn record_use(&self) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut quota = self.read().await?;
        quota.record(today());
        self.write(&quota).await
    }

    async fn reserve(&self) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut quota = self.read().await?;
        if !quota.try_reserve(self.limit, today()) {
            debug!("Quota {}/{} used, refusing", quota.count, self.limit);
            return Err(ForgeError::QuotaExceeded { limit: self.limit });
        }
        self.write(&quota).await
    }

    async fn release(&self) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut quota = self.read().await?;
        quota.release(today());
        self.write(&quota).await
    }

    async fn status(&self) -> Result<Option<QuotaStatus>> {
        let _guard = self.lock.lock().await;
        let mut quota = self.read().await?;
        Ok(Some(quota.status(self.limit, today())))
    }
}
