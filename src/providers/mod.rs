mod wikilink;

use crate::core::models::{
    AccountSnapshot, PlanConstants, DEFAULT_INCLUDED_FREE_GB, DEFAULT_TURBO_UNIT_PRICE,
    DEFAULT_TURBO_UNIT_VOLUME_GB,
};
use anyhow::Result;
use async_trait::async_trait;

pub use wikilink::WikilinkAccountService;

/// Remote account the daemon reads readings from and buys turbo units on.
///
/// Every read may hit the network; implementations decide how long a
/// fetched page stays fresh.
#[async_trait]
pub trait AccountService: Send + Sync {
    /// Balance in minor currency units.
    async fn balance(&self) -> Result<u64>;

    async fn plan_name(&self) -> Result<String>;

    /// Free high-speed data left, in whole megabytes.
    async fn remaining_free_mb(&self) -> Result<u64>;

    /// Buys one turbo unit. Fails unless the provider confirms the purchase.
    async fn activate_turbo(&self) -> Result<()>;

    fn turbo_unit_price(&self) -> u64 {
        DEFAULT_TURBO_UNIT_PRICE
    }

    fn turbo_unit_volume_gb(&self) -> u64 {
        DEFAULT_TURBO_UNIT_VOLUME_GB
    }

    fn included_free_gb(&self) -> u64 {
        DEFAULT_INCLUDED_FREE_GB
    }

    fn plan_constants(&self) -> PlanConstants {
        PlanConstants {
            turbo_unit_price: self.turbo_unit_price(),
            turbo_unit_volume_gb: self.turbo_unit_volume_gb(),
            included_free_gb: self.included_free_gb(),
        }
    }
}

pub async fn read_snapshot(service: &dyn AccountService) -> Result<AccountSnapshot> {
    Ok(AccountSnapshot {
        balance: service.balance().await?,
        remaining_free_mb: service.remaining_free_mb().await?,
        plan_name: service.plan_name().await?,
        plan: service.plan_constants(),
    })
}
