pub mod engine;
pub mod polling;

use crate::core::ledger::UsageLedger;
use crate::core::policy::Policy;
use crate::core::settings::Settings;
use crate::providers::{AccountService, WikilinkAccountService};
use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;

pub use engine::DecisionEngine;
pub use polling::PollingLoop;

/// Builds the engine from config. Any failure here aborts before the first tick.
pub fn build_engine(settings: &Settings) -> Result<DecisionEngine> {
    let policy = Policy::from_settings(&settings.policy).context("Invalid policy")?;
    let ledger = UsageLedger::open(&settings.daemon.ledger_path)
        .context("Failed to open usage ledger")?;
    let account: Arc<dyn AccountService> = Arc::new(
        WikilinkAccountService::new(&settings.account, &settings.plan)
            .context("Failed to set up account service")?,
    );

    tracing::info!(
        daily_cap_gb = policy.daily_cap_gb(),
        exception_date = ?policy.exception_date(),
        ledger = ?ledger.path(),
        "Policy loaded"
    );

    Ok(DecisionEngine::new(policy, ledger, account))
}

pub async fn run(config_path: Option<&Path>) -> Result<()> {
    tracing::info!("Starting turbod daemon");

    let settings = Settings::load(config_path)?;
    let engine = build_engine(&settings)?;

    PollingLoop::new(engine)
        .with_interval(settings.daemon.poll_interval())
        .with_startup_delay(settings.daemon.startup_delay())
        .run()
        .await
}
