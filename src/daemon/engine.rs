use crate::core::ledger::UsageLedger;
use crate::core::models::{Decision, Gates};
use crate::core::policy::Policy;
use crate::providers::{read_snapshot, AccountService};
use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Purchased { volume_gb: u64, used_gb: u64 },
    Skipped,
}

/// Decides once per tick whether to buy a turbo unit, and records purchases.
pub struct DecisionEngine {
    policy: Policy,
    ledger: UsageLedger,
    account: Arc<dyn AccountService>,
}

impl DecisionEngine {
    pub fn new(policy: Policy, ledger: UsageLedger, account: Arc<dyn AccountService>) -> Self {
        Self {
            policy,
            ledger,
            account,
        }
    }

    pub fn ledger(&self) -> &UsageLedger {
        &self.ledger
    }

    /// Reads the account and ledger for `date` without side effects.
    pub async fn evaluate(&self, date: NaiveDate) -> Result<Decision> {
        let account = read_snapshot(self.account.as_ref())
            .await
            .context("Failed to read account")?;
        let cap_gb = self.policy.cap_for_date(date);
        let used_gb = self.ledger.used_gb(date);
        let gates = Gates::evaluate(&account, cap_gb, used_gb);

        Ok(Decision {
            date,
            cap_gb,
            used_gb,
            account,
            gates,
        })
    }

    /// One tick against the local calendar day.
    pub async fn tick(&mut self) -> Result<TickOutcome> {
        let today = Local::now().date_naive();
        self.tick_on(today).await
    }

    pub async fn tick_on(&mut self, date: NaiveDate) -> Result<TickOutcome> {
        let decision = self.evaluate(date).await?;

        if !decision.allow_purchase() {
            let gates = decision.gates;
            tracing::info!(
                %date,
                no_high_speed_data_remaining = gates.no_high_speed_data_remaining,
                sufficient_funds = gates.sufficient_funds,
                within_policy = gates.within_policy,
                remaining_free_mb = decision.account.remaining_free_mb,
                balance = decision.account.balance,
                used_gb = decision.used_gb,
                cap_gb = ?decision.cap_gb,
                "Not buying turbo"
            );
            return Ok(TickOutcome::Skipped);
        }

        let volume_gb = decision.account.plan.turbo_unit_volume_gb;
        tracing::info!(
            %date,
            balance = decision.account.balance,
            used_gb = decision.used_gb,
            cap_gb = ?decision.cap_gb,
            volume_gb,
            "Buying turbo"
        );

        self.account
            .activate_turbo()
            .await
            .context("Failed to buy turbo")?;

        let used_gb = match self.ledger.add_used_gb(date, volume_gb) {
            Ok(total) => total,
            Err(e) => {
                tracing::error!(
                    %date,
                    volume_gb,
                    error = %e,
                    "Turbo was bought but could not be recorded"
                );
                return Err(e).context("Failed to record turbo purchase");
            }
        };

        tracing::info!(%date, used_gb, "Recorded turbo purchase");
        Ok(TickOutcome::Purchased { volume_gb, used_gb })
    }
}
