use crate::daemon::engine::{DecisionEngine, TickOutcome};
use anyhow::Result;
use std::time::Duration;

pub const POLL_INTERVAL: Duration = Duration::from_secs(30);
pub const STARTUP_DELAY: Duration = Duration::from_secs(1);

/// Runs engine ticks one at a time, sleeping a fixed interval after each
/// completed tick. There is no catch-up and no backoff.
pub struct PollingLoop {
    engine: DecisionEngine,
    interval: Duration,
    startup_delay: Duration,
}

impl PollingLoop {
    pub fn new(engine: DecisionEngine) -> Self {
        Self {
            engine,
            interval: POLL_INTERVAL,
            startup_delay: STARTUP_DELAY,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_startup_delay(mut self, delay: Duration) -> Self {
        self.startup_delay = delay;
        self
    }

    /// Loops until a tick fails; the error is returned to the caller.
    pub async fn run(mut self) -> Result<()> {
        tracing::info!(
            interval = ?self.interval,
            startup_delay = ?self.startup_delay,
            "Polling loop started"
        );
        tokio::time::sleep(self.startup_delay).await;

        let mut bought_gb: u64 = 0;
        loop {
            if let TickOutcome::Purchased { volume_gb, used_gb } = self.engine.tick().await? {
                bought_gb += volume_gb;
                tracing::debug!(used_gb, bought_gb, "Turbo bought since start");
            }
            tokio::time::sleep(self.interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ledger::UsageLedger;
    use crate::core::models::PlanConstants;
    use crate::core::policy::Policy;
    use crate::providers::mock::MockAccountService;
    use crate::providers::AccountService;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn engine(dir: &TempDir, account: &Arc<MockAccountService>) -> DecisionEngine {
        DecisionEngine::new(
            Policy::new(5, None).unwrap(),
            UsageLedger::open(dir.path().join("ledger.json")).unwrap(),
            Arc::clone(account) as Arc<dyn AccountService>,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_at_fixed_interval_until_failure() {
        let dir = TempDir::new().unwrap();
        let mut account = MockAccountService::new(500, 2048, PlanConstants::default());
        account.fail_reads_after = Some(3);
        let account = Arc::new(account);

        let started = tokio::time::Instant::now();
        let result = PollingLoop::new(engine(&dir, &account))
            .with_interval(Duration::from_secs(30))
            .with_startup_delay(Duration::from_secs(1))
            .run()
            .await;

        assert!(result.is_err());
        assert_eq!(account.reads(), 4);
        assert_eq!(account.purchases(), 0);
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(1 + 3 * 30));
        assert!(elapsed < Duration::from_secs(1 + 4 * 30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_tick_delays_next_tick() {
        let dir = TempDir::new().unwrap();
        let mut account = MockAccountService::new(500, 2048, PlanConstants::default());
        account.fail_reads_after = Some(3);
        account.read_latency = Duration::from_secs(20);
        let account = Arc::new(account);

        let started = tokio::time::Instant::now();
        let result = PollingLoop::new(engine(&dir, &account))
            .with_interval(Duration::from_secs(30))
            .with_startup_delay(Duration::from_secs(1))
            .run()
            .await;

        assert!(result.is_err());
        assert_eq!(account.reads(), 4);

        // startup + 4 reads of 20s + 3 intervals of 30s, nothing skipped
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(1 + 4 * 20 + 3 * 30));
        assert!(elapsed < Duration::from_secs(1 + 4 * 20 + 4 * 30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_tick_failure_stops_loop() {
        let dir = TempDir::new().unwrap();
        let mut account = MockAccountService::new(500, 0, PlanConstants::default());
        account.fail_reads_after = Some(0);
        let account = Arc::new(account);

        let result = PollingLoop::new(engine(&dir, &account))
            .with_startup_delay(Duration::ZERO)
            .run()
            .await;

        assert!(result.is_err());
        assert_eq!(account.reads(), 1);
    }

    #[test]
    fn test_defaults() {
        assert_eq!(POLL_INTERVAL, Duration::from_secs(30));
        assert!(STARTUP_DELAY < POLL_INTERVAL);
    }
}
