use crate::core::models::PlanConstants;
use crate::core::settings::{AccountSettings, PlanOverrides};
use crate::providers::AccountService;
use anyhow::{Context, Result};
use async_trait::async_trait;
use regex::Regex;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

const LOGIN_PATH: &str = "/sessions.php";
const LOGIN_BUTTON: &str = "Войти";

/// Reads within this window reuse the last scraped page.
const REFRESH_WINDOW: Duration = Duration::from_secs(1);

const BALANCE_PATTERN: &str = r"счете:(.*?)(?P<target>-?\d+,\d+)";
const PLAN_PATTERN: &str = r##"<font color="#4c4c4c"><span>\s+(?P<target>.*)\s+</span></font>"##;
const REMAINING_MB_PATTERN: &str = r"Осталось скоростного трафика:(.*?)(?P<target>\d+(\.\d)?)";

#[derive(Debug, Clone, PartialEq, Eq)]
struct AccountPage {
    balance: u64,
    plan_name: String,
    remaining_free_mb: u64,
}

struct CachedPage {
    page: AccountPage,
    fetched_at: Instant,
}

struct PortalPatterns {
    balance: Regex,
    plan: Regex,
    remaining_mb: Regex,
}

impl PortalPatterns {
    fn compile() -> Result<Self> {
        Ok(Self {
            balance: Regex::new(BALANCE_PATTERN).context("Invalid balance pattern")?,
            plan: Regex::new(PLAN_PATTERN).context("Invalid plan pattern")?,
            remaining_mb: Regex::new(REMAINING_MB_PATTERN)
                .context("Invalid remaining data pattern")?,
        })
    }

    fn parse(&self, body: &str) -> Result<AccountPage> {
        let balance = capture(&self.balance, body).context("Could not parse account balance")?;
        let plan_name = capture(&self.plan, body).context("Could not parse traffic plan")?;
        let remaining = capture(&self.remaining_mb, body)
            .context("Could not parse remaining high-speed data amount")?;

        Ok(AccountPage {
            balance: parse_balance(balance)?,
            plan_name: plan_name.trim().to_string(),
            remaining_free_mb: parse_remaining_mb(remaining)?,
        })
    }
}

fn capture<'a>(pattern: &Regex, body: &'a str) -> Option<&'a str> {
    pattern
        .captures(body)
        .and_then(|c| c.name("target"))
        .map(|m| m.as_str())
}

/// `"12,34"` → 1234 minor units. A single fractional digit means tenths.
/// A debt reads as zero so it can never cover a purchase.
fn parse_balance(raw: &str) -> Result<u64> {
    if let Some(debt) = raw.strip_prefix('-') {
        let owed = parse_balance(debt)?;
        tracing::warn!(owed, "Account balance is negative");
        return Ok(0);
    }

    let (whole, fraction) = raw
        .split_once(',')
        .with_context(|| format!("Unexpected balance format: {raw}"))?;

    let whole: u64 = whole
        .parse()
        .with_context(|| format!("Unexpected balance format: {raw}"))?;
    let fraction: u64 = match fraction.len() {
        1 => fraction.parse::<u64>().map(|tenths| tenths * 10),
        2 => fraction.parse::<u64>(),
        _ => anyhow::bail!("Unexpected balance format: {raw}"),
    }
    .with_context(|| format!("Unexpected balance format: {raw}"))?;

    whole
        .checked_mul(100)
        .and_then(|v| v.checked_add(fraction))
        .with_context(|| format!("Balance out of range: {raw}"))
}

/// Rounds up, so a fractional leftover never reads as exhausted.
fn parse_remaining_mb(raw: &str) -> Result<u64> {
    let (whole, fraction) = raw.split_once('.').unwrap_or((raw, ""));

    let whole: u64 = whole
        .parse()
        .with_context(|| format!("Unexpected remaining data format: {raw}"))?;
    let round_up = fraction.bytes().any(|b| b != b'0');

    Ok(whole + u64::from(round_up))
}

/// Account service backed by the provider's HTML self-care portal.
pub struct WikilinkAccountService {
    client: reqwest::Client,
    base_url: String,
    turbo_path: String,
    login: String,
    password: String,
    plan: PlanConstants,
    patterns: PortalPatterns,
    cache: Mutex<Option<CachedPage>>,
}

impl WikilinkAccountService {
    pub fn new(account: &AccountSettings, plan: &PlanOverrides) -> Result<Self> {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(account.request_timeout())
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: account.base_url.trim_end_matches('/').to_string(),
            turbo_path: account.turbo_path.clone(),
            login: account.login.clone(),
            password: account.password.clone(),
            plan: plan.apply(PlanConstants::default()),
            patterns: PortalPatterns::compile()?,
            cache: Mutex::new(None),
        })
    }

    async fn page(&self) -> Result<AccountPage> {
        let mut cache = self.cache.lock().await;

        if let Some(cached) = cache.as_ref() {
            if cached.fetched_at.elapsed() <= REFRESH_WINDOW {
                return Ok(cached.page.clone());
            }
        }

        let page = self.fetch_page().await?;
        *cache = Some(CachedPage {
            page: page.clone(),
            fetched_at: Instant::now(),
        });
        Ok(page)
    }

    async fn fetch_page(&self) -> Result<AccountPage> {
        let url = format!("{}{}", self.base_url, LOGIN_PATH);
        tracing::debug!(%url, "Refreshing account page");

        let response = self
            .client
            .post(&url)
            .form(&[
                ("user[redirect]", ""),
                ("user_account", self.login.as_str()),
                ("user_password", self.password.as_str()),
                ("commit", LOGIN_BUTTON),
            ])
            .send()
            .await
            .context("Failed to fetch account page")?;

        if !response.status().is_success() {
            anyhow::bail!("Account portal error: {}", response.status());
        }

        let body = response
            .text()
            .await
            .context("Failed to read account page")?;

        self.patterns.parse(&body)
    }
}

#[async_trait]
impl AccountService for WikilinkAccountService {
    async fn balance(&self) -> Result<u64> {
        Ok(self.page().await?.balance)
    }

    async fn plan_name(&self) -> Result<String> {
        Ok(self.page().await?.plan_name)
    }

    async fn remaining_free_mb(&self) -> Result<u64> {
        Ok(self.page().await?.remaining_free_mb)
    }

    async fn activate_turbo(&self) -> Result<()> {
        // Establishes the session cookie when the cached login is stale.
        self.page().await?;

        let url = format!("{}{}", self.base_url, self.turbo_path);
        let response = self
            .client
            .post(&url)
            .send()
            .await
            .context("Failed to activate turbo")?;

        let status = response.status();
        *self.cache.lock().await = None;

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Turbo activation rejected: {} - {}", status, body);
        }

        tracing::info!(%url, "Turbo activated");
        Ok(())
    }

    fn turbo_unit_price(&self) -> u64 {
        self.plan.turbo_unit_price
    }

    fn turbo_unit_volume_gb(&self) -> u64 {
        self.plan.turbo_unit_volume_gb
    }

    fn included_free_gb(&self) -> u64 {
        self.plan.included_free_gb
    }
}
