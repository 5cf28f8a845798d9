use crate::core::ledger::UsageLedger;
use crate::core::models::{AccountSnapshot, Decision, Gates, PlanConstants};
use crate::core::policy::Policy;
use crate::core::settings::Settings;
use crate::daemon::build_engine;
use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use serde::Serialize;
use std::path::Path;

#[derive(Serialize)]
struct StatusOutput {
    date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    cap_gb: Option<u64>,
    uncapped: bool,
    used_gb: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    headroom_gb: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    account: Option<AccountSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    gates: Option<Gates>,
    #[serde(skip_serializing_if = "Option::is_none")]
    would_buy: Option<bool>,
}

impl From<Decision> for StatusOutput {
    fn from(decision: Decision) -> Self {
        let would_buy = decision.allow_purchase();
        let headroom_gb = decision.headroom_gb();
        Self {
            date: decision.date,
            cap_gb: decision.cap_gb,
            uncapped: decision.cap_gb.is_none(),
            used_gb: decision.used_gb,
            headroom_gb,
            account: Some(decision.account),
            gates: Some(decision.gates),
            would_buy: Some(would_buy),
        }
    }
}

pub async fn run(config_path: Option<&Path>, json: bool, offline: bool) -> Result<()> {
    let settings = Settings::load(config_path)?;
    let today = Local::now().date_naive();

    let output = if offline {
        offline_status(&settings, today)?
    } else {
        let engine = build_engine(&settings)?;
        engine
            .evaluate(today)
            .await
            .context("Failed to evaluate current state")?
            .into()
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        print_text_output(&output);
    }

    Ok(())
}

fn offline_status(settings: &Settings, today: NaiveDate) -> Result<StatusOutput> {
    let policy = Policy::from_settings(&settings.policy).context("Invalid policy")?;
    let ledger = UsageLedger::open(&settings.daemon.ledger_path)
        .context("Failed to open usage ledger")?;
    let plan = settings.plan.apply(PlanConstants::default());
    let cap_gb = policy.cap_for_date(today);
    let used_gb = ledger.used_gb(today);

    Ok(StatusOutput {
        date: today,
        cap_gb,
        uncapped: cap_gb.is_none(),
        used_gb,
        headroom_gb: plan.headroom_gb(cap_gb, used_gb),
        account: None,
        gates: None,
        would_buy: None,
    })
}

fn format_cap(cap_gb: Option<u64>) -> String {
    cap_gb
        .map(|cap| format!("{} GB", cap))
        .unwrap_or_else(|| "uncapped (exception date)".to_string())
}

fn format_money(minor: u64) -> String {
    format!("{},{:02}", minor / 100, minor % 100)
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

fn print_text_output(output: &StatusOutput) {
    println!("{}", output.date);
    println!("  {:<16} {}", "Daily cap:", format_cap(output.cap_gb));
    println!("  {:<16} {} GB", "Bought today:", output.used_gb);
    if let Some(headroom) = output.headroom_gb {
        println!("  {:<16} {} GB", "Turbo headroom:", headroom);
    }

    let Some(account) = &output.account else {
        return;
    };

    println!();
    println!("{}", account.plan_name);
    println!("  {:<16} {}", "Balance:", format_money(account.balance));
    println!("  {:<16} {} MB", "Free data left:", account.remaining_free_mb);
    println!(
        "  {:<16} {} for {} GB",
        "Turbo unit:",
        format_money(account.plan.turbo_unit_price),
        account.plan.turbo_unit_volume_gb
    );

    if let Some(gates) = &output.gates {
        println!();
        println!("  {:<16} {}", "Data exhausted:", yes_no(gates.no_high_speed_data_remaining));
        println!("  {:<16} {}", "Enough funds:", yes_no(gates.sufficient_funds));
        println!("  {:<16} {}", "Within policy:", yes_no(gates.within_policy));
    }

    if let Some(would_buy) = output.would_buy {
        println!("  {:<16} {}", "Would buy now:", yes_no(would_buy));
    }
}
