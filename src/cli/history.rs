use crate::core::ledger::UsageLedger;
use crate::core::settings::Settings;
use anyhow::{Context, Result};
use chrono::{Days, Local, NaiveDate};
use serde::Serialize;
use std::path::Path;

#[derive(Debug, Serialize, PartialEq, Eq)]
struct DayUsage {
    date: NaiveDate,
    used_gb: u64,
}

pub fn run(config_path: Option<&Path>, json: bool, days: u32) -> Result<()> {
    let settings = Settings::load(config_path)?;
    let ledger = UsageLedger::open(&settings.daemon.ledger_path)
        .context("Failed to open usage ledger")?;

    let today = Local::now().date_naive();
    let history = recent_usage(&ledger, today, days);

    if json {
        println!("{}", serde_json::to_string_pretty(&history)?);
        return Ok(());
    }

    if history.is_empty() {
        println!("No turbo purchases in the last {} days", days);
        return Ok(());
    }

    let total: u64 = history.iter().map(|d| d.used_gb).sum();
    for day in &history {
        println!("{}  {:>4} GB", day.date, day.used_gb);
    }
    println!("{:<10}  {:>4} GB", "Total", total);

    Ok(())
}

fn recent_usage(ledger: &UsageLedger, today: NaiveDate, days: u32) -> Vec<DayUsage> {
    let since = today
        .checked_sub_days(Days::new(u64::from(days.saturating_sub(1))))
        .unwrap_or(NaiveDate::MIN);

    ledger
        .entries()
        .into_iter()
        .filter(|(date, _)| *date >= since && *date <= today)
        .map(|(date, used_gb)| DayUsage { date, used_gb })
        .collect()
}
