use crate::core::settings::PolicySettings;
use chrono::NaiveDate;
use thiserror::Error;

const EXCEPTION_DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PolicyError {
    #[error("policy.data_limit must be a number with a \"G\" suffix, got {0:?}")]
    InvalidDataLimit(String),

    #[error("policy.data_limit must be a positive value")]
    NonPositiveDataLimit,

    #[error("policy.exception must be a YYYY-MM-DD date, got {0:?}")]
    InvalidExceptionDate(String),
}

/// Daily turbo cap, with an optional single day on which the cap is lifted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Policy {
    daily_cap_gb: u64,
    exception_date: Option<NaiveDate>,
}

impl Policy {
    pub fn new(daily_cap_gb: u64, exception_date: Option<NaiveDate>) -> Result<Self, PolicyError> {
        if daily_cap_gb == 0 {
            return Err(PolicyError::NonPositiveDataLimit);
        }

        Ok(Self {
            daily_cap_gb,
            exception_date,
        })
    }

    pub fn from_settings(settings: &PolicySettings) -> Result<Self, PolicyError> {
        let daily_cap_gb = parse_data_limit(&settings.data_limit)?;
        let exception_date = settings
            .exception
            .as_deref()
            .map(parse_exception_date)
            .transpose()?;

        Self::new(daily_cap_gb, exception_date)
    }

    /// Cap in GB for `date`, or `None` when the day is uncapped.
    pub fn cap_for_date(&self, date: NaiveDate) -> Option<u64> {
        if self.exception_date == Some(date) {
            return None;
        }
        Some(self.daily_cap_gb)
    }

    pub fn daily_cap_gb(&self) -> u64 {
        self.daily_cap_gb
    }

    pub fn exception_date(&self) -> Option<NaiveDate> {
        self.exception_date
    }
}

fn parse_data_limit(raw: &str) -> Result<u64, PolicyError> {
    let invalid = || PolicyError::InvalidDataLimit(raw.to_string());

    let digits = raw.strip_suffix('G').ok_or_else(invalid)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }

    let value: u64 = digits.parse().map_err(|_| invalid())?;
    if value == 0 {
        return Err(PolicyError::NonPositiveDataLimit);
    }
    Ok(value)
}

fn parse_exception_date(raw: &str) -> Result<NaiveDate, PolicyError> {
    NaiveDate::parse_from_str(raw, EXCEPTION_DATE_FORMAT)
        .map_err(|_| PolicyError::InvalidExceptionDate(raw.to_string()))
}
