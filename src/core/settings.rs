use crate::core::models::PlanConstants;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const SYSTEM_CONFIG_PATH: &str = "/etc/turbod/config.toml";
const CONFIG_ENV: &str = "TURBOD_CONFIG";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub policy: PolicySettings,
    pub account: AccountSettings,
    #[serde(default)]
    pub plan: PlanOverrides,
    #[serde(default)]
    pub daemon: DaemonSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicySettings {
    /// Daily turbo cap, e.g. `"10G"`.
    pub data_limit: String,
    /// Day on which the cap is lifted, `YYYY-MM-DD`.
    #[serde(default)]
    pub exception: Option<String>,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct AccountSettings {
    pub login: String,
    pub password: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_turbo_path")]
    pub turbo_path: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl std::fmt::Debug for AccountSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountSettings")
            .field("login", &self.login)
            .field("password", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("turbo_path", &self.turbo_path)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

impl AccountSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn default_base_url() -> String {
    "http://cab.wikilink.by".to_string()
}

fn default_turbo_path() -> String {
    "/turbo.php".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanOverrides {
    pub turbo_unit_price: Option<u64>,
    pub turbo_unit_volume_gb: Option<u64>,
    pub included_free_gb: Option<u64>,
}

impl PlanOverrides {
    pub fn apply(&self, base: PlanConstants) -> PlanConstants {
        PlanConstants {
            turbo_unit_price: self.turbo_unit_price.unwrap_or(base.turbo_unit_price),
            turbo_unit_volume_gb: self
                .turbo_unit_volume_gb
                .unwrap_or(base.turbo_unit_volume_gb),
            included_free_gb: self.included_free_gb.unwrap_or(base.included_free_gb),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonSettings {
    pub poll_interval_secs: u64,
    pub startup_delay_secs: u64,
    pub ledger_path: PathBuf,
}

impl Default for DaemonSettings {
    fn default() -> Self {
        Self {
            poll_interval_secs: 30,
            startup_delay_secs: 1,
            ledger_path: PathBuf::from("/var/lib/turbod/ledger.json"),
        }
    }
}

impl DaemonSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn startup_delay(&self) -> Duration {
        Duration::from_secs(self.startup_delay_secs)
    }
}

impl Settings {
    /// Explicit path, then `$TURBOD_CONFIG`, then the system file, then the
    /// user config directory.
    pub fn resolve_path(explicit: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return Some(path.to_path_buf());
        }

        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return Some(PathBuf::from(path));
        }

        let system = PathBuf::from(SYSTEM_CONFIG_PATH);
        if system.exists() {
            return Some(system);
        }

        dirs::config_dir().map(|p| p.join("turbod").join("config.toml"))
    }

    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = Self::resolve_path(explicit).context("Could not determine config path")?;
        let settings = Self::load_from(&path)?;
        tracing::info!(?path, "Loaded config");
        Ok(settings)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let settings: Settings = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        settings
            .validate()
            .with_context(|| format!("Invalid config file: {}", path.display()))?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.account.login.trim().is_empty() {
            anyhow::bail!("account.login must not be empty");
        }
        if self.account.password.is_empty() {
            anyhow::bail!("account.password must not be empty");
        }
        if self.account.request_timeout_secs == 0 {
            anyhow::bail!("account.request_timeout_secs must be positive");
        }
        if self.daemon.poll_interval_secs == 0 {
            anyhow::bail!("daemon.poll_interval_secs must be positive");
        }

        let plan = &self.plan;
        for (name, value) in [
            ("plan.turbo_unit_price", plan.turbo_unit_price),
            ("plan.turbo_unit_volume_gb", plan.turbo_unit_volume_gb),
            ("plan.included_free_gb", plan.included_free_gb),
        ] {
            if value == Some(0) {
                anyhow::bail!("{name} must be positive");
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const MINIMAL: &str = r#"
        [policy]
        data_limit = "10G"

        [account]
        login = "user"
        password = "secret"
    "#;

    #[test]
    fn test_parse_minimal() {
        let settings: Settings = toml::from_str(MINIMAL).unwrap();
        assert!(settings.validate().is_ok());

        assert_eq!(settings.policy.data_limit, "10G");
        assert!(settings.policy.exception.is_none());
        assert_eq!(settings.account.base_url, "http://cab.wikilink.by");
        assert_eq!(settings.account.turbo_path, "/turbo.php");
        assert_eq!(settings.account.request_timeout(), Duration::from_secs(30));
        assert_eq!(settings.daemon.poll_interval(), Duration::from_secs(30));
        assert_eq!(settings.daemon.startup_delay(), Duration::from_secs(1));
        assert_eq!(
            settings.plan.apply(PlanConstants::default()),
            PlanConstants::default()
        );
    }

    #[test]
    fn test_parse_full() {
        let toml = r#"
            [policy]
            data_limit = "5G"
            exception = "2026-12-31"

            [account]
            login = "user"
            password = "secret"
            base_url = "http://localhost:8080"
            turbo_path = "/cabinet/turbo"
            request_timeout_secs = 5

            [plan]
            turbo_unit_price = 290
            included_free_gb = 3

            [daemon]
            poll_interval_secs = 45
            startup_delay_secs = 0
            ledger_path = "/tmp/turbod/ledger.json"
        "#;

        let settings: Settings = toml::from_str(toml).unwrap();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.policy.exception.as_deref(), Some("2026-12-31"));
        assert_eq!(settings.account.base_url, "http://localhost:8080");
        assert_eq!(settings.daemon.poll_interval(), Duration::from_secs(45));
        assert_eq!(
            settings.daemon.ledger_path,
            PathBuf::from("/tmp/turbod/ledger.json")
        );

        let plan = settings.plan.apply(PlanConstants::default());
        assert_eq!(plan.turbo_unit_price, 290);
        assert_eq!(plan.turbo_unit_volume_gb, 1);
        assert_eq!(plan.included_free_gb, 3);
    }

    #[test]
    fn test_missing_credentials_rejected() {
        let toml = r#"
            [policy]
            data_limit = "10G"
        "#;
        assert!(toml::from_str::<Settings>(toml).is_err());

        let mut settings: Settings = toml::from_str(MINIMAL).unwrap();
        settings.account.login = "  ".to_string();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_missing_policy_rejected() {
        let toml = r#"
            [account]
            login = "user"
            password = "secret"
        "#;
        assert!(toml::from_str::<Settings>(toml).is_err());
    }

    #[test]
    fn test_zero_values_rejected() {
        let mut settings: Settings = toml::from_str(MINIMAL).unwrap();
        settings.daemon.poll_interval_secs = 0;
        assert!(settings.validate().is_err());

        let mut settings: Settings = toml::from_str(MINIMAL).unwrap();
        settings.plan.turbo_unit_volume_gb = Some(0);
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_password_not_in_debug_output() {
        let settings: Settings = toml::from_str(MINIMAL).unwrap();
        let debug = format!("{:?}", settings);
        assert!(!debug.contains("secret"));
        assert!(debug.contains("user"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(MINIMAL.as_bytes()).unwrap();

        let settings = Settings::load_from(file.path()).unwrap();
        assert_eq!(settings.account.login, "user");
    }

    #[test]
    fn test_load_missing_file_fails() {
        let dir = tempfile::TempDir::new().unwrap();
        assert!(Settings::load_from(&dir.path().join("absent.toml")).is_err());
    }

    #[test]
    fn test_explicit_path_wins() {
        let explicit = PathBuf::from("/somewhere/config.toml");
        assert_eq!(
            Settings::resolve_path(Some(explicit.as_path())),
            Some(explicit.clone())
        );
    }
}
