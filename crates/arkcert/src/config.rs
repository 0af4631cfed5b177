//! Configuration loading and validation shared by every function binary.
//!
//! All values are read from environment variables once, in `main`, and the
//! resulting [`Config`] is handed to the components that need it.

use anyhow::{Context, Result};
use serde::Deserialize;

/// Largest page size accepted by `GetParametersByPath`.
pub const MAX_PARAMETER_PAGE_SIZE: i32 = 10;

/// Validated function configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Tracing log level (e.g. `"info"`, `"debug"`).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Page size used when scanning certificate parameter paths.
    #[serde(default = "default_parameter_page_size")]
    pub parameter_page_size: i32,

    /// Whether non-CA certificates are also uploaded as IAM server certificates.
    #[serde(default = "default_mirror_server_certificates")]
    pub mirror_server_certificates: bool,

    /// S3 bucket for renewal lists, used when a request does not name one.
    #[serde(default)]
    pub renewal_bucket: Option<String>,

    /// S3 key prefix under which renewal lists are written.
    #[serde(default = "default_renewal_key_prefix")]
    pub renewal_key_prefix: String,

    /// Days-to-expiry threshold used when a request does not carry one.
    #[serde(default = "default_renewal_threshold_days")]
    pub renewal_threshold_days: u32,

    /// Step Functions state machine that renews the descendants of an updated CA.
    #[serde(default)]
    pub cascade_state_machine_arn: Option<String>,
}

fn default_log_level() -> String {
    "info".into()
}
fn default_parameter_page_size() -> i32 {
    MAX_PARAMETER_PAGE_SIZE
}
fn default_mirror_server_certificates() -> bool {
    true
}
fn default_renewal_key_prefix() -> String {
    "certificate-renewals/".into()
}
fn default_renewal_threshold_days() -> u32 {
    14
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            parameter_page_size: default_parameter_page_size(),
            mirror_server_certificates: default_mirror_server_certificates(),
            renewal_bucket: None,
            renewal_key_prefix: default_renewal_key_prefix(),
            renewal_threshold_days: default_renewal_threshold_days(),
            cascade_state_machine_arn: None,
        }
    }
}

impl Config {
    /// Load and validate configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable cannot be parsed or fails validation.
    pub fn from_env() -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(config::Environment::default())
            .build()
            .context("failed to build configuration from environment")?;

        let c: Config = cfg
            .try_deserialize()
            .context("failed to deserialise configuration")?;

        c.validate()?;
        Ok(c)
    }

    /// Validate all fields, returning a descriptive error on the first failure.
    fn validate(&self) -> Result<()> {
        if !(1..=MAX_PARAMETER_PAGE_SIZE).contains(&self.parameter_page_size) {
            anyhow::bail!("PARAMETER_PAGE_SIZE must be between 1 and {MAX_PARAMETER_PAGE_SIZE}");
        }
        if self.renewal_key_prefix.starts_with('/') {
            anyhow::bail!("RENEWAL_KEY_PREFIX must not start with '/'");
        }
        ensure_non_blank(self.renewal_bucket.as_deref(), "RENEWAL_BUCKET")?;
        ensure_non_blank(
            self.cascade_state_machine_arn.as_deref(),
            "CASCADE_STATE_MACHINE_ARN",
        )?;
        Ok(())
    }
}

fn ensure_non_blank(value: Option<&str>, name: &str) -> Result<()> {
    if value.is_some_and(|v| v.trim().is_empty()) {
        anyhow::bail!("{name} must not be empty when set");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_correct() {
        assert_eq!(default_log_level(), "info");
        assert_eq!(default_parameter_page_size(), 10);
        assert!(default_mirror_server_certificates());
        assert_eq!(default_renewal_key_prefix(), "certificate-renewals/");
        assert_eq!(default_renewal_threshold_days(), 14);
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn validate_rejects_oversized_page() {
        let cfg = Config {
            parameter_page_size: 50,
            ..Config::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_page() {
        let cfg = Config {
            parameter_page_size: 0,
            ..Config::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_blank_bucket() {
        let cfg = Config {
            renewal_bucket: Some("  ".into()),
            ..Config::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_absolute_prefix() {
        let cfg = Config {
            renewal_key_prefix: "/renewals/".into(),
            ..Config::default()
        };
        assert!(cfg.validate().is_err());
    }
}
