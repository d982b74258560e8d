use std::path::PathBuf;

use bon::Builder;

use crate::error::{Result, SimpleCertError};
use crate::layout::Layout;
use crate::san::SanConfigBuilder;

/// What the issuance pipeline does when a step fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Log the failure, record it in the report and run the next step.
    #[default]
    ContinueOnError,
    /// Abort the run with the first failure.
    FailFast,
}

/// Run configuration.
///
/// # Example
///
/// ```
/// use simplecert::config::{FailurePolicy, PkiConfig};
///
/// let config = PkiConfig::builder()
///     .data_root("/tmp/simplecert")
///     .failure_policy(FailurePolicy::FailFast)
///     .build();
/// assert_eq!(config.country, "US");
/// assert_eq!(config.ca_key_bits, 4096);
/// config.validate().unwrap();
/// ```
#[derive(Debug, Clone, Builder)]
pub struct PkiConfig {
    #[builder(into)]
    pub data_root: PathBuf,
    #[builder(into, default = "US".to_string())]
    pub country: String,
    #[builder(into, default = "TX".to_string())]
    pub province: String,
    #[builder(default = 4096)]
    pub ca_key_bits: usize,
    #[builder(default = 2048)]
    pub end_entity_key_bits: usize,
    #[builder(default = 7300)]
    pub ca_validity_days: u32,
    #[builder(default = 10)]
    pub end_entity_validity_days: u32,
    #[builder(default = 32)]
    pub ca_passphrase_bytes: usize,
    #[builder(default = 6)]
    pub end_entity_passphrase_bytes: usize,
    /// Base end-entity request config; the built-in template when `None`.
    pub san_template: Option<PathBuf>,
    #[builder(default)]
    pub failure_policy: FailurePolicy,
}

impl PkiConfig {
    pub fn validate(&self) -> Result<()> {
        if self.country.len() != 2 || !self.country.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(SimpleCertError::InvalidInput(format!(
                "country must be a two-letter code, got '{}'",
                self.country
            )));
        }
        if self.province.trim().is_empty() {
            return Err(SimpleCertError::InvalidInput("province must not be empty".into()));
        }
        for (what, bits) in [
            ("CA key", self.ca_key_bits),
            ("end-entity key", self.end_entity_key_bits),
        ] {
            if bits < 1024 {
                return Err(SimpleCertError::InvalidInput(format!(
                    "{what} size must be at least 1024 bits, got {bits}"
                )));
            }
        }
        if self.ca_validity_days == 0 || self.end_entity_validity_days == 0 {
            return Err(SimpleCertError::InvalidInput(
                "validity must be at least one day".into(),
            ));
        }
        if self.ca_passphrase_bytes == 0 || self.end_entity_passphrase_bytes == 0 {
            return Err(SimpleCertError::InvalidInput(
                "generated passphrases need at least one random byte".into(),
            ));
        }
        Ok(())
    }

    pub fn layout(&self) -> Layout {
        Layout::new(&self.data_root)
    }

    /// SAN config builder writing to the layout's SAN config path.
    pub fn san_builder(&self) -> Result<SanConfigBuilder> {
        let output = self.layout().san_config();
        match &self.san_template {
            Some(path) => SanConfigBuilder::from_template_file(path, output),
            None => SanConfigBuilder::with_builtin_template(output),
        }
    }
}
