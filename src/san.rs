//! SAN configuration: the per-issuance copy of the end-entity request
//! template, and the reader that turns it back into X.509 extensions.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, info};

use crate::cert::extensions::{
    BasicConstraints, ExtendedKeyUsage, ExtendedKeyUsageOption, FlagSet, KeyUsage, KeyUsages,
    SubjectAltName,
};
use crate::cert::params::ExtensionParam;
use crate::error::{Result, SimpleCertError};

/// Template compiled into the binary, used when no `--san-template` is given.
pub const BUILTIN_TEMPLATE: &str = include_str!("../templates/enduser.openssl.cnf");

/// Name that every generated SAN list contains.
pub const LOCALHOST: &str = "localhost";

static DNS_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(\*\.)?([A-Za-z0-9]([A-Za-z0-9-]{0,61}[A-Za-z0-9])?\.)*[A-Za-z0-9]([A-Za-z0-9-]{0,61}[A-Za-z0-9])?$",
    )
    .expect("static regex")
});

/// Letters, digits and hyphens in dot-separated labels, optional leading `*.`.
pub fn is_valid_dns_name(name: &str) -> bool {
    name.len() <= 253 && DNS_NAME.is_match(name)
}

/// Writes the ephemeral SAN config consumed by the CSR and signing steps.
#[derive(Debug, Clone)]
pub struct SanConfigBuilder {
    template: String,
    output: PathBuf,
}

impl SanConfigBuilder {
    /// The template must already list `localhost` under its alt names section.
    pub fn new(template: impl Into<String>, output: impl Into<PathBuf>) -> Result<Self> {
        let template = template.into();
        let parsed = RequestExtensions::from_config(&template)?;
        if !parsed.san.names.iter().any(|n| n == LOCALHOST) {
            return Err(SimpleCertError::InvalidInput(format!(
                "SAN template must contain a DNS entry for {LOCALHOST}"
            )));
        }
        Ok(Self {
            template,
            output: output.into(),
        })
    }

    pub fn with_builtin_template(output: impl Into<PathBuf>) -> Result<Self> {
        Self::new(BUILTIN_TEMPLATE, output)
    }

    pub fn from_template_file(path: &Path, output: impl Into<PathBuf>) -> Result<Self> {
        Self::new(std::fs::read_to_string(path)?, output)
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Template text plus a `DNS.n = <extra_dns>` line when `extra_dns` is
    /// non-empty.
    pub fn render(&self, extra_dns: Option<&str>) -> Result<String> {
        let extra = extra_dns.map(str::trim).filter(|d| !d.is_empty());
        let Some(extra) = extra else {
            return Ok(self.template.clone());
        };

        if !is_valid_dns_name(extra) {
            return Err(SimpleCertError::InvalidInput(format!(
                "'{extra}' is not a valid DNS name"
            )));
        }

        let existing = RequestExtensions::from_config(&self.template)?.san.names.len();
        let mut rendered = self.template.clone();
        if !rendered.ends_with('\n') {
            rendered.push('\n');
        }
        rendered.push_str(&format!("DNS.{} = {}\n", existing + 1, extra));

        // The appended line only counts if it landed in the alt names section.
        let names = RequestExtensions::from_config(&rendered)?.san.names;
        if !names.iter().any(|n| n == extra) {
            return Err(SimpleCertError::Parse(
                "the alt names section must be the last section of the SAN template".to_string(),
            ));
        }
        Ok(rendered)
    }

    /// Renders and writes the config, returning its path.
    pub fn build(&self, extra_dns: Option<&str>) -> Result<PathBuf> {
        let rendered = self.render(extra_dns)?;
        if let Some(parent) = self.output.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.output, rendered)?;
        info!(path = %self.output.display(), "Wrote SAN config");
        Ok(self.output.clone())
    }
}

/// A parsed subset of an OpenSSL config file: `[ section ]` headers,
/// `key = value` pairs, `#` comments.
#[derive(Debug, Clone, Default)]
pub struct OpensslConfig {
    sections: Vec<(String, Vec<(String, String)>)>,
}

impl OpensslConfig {
    pub fn parse(text: &str) -> Result<Self> {
        let mut config = OpensslConfig::default();
        let mut current = String::new();
        config.sections.push((current.clone(), Vec::new()));

        for (lineno, raw) in text.lines().enumerate() {
            let line = raw.split('#').next().unwrap_or_default().trim();
            if line.is_empty() {
                continue;
            }
            if let Some(rest) = line.strip_prefix('[') {
                let name = rest.strip_suffix(']').ok_or_else(|| {
                    SimpleCertError::Parse(format!("line {}: unterminated section header", lineno + 1))
                })?;
                current = name.trim().to_string();
                config.sections.push((current.clone(), Vec::new()));
                continue;
            }
            let (key, value) = line.split_once('=').ok_or_else(|| {
                SimpleCertError::Parse(format!("line {}: expected 'key = value'", lineno + 1))
            })?;
            if let Some((_, entries)) = config.sections.last_mut() {
                entries.push((key.trim().to_string(), value.trim().to_string()));
            }
        }
        Ok(config)
    }

    /// Entries of every section called `name`, in file order.
    pub fn section(&self, name: &str) -> Vec<(&str, &str)> {
        self.sections
            .iter()
            .filter(|(section, _)| section == name)
            .flat_map(|(_, entries)| entries.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .collect()
    }

    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.section(section)
            .into_iter()
            .rev()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v)
    }
}

/// Extensions requested by the `req_ext` section of a SAN config.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestExtensions {
    pub basic_constraints: Option<(BasicConstraints, bool)>,
    pub key_usage: Option<(KeyUsage, bool)>,
    pub extended_key_usage: Option<(ExtendedKeyUsage, bool)>,
    pub san: SubjectAltName,
}

impl RequestExtensions {
    pub fn from_config(text: &str) -> Result<Self> {
        let config = OpensslConfig::parse(text)?;
        let section = config.get("req", "req_extensions").unwrap_or("req_ext");
        let entries = config.section(section);
        if entries.is_empty() {
            return Err(SimpleCertError::Parse(format!(
                "SAN config has no [ {section} ] section"
            )));
        }

        let mut out = RequestExtensions::default();
        for (key, value) in entries {
            let (critical, value) = split_critical(value);
            match key {
                "basicConstraints" => {
                    out.basic_constraints = Some((parse_basic_constraints(value)?, critical));
                }
                "keyUsage" => {
                    let mut flags: FlagSet<KeyUsages> = FlagSet::empty();
                    for name in list(value) {
                        flags |= KeyUsage::flag_from_openssl_name(name).ok_or_else(|| {
                            SimpleCertError::Parse(format!("unknown keyUsage '{name}'"))
                        })?;
                    }
                    out.key_usage = Some((KeyUsage(flags), critical));
                }
                "extendedKeyUsage" => {
                    let usage = list(value)
                        .map(|name| {
                            ExtendedKeyUsageOption::from_openssl_name(name).ok_or_else(|| {
                                SimpleCertError::Parse(format!("unknown extendedKeyUsage '{name}'"))
                            })
                        })
                        .collect::<Result<Vec<_>>>()?;
                    out.extended_key_usage = Some((ExtendedKeyUsage { usage }, critical));
                }
                "subjectAltName" => out.san.names.extend(parse_alt_names(&config, value)?),
                other => debug!(key = other, "Ignoring unsupported request extension"),
            }
        }
        Ok(out)
    }

    pub fn dns_names(&self) -> &[String] {
        &self.san.names
    }

    pub fn to_extension_params(&self) -> Result<Vec<ExtensionParam>> {
        let mut params = Vec::new();
        if let Some((bc, critical)) = self.basic_constraints {
            params.push(ExtensionParam::from_extension(bc, critical)?);
        }
        if let Some((ku, critical)) = self.key_usage {
            params.push(ExtensionParam::from_extension(ku, critical)?);
        }
        if let Some((eku, critical)) = &self.extended_key_usage {
            params.push(ExtensionParam::from_extension(eku.clone(), *critical)?);
        }
        if !self.san.names.is_empty() {
            params.push(ExtensionParam::from_extension(self.san.clone(), false)?);
        }
        Ok(params)
    }
}

fn split_critical(value: &str) -> (bool, &str) {
    match value.strip_prefix("critical") {
        Some(rest) => (true, rest.trim_start_matches(',').trim()),
        None => (false, value),
    }
}

fn list(value: &str) -> impl Iterator<Item = &str> {
    value.split(',').map(str::trim).filter(|v| !v.is_empty())
}

fn parse_basic_constraints(value: &str) -> Result<BasicConstraints> {
    let mut bc = BasicConstraints::default();
    for item in list(value) {
        let (key, val) = item
            .split_once(':')
            .ok_or_else(|| SimpleCertError::Parse(format!("bad basicConstraints '{item}'")))?;
        match (key.trim(), val.trim()) {
            ("CA", v) => bc.is_ca = v.eq_ignore_ascii_case("true"),
            ("pathlen", v) => {
                bc.max_path_length = Some(v.parse().map_err(|_| {
                    SimpleCertError::Parse(format!("bad pathlen '{v}'"))
                })?)
            }
            _ => return Err(SimpleCertError::Parse(format!("bad basicConstraints '{item}'"))),
        }
    }
    Ok(bc)
}

/// `@section` references a section of `DNS.n` entries; otherwise an inline
/// `DNS:a, DNS:b` list.
fn parse_alt_names(config: &OpensslConfig, value: &str) -> Result<Vec<String>> {
    if let Some(section) = value.strip_prefix('@') {
        return Ok(config
            .section(section.trim())
            .into_iter()
            .filter(|(k, _)| k.starts_with("DNS"))
            .map(|(_, v)| v.to_string())
            .collect());
    }
    list(value)
        .map(|item| {
            item.strip_prefix("DNS:")
                .map(|name| name.trim().to_string())
                .ok_or_else(|| SimpleCertError::Parse(format!("unsupported subjectAltName '{item}'")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder() -> SanConfigBuilder {
        SanConfigBuilder::with_builtin_template("unused/san.openssl.cnf").unwrap()
    }

    #[test]
    fn test_builtin_template_requests_localhost_only() {
        let ext = RequestExtensions::from_config(BUILTIN_TEMPLATE).unwrap();
        assert_eq!(ext.dns_names(), ["localhost"]);
        assert_eq!(ext.basic_constraints, Some((BasicConstraints::default(), false)));
        let (ku, critical) = ext.key_usage.unwrap();
        assert!(critical);
        assert_eq!(ku, KeyUsage(KeyUsages::DigitalSignature | KeyUsages::KeyEncipherment));
        assert_eq!(ext.to_extension_params().unwrap().len(), 4);
    }

    #[test]
    fn test_render_without_extra_dns_is_verbatim() {
        assert_eq!(builder().render(None).unwrap(), BUILTIN_TEMPLATE);
        assert_eq!(builder().render(Some("  ")).unwrap(), BUILTIN_TEMPLATE);
    }

    #[test]
    fn test_render_appends_second_dns_entry() {
        let rendered = builder().render(Some("app.local")).unwrap();
        assert!(rendered.ends_with("DNS.2 = app.local\n"));
        let ext = RequestExtensions::from_config(&rendered).unwrap();
        assert_eq!(ext.dns_names(), ["localhost", "app.local"]);
    }

    #[test]
    fn test_render_rejects_config_injection() {
        let err = builder().render(Some("app.local\n[ req_ext ]")).unwrap_err();
        assert!(matches!(err, SimpleCertError::InvalidInput(_)));
        assert!(builder().render(Some("a b.local")).is_err());
    }

    #[test]
    fn test_template_without_localhost_is_rejected() {
        let template = "[ req_ext ]\nsubjectAltName = @alt\n[ alt ]\nDNS.1 = example.com\n";
        assert!(SanConfigBuilder::new(template, "x").is_err());
    }

    #[test]
    fn test_alt_names_must_be_last_section() {
        let template =
            "[ req_ext ]\nsubjectAltName = @alt\n[ alt ]\nDNS.1 = localhost\n[ other ]\nx = y\n";
        let err = SanConfigBuilder::new(template, "x")
            .unwrap()
            .render(Some("app.local"))
            .unwrap_err();
        assert!(matches!(err, SimpleCertError::Parse(_)));
    }

    #[test]
    fn test_inline_alt_names() {
        let ext = RequestExtensions::from_config(
            "[ req_ext ]\nsubjectAltName = DNS:localhost, DNS:api.local\n",
        )
        .unwrap();
        assert_eq!(ext.dns_names(), ["localhost", "api.local"]);
    }

    #[test]
    fn test_dns_name_validation() {
        assert!(is_valid_dns_name("localhost"));
        assert!(is_valid_dns_name("app.local"));
        assert!(is_valid_dns_name("*.dev.example.com"));
        assert!(!is_valid_dns_name("-bad.local"));
        assert!(!is_valid_dns_name("bad..local"));
        assert!(!is_valid_dns_name("$(rm -rf /)"));
    }
}
