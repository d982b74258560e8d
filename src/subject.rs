//! Organization and common name, either derived from the user's answer or
//! read back from an existing certificate.

use std::path::Path;

use tracing::debug;

use crate::error::{Result, SimpleCertError};
use crate::provider::CryptoProvider;

const CA_SUFFIX: &str = "Certificate Authority";
const END_ENTITY_SUFFIX: &str = "Web Client";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectIdentity {
    pub organization: String,
    pub common_name: String,
}

impl SubjectIdentity {
    /// `"X Ltd"` / `"X Ltd Certificate Authority"` for the answer `X`.
    pub fn ca_from_base_name(base_name: &str) -> Self {
        let organization = organization_name(base_name);
        Self {
            common_name: format!("{organization} {CA_SUFFIX}"),
            organization,
        }
    }

    /// `"X Ltd"` / `"X Ltd Web Client"` for the answer `X`.
    pub fn end_entity_from_base_name(base_name: &str) -> Self {
        let organization = organization_name(base_name);
        Self {
            common_name: format!("{organization} {END_ENTITY_SUFFIX}"),
            organization,
        }
    }

    /// End-entity identity for a CA with no prior end-entity certificate.
    pub fn end_entity_from_ca(ca: &SubjectIdentity) -> Self {
        Self {
            organization: ca.organization.clone(),
            common_name: ca.common_name.replace(CA_SUFFIX, END_ENTITY_SUFFIX),
        }
    }
}

fn organization_name(base_name: &str) -> String {
    format!("{} Ltd", base_name.trim())
}

/// Reads the subject of the certificate at `cert`.
pub fn extract_subject<C: CryptoProvider>(crypto: &C, cert: &Path) -> Result<SubjectIdentity> {
    let line = crypto.read_subject(cert)?;
    debug!(cert = %cert.display(), subject = %line, "Read certificate subject");
    parse_subject_line(&line)
}

/// Parses `C = US, ST = TX, O = Acme Ltd, CN = Acme Ltd Certificate Authority`.
/// An optional `subject=` prefix is ignored.
pub fn parse_subject_line(line: &str) -> Result<SubjectIdentity> {
    let line = line.trim();
    let line = line.strip_prefix("subject=").unwrap_or(line);

    let mut organization = None;
    let mut common_name = None;
    for token in split_unescaped_commas(line) {
        let token = token.trim().trim_matches('"').trim();
        let Some((key, value)) = token.split_once('=') else {
            continue;
        };
        let value = unescape(value.trim().trim_matches('"'));
        match key.trim() {
            "O" if organization.is_none() => organization = Some(value),
            "CN" if common_name.is_none() => common_name = Some(value),
            _ => {}
        }
    }

    let organization = organization
        .filter(|v| !v.is_empty())
        .ok_or_else(|| SimpleCertError::Parse(format!("no organization (O) in subject '{line}'")))?;
    let common_name = common_name
        .filter(|v| !v.is_empty())
        .ok_or_else(|| SimpleCertError::Parse(format!("no common name (CN) in subject '{line}'")))?;

    Ok(SubjectIdentity {
        organization,
        common_name,
    })
}

fn split_unescaped_commas(line: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut start = 0;
    let mut escaped = false;
    for (i, c) in line.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' => escaped = true,
            ',' => {
                tokens.push(&line[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    tokens.push(&line[start..]);
    tokens
}

fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}
