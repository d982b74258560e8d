use bon::Builder;
use const_oid::ObjectIdentifier;
use der::asn1::{Any, SetOfVec};
use der::{Tag, Tagged};
use time::Duration;
use time::OffsetDateTime;
use x509_cert::attr::AttributeTypeAndValue;
use x509_cert::name::{RdnSequence, RelativeDistinguishedName};

use super::extensions::ToAndFromX509Extension;
use crate::error::{Result, SimpleCertError};

pub const COUNTRY_NAME: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.6");
pub const STATE_OR_PROVINCE_NAME: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.8");
pub const ORGANIZATION_NAME: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.10");
pub const COMMON_NAME: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.3");

/// Distinguished name of a CA or end-entity certificate.
///
/// # Fields
/// * `country` - The country (C).
/// * `state` - The state or province (ST).
/// * `organization` - The organization (O).
/// * `common_name` - The common name (CN).
#[derive(Clone, Debug, Builder, Default, PartialEq, Eq)]
pub struct DistinguishedName {
    pub country: Option<String>,
    pub state: Option<String>,
    pub organization: Option<String>,
    pub common_name: String,
}

impl DistinguishedName {
    fn attributes(&self) -> Vec<(ObjectIdentifier, &str)> {
        let mut attrs = Vec::with_capacity(4);
        if let Some(c) = &self.country {
            attrs.push((COUNTRY_NAME, c.as_str()));
        }
        if let Some(st) = &self.state {
            attrs.push((STATE_OR_PROVINCE_NAME, st.as_str()));
        }
        if let Some(o) = &self.organization {
            attrs.push((ORGANIZATION_NAME, o.as_str()));
        }
        attrs.push((COMMON_NAME, self.common_name.as_str()));
        attrs
    }

    /// Converts the distinguished name to an X.509 name, one attribute per
    /// RDN in C, ST, O, CN order. Country is a PrintableString, the rest
    /// UTF8String.
    pub fn as_x509_name(&self) -> Result<x509_cert::name::DistinguishedName> {
        let mut rdns = Vec::new();
        for (oid, value) in self.attributes() {
            if value.is_empty() {
                continue;
            }
            let tag = if oid == COUNTRY_NAME {
                if !value.chars().all(|c| c.is_ascii_alphanumeric()) {
                    return Err(SimpleCertError::InvalidInput(format!(
                        "country '{value}' is not a printable string"
                    )));
                }
                Tag::PrintableString
            } else {
                Tag::Utf8String
            };
            let atv = AttributeTypeAndValue {
                oid,
                value: Any::new(tag, value.as_bytes())?,
            };
            rdns.push(RelativeDistinguishedName(SetOfVec::try_from(vec![atv])?));
        }
        Ok(RdnSequence(rdns))
    }

    /// Creates a `DistinguishedName` from an X.509 name. Attributes other
    /// than C, ST, O and CN are ignored.
    pub fn from_x509_name(x509dn: &x509_cert::name::DistinguishedName) -> Result<Self> {
        let mut dn = DistinguishedName::default();
        for rdn in x509dn.0.iter() {
            for attr in rdn.0.iter() {
                let value = attribute_string(attr)?;
                match attr.oid {
                    COUNTRY_NAME => dn.country = Some(value),
                    STATE_OR_PROVINCE_NAME => dn.state = Some(value),
                    ORGANIZATION_NAME => dn.organization = Some(value),
                    COMMON_NAME => dn.common_name = value,
                    _ => {}
                }
            }
        }
        Ok(dn)
    }

    /// Renders the subject the way `openssl x509 -subject -nameopt oneline`
    /// style tools print it: `C = US, ST = TX, O = Acme Ltd, CN = ...`.
    /// Backslashes and commas inside values are escaped as `\\` and `\,`.
    pub fn to_rdn_string(&self) -> String {
        self.attributes()
            .into_iter()
            .filter(|(_, value)| !value.is_empty())
            .map(|(oid, value)| {
                let escaped = value.replace('\\', "\\\\").replace(',', "\\,");
                format!("{} = {}", short_name(oid), escaped)
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Slash form used in `index.txt` records: `/C=US/ST=TX/O=.../CN=...`.
    pub fn to_slash_string(&self) -> String {
        self.attributes()
            .into_iter()
            .filter(|(_, value)| !value.is_empty())
            .map(|(oid, value)| format!("/{}={}", short_name(oid), value))
            .collect()
    }
}

fn short_name(oid: ObjectIdentifier) -> &'static str {
    match oid {
        COUNTRY_NAME => "C",
        STATE_OR_PROVINCE_NAME => "ST",
        ORGANIZATION_NAME => "O",
        _ => "CN",
    }
}

fn attribute_string(attr: &AttributeTypeAndValue) -> Result<String> {
    match attr.value.tag() {
        Tag::Utf8String | Tag::PrintableString | Tag::Ia5String | Tag::TeletexString => {
            String::from_utf8(attr.value.value().to_vec())
                .map_err(|e| SimpleCertError::Decoding(e.to_string()))
        }
        other => Err(SimpleCertError::Decoding(format!(
            "unsupported string type {other} for attribute {}",
            attr.oid
        ))),
    }
}

/// Certificate validity period.
///
/// This struct represents the `notBefore` and `notAfter` fields in a certificate.
#[derive(Clone, Debug)]
pub struct Validity {
    pub not_before: OffsetDateTime,
    pub not_after: OffsetDateTime,
}

impl Validity {
    /// Creates a validity period starting now for the given number of days.
    pub fn for_days(days: u32) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            not_before: now,
            not_after: now + Duration::days(i64::from(days)),
        }
    }
}

/// Represents an X.509 extension.
///
/// # Fields
/// * `oid` - The object identifier of the extension.
/// * `critical` - Indicates if the extension is critical.
/// * `value` - The DER-encoded value of the extension.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtensionParam {
    pub oid: ObjectIdentifier,
    pub critical: bool,
    /// DER-encoded extension value
    pub value: Vec<u8>,
}

impl ExtensionParam {
    /// Creates an `ExtensionParam` from a specific extension.
    pub fn from_extension<E: ToAndFromX509Extension>(extension: E, critical: bool) -> Result<Self> {
        Ok(Self {
            oid: E::OID,
            critical,
            value: extension.to_x509_extension_value()?,
        })
    }

    /// Decodes an `ExtensionParam` into a specific extension.
    pub fn to_extension<E: ToAndFromX509Extension>(&self) -> Result<E> {
        E::from_x509_extension_value(&self.value)
    }

    pub fn to_x509(&self) -> Result<x509_cert::ext::Extension> {
        Ok(x509_cert::ext::Extension {
            extn_id: self.oid,
            critical: self.critical,
            extn_value: der::asn1::OctetString::new(self.value.clone())?,
        })
    }

    pub fn from_x509(ext: &x509_cert::ext::Extension) -> Self {
        Self {
            oid: ext.extn_id,
            critical: ext.critical,
            value: ext.extn_value.as_bytes().to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn acme() -> DistinguishedName {
        DistinguishedName::builder()
            .country("US".to_string())
            .state("TX".to_string())
            .organization("Acme Ltd".to_string())
            .common_name("Acme Ltd Certificate Authority".to_string())
            .build()
    }

    #[test]
    fn test_x509_name_conversion_keeps_fields() {
        let dn = acme();
        let x509 = dn.as_x509_name().unwrap();
        assert_eq!(x509.0.len(), 4);
        assert_eq!(DistinguishedName::from_x509_name(&x509).unwrap(), dn);
    }

    #[test]
    fn test_rdn_string_layout() {
        assert_eq!(
            acme().to_rdn_string(),
            "C = US, ST = TX, O = Acme Ltd, CN = Acme Ltd Certificate Authority"
        );
        assert_eq!(
            acme().to_slash_string(),
            "/C=US/ST=TX/O=Acme Ltd/CN=Acme Ltd Certificate Authority"
        );
    }

    #[test]
    fn test_rdn_string_escapes_commas() {
        let dn = DistinguishedName::builder()
            .organization("Smith, Jones Ltd".to_string())
            .common_name("x".to_string())
            .build();
        assert_eq!(dn.to_rdn_string(), "O = Smith\\, Jones Ltd, CN = x");
    }

    #[test]
    fn test_country_must_be_printable() {
        let dn = DistinguishedName::builder()
            .country("U S".to_string())
            .common_name("x".to_string())
            .build();
        assert!(dn.as_x509_name().is_err());
    }
}
