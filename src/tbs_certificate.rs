use der::asn1::{GeneralizedTime, UtcTime};
use time::OffsetDateTime;
use x509_cert::Version;
use x509_cert::certificate::TbsCertificateInner;
use x509_cert::name::Name;
use x509_cert::serial_number::SerialNumber;
use x509_cert::spki::SubjectPublicKeyInfoOwned;

use crate::cert::SignatureAlgorithm;
use crate::cert::params::{ExtensionParam, Validity};
use crate::error::Result;

/// Represents the "To Be Signed" (TBS) portion of an X.509 certificate.
///
/// # Fields
/// * `serial_number` - Big-endian serial, as produced by [`serial_bytes`].
/// * `signature_algorithm` - The algorithm used to sign the certificate.
/// * `issuer` - The issuer name, copied from the issuing certificate's subject.
/// * `validity` - The validity window.
/// * `subject` - The subject name.
/// * `subject_public_key` - The subject public key info.
/// * `extensions` - Additional X.509 extensions for the certificate.
pub struct TbsCertificate {
    pub serial_number: Vec<u8>,
    pub signature_algorithm: SignatureAlgorithm,
    pub issuer: Name,
    pub validity: Validity,
    pub subject: Name,
    pub subject_public_key: SubjectPublicKeyInfoOwned,
    pub extensions: Vec<ExtensionParam>,
}

impl TbsCertificate {
    /// Converts the `TbsCertificate` into a `TbsCertificateInner` for DER encoding.
    pub fn to_tbs_certificate_inner(&self) -> Result<TbsCertificateInner> {
        let validity = x509_cert::time::Validity {
            not_before: to_x509_time(self.validity.not_before)?,
            not_after: to_x509_time(self.validity.not_after)?,
        };

        let extensions = self
            .extensions
            .iter()
            .map(ExtensionParam::to_x509)
            .collect::<Result<Vec<_>>>()?;

        Ok(TbsCertificateInner {
            version: Version::V3,
            serial_number: SerialNumber::new(self.serial_number.as_slice())?,
            signature: self.signature_algorithm.clone().into(),
            issuer: self.issuer.clone(),
            validity,
            subject: self.subject.clone(),
            subject_public_key_info: self.subject_public_key.clone(),
            issuer_unique_id: None,
            subject_unique_id: None,
            extensions: Some(extensions),
        })
    }
}

/// RFC 5280: UTCTime through 2049, GeneralizedTime from 2050 on.
pub fn to_x509_time(at: OffsetDateTime) -> Result<x509_cert::time::Time> {
    let system_time: std::time::SystemTime = at.into();
    if at.year() < 2050 {
        Ok(x509_cert::time::Time::UtcTime(UtcTime::from_system_time(
            system_time,
        )?))
    } else {
        Ok(x509_cert::time::Time::GeneralTime(
            GeneralizedTime::from_system_time(system_time)?,
        ))
    }
}

/// Minimal positive big-endian encoding of a serial counter.
pub fn serial_bytes(serial: u64) -> Vec<u8> {
    let bytes = serial.to_be_bytes();
    let first = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len() - 1);
    let mut out = bytes[first..].to_vec();
    if out[0] & 0x80 != 0 {
        out.insert(0, 0);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serial_bytes_are_minimal_and_positive() {
        assert_eq!(serial_bytes(0x1000), vec![0x10, 0x00]);
        assert_eq!(serial_bytes(0), vec![0x00]);
        assert_eq!(serial_bytes(0x80), vec![0x00, 0x80]);
    }

    #[test]
    fn test_time_switches_to_generalized_in_2050() {
        let year = |y| {
            time::Date::from_calendar_date(y, time::Month::June, 1)
                .unwrap()
                .midnight()
                .assume_utc()
        };
        let (before, after) = (year(2049), year(2050));
        assert!(matches!(
            to_x509_time(before).unwrap(),
            x509_cert::time::Time::UtcTime(_)
        ));
        assert!(matches!(
            to_x509_time(after).unwrap(),
            x509_cert::time::Time::GeneralTime(_)
        ));
    }
}
