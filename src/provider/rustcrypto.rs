use std::io::Write;
use std::path::Path;

use rand::RngCore;
use tracing::debug;

use super::{CryptoProvider, CsrRequest, Pkcs12Request, RootCertRequest, SignRequest};
use crate::cert::extensions::{BasicConstraints, KeyUsage, KeyUsages};
use crate::cert::params::{DistinguishedName, ExtensionParam, Validity};
use crate::cert::{Certificate, CertificateWithPrivateKey, SelfIssuer};
use crate::csr::CertificateRequest;
use crate::error::{Result, SimpleCertError};
use crate::issuer::{IssueParams, Issuer};
use crate::key::{KeyPair, is_encrypted_pem};
use crate::layout::write_private;
use crate::san::RequestExtensions;
use crate::tbs_certificate::serial_bytes;

/// Pure-Rust provider: RSA via `rsa`, X.509 via `x509-cert`, PKCS#12 via `p12`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RustCryptoProvider;

impl RustCryptoProvider {
    pub fn new() -> Self {
        Self
    }
}

impl CryptoProvider for RustCryptoProvider {
    fn generate_rsa_key(&self, bits: usize, passphrase: Option<&str>, key_out: &Path) -> Result<()> {
        debug!(bits, encrypted = passphrase.is_some_and(|p| !p.is_empty()), "Generating RSA key");
        let key = KeyPair::generate_rsa(bits)?;
        let pem = key.to_pkcs8_pem(passphrase)?;
        write_private(key_out, pem.as_bytes())
    }

    fn self_sign_root(&self, request: &RootCertRequest<'_>) -> Result<()> {
        if request.passphrase.is_empty() {
            return Err(SimpleCertError::InvalidInput(
                "the CA key must be passphrase protected".to_string(),
            ));
        }
        let key = KeyPair::from_pem_file(request.key, Some(request.passphrase))?;
        let name = request.subject.as_x509_name()?;

        let basic_constraints = BasicConstraints {
            is_ca: true,
            max_path_length: None,
        };
        let key_usage =
            KeyUsage(KeyUsages::KeyCertSign | KeyUsages::CRLSign | KeyUsages::DigitalSignature);

        let params = IssueParams {
            serial_number: random_serial(),
            subject: name.clone(),
            subject_public_key: key.as_spki()?,
            validity: Validity::for_days(request.days),
            extensions: vec![
                ExtensionParam::from_extension(basic_constraints, true)?,
                ExtensionParam::from_extension(key_usage, true)?,
            ],
        };

        let cert = SelfIssuer { name, key: &key }.issue(&params)?;
        std::fs::write(request.cert_out, cert.to_pem()?)?;
        Ok(())
    }

    fn generate_csr(&self, request: &CsrRequest<'_>) -> Result<()> {
        let key = KeyPair::from_pem_file(request.key, request.passphrase)?;
        let extensions =
            RequestExtensions::from_config(&std::fs::read_to_string(request.san_config)?)?;
        debug!(dns = ?extensions.dns_names(), "Building CSR");

        let csr =
            CertificateRequest::new(request.subject, &key, &extensions.to_extension_params()?)?;
        std::fs::write(request.csr_out, csr.to_pem()?)?;
        Ok(())
    }

    fn sign_certificate(&self, request: &SignRequest<'_>) -> Result<()> {
        let csr = CertificateRequest::from_pem_file(request.csr)?;
        csr.verify()?;

        let ca = CertificateWithPrivateKey {
            cert: Certificate::from_pem_file(request.ca_cert)?,
            key: KeyPair::from_pem_file(request.ca_key, Some(request.ca_passphrase))?,
        };
        if ca.cert.inner.tbs_certificate.subject_public_key_info.subject_public_key
            != ca.key.as_spki()?.subject_public_key
        {
            return Err(SimpleCertError::Certificate(
                "CA private key does not match the CA certificate".to_string(),
            ));
        }

        // Extensions come from the SAN config, as `-extfile` does, not from the CSR.
        let extensions =
            RequestExtensions::from_config(&std::fs::read_to_string(request.san_config)?)?;

        let serial = read_serial(request.serial_file)?;
        let params = IssueParams {
            serial_number: serial_bytes(serial),
            subject: csr.subject_name().clone(),
            subject_public_key: csr.public_key().clone(),
            validity: Validity::for_days(request.days),
            extensions: extensions.to_extension_params()?,
        };
        let cert = ca.issue(&params)?;
        std::fs::write(request.cert_out, cert.to_pem()?)?;

        let next = serial.checked_add(1).ok_or_else(|| {
            SimpleCertError::Parse("serial counter overflow".to_string())
        })?;
        std::fs::write(request.serial_file, format!("{}\n", format_serial(next)))?;
        append_index_record(request.index_file, serial, &params.validity, &csr.subject()?)?;
        debug!(serial = %format_serial(serial), "Signed certificate");
        Ok(())
    }

    fn export_pkcs12(&self, request: &Pkcs12Request<'_>) -> Result<()> {
        let key = KeyPair::from_pem_file(request.key, request.key_passphrase)?;
        let cert = Certificate::from_pem_file(request.cert)?;
        let friendly_name = cert.subject()?.common_name;

        let pfx = p12::PFX::new(
            &cert.to_der()?,
            &key.to_pkcs8_der()?,
            None,
            request.export_passphrase,
            &friendly_name,
        )
        .ok_or_else(|| SimpleCertError::Encoding("failed to assemble PKCS#12 bundle".to_string()))?;
        write_private(request.p12_out, &pfx.to_der())
    }

    fn read_subject(&self, cert: &Path) -> Result<String> {
        Ok(Certificate::from_pem_file(cert)?.subject()?.to_rdn_string())
    }

    fn verify_key_passphrase(&self, key: &Path, passphrase: &str) -> Result<bool> {
        let pem = zeroize::Zeroizing::new(std::fs::read_to_string(key)?);
        if !is_encrypted_pem(&pem) {
            debug!(key = %key.display(), "Key is not encrypted, no passphrase can unlock it");
            return Ok(false);
        }
        match KeyPair::from_pkcs8_pem(&pem, Some(passphrase)) {
            Ok(_) => Ok(true),
            Err(SimpleCertError::Pkcs8(_) | SimpleCertError::InvalidInput(_)) => Ok(false),
            Err(err) => Err(err),
        }
    }

    fn random_hex(&self, byte_count: usize) -> Result<String> {
        let mut bytes = vec![0u8; byte_count];
        rand::rng().fill_bytes(&mut bytes);
        Ok(hex::encode(bytes))
    }
}

/// Eight random bytes, forced positive and non-zero.
fn random_serial() -> Vec<u8> {
    let mut bytes = [0u8; 8];
    rand::rng().fill_bytes(&mut bytes);
    bytes[0] = (bytes[0] & 0x7f) | 0x01;
    bytes.to_vec()
}

/// Reads the hexadecimal serial counter.
pub(crate) fn read_serial(path: &Path) -> Result<u64> {
    let text = std::fs::read_to_string(path)?;
    let text = text.trim();
    u64::from_str_radix(text, 16)
        .map_err(|e| SimpleCertError::Parse(format!("serial file '{text}': {e}")))
}

/// Uppercase hex with an even number of digits, as OpenSSL writes serials.
pub(crate) fn format_serial(serial: u64) -> String {
    let hex = format!("{serial:X}");
    if hex.len() % 2 == 1 { format!("0{hex}") } else { hex }
}

fn append_index_record(
    path: &Path,
    serial: u64,
    validity: &Validity,
    subject: &DistinguishedName,
) -> Result<()> {
    let expiry = validity.not_after;
    let record = format!(
        "V\t{:02}{:02}{:02}{:02}{:02}{:02}Z\t\t{}\tunknown\t{}\n",
        expiry.year().rem_euclid(100),
        u8::from(expiry.month()),
        expiry.day(),
        expiry.hour(),
        expiry.minute(),
        expiry.second(),
        format_serial(serial),
        subject.to_slash_string(),
    );
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    file.write_all(record.as_bytes())?;
    Ok(())
}
