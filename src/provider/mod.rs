//! The cryptographic operations the lifecycle depends on.
//!
//! Every artifact is addressed by path and every input is a typed
//! parameter; nothing is ever assembled into a command line.

mod rustcrypto;

use std::path::Path;

pub use rustcrypto::RustCryptoProvider;

use crate::cert::params::DistinguishedName;
use crate::error::Result;

/// Inputs for a self-signed root certificate.
#[derive(Debug, Clone, Copy)]
pub struct RootCertRequest<'a> {
    pub key: &'a Path,
    pub passphrase: &'a str,
    pub subject: &'a DistinguishedName,
    pub days: u32,
    pub cert_out: &'a Path,
}

/// Inputs for a certificate signing request.
#[derive(Debug, Clone, Copy)]
pub struct CsrRequest<'a> {
    pub key: &'a Path,
    /// `None` for an unencrypted key.
    pub passphrase: Option<&'a str>,
    pub subject: &'a DistinguishedName,
    pub san_config: &'a Path,
    pub csr_out: &'a Path,
}

/// Inputs for signing a CSR with the CA.
#[derive(Debug, Clone, Copy)]
pub struct SignRequest<'a> {
    pub csr: &'a Path,
    pub ca_key: &'a Path,
    pub ca_cert: &'a Path,
    pub ca_passphrase: &'a str,
    pub san_config: &'a Path,
    pub days: u32,
    /// Hex serial counter, read and incremented.
    pub serial_file: &'a Path,
    /// Issued-certificate database, appended to.
    pub index_file: &'a Path,
    pub cert_out: &'a Path,
}

/// Inputs for a PKCS#12 bundle.
#[derive(Debug, Clone, Copy)]
pub struct Pkcs12Request<'a> {
    pub key: &'a Path,
    pub key_passphrase: Option<&'a str>,
    pub cert: &'a Path,
    /// May be empty.
    pub export_passphrase: &'a str,
    pub p12_out: &'a Path,
}

/// Cryptographic Operations Provider.
pub trait CryptoProvider {
    /// Generates an RSA key and writes it to `key_out`, encrypted when
    /// `passphrase` is a non-empty string.
    fn generate_rsa_key(&self, bits: usize, passphrase: Option<&str>, key_out: &Path) -> Result<()>;

    fn self_sign_root(&self, request: &RootCertRequest<'_>) -> Result<()>;

    fn generate_csr(&self, request: &CsrRequest<'_>) -> Result<()>;

    /// Signs a CSR with the CA, consuming the next serial number.
    fn sign_certificate(&self, request: &SignRequest<'_>) -> Result<()>;

    fn export_pkcs12(&self, request: &Pkcs12Request<'_>) -> Result<()>;

    /// The certificate subject as `C = .., ST = .., O = .., CN = ..`.
    fn read_subject(&self, cert: &Path) -> Result<String>;

    /// `Ok(false)` when the passphrase does not decrypt the key, or when the
    /// key is not encrypted at all.
    fn verify_key_passphrase(&self, key: &Path, passphrase: &str) -> Result<bool>;

    /// `byte_count` random bytes as lowercase hex.
    fn random_hex(&self, byte_count: usize) -> Result<String>;
}
