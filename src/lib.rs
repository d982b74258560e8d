//! # simplecert - A Local Certificate Authority in Pure Rust
//!
//! simplecert bootstraps a self-signed certificate authority on first use and
//! issues end-entity TLS certificates from it on every later run, without
//! shelling out to openssl. Keys, certificates, CSRs and PKCS#12 bundles are
//! produced with the rustcrypto libraries.
//!
//! ## Artifacts
//!
//! Everything lives under one data root:
//!
//! - `ca/private/ca.key.pem`, `ca/certs/ca.cert.pem`: the CA, key always encrypted
//! - `ca/serial`, `ca/index.txt`: serial counter and issued-certificate database
//! - `eu/private/key.pem`, `eu/csr/csr.pem`, `eu/certs/cert.pem`, `eu/certs/cert.p12`
//! - `ca/passphrase.txt`, `eu/passphrase.txt`: only for generated passphrases
//! - `san.openssl.cnf`: request config rewritten on each issuance
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use simplecert::{
//!     config::PkiConfig,
//!     orchestrator::Orchestrator,
//!     prompt::DialoguerPrompt,
//!     provider::RustCryptoProvider,
//! };
//!
//! # fn main() -> Result<(), simplecert::error::SimpleCertError> {
//! let config = PkiConfig::builder().data_root("/home/data").build();
//! let mut orchestrator =
//!     Orchestrator::new(config, RustCryptoProvider::new(), DialoguerPrompt::new())?;
//!
//! let outcome = orchestrator.run()?;
//! println!("{:?}: {:?}", outcome.flow, outcome.report);
//! # Ok(())
//! # }
//! ```
//!
//! ## Issuing From a CA Directly
//!
//! ```rust,no_run
//! use simplecert::{
//!     cert::{CertificateWithPrivateKey, params::{DistinguishedName, ExtensionParam, Validity}},
//!     cert::extensions::SubjectAltName,
//!     issuer::{IssueParams, Issuer},
//!     key::KeyPair,
//! };
//!
//! # fn main() -> Result<(), simplecert::error::SimpleCertError> {
//! # let ca: CertificateWithPrivateKey = unimplemented!();
//! let server_key = KeyPair::generate_rsa(2048)?;
//! let subject = DistinguishedName::builder()
//!     .common_name("server.local".to_string())
//!     .build();
//!
//! let cert = ca.issue(&IssueParams {
//!     serial_number: vec![0x10, 0x00],
//!     subject: subject.as_x509_name()?,
//!     subject_public_key: server_key.as_spki()?,
//!     validity: Validity::for_days(10),
//!     extensions: vec![ExtensionParam::from_extension(
//!         SubjectAltName { names: vec!["server.local".to_string()] },
//!         false,
//!     )?],
//! })?;
//! println!("{}", cert.to_pem()?);
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! - [`orchestrator`]: fresh setup versus incremental issuance
//! - [`pipeline`]: the ordered issuance steps and their failure policy
//! - [`passphrase`]: passphrase acquisition and persistence
//! - [`detector`]: what CA material exists and whether it can be unlocked
//! - [`subject`]: organization and common name derivation
//! - [`san`]: the SAN request config
//! - [`provider`]: the cryptographic operations and their rustcrypto implementation
//! - [`prompt`]: interactive questions
//! - [`key`], [`cert`], [`csr`], [`issuer`], [`tbs_certificate`]: X.509 building blocks
//! - [`config`], [`layout`], [`error`]: configuration, paths and errors

pub mod cert;
pub mod config;
pub mod csr;
pub mod detector;
pub mod error;
pub mod issuer;
pub mod key;
pub mod layout;
pub mod orchestrator;
pub mod passphrase;
pub mod pipeline;
pub mod prompt;
pub mod provider;
pub mod san;
pub mod subject;
pub mod tbs_certificate;
