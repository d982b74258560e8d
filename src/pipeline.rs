//! The ordered issuance steps: CA key, CA certificate, end-entity key, CSR,
//! signed certificate, PKCS#12 bundle.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{error, info};

use crate::cert::params::DistinguishedName;
use crate::config::{FailurePolicy, PkiConfig};
use crate::error::{Result, SimpleCertError};
use crate::layout::{Layout, create_dir_with_mode};
use crate::passphrase::Passphrase;
use crate::provider::{CryptoProvider, CsrRequest, Pkcs12Request, RootCertRequest, SignRequest};
use crate::san::SanConfigBuilder;
use crate::subject::SubjectIdentity;

/// Initial content of the CA serial counter.
pub const INITIAL_SERIAL: &str = "1000";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    GenerateCaKey,
    SelfSignCaCert,
    GenerateEndEntityKey,
    GenerateCsr,
    SignCertificate,
    ExportPkcs12,
}

impl Step {
    /// Steps run on a fresh setup.
    pub const FULL: [Step; 6] = [
        Step::GenerateCaKey,
        Step::SelfSignCaCert,
        Step::GenerateEndEntityKey,
        Step::GenerateCsr,
        Step::SignCertificate,
        Step::ExportPkcs12,
    ];

    /// Steps run when the CA is reused.
    pub const END_ENTITY: [Step; 4] = [
        Step::GenerateEndEntityKey,
        Step::GenerateCsr,
        Step::SignCertificate,
        Step::ExportPkcs12,
    ];
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Step::GenerateCaKey => "Create CA private key",
            Step::SelfSignCaCert => "Create CA certificate",
            Step::GenerateEndEntityKey => "Create End User private key",
            Step::GenerateCsr => "Create End User CSR",
            Step::SignCertificate => "Create End User Certificate",
            Step::ExportPkcs12 => "Create End User PKCS#12 bundle",
        })
    }
}

/// Which steps ran and which failed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IssuanceReport {
    pub completed: Vec<Step>,
    pub failed: Vec<(Step, String)>,
}

impl IssuanceReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// End-entity inputs shared by both flows.
#[derive(Debug, Clone, Copy)]
pub struct EndEntityRequest<'a> {
    pub identity: &'a SubjectIdentity,
    /// Empty means an unencrypted key and PKCS#12 bundle.
    pub passphrase: &'a Passphrase,
    pub extra_dns: Option<&'a str>,
}

pub struct IssuancePipeline<'a, C> {
    crypto: &'a C,
    config: &'a PkiConfig,
    layout: &'a Layout,
    san: &'a SanConfigBuilder,
}

impl<'a, C: CryptoProvider> IssuancePipeline<'a, C> {
    pub fn new(
        crypto: &'a C,
        config: &'a PkiConfig,
        layout: &'a Layout,
        san: &'a SanConfigBuilder,
    ) -> Self {
        Self {
            crypto,
            config,
            layout,
            san,
        }
    }

    /// Creates the CA, then issues the end-entity certificate from it.
    pub fn run_full(
        &self,
        ca_identity: &SubjectIdentity,
        ca_passphrase: &Passphrase,
        end_entity: &EndEntityRequest<'_>,
    ) -> Result<IssuanceReport> {
        let mut report = IssuanceReport::default();
        self.run_step(&mut report, Step::GenerateCaKey, || {
            self.generate_ca_key(ca_passphrase)
        })?;
        self.run_step(&mut report, Step::SelfSignCaCert, || {
            self.self_sign_ca_cert(ca_identity, ca_passphrase)
        })?;
        self.run_end_entity_steps(&mut report, ca_passphrase, end_entity)?;
        Ok(report)
    }

    /// Issues an end-entity certificate from an existing CA.
    pub fn run_end_entity(
        &self,
        ca_passphrase: &Passphrase,
        end_entity: &EndEntityRequest<'_>,
    ) -> Result<IssuanceReport> {
        let mut report = IssuanceReport::default();
        self.run_end_entity_steps(&mut report, ca_passphrase, end_entity)?;
        Ok(report)
    }

    fn run_end_entity_steps(
        &self,
        report: &mut IssuanceReport,
        ca_passphrase: &Passphrase,
        end_entity: &EndEntityRequest<'_>,
    ) -> Result<()> {
        self.run_step(report, Step::GenerateEndEntityKey, || {
            self.generate_end_entity_key(end_entity.passphrase)
        })?;
        // Both the CSR and the signing step read this file; neither may fall
        // back to one left over from an earlier run.
        let san_config = self.san.build(end_entity.extra_dns).map_err(|e| e.to_string());
        self.run_step(report, Step::GenerateCsr, || {
            self.generate_csr(end_entity, built(&san_config)?)
        })?;
        self.run_step(report, Step::SignCertificate, || {
            self.sign_certificate(ca_passphrase, built(&san_config)?)
        })?;
        self.run_step(report, Step::ExportPkcs12, || {
            self.export_pkcs12(end_entity.passphrase)
        })
    }

    fn run_step(
        &self,
        report: &mut IssuanceReport,
        step: Step,
        action: impl FnOnce() -> Result<PathBuf>,
    ) -> Result<()> {
        match action() {
            Ok(artifact) => {
                info!(path = %artifact.display(), "{step} successful");
                report.completed.push(step);
                Ok(())
            }
            Err(err) => {
                error!("{step} failed: {err}");
                match self.config.failure_policy {
                    FailurePolicy::FailFast => Err(SimpleCertError::ProviderInvocation {
                        step,
                        source: Box::new(err),
                    }),
                    FailurePolicy::ContinueOnError => {
                        report.failed.push((step, err.to_string()));
                        Ok(())
                    }
                }
            }
        }
    }

    fn subject(&self, identity: &SubjectIdentity) -> DistinguishedName {
        DistinguishedName {
            country: Some(self.config.country.clone()),
            state: Some(self.config.province.clone()),
            organization: Some(identity.organization.clone()),
            common_name: identity.common_name.clone(),
        }
    }

    fn generate_ca_key(&self, passphrase: &Passphrase) -> Result<PathBuf> {
        if passphrase.is_empty() {
            return Err(SimpleCertError::InvalidInput(
                "the CA private key must be passphrase protected".to_string(),
            ));
        }
        create_dir_with_mode(&self.layout.ca_private_dir(), 0o700)?;
        fs::create_dir_all(self.layout.ca_certs_dir())?;
        fs::write(self.layout.ca_serial(), INITIAL_SERIAL)?;
        fs::write(self.layout.ca_index(), "")?;

        let key = self.layout.ca_key();
        self.crypto
            .generate_rsa_key(self.config.ca_key_bits, passphrase.as_option(), &key)?;
        Ok(key)
    }

    fn self_sign_ca_cert(&self, identity: &SubjectIdentity, passphrase: &Passphrase) -> Result<PathBuf> {
        fs::create_dir_all(self.layout.ca_certs_dir())?;
        let cert = self.layout.ca_cert();
        self.crypto.self_sign_root(&RootCertRequest {
            key: &self.layout.ca_key(),
            passphrase: passphrase.expose(),
            subject: &self.subject(identity),
            days: self.config.ca_validity_days,
            cert_out: &cert,
        })?;
        Ok(cert)
    }

    fn generate_end_entity_key(&self, passphrase: &Passphrase) -> Result<PathBuf> {
        fs::create_dir_all(self.layout.eu_private_dir())?;
        let key = self.layout.eu_key();
        self.crypto
            .generate_rsa_key(self.config.end_entity_key_bits, passphrase.as_option(), &key)?;
        Ok(key)
    }

    fn generate_csr(&self, end_entity: &EndEntityRequest<'_>, san_config: &Path) -> Result<PathBuf> {
        fs::create_dir_all(self.layout.eu_csr_dir())?;
        let csr = self.layout.eu_csr();
        self.crypto.generate_csr(&CsrRequest {
            key: &self.layout.eu_key(),
            passphrase: end_entity.passphrase.as_option(),
            subject: &self.subject(end_entity.identity),
            san_config,
            csr_out: &csr,
        })?;
        Ok(csr)
    }

    fn sign_certificate(&self, ca_passphrase: &Passphrase, san_config: &Path) -> Result<PathBuf> {
        fs::create_dir_all(self.layout.eu_certs_dir())?;
        let cert = self.layout.eu_cert();
        self.crypto.sign_certificate(&SignRequest {
            csr: &self.layout.eu_csr(),
            ca_key: &self.layout.ca_key(),
            ca_cert: &self.layout.ca_cert(),
            ca_passphrase: ca_passphrase.expose(),
            san_config,
            days: self.config.end_entity_validity_days,
            serial_file: &self.layout.ca_serial(),
            index_file: &self.layout.ca_index(),
            cert_out: &cert,
        })?;
        Ok(cert)
    }

    fn export_pkcs12(&self, passphrase: &Passphrase) -> Result<PathBuf> {
        fs::create_dir_all(self.layout.eu_certs_dir())?;
        let p12 = self.layout.eu_p12();
        self.crypto.export_pkcs12(&Pkcs12Request {
            key: &self.layout.eu_key(),
            key_passphrase: passphrase.as_option(),
            cert: &self.layout.eu_cert(),
            export_passphrase: passphrase.expose(),
            p12_out: &p12,
        })?;
        Ok(p12)
    }
}

fn built(san_config: &std::result::Result<PathBuf, String>) -> Result<&Path> {
    san_config
        .as_deref()
        .map_err(|e| SimpleCertError::InvalidInput(format!("SAN config was not built: {e}")))
}
