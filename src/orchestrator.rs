//! Top-level flow: bootstrap a fresh CA, or reuse the existing one and
//! issue another end-entity certificate from it.

use tracing::{info, warn};

use crate::config::PkiConfig;
use crate::detector::CaStateDetector;
use crate::error::{Result, SimpleCertError};
use crate::layout::Layout;
use crate::passphrase::{self, Passphrase, PassphraseManager, PassphraseOrigin, Role, Strategy};
use crate::pipeline::{EndEntityRequest, IssuanceReport, IssuancePipeline};
use crate::prompt::PromptProvider;
use crate::provider::CryptoProvider;
use crate::san::{SanConfigBuilder, is_valid_dns_name};
use crate::subject::{SubjectIdentity, extract_subject};

pub const ORGANIZATION_QUESTION: &str = "What is your name or organization name?";
pub const DNS_QUESTION: &str = "What is the DNS name of your server?";
pub const PASSPHRASE_MODE_QUESTION: &str = "How should passphrases be handled?";
pub const CA_PASSPHRASE_QUESTION: &str = "CA passphrase";
pub const END_ENTITY_PASSPHRASE_QUESTION: &str = "End-entity passphrase";
pub const OVERRIDE_QUESTION: &str =
    "An existing CA was found but its passphrase could not be verified. Replace it with a new CA?";
pub const EXISTING_CA_PASSPHRASE_QUESTION: &str = "Enter the existing CA passphrase";

pub const PASSPHRASE_MODES: [&str; 2] = ["Auto-generate everything", "Manual control"];
pub const CA_STRATEGIES: [&str; 2] = ["Auto-generate", "Enter my own"];
pub const END_ENTITY_STRATEGIES: [&str; 3] = ["Auto-generate", "Enter my own", "No passphrase"];

/// What is on disk at the start of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaState {
    NoCa,
    ExistingCaPassphraseFileValid,
    ExistingCaPassphraseFileInvalidOrMissing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    FreshSetup,
    IncrementalIssuance,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub flow: Flow,
    pub report: IssuanceReport,
}

pub struct Orchestrator<C, P> {
    config: PkiConfig,
    layout: Layout,
    crypto: C,
    prompt: P,
}

impl<C: CryptoProvider, P: PromptProvider> Orchestrator<C, P> {
    pub fn new(config: PkiConfig, crypto: C, prompt: P) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            layout: config.layout(),
            config,
            crypto,
            prompt,
        })
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn crypto(&self) -> &C {
        &self.crypto
    }

    pub fn prompt(&self) -> &P {
        &self.prompt
    }

    pub fn detect_state(&self) -> CaState {
        let detector = CaStateDetector::new(&self.crypto, &self.layout);
        if !detector.ca_exists() {
            CaState::NoCa
        } else if detector.is_passphrase_file_valid(&self.layout.ca_passphrase_file()) {
            CaState::ExistingCaPassphraseFileValid
        } else {
            CaState::ExistingCaPassphraseFileInvalidOrMissing
        }
    }

    pub fn run(&mut self) -> Result<RunOutcome> {
        let san = self.config.san_builder()?;
        let state = self.detect_state();
        info!(?state, data_root = %self.layout.root().display(), "Detected CA state");

        match state {
            CaState::NoCa => self.fresh_setup(&san),
            CaState::ExistingCaPassphraseFileValid => {
                let ca_passphrase = passphrase::retrieve(&self.layout.ca_passphrase_file())
                    .ok_or(SimpleCertError::PassphraseValidation)?;
                self.incremental_issuance(&san, &ca_passphrase)
            }
            CaState::ExistingCaPassphraseFileInvalidOrMissing => {
                if self.prompt.yes_no(OVERRIDE_QUESTION)? {
                    warn!("Replacing the existing CA");
                    return self.fresh_setup(&san);
                }
                let candidate = Passphrase::new(
                    self.prompt.masked_text(EXISTING_CA_PASSPHRASE_QUESTION)?,
                    PassphraseOrigin::UserSupplied,
                );
                let detector = CaStateDetector::new(&self.crypto, &self.layout);
                if candidate.is_empty() || !detector.is_passphrase_valid(candidate.expose()) {
                    return Err(SimpleCertError::PassphraseValidation);
                }
                store_passphrase(&candidate, &self.layout.ca_passphrase_file())?;
                self.incremental_issuance(&san, &candidate)
            }
        }
    }

    fn fresh_setup(&mut self, san: &SanConfigBuilder) -> Result<RunOutcome> {
        info!("Setting up a new certificate authority");
        let base_name = self.ask_required(ORGANIZATION_QUESTION)?;
        let extra_dns = self.ask_dns()?;

        let (ca_strategy, eu_strategy) =
            match self.choose(PASSPHRASE_MODE_QUESTION, &PASSPHRASE_MODES)? {
                0 => (Strategy::AutoGenerate, Strategy::AutoGenerate),
                _ => {
                    let ca = match self.choose(CA_PASSPHRASE_QUESTION, &CA_STRATEGIES)? {
                        0 => Strategy::AutoGenerate,
                        _ => Strategy::PromptSupply,
                    };
                    (ca, self.choose_end_entity_strategy()?)
                }
            };

        let mut manager = PassphraseManager::new(&self.crypto, &mut self.prompt);
        let ca_passphrase = manager.acquire(
            Role::CertificateAuthority,
            ca_strategy,
            self.config.ca_passphrase_bytes,
        )?;
        let eu_passphrase = manager.acquire(
            Role::EndEntity,
            eu_strategy,
            self.config.end_entity_passphrase_bytes,
        )?;

        store_passphrase(&ca_passphrase, &self.layout.ca_passphrase_file())?;
        store_passphrase(&eu_passphrase, &self.layout.eu_passphrase_file())?;

        let ca_identity = SubjectIdentity::ca_from_base_name(&base_name);
        let eu_identity = SubjectIdentity::end_entity_from_base_name(&base_name);
        let pipeline = IssuancePipeline::new(&self.crypto, &self.config, &self.layout, san);
        let report = pipeline.run_full(
            &ca_identity,
            &ca_passphrase,
            &EndEntityRequest {
                identity: &eu_identity,
                passphrase: &eu_passphrase,
                extra_dns: extra_dns.as_deref(),
            },
        )?;

        Ok(RunOutcome {
            flow: Flow::FreshSetup,
            report,
        })
    }

    fn incremental_issuance(
        &mut self,
        san: &SanConfigBuilder,
        ca_passphrase: &Passphrase,
    ) -> Result<RunOutcome> {
        info!("Issuing a new end-entity certificate from the existing CA");
        let eu_cert = self.layout.eu_cert();
        let eu_identity = if eu_cert.is_file() {
            extract_subject(&self.crypto, &eu_cert)?
        } else {
            let ca_identity = extract_subject(&self.crypto, &self.layout.ca_cert())?;
            SubjectIdentity::end_entity_from_ca(&ca_identity)
        };

        let extra_dns = self.ask_dns()?;
        let eu_strategy = self.choose_end_entity_strategy()?;
        let eu_passphrase = PassphraseManager::new(&self.crypto, &mut self.prompt).acquire(
            Role::EndEntity,
            eu_strategy,
            self.config.end_entity_passphrase_bytes,
        )?;
        store_passphrase(&eu_passphrase, &self.layout.eu_passphrase_file())?;

        let pipeline = IssuancePipeline::new(&self.crypto, &self.config, &self.layout, san);
        let report = pipeline.run_end_entity(
            ca_passphrase,
            &EndEntityRequest {
                identity: &eu_identity,
                passphrase: &eu_passphrase,
                extra_dns: extra_dns.as_deref(),
            },
        )?;

        Ok(RunOutcome {
            flow: Flow::IncrementalIssuance,
            report,
        })
    }

    fn choose_end_entity_strategy(&mut self) -> Result<Strategy> {
        Ok(
            match self.choose(END_ENTITY_PASSPHRASE_QUESTION, &END_ENTITY_STRATEGIES)? {
                0 => Strategy::AutoGenerate,
                1 => Strategy::PromptSupply,
                _ => Strategy::NoPassphrase,
            },
        )
    }

    fn choose(&mut self, question: &str, options: &[&str]) -> Result<usize> {
        let index = self.prompt.single_choice(question, options)?;
        if index >= options.len() {
            return Err(SimpleCertError::UserInput(format!(
                "choice {index} is out of range for '{question}'"
            )));
        }
        Ok(index)
    }

    /// Asks once more when the first answer is empty.
    fn ask_required(&mut self, question: &str) -> Result<String> {
        for attempt in 0..2 {
            let answer = self.prompt.free_text(question, true)?;
            let answer = answer.trim();
            if !answer.is_empty() {
                return Ok(answer.to_string());
            }
            if attempt == 0 {
                self.prompt.notify("An answer is required.");
            }
        }
        Err(SimpleCertError::UserInput(format!(
            "no answer given to '{question}'"
        )))
    }

    /// Optional DNS name; an invalid name is asked once more.
    fn ask_dns(&mut self) -> Result<Option<String>> {
        for attempt in 0..2 {
            let answer = self.prompt.free_text(DNS_QUESTION, false)?;
            let answer = answer.trim();
            if answer.is_empty() {
                return Ok(None);
            }
            if is_valid_dns_name(answer) {
                return Ok(Some(answer.to_string()));
            }
            warn!(dns = %answer, "Rejected DNS name");
            if attempt == 0 {
                self.prompt
                    .notify(&format!("'{answer}' is not a valid DNS name."));
            }
        }
        Err(SimpleCertError::UserInput(
            "no valid DNS name given".to_string(),
        ))
    }
}

/// Persists generated passphrases and removes files left for any other kind.
fn store_passphrase(passphrase: &Passphrase, path: &std::path::Path) -> Result<()> {
    passphrase::persist(passphrase, path)?;
    passphrase::reconcile(passphrase.origin(), path);
    Ok(())
}
