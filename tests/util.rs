#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fs;
use std::path::Path;

use simplecert::config::{FailurePolicy, PkiConfig};
use simplecert::error::{Result, SimpleCertError};
use simplecert::prompt::PromptProvider;
use simplecert::provider::{
    CryptoProvider, CsrRequest, Pkcs12Request, RootCertRequest, SignRequest,
};
use simplecert::san::RequestExtensions;

/// Config for a temp data root. Key sizes are the smallest accepted so the
/// real provider stays fast in debug builds.
pub fn test_config(root: &Path, policy: FailurePolicy) -> PkiConfig {
    PkiConfig::builder()
        .data_root(root)
        .ca_key_bits(1024)
        .end_entity_key_bits(1024)
        .failure_policy(policy)
        .build()
}

/// One scripted answer.
#[derive(Debug, Clone)]
pub enum Answer {
    Text(&'static str),
    Choice(usize),
    YesNo(bool),
    Masked(&'static str),
}

/// Replays answers in order. Running out of answers behaves like a closed
/// terminal.
#[derive(Debug, Default)]
pub struct ScriptedPrompt {
    answers: VecDeque<Answer>,
    pub questions: Vec<String>,
    pub notices: Vec<String>,
}

impl ScriptedPrompt {
    pub fn new(answers: impl IntoIterator<Item = Answer>) -> Self {
        Self {
            answers: answers.into_iter().collect(),
            ..Default::default()
        }
    }

    pub fn remaining(&self) -> usize {
        self.answers.len()
    }

    fn next(&mut self, question: &str) -> Result<Answer> {
        self.questions.push(question.to_string());
        self.answers
            .pop_front()
            .ok_or_else(|| SimpleCertError::Prompt(format!("script exhausted at '{question}'")))
    }
}

impl PromptProvider for ScriptedPrompt {
    fn free_text(&mut self, question: &str, _required: bool) -> Result<String> {
        match self.next(question)? {
            Answer::Text(text) => Ok(text.to_string()),
            other => panic!("expected text for '{question}', script has {other:?}"),
        }
    }

    fn single_choice(&mut self, question: &str, _options: &[&str]) -> Result<usize> {
        match self.next(question)? {
            Answer::Choice(index) => Ok(index),
            other => panic!("expected a choice for '{question}', script has {other:?}"),
        }
    }

    fn yes_no(&mut self, question: &str) -> Result<bool> {
        match self.next(question)? {
            Answer::YesNo(answer) => Ok(answer),
            other => panic!("expected yes/no for '{question}', script has {other:?}"),
        }
    }

    fn masked_text(&mut self, question: &str) -> Result<String> {
        match self.next(question)? {
            Answer::Masked(text) => Ok(text.to_string()),
            other => panic!("expected masked text for '{question}', script has {other:?}"),
        }
    }

    fn notify(&mut self, message: &str) {
        self.notices.push(message.to_string());
    }
}

/// File-backed stand-in for the crypto provider. Keys record their
/// passphrase in clear, certificates record their subject and SAN list.
#[derive(Debug, Default)]
pub struct FakeCrypto {
    pub calls: RefCell<Vec<&'static str>>,
    pub fail_on: Option<&'static str>,
    counter: Cell<u8>,
}

impl FakeCrypto {
    pub fn failing_on(call: &'static str) -> Self {
        Self {
            fail_on: Some(call),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.borrow().clone()
    }

    fn record(&self, call: &'static str) -> Result<()> {
        self.calls.borrow_mut().push(call);
        if self.fail_on == Some(call) {
            return Err(SimpleCertError::Certificate(format!("{call} failed")));
        }
        Ok(())
    }

    fn unlock(key: &Path, passphrase: Option<&str>) -> Result<()> {
        let stored = key_passphrase(key)?;
        if !stored.is_empty() && Some(stored.as_str()) != passphrase {
            return Err(SimpleCertError::Pkcs8("bad decrypt".to_string()));
        }
        Ok(())
    }
}

/// Passphrase recorded in a fake key file.
pub fn key_passphrase(key: &Path) -> Result<String> {
    let text = fs::read_to_string(key)?;
    Ok(text.lines().nth(1).unwrap_or_default().to_string())
}

/// SAN list recorded in a fake certificate.
pub fn fake_cert_dns(cert: &Path) -> Vec<String> {
    let text = fs::read_to_string(cert).unwrap();
    text.lines()
        .nth(1)
        .unwrap()
        .split(',')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

impl CryptoProvider for FakeCrypto {
    fn generate_rsa_key(&self, bits: usize, passphrase: Option<&str>, key_out: &Path) -> Result<()> {
        self.record("generate_rsa_key")?;
        fs::write(key_out, format!("FAKE RSA {bits}\n{}\n", passphrase.unwrap_or_default()))?;
        Ok(())
    }

    fn self_sign_root(&self, request: &RootCertRequest<'_>) -> Result<()> {
        self.record("self_sign_root")?;
        Self::unlock(request.key, Some(request.passphrase))?;
        fs::write(
            request.cert_out,
            format!("{}\n\n", request.subject.to_rdn_string()),
        )?;
        Ok(())
    }

    fn generate_csr(&self, request: &CsrRequest<'_>) -> Result<()> {
        self.record("generate_csr")?;
        Self::unlock(request.key, request.passphrase)?;
        let extensions = RequestExtensions::from_config(&fs::read_to_string(request.san_config)?)?;
        fs::write(
            request.csr_out,
            format!(
                "{}\n{}\n",
                request.subject.to_rdn_string(),
                extensions.dns_names().join(",")
            ),
        )?;
        Ok(())
    }

    fn sign_certificate(&self, request: &SignRequest<'_>) -> Result<()> {
        self.record("sign_certificate")?;
        Self::unlock(request.ca_key, Some(request.ca_passphrase))?;
        let csr = fs::read_to_string(request.csr)?;
        let serial = u64::from_str_radix(fs::read_to_string(request.serial_file)?.trim(), 16)
            .map_err(|e| SimpleCertError::Parse(e.to_string()))?;
        fs::write(request.cert_out, csr)?;
        fs::write(request.serial_file, format!("{:X}\n", serial + 1))?;
        Ok(())
    }

    fn export_pkcs12(&self, request: &Pkcs12Request<'_>) -> Result<()> {
        self.record("export_pkcs12")?;
        Self::unlock(request.key, request.key_passphrase)?;
        let cert = fs::read_to_string(request.cert)?;
        fs::write(
            request.p12_out,
            format!("P12 {}\n{cert}", request.export_passphrase),
        )?;
        Ok(())
    }

    fn read_subject(&self, cert: &Path) -> Result<String> {
        self.record("read_subject")?;
        let text = fs::read_to_string(cert)?;
        Ok(text.lines().next().unwrap_or_default().to_string())
    }

    fn verify_key_passphrase(&self, key: &Path, passphrase: &str) -> Result<bool> {
        self.record("verify_key_passphrase")?;
        let stored = key_passphrase(key)?;
        Ok(!stored.is_empty() && stored == passphrase)
    }

    fn random_hex(&self, byte_count: usize) -> Result<String> {
        self.record("random_hex")?;
        let seed = self.counter.get();
        self.counter.set(seed.wrapping_add(1));
        let mut hex: String = (0..byte_count)
            .map(|i| format!("{:02x}", (i as u8).wrapping_mul(37).wrapping_add(seed)))
            .collect();
        hex.push('\n');
        Ok(hex)
    }
}
