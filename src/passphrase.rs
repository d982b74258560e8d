//! Passphrase acquisition, confirmation and persistence.
//!
//! Only generated passphrases are ever written to disk. Choosing a
//! passphrase yourself (or none) removes any file left by an earlier run.

use std::fmt;
use std::path::Path;

use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::error::{Result, SimpleCertError};
use crate::layout::write_private;
use crate::prompt::PromptProvider;
use crate::provider::CryptoProvider;

/// Shortest passphrase accepted from the user.
pub const MIN_PASSPHRASE_LEN: usize = 6;
/// Longest passphrase accepted from the user.
pub const MAX_PASSPHRASE_LEN: usize = 1023;

/// Where a passphrase value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassphraseOrigin {
    AutoGenerated,
    UserSupplied,
    None,
}

/// Whose key the passphrase protects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    CertificateAuthority,
    EndEntity,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::CertificateAuthority => f.write_str("CA"),
            Role::EndEntity => f.write_str("end-entity"),
        }
    }
}

/// How to obtain a passphrase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    AutoGenerate,
    PromptSupply,
    NoPassphrase,
}

/// A passphrase value and its origin. The value is wiped on drop.
#[derive(Clone, PartialEq, Eq)]
pub struct Passphrase {
    value: Zeroizing<String>,
    origin: PassphraseOrigin,
}

impl Passphrase {
    pub fn new(value: impl Into<String>, origin: PassphraseOrigin) -> Self {
        Self {
            value: Zeroizing::new(value.into()),
            origin,
        }
    }

    pub fn none() -> Self {
        Self::new(String::new(), PassphraseOrigin::None)
    }

    pub fn expose(&self) -> &str {
        &self.value
    }

    /// The value when non-empty, for APIs where `None` means unencrypted.
    pub fn as_option(&self) -> Option<&str> {
        Some(self.expose()).filter(|v| !v.is_empty())
    }

    pub fn origin(&self) -> PassphraseOrigin {
        self.origin
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }
}

impl fmt::Debug for Passphrase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Passphrase")
            .field("value", &"[REDACTED]")
            .field("origin", &self.origin)
            .finish()
    }
}

/// Checks a passphrase/confirmation pair.
pub fn validate_confirmation(password: &str, confirm: &str) -> Result<()> {
    if password.is_empty() {
        return Err(SimpleCertError::PassphraseMismatch(
            "The passphrase must not be empty".to_string(),
        ));
    }
    let len = password.chars().count();
    if len < MIN_PASSPHRASE_LEN {
        return Err(SimpleCertError::PassphraseMismatch(format!(
            "The passphrase must be at least {MIN_PASSPHRASE_LEN} characters"
        )));
    }
    if len > MAX_PASSPHRASE_LEN {
        return Err(SimpleCertError::PassphraseMismatch(format!(
            "The passphrase must be at most {MAX_PASSPHRASE_LEN} characters"
        )));
    }
    if password != confirm {
        return Err(SimpleCertError::PassphraseMismatch(
            "The passphrases do not match".to_string(),
        ));
    }
    Ok(())
}

/// Obtains passphrases through the crypto provider (generation) or the
/// prompt provider (user entry).
pub struct PassphraseManager<'a, C, P> {
    crypto: &'a C,
    prompt: &'a mut P,
}

impl<'a, C: CryptoProvider, P: PromptProvider> PassphraseManager<'a, C, P> {
    pub fn new(crypto: &'a C, prompt: &'a mut P) -> Self {
        Self { crypto, prompt }
    }

    /// `byte_count` random bytes as lowercase hex.
    pub fn auto_generate(&self, byte_count: usize) -> Result<Passphrase> {
        let mut hex = self.crypto.random_hex(byte_count)?;
        hex.retain(|c| c != '\r' && c != '\n');
        Ok(Passphrase::new(hex, PassphraseOrigin::AutoGenerated))
    }

    /// Asks for a passphrase and its confirmation until the pair is valid.
    pub fn prompt_supply_with_confirm(&mut self, role: Role) -> Result<Passphrase> {
        loop {
            let password = Zeroizing::new(
                self.prompt
                    .masked_text(&format!("Enter the {role} passphrase"))?,
            );
            let confirm = Zeroizing::new(
                self.prompt
                    .masked_text(&format!("Confirm the {role} passphrase"))?,
            );
            match validate_confirmation(&password, &confirm) {
                Ok(()) => {
                    return Ok(Passphrase::new(
                        password.as_str(),
                        PassphraseOrigin::UserSupplied,
                    ));
                }
                Err(err) => {
                    warn!(%role, "Rejected passphrase entry: {err}");
                    self.prompt.notify(&err.to_string());
                }
            }
        }
    }

    /// An empty passphrase: the key is stored unencrypted.
    pub fn no_passphrase(&self, role: Role) -> Result<Passphrase> {
        match role {
            Role::CertificateAuthority => Err(SimpleCertError::InvalidInput(
                "the CA private key must be passphrase protected".to_string(),
            )),
            Role::EndEntity => Ok(Passphrase::none()),
        }
    }

    /// `byte_count` is only used by [`Strategy::AutoGenerate`].
    pub fn acquire(&mut self, role: Role, strategy: Strategy, byte_count: usize) -> Result<Passphrase> {
        debug!(%role, ?strategy, "Acquiring passphrase");
        match strategy {
            Strategy::AutoGenerate => self.auto_generate(byte_count),
            Strategy::PromptSupply => self.prompt_supply_with_confirm(role),
            Strategy::NoPassphrase => self.no_passphrase(role),
        }
    }
}

/// Writes a generated passphrase to `path`; any other origin is a no-op.
pub fn persist(passphrase: &Passphrase, path: &Path) -> Result<()> {
    if passphrase.origin() != PassphraseOrigin::AutoGenerated {
        return Ok(());
    }
    write_private(path, passphrase.expose().as_bytes())?;
    info!(path = %path.display(), "Saved generated passphrase");
    Ok(())
}

/// Deletes a previously persisted passphrase unless `origin` is generated.
pub fn reconcile(origin: PassphraseOrigin, path: &Path) {
    if origin == PassphraseOrigin::AutoGenerated {
        return;
    }
    match std::fs::remove_file(path) {
        Ok(()) => info!(path = %path.display(), "Removed stale passphrase file"),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => warn!(path = %path.display(), "Could not remove passphrase file: {err}"),
    }
}

/// Reads a persisted passphrase. Missing, unreadable or empty files are `None`.
pub fn retrieve(path: &Path) -> Option<Passphrase> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => Zeroizing::new(text),
        Err(err) => {
            debug!(path = %path.display(), "No usable passphrase file: {err}");
            return None;
        }
    };
    let value = text.trim_end_matches(['\r', '\n']);
    if value.is_empty() {
        return None;
    }
    Some(Passphrase::new(value, PassphraseOrigin::AutoGenerated))
}
