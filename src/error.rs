//! use simplecert::error::SimpleCertError;

use thiserror::Error;

use crate::pipeline::Step;

/// Represents errors that can occur while operating the local CA.
///
/// The first five variants are the ones the orchestrator reasons about; the
/// rest are raised by the built-in cryptographic provider and the terminal
/// prompt.
#[derive(Debug, Error)]
pub enum SimpleCertError {
    /// A required answer was left empty (or invalid) on both attempts.
    #[error("User input error: {0}")]
    UserInput(String),

    /// Passphrase and confirmation differ or violate the length bounds.
    #[error("{0}")]
    PassphraseMismatch(String),

    /// The supplied CA passphrase does not decrypt the CA private key.
    #[error("The supplied passphrase does not unlock the CA private key")]
    PassphraseValidation,

    /// A pipeline step failed and the failure policy is fail-fast.
    #[error("Step '{step}' failed: {source}")]
    ProviderInvocation {
        step: Step,
        #[source]
        source: Box<SimpleCertError>,
    },

    /// Text produced by the provider (subject line, SAN config, serial) is malformed.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Error during data encoding.
    #[error("Failed to encode data: {0}")]
    Encoding(String),

    /// Error during data decoding.
    #[error("Failed to decode data: {0}")]
    Decoding(String),

    /// Error due to invalid input.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Error during key generation.
    #[error("Key generation error: {0}")]
    KeyGeneration(String),

    /// Error related to certificate operations.
    #[error("Certificate error: {0}")]
    Certificate(String),

    /// Error from RSA operations.
    #[error("RSA error: {0}")]
    Rsa(String),

    /// Error from PKCS#8 operations, including a wrong key passphrase.
    #[error("PKCS#8 error: {0}")]
    Pkcs8(String),

    /// Filesystem error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The interactive prompt failed (terminal closed, interrupted).
    #[error("Prompt error: {0}")]
    Prompt(String),
}

impl From<der::Error> for SimpleCertError {
    fn from(err: der::Error) -> Self {
        SimpleCertError::Decoding(err.to_string())
    }
}

impl From<rsa::Error> for SimpleCertError {
    fn from(err: rsa::Error) -> Self {
        SimpleCertError::Rsa(err.to_string())
    }
}

impl From<pkcs8::Error> for SimpleCertError {
    fn from(err: pkcs8::Error) -> Self {
        SimpleCertError::Pkcs8(err.to_string())
    }
}

impl From<pkcs8::spki::Error> for SimpleCertError {
    fn from(err: pkcs8::spki::Error) -> Self {
        SimpleCertError::Encoding(err.to_string())
    }
}

impl From<dialoguer::Error> for SimpleCertError {
    fn from(err: dialoguer::Error) -> Self {
        SimpleCertError::Prompt(err.to_string())
    }
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, SimpleCertError>;
