use std::path::Path;

use tracing::{debug, warn};

use crate::layout::Layout;
use crate::passphrase;
use crate::provider::CryptoProvider;

/// Inspects the CA material on disk.
pub struct CaStateDetector<'a, C> {
    crypto: &'a C,
    layout: &'a Layout,
}

impl<'a, C: CryptoProvider> CaStateDetector<'a, C> {
    pub fn new(crypto: &'a C, layout: &'a Layout) -> Self {
        Self { crypto, layout }
    }

    /// Both the CA key and the CA certificate are present.
    pub fn ca_exists(&self) -> bool {
        let key = self.layout.ca_key().is_file();
        let cert = self.layout.ca_cert().is_file();
        debug!(key, cert, "Checked CA material");
        key && cert
    }

    /// Whether `candidate` decrypts the CA key. Provider errors count as no.
    pub fn is_passphrase_valid(&self, candidate: &str) -> bool {
        match self
            .crypto
            .verify_key_passphrase(&self.layout.ca_key(), candidate)
        {
            Ok(valid) => {
                debug!(valid, "Checked CA passphrase");
                valid
            }
            Err(err) => {
                debug!("CA passphrase check failed: {err}");
                false
            }
        }
    }

    /// Whether the passphrase stored at `path` decrypts the CA key.
    pub fn is_passphrase_file_valid(&self, path: &Path) -> bool {
        let Some(stored) = passphrase::retrieve(path) else {
            warn!(path = %path.display(), "No stored CA passphrase");
            return false;
        };
        match self
            .crypto
            .verify_key_passphrase(&self.layout.ca_key(), stored.expose())
        {
            Ok(true) => true,
            Ok(false) => {
                warn!(path = %path.display(), "Stored CA passphrase does not unlock the CA key");
                false
            }
            Err(err) => {
                warn!(path = %path.display(), "Could not check stored CA passphrase: {err}");
                false
            }
        }
    }
}
