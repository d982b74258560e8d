use std::path::Path;

use der::asn1::BitString;
use pkcs8::pkcs5::pbes2;
use pkcs8::{LineEnding, PrivateKeyInfo};
use rand_core::{OsRng, RngCore};
use rsa::pkcs1v15::{Signature, SigningKey, VerifyingKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey};
use rsa::signature::{SignatureEncoding, Signer, Verifier};
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;
use x509_cert::spki::SubjectPublicKeyInfoOwned;
use zeroize::Zeroizing;

use crate::error::{Result, SimpleCertError};

/// PEM label OpenSSL uses for PBES2-protected PKCS#8 keys.
pub const ENCRYPTED_PEM_LABEL: &str = "ENCRYPTED PRIVATE KEY";

/// PBKDF2 iteration count, matching `openssl genpkey -aes256`.
pub const PBKDF2_ITERATIONS: u32 = 2048;

/// An RSA key pair.
#[derive(Clone)]
pub struct KeyPair {
    private: Box<RsaPrivateKey>,
    public: RsaPublicKey,
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("public", &self.public)
            .finish_non_exhaustive()
    }
}

impl KeyPair {
    /// Generate an RSA key pair with the specified number of bits.
    pub fn generate_rsa(bits: usize) -> Result<Self> {
        let private = RsaPrivateKey::new(&mut OsRng, bits)
            .map_err(|e| SimpleCertError::KeyGeneration(e.to_string()))?;
        let public = RsaPublicKey::from(&private);
        Ok(KeyPair {
            private: Box::new(private),
            public,
        })
    }

    /// Loads a PKCS#8 PEM key. Encrypted keys need the passphrase; a
    /// passphrase given for a plain key is ignored.
    pub fn from_pkcs8_pem(pem: &str, passphrase: Option<&str>) -> Result<Self> {
        let private = if is_encrypted_pem(pem) {
            let passphrase = passphrase.filter(|p| !p.is_empty()).ok_or_else(|| {
                SimpleCertError::InvalidInput("key is encrypted but no passphrase was given".into())
            })?;
            RsaPrivateKey::from_pkcs8_encrypted_pem(pem, passphrase.as_bytes())?
        } else {
            RsaPrivateKey::from_pkcs8_pem(pem)?
        };
        let public = RsaPublicKey::from(&private);
        Ok(KeyPair {
            private: Box::new(private),
            public,
        })
    }

    pub fn from_pem_file(path: &Path, passphrase: Option<&str>) -> Result<Self> {
        let pem = Zeroizing::new(std::fs::read_to_string(path)?);
        Self::from_pkcs8_pem(&pem, passphrase)
    }

    /// Encodes the private key as PKCS#8 PEM, encrypted when a non-empty
    /// passphrase is given.
    pub fn to_pkcs8_pem(&self, passphrase: Option<&str>) -> Result<Zeroizing<String>> {
        let Some(passphrase) = passphrase.filter(|p| !p.is_empty()) else {
            return Ok(self.private.to_pkcs8_pem(LineEnding::LF)?);
        };

        let plain = self.private.to_pkcs8_der()?;
        let info = PrivateKeyInfo::try_from(plain.as_bytes())?;

        let mut salt = [0u8; 16];
        let mut iv = [0u8; 16];
        OsRng.fill_bytes(&mut salt);
        OsRng.fill_bytes(&mut iv);
        let params = pbes2::Parameters::pbkdf2_sha256_aes256cbc(PBKDF2_ITERATIONS, &salt, &iv)
            .map_err(|e| SimpleCertError::Encoding(e.to_string()))?;

        let encrypted = info.encrypt_with_params(params, passphrase.as_bytes())?;
        encrypted
            .to_pem(ENCRYPTED_PEM_LABEL, LineEnding::LF)
            .map_err(|e| SimpleCertError::Encoding(e.to_string()))
    }

    /// Unencrypted PKCS#8 DER, as PKCS#12 key bags expect it.
    pub fn to_pkcs8_der(&self) -> Result<Zeroizing<Vec<u8>>> {
        let doc = self.private.to_pkcs8_der()?;
        Ok(Zeroizing::new(doc.as_bytes().to_vec()))
    }

    pub fn public_key(&self) -> &RsaPublicKey {
        &self.public
    }

    pub fn as_spki(&self) -> Result<SubjectPublicKeyInfoOwned> {
        Ok(SubjectPublicKeyInfoOwned::from_key(self.public.clone())?)
    }

    /// SHA-1 over the subject public key bits (RFC 5280 method 1).
    pub fn key_identifier(&self) -> Result<Vec<u8>> {
        Ok(key_identifier(&self.as_spki()?.subject_public_key))
    }

    /// RSASSA-PKCS1-v1_5 with SHA-256.
    pub fn sign_data(&self, data: &[u8]) -> Vec<u8> {
        let signing_key = SigningKey::<Sha256>::new(*self.private.clone());
        signing_key.sign(data).to_vec()
    }
}

pub fn key_identifier(public_key_bits: &BitString) -> Vec<u8> {
    <sha1::Sha1 as sha1::Digest>::digest(public_key_bits.raw_bytes()).to_vec()
}

/// Verifies an RSASSA-PKCS1-v1_5/SHA-256 signature made by the key in `spki`.
pub fn verify_signature(spki: &SubjectPublicKeyInfoOwned, data: &[u8], signature: &[u8]) -> Result<()> {
    let spki_der = der::Encode::to_der(spki)?;
    let public = RsaPublicKey::from_public_key_der(&spki_der)?;
    let signature = Signature::try_from(signature)
        .map_err(|e| SimpleCertError::Certificate(e.to_string()))?;
    VerifyingKey::<Sha256>::new(public)
        .verify(data, &signature)
        .map_err(|e| SimpleCertError::Certificate(format!("signature check failed: {e}")))
}

pub fn is_encrypted_pem(pem: &str) -> bool {
    pem.contains(&format!("BEGIN {ENCRYPTED_PEM_LABEL}"))
}
