//! PKCS#10 certificate signing requests.

use std::path::Path;

use const_oid::ObjectIdentifier;
use der::asn1::{Any, BitString, SetOfVec};
use der::{Decode, Encode};
use x509_cert::attr::Attribute;
use x509_cert::name::Name;
use x509_cert::request::{CertReq, CertReqInfo, Version};
use x509_cert::spki::SubjectPublicKeyInfoOwned;

use crate::cert::params::{DistinguishedName, ExtensionParam};
use crate::cert::{SignatureAlgorithm, der_to_pem, pem_to_der};
use crate::error::{Result, SimpleCertError};
use crate::key::{KeyPair, verify_signature};

pub const CSR_PEM_LABEL: &str = "CERTIFICATE REQUEST";

/// PKCS#9 extensionRequest attribute.
pub const EXTENSION_REQUEST: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.14");

#[derive(Debug, Clone)]
pub struct CertificateRequest {
    pub inner: CertReq,
}

impl CertificateRequest {
    /// Builds a request for `subject` signed by `key`, carrying
    /// `extensions` in an extensionRequest attribute.
    pub fn new(
        subject: &DistinguishedName,
        key: &KeyPair,
        extensions: &[ExtensionParam],
    ) -> Result<Self> {
        let mut attributes = Vec::new();
        if !extensions.is_empty() {
            let requested = extensions
                .iter()
                .map(ExtensionParam::to_x509)
                .collect::<Result<Vec<_>>>()?;
            attributes.push(Attribute {
                oid: EXTENSION_REQUEST,
                values: SetOfVec::try_from(vec![Any::encode_from(&requested)?])?,
            });
        }

        let info = CertReqInfo {
            version: Version::V1,
            subject: subject.as_x509_name()?,
            public_key: key.as_spki()?,
            attributes: SetOfVec::try_from(attributes)?,
        };

        let signature = key.sign_data(&info.to_der()?);

        Ok(Self {
            inner: CertReq {
                info,
                algorithm: SignatureAlgorithm::Sha256WithRSA.into(),
                signature: BitString::from_bytes(&signature)?,
            },
        })
    }

    pub fn to_pem(&self) -> Result<String> {
        Ok(der_to_pem(&self.inner.to_der()?, CSR_PEM_LABEL))
    }

    pub fn from_pem(pem: &str) -> Result<Self> {
        Ok(Self {
            inner: CertReq::from_der(&pem_to_der(pem, CSR_PEM_LABEL)?)?,
        })
    }

    pub fn from_pem_file(path: &Path) -> Result<Self> {
        Self::from_pem(&std::fs::read_to_string(path)?)
    }

    pub fn subject_name(&self) -> &Name {
        &self.inner.info.subject
    }

    pub fn subject(&self) -> Result<DistinguishedName> {
        DistinguishedName::from_x509_name(self.subject_name())
    }

    pub fn public_key(&self) -> &SubjectPublicKeyInfoOwned {
        &self.inner.info.public_key
    }

    /// Checks the request is signed by the key it carries.
    pub fn verify(&self) -> Result<()> {
        verify_signature(
            &self.inner.info.public_key,
            &self.inner.info.to_der()?,
            self.inner.signature.raw_bytes(),
        )
        .map_err(|e| SimpleCertError::Certificate(format!("CSR self-signature invalid: {e}")))
    }

    /// Extensions from the extensionRequest attribute, empty if absent.
    pub fn requested_extensions(&self) -> Result<Vec<ExtensionParam>> {
        let Some(attr) = self
            .inner
            .info
            .attributes
            .iter()
            .find(|attr| attr.oid == EXTENSION_REQUEST)
        else {
            return Ok(Vec::new());
        };

        let mut out = Vec::new();
        for value in attr.values.iter() {
            let extensions = Vec::<x509_cert::ext::Extension>::from_der(&value.to_der()?)?;
            out.extend(extensions.iter().map(ExtensionParam::from_x509));
        }
        Ok(out)
    }
}
