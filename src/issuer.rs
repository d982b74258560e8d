use der::Encode;
use x509_cert::certificate::CertificateInner;
use x509_cert::name::Name;
use x509_cert::spki::SubjectPublicKeyInfoOwned;

use crate::cert::Certificate;
use crate::cert::SignatureAlgorithm;
use crate::cert::extensions::{AuthorityKeyIdentifier, SubjectKeyIdentifier};
use crate::cert::params::{ExtensionParam, Validity};
use crate::error::Result;
use crate::key::{KeyPair, key_identifier};
use crate::tbs_certificate::TbsCertificate;

/// What the issuer needs to know about the certificate it is about to sign.
#[derive(Debug, Clone)]
pub struct IssueParams {
    pub serial_number: Vec<u8>,
    pub subject: Name,
    pub subject_public_key: SubjectPublicKeyInfoOwned,
    pub validity: Validity,
    pub extensions: Vec<ExtensionParam>,
}

/// Represents an entity capable of issuing certificates.
pub trait Issuer {
    /// Returns the distinguished name of the issuer.
    fn issuer_name(&self) -> Name;

    /// Returns the signing key of the issuer.
    fn signing_key(&self) -> &KeyPair;

    /// Issues a certificate. Subject and authority key identifiers are
    /// appended to the requested extensions.
    fn issue(&self, params: &IssueParams) -> Result<Certificate> {
        let signature_algo = SignatureAlgorithm::Sha256WithRSA;

        let subject_key_id =
            SubjectKeyIdentifier(key_identifier(&params.subject_public_key.subject_public_key));
        let authority_key_id = AuthorityKeyIdentifier {
            key_identifier: self.signing_key().key_identifier()?,
        };

        let mut extensions = params.extensions.clone();
        extensions.push(ExtensionParam::from_extension(subject_key_id, false)?);
        extensions.push(ExtensionParam::from_extension(authority_key_id, false)?);

        let tbs_cert = TbsCertificate {
            serial_number: params.serial_number.clone(),
            signature_algorithm: signature_algo.clone(),
            issuer: self.issuer_name(),
            validity: params.validity.clone(),
            subject: params.subject.clone(),
            subject_public_key: params.subject_public_key.clone(),
            extensions,
        };

        let tbs_cert_inner = tbs_cert.to_tbs_certificate_inner()?;
        let signature = self.signing_key().sign_data(&tbs_cert_inner.to_der()?);

        let cert_inner = CertificateInner {
            tbs_certificate: tbs_cert_inner,
            signature_algorithm: signature_algo.into(),
            signature: der::asn1::BitString::from_bytes(&signature)?,
        };

        Ok(Certificate { inner: cert_inner })
    }
}
