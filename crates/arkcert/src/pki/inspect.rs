//! Read-back of stored certificates: subject, extensions, validity and lineage.

use std::cmp::Ordering;

use common::descriptor::{BasicConstraints, KeyUsage, KeyUsageBit, SubjectAlternativeName};
use common::PkiError;
use openssl::nid::Nid;
use openssl::x509::{X509NameRef, X509};
use x509_parser::error::X509Error;
use x509_parser::extensions::GeneralName;

use super::builder::crypto;
use super::metadata::{self, Lineage};

/// Subject attributes requested at issuance, in the order they are written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubjectFields {
    pub country_name: Option<String>,
    pub state_or_province_name: Option<String>,
    pub locality_name: Option<String>,
    pub organization_name: Option<String>,
    pub organizational_unit_name: Option<String>,
    pub email_address: Option<String>,
    pub common_name: Option<String>,
}

/// A certificate loaded from the parameter store plus the fields the graph
/// and renewal code need.
#[derive(Debug, Clone)]
pub struct CertificateInfo {
    /// Parameter name the certificate was read from.
    pub name: String,
    pub x509: X509,
    pub subject: SubjectFields,
    pub dn_qualifiers: Vec<String>,
    pub subject_alternative_name: Option<SubjectAlternativeName>,
    pub basic_constraints: Option<BasicConstraints>,
    pub key_usage: Option<KeyUsage>,
    /// Unix timestamps, seconds.
    pub not_before: i64,
    pub not_after: i64,
}

impl CertificateInfo {
    /// Parse a PEM certificate stored under `name`.
    pub fn from_pem(name: &str, pem: &str) -> Result<Self, PkiError> {
        let x509 = X509::from_pem(pem.as_bytes())
            .map_err(|e| PkiError::Crypto(format!("failed to load certificate {name}: {e}")))?;
        Self::from_x509(name, x509)
    }

    pub fn from_x509(name: &str, x509: X509) -> Result<Self, PkiError> {
        let der = x509.to_der().map_err(crypto("encode certificate"))?;
        let (_, parsed) = x509_parser::parse_x509_certificate(&der)
            .map_err(|e| PkiError::Crypto(format!("failed to parse certificate {name}: {e}")))?;
        let ext_err = |e: X509Error| PkiError::Crypto(format!("malformed extension in {name}: {e}"));

        let subject_alternative_name = parsed
            .subject_alternative_name()
            .map_err(ext_err)?
            .map(|ext| SubjectAlternativeName {
                critical: ext.critical,
                dns: ext
                    .value
                    .general_names
                    .iter()
                    .filter_map(|gn| match gn {
                        GeneralName::DNSName(dns) => Some((*dns).to_owned()),
                        _ => None,
                    })
                    .collect(),
            });

        let basic_constraints = parsed
            .basic_constraints()
            .map_err(ext_err)?
            .map(|ext| BasicConstraints {
                critical: ext.critical,
                ca: ext.value.ca,
                path_length: ext.value.path_len_constraint,
            });

        let key_usage = parsed.key_usage().map_err(ext_err)?.map(|ext| {
            let ku = ext.value;
            let bits = [
                (ku.digital_signature(), KeyUsageBit::DigitalSignature),
                (ku.non_repudiation(), KeyUsageBit::ContentCommitment),
                (ku.key_encipherment(), KeyUsageBit::KeyEncipherment),
                (ku.data_encipherment(), KeyUsageBit::DataEncipherment),
                (ku.key_agreement(), KeyUsageBit::KeyAgreement),
                (ku.key_cert_sign(), KeyUsageBit::KeyCertSign),
                (ku.crl_sign(), KeyUsageBit::CrlSign),
                (ku.encipher_only(), KeyUsageBit::EncipherOnly),
                (ku.decipher_only(), KeyUsageBit::DecipherOnly),
            ];
            KeyUsage {
                critical: ext.critical,
                usages: bits
                    .into_iter()
                    .filter_map(|(set, bit)| set.then_some(bit))
                    .collect(),
            }
        });

        let not_before = parsed.validity().not_before.timestamp();
        let not_after = parsed.validity().not_after.timestamp();

        let subject_name = x509.subject_name();
        let subject = SubjectFields {
            country_name: first_entry(subject_name, Nid::COUNTRYNAME)?,
            state_or_province_name: first_entry(subject_name, Nid::STATEORPROVINCENAME)?,
            locality_name: first_entry(subject_name, Nid::LOCALITYNAME)?,
            organization_name: first_entry(subject_name, Nid::ORGANIZATIONNAME)?,
            organizational_unit_name: first_entry(subject_name, Nid::ORGANIZATIONALUNITNAME)?,
            email_address: first_entry(subject_name, Nid::PKCS9_EMAILADDRESS)?,
            common_name: first_entry(subject_name, Nid::COMMONNAME)?,
        };
        let dn_qualifiers = entries(subject_name, Nid::DNQUALIFIER)?;

        Ok(Self {
            name: name.to_owned(),
            subject,
            dn_qualifiers,
            subject_alternative_name,
            basic_constraints,
            key_usage,
            not_before,
            not_after,
            x509,
        })
    }

    /// Whether the basic constraints extension marks this certificate as a CA.
    pub fn is_ca(&self) -> bool {
        self.basic_constraints.as_ref().is_some_and(|bc| bc.ca)
    }

    /// Whether the subject and issuer names are identical.
    pub fn is_self_signed(&self) -> bool {
        matches!(
            self.x509.subject_name().try_cmp(self.x509.issuer_name()),
            Ok(Ordering::Equal)
        )
    }

    /// Decode the lineage embedded in the subject.
    pub fn lineage(&self) -> Result<Lineage, PkiError> {
        metadata::decode(&self.name, &self.dn_qualifiers)
    }

    /// Validity span in whole days.
    pub fn validity_days(&self) -> i64 {
        (self.not_after - self.not_before).div_euclid(86_400)
    }

    pub fn to_pem(&self) -> Result<String, PkiError> {
        let pem = self.x509.to_pem().map_err(crypto("encode certificate"))?;
        String::from_utf8(pem).map_err(|e| PkiError::Crypto(e.to_string()))
    }
}

fn entries(name: &X509NameRef, nid: Nid) -> Result<Vec<String>, PkiError> {
    name.entries_by_nid(nid)
        .map(|entry| {
            std::str::from_utf8(entry.data().as_slice())
                .map(str::to_owned)
                .map_err(|e| PkiError::Crypto(format!("failed to decode subject attribute: {e}")))
        })
        .collect()
}

fn first_entry(name: &X509NameRef, nid: Nid) -> Result<Option<String>, PkiError> {
    Ok(entries(name, nid)?.into_iter().next())
}
