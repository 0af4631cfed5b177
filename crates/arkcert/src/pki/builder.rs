//! X.509 certificate construction and signing.

use common::descriptor::{BasicConstraints, KeyUsage, KeyUsageBit, SubjectAlternativeName};
use common::{CertificateDescriptor, PkiError};
use openssl::asn1::{Asn1Time, Asn1Type};
use openssl::bn::{BigNum, MsbOption};
use openssl::error::ErrorStack;
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkey::{PKeyRef, Private};
use openssl::x509::extension;
use openssl::x509::{X509Builder, X509Name, X509NameBuilder, X509NameRef, X509Ref, X509};
use tracing::warn;

use super::metadata;

const X509_VERSION_3: i32 = 2;
const SERIAL_BITS: i32 = 159;

/// Issuer certificate and key used to sign a CA-signed certificate.
#[derive(Clone, Copy)]
pub struct Signer<'a> {
    pub cert: &'a X509Ref,
    pub key: &'a PKeyRef<Private>,
}

/// Build and sign the certificate described by `descriptor` for `key`.
///
/// Without a `signer` the certificate is self-signed: the issuer name is the
/// subject and the signature is made with `key`. The validity window starts
/// now.
///
/// # Errors
///
/// Returns [`PkiError::Crypto`] if any field is rejected by the primitive.
pub fn build(
    descriptor: &CertificateDescriptor,
    key: &PKeyRef<Private>,
    signer: Option<Signer<'_>>,
) -> Result<X509, PkiError> {
    let subject = subject_name(descriptor)?;

    let mut builder = X509Builder::new().map_err(crypto("create X509 builder"))?;
    builder
        .set_version(X509_VERSION_3)
        .map_err(crypto("set version"))?;

    let mut serial = BigNum::new().map_err(crypto("allocate serial"))?;
    serial
        .rand(SERIAL_BITS, MsbOption::MAYBE_ZERO, false)
        .map_err(crypto("generate serial"))?;
    let serial = serial.to_asn1_integer().map_err(crypto("encode serial"))?;
    builder
        .set_serial_number(&serial)
        .map_err(crypto("set serial"))?;

    builder
        .set_subject_name(&subject)
        .map_err(crypto("set subject"))?;
    let issuer_name: &X509NameRef = match signer {
        Some(s) => s.cert.subject_name(),
        None => &subject,
    };
    builder
        .set_issuer_name(issuer_name)
        .map_err(crypto("set issuer"))?;

    let not_before = Asn1Time::days_from_now(0).map_err(crypto("compute not_before"))?;
    let not_after =
        Asn1Time::days_from_now(descriptor.validity_days).map_err(crypto("compute not_after"))?;
    builder
        .set_not_before(&not_before)
        .map_err(crypto("set not_before"))?;
    builder
        .set_not_after(&not_after)
        .map_err(crypto("set not_after"))?;

    builder.set_pubkey(key).map_err(crypto("set public key"))?;

    if let Some(san) = &descriptor.subject_alternative_name {
        let ext = subject_alternative_name(san)
            .build(&builder.x509v3_context(signer.map(|s| s.cert), None))
            .map_err(crypto("build SubjectAlternativeName"))?;
        builder
            .append_extension(ext)
            .map_err(crypto("add SubjectAlternativeName"))?;
    }
    if let Some(bc) = &descriptor.basic_constraints {
        let ext = basic_constraints(bc)
            .build()
            .map_err(crypto("build BasicConstraints"))?;
        builder
            .append_extension(ext)
            .map_err(crypto("add BasicConstraints"))?;
    }
    if let Some(ku) = &descriptor.key_usage {
        if ku.usages.is_empty() {
            warn!(cert = %descriptor.cert_parameter_name, "KeyUsage lists no usages; extension omitted");
        } else {
            let ext = key_usage(ku).build().map_err(crypto("build KeyUsage"))?;
            builder
                .append_extension(ext)
                .map_err(crypto("add KeyUsage"))?;
        }
    }

    let signing_key = signer.map_or(key, |s| s.key);
    builder
        .sign(signing_key, MessageDigest::sha256())
        .map_err(crypto("sign certificate"))?;

    Ok(builder.build())
}

/// Subject name: the requested attributes followed by the encoded lineage.
fn subject_name(descriptor: &CertificateDescriptor) -> Result<X509Name, PkiError> {
    let mut name = X509NameBuilder::new().map_err(crypto("create name builder"))?;

    let attributes = [
        (Nid::COUNTRYNAME, &descriptor.country_name),
        (Nid::STATEORPROVINCENAME, &descriptor.state_or_province_name),
        (Nid::LOCALITYNAME, &descriptor.locality_name),
        (Nid::ORGANIZATIONNAME, &descriptor.organization_name),
        (Nid::ORGANIZATIONALUNITNAME, &descriptor.organizational_unit_name),
        (Nid::PKCS9_EMAILADDRESS, &descriptor.email_address),
        (Nid::COMMONNAME, &descriptor.common_name),
    ];
    for (nid, value) in attributes {
        if let Some(value) = value {
            name.append_entry_by_nid(nid, value)
                .map_err(|e| PkiError::Crypto(format!("invalid {} {value:?}: {e}", nid_name(nid))))?;
        }
    }

    // PrintableString has no '/' or '_', which parameter names are full of.
    for value in metadata::encode(descriptor) {
        name.append_entry_by_nid_with_type(Nid::DNQUALIFIER, &value, Asn1Type::UTF8STRING)
            .map_err(crypto("append dnQualifier"))?;
    }

    Ok(name.build())
}

fn subject_alternative_name(san: &SubjectAlternativeName) -> extension::SubjectAlternativeName {
    let mut ext = extension::SubjectAlternativeName::new();
    if san.critical {
        ext.critical();
    }
    for dns in &san.dns {
        ext.dns(dns);
    }
    ext
}

fn basic_constraints(bc: &BasicConstraints) -> extension::BasicConstraints {
    let mut ext = extension::BasicConstraints::new();
    if bc.critical {
        ext.critical();
    }
    if bc.ca {
        ext.ca();
        if let Some(len) = bc.path_length {
            ext.pathlen(len);
        }
    }
    ext
}

fn key_usage(ku: &KeyUsage) -> extension::KeyUsage {
    let mut ext = extension::KeyUsage::new();
    if ku.critical {
        ext.critical();
    }
    for usage in &ku.usages {
        match usage {
            KeyUsageBit::DigitalSignature => ext.digital_signature(),
            KeyUsageBit::ContentCommitment => ext.non_repudiation(),
            KeyUsageBit::KeyEncipherment => ext.key_encipherment(),
            KeyUsageBit::DataEncipherment => ext.data_encipherment(),
            KeyUsageBit::KeyAgreement => ext.key_agreement(),
            KeyUsageBit::KeyCertSign => ext.key_cert_sign(),
            KeyUsageBit::CrlSign => ext.crl_sign(),
            KeyUsageBit::EncipherOnly => ext.encipher_only(),
            KeyUsageBit::DecipherOnly => ext.decipher_only(),
        };
    }
    ext
}

fn nid_name(nid: Nid) -> &'static str {
    nid.short_name().unwrap_or("attribute")
}

pub(crate) fn crypto(context: &'static str) -> impl Fn(ErrorStack) -> PkiError {
    move |e| PkiError::Crypto(format!("failed to {context}: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pki::inspect::CertificateInfo;
    use crate::pki::keys;
    use common::KeyType;
    use serde_json::json;

    fn root_descriptor() -> CertificateDescriptor {
        serde_json::from_value(json!({
            "KeySize": 2048,
            "ValidityDays": 3650,
            "CountryName": "US",
            "OrganizationName": "ArkCase",
            "CommonName": "ArkCase Root CA",
            "BasicConstraints": {"Critical": true, "CA": true, "PathLength": 1},
            "KeyUsage": {"Critical": true, "Usages": ["KeyCertSign", "CrlSign"]},
            "SelfSigned": true,
            "KeyParameterName": "/pki/private/root_ca",
            "CertParameterName": "/pki/certs/root_ca",
            "CertParametersPaths": ["/pki/certs"]
        }))
        .unwrap()
    }

    fn leaf_descriptor() -> CertificateDescriptor {
        serde_json::from_value(json!({
            "KeySize": 2048,
            "ValidityDays": 30,
            "CommonName": "web.arkcase.internal",
            "SubjectAlternativeName": {"DNS": ["web.arkcase.internal", "web"]},
            "KeyUsage": {"Usages": ["DigitalSignature", "KeyEncipherment"]},
            "CaKeyParameterName": "/pki/private/root_ca",
            "CaCertParameterName": "/pki/certs/root_ca",
            "KeyParameterName": "/pki/private/web",
            "CertParameterName": "/pki/certs/web"
        }))
        .unwrap()
    }

    #[test]
    fn self_signed_root_verifies_with_own_key() {
        let key = keys::generate(KeyType::Rsa, 2048).unwrap();
        let cert = build(&root_descriptor(), &key, None).unwrap();
        assert!(cert.verify(&key).unwrap());

        let info = CertificateInfo::from_x509("/pki/certs/root_ca", cert).unwrap();
        assert!(info.is_self_signed());
        assert!(info.is_ca());
        assert_eq!(info.lineage().unwrap().cascade_paths, vec!["/pki/certs"]);
        let bc = info.basic_constraints.unwrap();
        assert!(bc.critical);
        assert_eq!(bc.path_length, Some(1));
    }

    #[test]
    fn leaf_is_signed_by_issuer() {
        let ca_key = keys::generate(KeyType::Rsa, 2048).unwrap();
        let ca_cert = build(&root_descriptor(), &ca_key, None).unwrap();
        let key = keys::generate(KeyType::Rsa, 2048).unwrap();
        let signer = Signer {
            cert: &ca_cert,
            key: &ca_key,
        };

        let cert = build(&leaf_descriptor(), &key, Some(signer)).unwrap();
        assert!(cert.verify(&ca_key).unwrap());
        assert!(!cert.verify(&key).unwrap());

        let info = CertificateInfo::from_x509("/pki/certs/web", cert).unwrap();
        assert!(!info.is_self_signed());
        assert!(!info.is_ca());
        let san = info.subject_alternative_name.clone().unwrap();
        assert_eq!(san.dns, vec!["web.arkcase.internal", "web"]);
        let lineage = info.lineage().unwrap();
        assert_eq!(lineage.ca_cert_parameter_name.as_deref(), Some("/pki/certs/root_ca"));
    }

    #[test]
    fn serials_differ_between_issuances() {
        let key = keys::generate(KeyType::Rsa, 2048).unwrap();
        let a = build(&root_descriptor(), &key, None).unwrap();
        let b = build(&root_descriptor(), &key, None).unwrap();
        let a = a.serial_number().to_bn().unwrap();
        let b = b.serial_number().to_bn().unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn dsa_keys_can_sign() {
        let key = keys::generate(KeyType::Dsa, 1024).unwrap();
        let mut d = root_descriptor();
        d.key_type = KeyType::Dsa;
        d.key_size = 1024;
        let cert = build(&d, &key, None).unwrap();
        assert!(cert.verify(&key).unwrap());
    }

    #[test]
    fn invalid_country_is_a_crypto_error() {
        let key = keys::generate(KeyType::Rsa, 2048).unwrap();
        let mut d = root_descriptor();
        d.country_name = Some("United States".into());
        assert!(matches!(build(&d, &key, None), Err(PkiError::Crypto(_))));
    }
}
