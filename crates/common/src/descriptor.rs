//! [`CertificateDescriptor`]: everything needed to issue or re-issue one certificate.
//!
//! The same shape is accepted by the issuance function, embedded in
//! CloudFormation custom resource properties, and written to the durable
//! renewal list, so it round-trips through JSON with PascalCase names.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PkiError;
use crate::lenient;

/// Asymmetric key algorithm of the generated key pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum KeyType {
    #[default]
    Rsa,
    Dsa,
}

impl KeyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyType::Rsa => "RSA",
            KeyType::Dsa => "DSA",
        }
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KeyType {
    type Err = PkiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "RSA" => Ok(KeyType::Rsa),
            "DSA" => Ok(KeyType::Dsa),
            other => Err(PkiError::UnsupportedKeyType(other.to_owned())),
        }
    }
}

impl TryFrom<String> for KeyType {
    type Error = PkiError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<KeyType> for String {
    fn from(value: KeyType) -> Self {
        value.as_str().to_owned()
    }
}

/// A name/value tag attached to a stored key or certificate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Subject alternative name extension. Only DNS names are supported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SubjectAlternativeName {
    #[serde(default, deserialize_with = "lenient::bool")]
    pub critical: bool,
    #[serde(rename = "DNS")]
    pub dns: Vec<String>,
}

/// Basic constraints extension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BasicConstraints {
    #[serde(default, deserialize_with = "lenient::bool")]
    pub critical: bool,
    #[serde(rename = "CA", default, deserialize_with = "lenient::bool")]
    pub ca: bool,
    /// `None` means no path length limit.
    #[serde(
        default,
        deserialize_with = "lenient::opt_u32",
        skip_serializing_if = "Option::is_none"
    )]
    pub path_length: Option<u32>,
}

/// Named key usage bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum KeyUsageBit {
    DigitalSignature,
    ContentCommitment,
    KeyEncipherment,
    DataEncipherment,
    KeyAgreement,
    KeyCertSign,
    CrlSign,
    EncipherOnly,
    DecipherOnly,
}

/// Key usage extension; bits absent from `usages` are cleared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct KeyUsage {
    #[serde(default, deserialize_with = "lenient::bool")]
    pub critical: bool,
    pub usages: BTreeSet<KeyUsageBit>,
}

/// Everything needed to issue one certificate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CertificateDescriptor {
    #[serde(default)]
    pub key_type: KeyType,
    #[serde(deserialize_with = "lenient::u32")]
    pub key_size: u32,
    #[serde(deserialize_with = "lenient::u32")]
    pub validity_days: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_or_province_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locality_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organizational_unit_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub common_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject_alternative_name: Option<SubjectAlternativeName>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub basic_constraints: Option<BasicConstraints>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_usage: Option<KeyUsage>,

    #[serde(default, deserialize_with = "lenient::bool")]
    pub self_signed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_key_parameter_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_cert_parameter_name: Option<String>,

    pub key_parameter_name: String,
    pub cert_parameter_name: String,

    #[serde(default)]
    pub key_tags: Vec<Tag>,
    #[serde(default)]
    pub cert_tags: Vec<Tag>,

    /// Parameter store paths scanned for certificates signed by this one.
    /// Required for CA certificates.
    #[serde(default)]
    pub cert_parameters_paths: Vec<String>,
}

impl CertificateDescriptor {
    /// Whether the basic constraints extension marks this certificate as a CA.
    pub fn is_ca(&self) -> bool {
        self.basic_constraints.as_ref().is_some_and(|bc| bc.ca)
    }

    /// Issuer key and certificate references, or `None` for a self-signed request.
    ///
    /// # Errors
    ///
    /// Returns [`PkiError::MissingIssuer`] if the request is not self-signed
    /// and either reference is missing or blank.
    pub fn issuer_refs(&self) -> Result<Option<(&str, &str)>, PkiError> {
        if self.self_signed {
            return Ok(None);
        }
        let key = non_blank(self.ca_key_parameter_name.as_deref())
            .ok_or(PkiError::MissingIssuer("CaKeyParameterName"))?;
        let cert = non_blank(self.ca_cert_parameter_name.as_deref())
            .ok_or(PkiError::MissingIssuer("CaCertParameterName"))?;
        Ok(Some((key, cert)))
    }

    /// Validate the request before any key material is generated.
    ///
    /// # Errors
    ///
    /// Returns the first violation found: [`PkiError::InvalidField`] for
    /// unusable sizes or blank references, [`PkiError::InvalidReference`] for
    /// references containing a comma, [`PkiError::MissingIssuer`] for a
    /// CA-signed request without issuer references, and
    /// [`PkiError::DataIntegrity`] for a CA without cascade paths.
    pub fn validate(&self) -> Result<(), PkiError> {
        if self.key_size == 0 {
            return Err(invalid("KeySize", "must be a positive integer"));
        }
        if self.validity_days == 0 {
            return Err(invalid("ValidityDays", "must be a positive integer"));
        }
        ensure_reference(&self.key_parameter_name, "KeyParameterName")?;
        ensure_reference(&self.cert_parameter_name, "CertParameterName")?;
        self.issuer_refs()?;
        if let Some(san) = &self.subject_alternative_name {
            if san.dns.is_empty() {
                return Err(invalid("SubjectAlternativeName", "at least one DNS name is required"));
            }
        }
        if self.is_ca() && self.cert_parameters_paths.is_empty() {
            return Err(PkiError::DataIntegrity(format!(
                "CA certificate {} must list the CertParametersPaths holding its descendants",
                self.cert_parameter_name
            )));
        }
        Ok(())
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

fn ensure_reference(value: &str, field: &'static str) -> Result<(), PkiError> {
    if value.trim().is_empty() {
        return Err(invalid(field, "must not be empty"));
    }
    if value.contains(',') {
        return Err(PkiError::InvalidReference {
            field,
            value: value.to_owned(),
        });
    }
    Ok(())
}

fn invalid(field: &'static str, reason: &str) -> PkiError {
    PkiError::InvalidField {
        field,
        reason: reason.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn leaf() -> CertificateDescriptor {
        serde_json::from_value(json!({
            "KeySize": 2048,
            "ValidityDays": 90,
            "CommonName": "arkcase.internal",
            "CaKeyParameterName": "/arkcase/pki/private/ca",
            "CaCertParameterName": "/arkcase/pki/certs/ca",
            "KeyParameterName": "/arkcase/pki/private/web",
            "CertParameterName": "/arkcase/pki/certs/web"
        }))
        .unwrap()
    }

    #[test]
    fn defaults_apply() {
        let d = leaf();
        assert_eq!(d.key_type, KeyType::Rsa);
        assert!(!d.self_signed);
        assert!(d.key_tags.is_empty());
        assert!(!d.is_ca());
        assert!(d.validate().is_ok());
    }

    #[test]
    fn cloudformation_strings_are_accepted() {
        let d: CertificateDescriptor = serde_json::from_value(json!({
            "KeyType": "DSA",
            "KeySize": "2048",
            "ValidityDays": "365",
            "SelfSigned": "true",
            "BasicConstraints": {"Critical": "true", "CA": "true", "PathLength": "1"},
            "KeyUsage": {"Usages": ["KeyCertSign", "CrlSign"]},
            "KeyParameterName": "/k",
            "CertParameterName": "/c",
            "CertParametersPaths": ["/arkcase/pki/certs"],
            "ServiceToken": "arn:aws:lambda:ignored"
        }))
        .unwrap();
        assert_eq!(d.key_type, KeyType::Dsa);
        assert_eq!(d.key_size, 2048);
        assert!(d.self_signed);
        let bc = d.basic_constraints.as_ref().unwrap();
        assert!(bc.critical && bc.ca);
        assert_eq!(bc.path_length, Some(1));
        assert!(d.key_usage.as_ref().unwrap().usages.contains(&KeyUsageBit::KeyCertSign));
        assert!(d.validate().is_ok());
    }

    #[test]
    fn unsupported_key_type_is_rejected() {
        let err = "ECDSA".parse::<KeyType>().unwrap_err();
        assert!(matches!(err, PkiError::UnsupportedKeyType(ref t) if t == "ECDSA"));
        let parsed = serde_json::from_value::<CertificateDescriptor>(json!({
            "KeyType": "ECDSA",
            "KeySize": 256,
            "ValidityDays": 1,
            "KeyParameterName": "/k",
            "CertParameterName": "/c"
        }));
        assert!(parsed.unwrap_err().to_string().contains("unsupported key type"));
    }

    #[test]
    fn comma_in_reference_is_rejected() {
        let mut d = leaf();
        d.key_parameter_name = "a,b".into();
        assert!(matches!(
            d.validate(),
            Err(PkiError::InvalidReference { field: "KeyParameterName", .. })
        ));

        let mut d = leaf();
        d.cert_parameter_name = "/certs/x,y".into();
        assert!(matches!(
            d.validate(),
            Err(PkiError::InvalidReference { field: "CertParameterName", .. })
        ));
    }

    #[test]
    fn ca_signed_request_requires_issuer() {
        let mut d = leaf();
        d.ca_key_parameter_name = None;
        assert!(matches!(d.validate(), Err(PkiError::MissingIssuer("CaKeyParameterName"))));

        let mut d = leaf();
        d.ca_cert_parameter_name = Some("  ".into());
        assert!(matches!(d.validate(), Err(PkiError::MissingIssuer("CaCertParameterName"))));
    }

    #[test]
    fn self_signed_ignores_issuer_refs() {
        let mut d = leaf();
        d.self_signed = true;
        d.ca_key_parameter_name = None;
        assert_eq!(d.issuer_refs().unwrap(), None);
    }

    #[test]
    fn ca_requires_cascade_paths() {
        let mut d = leaf();
        d.basic_constraints = Some(BasicConstraints {
            critical: true,
            ca: true,
            path_length: None,
        });
        assert!(matches!(d.validate(), Err(PkiError::DataIntegrity(_))));
        d.cert_parameters_paths = vec!["/arkcase/pki/certs".into()];
        assert!(d.validate().is_ok());
    }

    #[test]
    fn zero_sizes_are_rejected() {
        let mut d = leaf();
        d.validity_days = 0;
        assert!(matches!(d.validate(), Err(PkiError::InvalidField { field: "ValidityDays", .. })));
    }

    #[test]
    fn serialised_form_omits_absent_fields() {
        let value = serde_json::to_value(leaf()).unwrap();
        assert_eq!(value["KeyType"], "RSA");
        assert!(value.get("CountryName").is_none());
        assert!(value.get("BasicConstraints").is_none());
        let back: CertificateDescriptor = serde_json::from_value(value).unwrap();
        assert_eq!(back, leaf());
    }
}
