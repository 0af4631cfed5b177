//! Certificate lineage carried in repeated subject `dnQualifier` attributes.
//!
//! Each value has the form `<tag>:<value>`:
//!
//! | tag      | meaning                                  | count        |
//! |----------|------------------------------------------|--------------|
//! | `key`    | parameter holding the certificate's key  | exactly one  |
//! | `cakey`  | parameter holding the issuer's key       | zero or one  |
//! | `cacert` | parameter holding the issuer certificate | zero or one  |
//! | `path`   | path scanned for descendants (CA only)   | zero or more |
//!
//! The parameter store has no notion of parent and child, so this is the only
//! place the hierarchy is recorded. Keep every read and write of these
//! attributes behind [`encode`] and [`decode`].

use common::{CertificateDescriptor, PkiError};
use tracing::warn;

const KEY_TAG: &str = "key";
const CA_KEY_TAG: &str = "cakey";
const CA_CERT_TAG: &str = "cacert";
const PATH_TAG: &str = "path";

/// Relationship data decoded from a certificate subject.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Lineage {
    pub key_parameter_name: String,
    /// `None` for a self-signed certificate.
    pub ca_key_parameter_name: Option<String>,
    pub ca_cert_parameter_name: Option<String>,
    pub cascade_paths: Vec<String>,
}

impl Lineage {
    /// A certificate without an issuer key reference is a forest root.
    pub fn is_root(&self) -> bool {
        self.ca_key_parameter_name.is_none()
    }
}

/// Encode the lineage of `descriptor` as `dnQualifier` values.
///
/// Issuer references are only emitted for CA-signed requests; every cascade
/// path is emitted as given.
pub fn encode(descriptor: &CertificateDescriptor) -> Vec<String> {
    let mut values = vec![format!("{KEY_TAG}:{}", descriptor.key_parameter_name)];
    if !descriptor.self_signed {
        if let Some(ca_key) = &descriptor.ca_key_parameter_name {
            values.push(format!("{CA_KEY_TAG}:{ca_key}"));
        }
        if let Some(ca_cert) = &descriptor.ca_cert_parameter_name {
            values.push(format!("{CA_CERT_TAG}:{ca_cert}"));
        }
    }
    values.extend(
        descriptor
            .cert_parameters_paths
            .iter()
            .map(|p| format!("{PATH_TAG}:{p}")),
    );
    values
}

/// Decode `dnQualifier` values read from the certificate stored at `cert_name`.
///
/// Values are split on the first colon. Unknown tags and values without a
/// colon are logged and skipped.
///
/// # Errors
///
/// Returns [`PkiError::MissingIdentity`] if no `key` tag is present.
pub fn decode<I, S>(cert_name: &str, values: I) -> Result<Lineage, PkiError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut key = None;
    let mut lineage = Lineage::default();

    for value in values {
        let value = value.as_ref();
        let Some((tag, rest)) = value.split_once(':') else {
            warn!(cert = %cert_name, value = %value, "dnQualifier without a tag; ignoring");
            continue;
        };
        match tag {
            KEY_TAG => key = Some(rest.to_owned()),
            CA_KEY_TAG => lineage.ca_key_parameter_name = Some(rest.to_owned()),
            CA_CERT_TAG => lineage.ca_cert_parameter_name = Some(rest.to_owned()),
            PATH_TAG => lineage.cascade_paths.push(rest.to_owned()),
            other => warn!(cert = %cert_name, tag = %other, "unknown dnQualifier tag; ignoring"),
        }
    }

    lineage.key_parameter_name = key.ok_or_else(|| PkiError::MissingIdentity(cert_name.to_owned()))?;
    Ok(lineage)
}
