//! Common error types shared across crates.

use thiserror::Error;

/// Errors raised by a store collaborator (parameter store, server
/// certificate store, blob store, workflow engine).
#[derive(Debug, Error)]
pub enum StoreError {
    /// The named entry does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// An entry with this name already exists and the store refuses to overwrite it.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Any other failure reported by the backing service.
    #[error("store backend error: {0}")]
    Backend(String),
}

/// Top-level error type of the certificate engine.
///
/// Every variant is raised where the condition is detected and propagated
/// unchanged to the entry point, which turns it into a
/// `{Success: false, Reason}` envelope.
#[derive(Debug, Error)]
pub enum PkiError {
    /// A key or certificate store reference contains a comma.
    #[error("{field} can't have commas: {value}")]
    InvalidReference { field: &'static str, value: String },

    /// A certificate that is not self-signed was requested without issuer references.
    #[error("`SelfSigned` is set to `false`, but `{0}` is not set")]
    MissingIssuer(&'static str),

    /// A certificate subject carries no `key:` dnQualifier.
    #[error("dnQualifier doesn't contain the key parameter name for certificate {0}")]
    MissingIdentity(String),

    /// The issuer key or certificate reference does not resolve.
    #[error("issuer not found: {0}")]
    IssuerNotFound(String),

    /// Key type other than RSA or DSA.
    #[error("unsupported key type: {0}")]
    UnsupportedKeyType(String),

    /// Stored certificates contradict the relationships they encode.
    #[error("data integrity violation: {0}")]
    DataIntegrity(String),

    /// A request field is present but unusable.
    #[error("invalid `{field}`: {reason}")]
    InvalidField { field: &'static str, reason: String },

    /// A certificate named by a request is not among the scanned certificates.
    #[error("certificate not found: {0}")]
    CertificateNotFound(String),

    /// The signing primitive failed (key generation, encoding, signing).
    #[error("crypto failure: {0}")]
    Crypto(String),

    /// A stored document or request could not be (de)serialised.
    #[error("serialization failure: {0}")]
    Serialization(String),

    /// A store collaborator failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl PkiError {
    /// Short, stable identifier for this error, used as a structured log field.
    pub fn code(&self) -> &'static str {
        match self {
            PkiError::InvalidReference { .. } => "invalid_reference",
            PkiError::MissingIssuer(_) => "missing_issuer",
            PkiError::MissingIdentity(_) => "missing_identity",
            PkiError::IssuerNotFound(_) => "issuer_not_found",
            PkiError::UnsupportedKeyType(_) => "unsupported_key_type",
            PkiError::DataIntegrity(_) => "data_integrity",
            PkiError::InvalidField { .. } => "invalid_field",
            PkiError::CertificateNotFound(_) => "certificate_not_found",
            PkiError::Crypto(_) => "crypto",
            PkiError::Serialization(_) => "serialization",
            PkiError::Store(_) => "store",
        }
    }
}

impl From<serde_json::Error> for PkiError {
    fn from(e: serde_json::Error) -> Self {
        PkiError::Serialization(e.to_string())
    }
}
