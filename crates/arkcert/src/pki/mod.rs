//! Private PKI primitives and the issuance engine.
//!
//! - [`metadata`] encodes certificate lineage into subject `dnQualifier`s.
//! - [`keys`], [`builder`] and [`inspect`] wrap the signing primitive.
//! - [`issue`] ties them to the parameter and server certificate stores.

pub mod builder;
pub mod inspect;
pub mod issue;
pub mod keys;
pub mod metadata;

pub use inspect::CertificateInfo;
pub use issue::CertificateIssuer;
pub use metadata::Lineage;
