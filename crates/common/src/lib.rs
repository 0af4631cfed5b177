//! Common types, protocol definitions, and errors shared across the `arkcert` crates.

pub mod descriptor;
pub mod error;
pub mod lenient;
pub mod protocol;

pub use descriptor::{CertificateDescriptor, KeyType, Tag};
pub use error::{PkiError, StoreError};
