//! `arkcert`: private PKI kept in SSM Parameter Store.
//!
//! Certificates record their own lineage (private key, issuer key and
//! certificate, and for CAs the paths holding their descendants) in subject
//! `dnQualifier` attributes, so the issuer/subject forest can be rebuilt from a
//! flat parameter listing without a separate database. The forest drives
//! cascading and expiry-based renewal through a paginated, stateless driver.

pub mod aws;
pub mod cfn;
pub mod config;
pub mod graph;
pub mod handlers;
pub mod pki;
pub mod renewal;
pub mod store;
pub mod telemetry;
