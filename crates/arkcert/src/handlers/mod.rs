//! One handler per Lambda entry point.
//!
//! Handlers take the raw event payload so that a malformed request still
//! produces the uniform `{Success: false, Reason}` envelope instead of a
//! runtime-level deserialisation error.

pub mod certificate;
pub mod check;
pub mod notify;
pub mod renew;
pub mod resource;

use common::protocol::Outcome;
use common::PkiError;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::error;

/// Deserialise an event payload.
pub(crate) fn parse<T: DeserializeOwned>(payload: Value) -> Result<T, PkiError> {
    Ok(serde_json::from_value(payload)?)
}

/// Convert a handler result into the response envelope, logging failures.
pub(crate) fn envelope<T>(function: &str, result: Result<(String, T), PkiError>) -> Outcome<T> {
    match result {
        Ok((reason, data)) => Outcome::ok(reason, data),
        Err(e) => {
            error!(function, code = e.code(), error = %e, "request failed");
            Outcome::failed(e.to_string())
        }
    }
}
