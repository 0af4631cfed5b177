//! Key pair generation and PEM (de)serialisation.

use common::{KeyType, PkiError};
use openssl::dsa::Dsa;
use openssl::pkey::{Id, PKey, Private};
use openssl::rsa::Rsa;

/// Generate a fresh private key of the given type and size in bits.
///
/// # Errors
///
/// Returns [`PkiError::Crypto`] if the primitive rejects the size.
pub fn generate(key_type: KeyType, bits: u32) -> Result<PKey<Private>, PkiError> {
    let key = match key_type {
        KeyType::Rsa => Rsa::generate(bits).and_then(PKey::from_rsa),
        KeyType::Dsa => Dsa::generate(bits).and_then(PKey::from_dsa),
    };
    key.map_err(|e| PkiError::Crypto(format!("failed to generate {key_type} {bits}-bit key: {e}")))
}

/// PKCS#8 PEM encoding of `key`.
pub fn to_pem(key: &PKey<Private>) -> Result<String, PkiError> {
    let pem = key
        .private_key_to_pem_pkcs8()
        .map_err(|e| PkiError::Crypto(format!("failed to encode private key: {e}")))?;
    String::from_utf8(pem).map_err(|e| PkiError::Crypto(e.to_string()))
}

/// Load a PEM private key read from the parameter `name`.
pub fn from_pem(name: &str, pem: &str) -> Result<PKey<Private>, PkiError> {
    PKey::private_key_from_pem(pem.as_bytes())
        .map_err(|e| PkiError::Crypto(format!("failed to load private key {name}: {e}")))
}

/// Key type and size in bits of a stored key, as needed to re-issue it.
///
/// # Errors
///
/// Returns [`PkiError::UnsupportedKeyType`] for anything but RSA or DSA.
pub fn describe(key: &PKey<Private>) -> Result<(KeyType, u32), PkiError> {
    let key_type = match key.id() {
        Id::RSA => KeyType::Rsa,
        Id::DSA => KeyType::Dsa,
        other => return Err(PkiError::UnsupportedKeyType(format!("{other:?}"))),
    };
    Ok((key_type, key.bits()))
}
