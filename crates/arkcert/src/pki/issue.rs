//! [`CertificateIssuer`]: generate, sign, persist and optionally mirror one certificate.
//!
//! # Persistence
//!
//! The key and the certificate are written with overwrite semantics and
//! their tag sets are replaced wholesale, so issuing the same descriptor twice
//! leaves only the second key pair behind at the same references. A failure
//! between the two writes leaves a rotated key next to the previous
//! certificate; callers recover by issuing again.

use common::protocol::IssuedRefs;
use common::{CertificateDescriptor, PkiError, StoreError, Tag};
use openssl::pkey::{PKey, Private};
use openssl::x509::X509;
use tracing::{debug, info};

use super::builder::{self, Signer};
use super::inspect::CertificateInfo;
use super::keys;
use crate::store::{ParameterStore, ServerCertificateStore};

/// Longest issuer chain followed when assembling a trust chain.
pub const MAX_CHAIN_DEPTH: usize = 16;

/// Issues certificates against a parameter store and, for non-CA
/// certificates, a server certificate store.
pub struct CertificateIssuer<'a> {
    parameters: &'a dyn ParameterStore,
    server_certificates: Option<&'a dyn ServerCertificateStore>,
}

impl<'a> CertificateIssuer<'a> {
    /// Issuer that persists to `parameters` only.
    pub fn new(parameters: &'a dyn ParameterStore) -> Self {
        Self {
            parameters,
            server_certificates: None,
        }
    }

    /// Also mirror non-CA certificates to `store`.
    pub fn with_server_certificates(mut self, store: &'a dyn ServerCertificateStore) -> Self {
        self.server_certificates = Some(store);
        self
    }

    /// Issue the certificate described by `descriptor`.
    ///
    /// # Errors
    ///
    /// Validation errors are returned before any key is generated;
    /// [`PkiError::IssuerNotFound`] if an issuer reference does not resolve;
    /// [`PkiError::Store`] for any other store failure.
    pub async fn issue(&self, descriptor: &CertificateDescriptor) -> Result<IssuedRefs, PkiError> {
        descriptor.validate()?;
        let cert_name = descriptor.cert_parameter_name.as_str();
        let key_name = descriptor.key_parameter_name.as_str();

        let issuer = match descriptor.issuer_refs()? {
            Some((ca_key, ca_cert)) => Some(self.load_issuer(ca_key, ca_cert).await?),
            None => None,
        };

        info!(
            cert = %cert_name,
            key_type = %descriptor.key_type,
            key_size = descriptor.key_size,
            "generating private key"
        );
        let key = keys::generate(descriptor.key_type, descriptor.key_size)?;

        let signer = issuer.as_ref().map(|(ca_key, ca_cert)| Signer {
            cert: ca_cert,
            key: ca_key,
        });
        let cert = builder::build(descriptor, &key, signer)?;
        let cert = CertificateInfo::from_x509(cert_name, cert)?;
        match &descriptor.ca_cert_parameter_name {
            Some(ca) if !descriptor.self_signed => info!(cert = %cert_name, issuer = %ca, "certificate signed"),
            _ => info!(cert = %cert_name, "certificate self-signed"),
        }

        let key_pem = keys::to_pem(&key)?;
        let cert_pem = cert.to_pem()?;

        let key_parameter_arn = self
            .upsert(
                key_name,
                &key_pem,
                &format!("Private key for {cert_name}"),
                true,
                &descriptor.key_tags,
            )
            .await?;
        let cert_parameter_arn = self
            .upsert(
                cert_name,
                &cert_pem,
                &format!("X.509 certificate for {cert_name}"),
                false,
                &descriptor.cert_tags,
            )
            .await?;

        let server_certificate_arn = match self.server_certificates {
            Some(store) if !descriptor.is_ca() => {
                let chain = match &issuer {
                    Some((_, ca_cert)) => Some(self.trust_chain(ca_cert, cert_name).await?),
                    None => None,
                };
                mirror(store, cert_name, &cert_pem, &key_pem, chain).await?
            }
            Some(_) => {
                debug!(cert = %cert_name, "CA certificate; not mirrored");
                String::new()
            }
            None => String::new(),
        };

        info!(
            cert = %cert_name,
            key_arn = %key_parameter_arn,
            cert_arn = %cert_parameter_arn,
            server_certificate_arn = %server_certificate_arn,
            "certificate issued"
        );
        Ok(IssuedRefs {
            key_parameter_arn,
            cert_parameter_arn,
            server_certificate_arn,
        })
    }

    async fn load_issuer(
        &self,
        ca_key: &str,
        ca_cert: &str,
    ) -> Result<(PKey<Private>, X509), PkiError> {
        let key = self.parameters.get(ca_key, true).await.map_err(issuer_error)?;
        let cert = self.parameters.get(ca_cert, false).await.map_err(issuer_error)?;
        let key = keys::from_pem(ca_key, &key.value)?;
        let cert = X509::from_pem(cert.value.as_bytes())
            .map_err(|e| PkiError::Crypto(format!("failed to load certificate {ca_cert}: {e}")))?;
        Ok((key, cert))
    }

    /// Write a parameter and replace its tag set.
    async fn upsert(
        &self,
        name: &str,
        value: &str,
        description: &str,
        secure: bool,
        tags: &[Tag],
    ) -> Result<String, PkiError> {
        let arn = self.parameters.put(name, value, description, secure).await?;
        self.parameters.replace_tags(name, tags).await?;
        debug!(parameter = %name, tags = tags.len(), "parameter saved");
        Ok(arn)
    }

    /// PEM chain from `issuer` up to and including the first self-signed
    /// certificate, following each link's own `cacert` reference.
    ///
    /// # Errors
    ///
    /// [`PkiError::DataIntegrity`] if a link that is not self-signed has no
    /// `cacert` reference or the chain exceeds [`MAX_CHAIN_DEPTH`].
    pub async fn trust_chain(&self, issuer: &X509, cert_name: &str) -> Result<String, PkiError> {
        let mut link = CertificateInfo::from_x509(cert_name, issuer.clone())?;
        let mut chain = String::new();

        for _ in 0..MAX_CHAIN_DEPTH {
            chain.push_str(&link.to_pem()?);
            if link.is_self_signed() {
                return Ok(chain);
            }
            let next = link.lineage()?.ca_cert_parameter_name.ok_or_else(|| {
                PkiError::DataIntegrity(format!(
                    "certificate in the chain of {cert_name} is not self-signed but names no issuer"
                ))
            })?;
            let param = self.parameters.get(&next, false).await.map_err(issuer_error)?;
            link = CertificateInfo::from_pem(&next, &param.value)?;
        }

        Err(PkiError::DataIntegrity(format!(
            "trust chain of {cert_name} is deeper than {MAX_CHAIN_DEPTH} certificates"
        )))
    }
}

fn issuer_error(e: StoreError) -> PkiError {
    match e {
        StoreError::NotFound(name) => PkiError::IssuerNotFound(name),
        other => PkiError::Store(other),
    }
}

/// Split a certificate parameter name into a server certificate path and name.
///
/// The last `/` segment is the name; the rest is the path, which always
/// starts and ends with `/`.
pub fn server_certificate_location(cert_parameter_name: &str) -> (String, String) {
    let (path, name) = cert_parameter_name
        .rsplit_once('/')
        .unwrap_or(("", cert_parameter_name));
    let path = path.trim_matches('/');
    let path = if path.is_empty() {
        "/".to_owned()
    } else {
        format!("/{path}/")
    };
    (path, name.to_owned())
}

/// Upload to the server certificate store, replacing an existing entry.
async fn mirror(
    store: &dyn ServerCertificateStore,
    cert_name: &str,
    cert_pem: &str,
    key_pem: &str,
    chain: Option<String>,
) -> Result<String, PkiError> {
    let (path, name) = server_certificate_location(cert_name);
    info!(cert = %cert_name, path = %path, name = %name, "mirroring to server certificate store");

    match store
        .upload(&path, &name, cert_pem, key_pem, chain.clone())
        .await
    {
        Ok(arn) => Ok(arn),
        Err(StoreError::AlreadyExists(_)) => {
            info!(name = %name, "server certificate already exists; replacing it");
            store.delete(&name).await?;
            Ok(store.upload(&path, &name, cert_pem, key_pem, chain).await?)
        }
        Err(e) => Err(e.into()),
    }
}
