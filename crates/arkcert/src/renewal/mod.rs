//! Paginated renewal: descriptor reconstruction, list publication and the
//! one-certificate-per-invocation step driver.
//!
//! # Protocol
//!
//! 1. The selected certificates are turned back into descriptors
//!    ([`renewal_descriptor`]) and written as one JSON array to the blob store
//!    ([`publish`]), which returns the initial [`RenewalState`].
//! 2. An external workflow calls [`RenewalDriver::step`] with the previous
//!    state until `IsFinished` is true. Each step re-issues exactly one
//!    certificate.
//!
//! The driver holds nothing between steps; all progress is in the state.

use common::protocol::RenewalState;
use common::{CertificateDescriptor, PkiError};
use tracing::{info, warn};
use uuid::Uuid;

use crate::graph::CertificateNode;
use crate::pki::{keys, CertificateIssuer};
use crate::store::{BlobStore, ParameterStore};

/// Rebuild the descriptor that re-issues `node` with the same subject,
/// extensions, key type and size, tags, lineage and validity span.
///
/// # Errors
///
/// [`PkiError::Store`] if the key or tags cannot be read,
/// [`PkiError::UnsupportedKeyType`] for a key that is neither RSA nor DSA, and
/// [`PkiError::DataIntegrity`] for a certificate with an empty validity span.
pub async fn renewal_descriptor(
    store: &dyn ParameterStore,
    node: &CertificateNode,
) -> Result<CertificateDescriptor, PkiError> {
    let lineage = &node.lineage;
    let cert = &node.certificate;

    let key = store.get(&lineage.key_parameter_name, true).await?;
    let key = keys::from_pem(&lineage.key_parameter_name, &key.value)?;
    let (key_type, key_size) = keys::describe(&key)?;

    let validity_days = u32::try_from(cert.validity_days())
        .ok()
        .filter(|d| *d > 0)
        .ok_or_else(|| {
            PkiError::DataIntegrity(format!(
                "certificate {} has no usable validity span",
                node.cert_parameter_name
            ))
        })?;

    let key_tags = store.list_tags(&lineage.key_parameter_name).await?;
    let cert_tags = store.list_tags(&node.cert_parameter_name).await?;

    let subject = cert.subject.clone();
    Ok(CertificateDescriptor {
        key_type,
        key_size,
        validity_days,
        country_name: subject.country_name,
        state_or_province_name: subject.state_or_province_name,
        locality_name: subject.locality_name,
        organization_name: subject.organization_name,
        organizational_unit_name: subject.organizational_unit_name,
        email_address: subject.email_address,
        common_name: subject.common_name,
        subject_alternative_name: cert.subject_alternative_name.clone(),
        basic_constraints: cert.basic_constraints.clone(),
        key_usage: cert.key_usage.clone(),
        self_signed: lineage.is_root(),
        ca_key_parameter_name: lineage.ca_key_parameter_name.clone(),
        ca_cert_parameter_name: lineage.ca_cert_parameter_name.clone(),
        key_parameter_name: lineage.key_parameter_name.clone(),
        cert_parameter_name: node.cert_parameter_name.clone(),
        key_tags,
        cert_tags,
        cert_parameters_paths: lineage.cascade_paths.clone(),
    })
}

/// Write `descriptors` to `bucket` under a fresh key below `prefix` and
/// return the initial driver state.
pub async fn publish(
    blobs: &dyn BlobStore,
    bucket: &str,
    prefix: &str,
    descriptors: &[CertificateDescriptor],
) -> Result<RenewalState, PkiError> {
    let key = format!("{prefix}{}.json", Uuid::new_v4());
    let body = serde_json::to_vec(descriptors)?;
    blobs.put(bucket, &key, body).await?;
    info!(bucket = %bucket, key = %key, count = descriptors.len(), "renewal list published");
    Ok(RenewalState::new(bucket, key, descriptors.len()))
}

/// Advance `state` past the current index.
pub fn advance(mut state: RenewalState) -> RenewalState {
    state.index += 1;
    state.is_finished = state.index >= state.count;
    state
}

/// Re-issues one stored descriptor per call.
pub struct RenewalDriver<'a> {
    blobs: &'a dyn BlobStore,
    issuer: &'a CertificateIssuer<'a>,
}

impl<'a> RenewalDriver<'a> {
    pub fn new(blobs: &'a dyn BlobStore, issuer: &'a CertificateIssuer<'a>) -> Self {
        Self { blobs, issuer }
    }

    /// Re-issue the certificate at `state.index` and return the next state.
    ///
    /// A finished state is returned unchanged. An unfinished state whose
    /// index is already at or past `Count` is returned with `IsFinished` set,
    /// so a workflow looping on that flag still terminates.
    ///
    /// # Errors
    ///
    /// [`PkiError::DataIntegrity`] if the stored list is shorter than
    /// `Count`; any issuance error for the current descriptor.
    pub async fn step(&self, state: RenewalState) -> Result<RenewalState, PkiError> {
        if state.is_finished {
            return Ok(state);
        }
        if state.index >= state.count {
            return Ok(RenewalState {
                is_finished: true,
                ..state
            });
        }

        let body = self.blobs.get(&state.s3_bucket, &state.s3_key).await?;
        let descriptors: Vec<CertificateDescriptor> = serde_json::from_slice(&body)?;
        if descriptors.len() != state.count {
            warn!(
                key = %state.s3_key,
                stored = descriptors.len(),
                count = state.count,
                "renewal list length differs from state"
            );
        }
        let descriptor = descriptors.get(state.index).ok_or_else(|| {
            PkiError::DataIntegrity(format!(
                "renewal list {} has no entry {}",
                state.s3_key, state.index
            ))
        })?;

        info!(
            cert = %descriptor.cert_parameter_name,
            index = state.index,
            count = state.count,
            "renewing certificate"
        );
        self.issuer.issue(descriptor).await?;

        Ok(advance(state))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::tests::populate;
    use crate::graph::{select, Forest};
    use crate::pki::CertificateInfo;
    use crate::store::memory::{MemoryBlobStore, MemoryParameterStore};
    use common::Tag;

    async fn forest(store: &MemoryParameterStore) -> Forest {
        Forest::build(store, &["/pki/certs".into()], 10).await.unwrap()
    }

    #[tokio::test]
    async fn descriptor_reproduces_the_stored_certificate() {
        let store = populate(&[("root", None, true, 3650), ("leaf", Some("root"), false, 90)]).await;
        store
            .replace_tags("/pki/certs/leaf", &[Tag::new("app", "arkcase")])
            .await
            .unwrap();
        let f = forest(&store).await;

        let leaf = f.node(f.find("/pki/certs/leaf").unwrap());
        let d = renewal_descriptor(&store, leaf).await.unwrap();
        assert_eq!(d.key_type, common::KeyType::Rsa);
        assert_eq!(d.key_size, 1024);
        assert_eq!(d.validity_days, 90);
        assert_eq!(d.common_name.as_deref(), Some("leaf"));
        assert!(!d.self_signed);
        assert_eq!(d.ca_cert_parameter_name.as_deref(), Some("/pki/certs/root"));
        assert_eq!(d.key_parameter_name, "/pki/private/leaf");
        assert_eq!(d.cert_tags, vec![Tag::new("app", "arkcase")]);
        assert!(d.key_tags.is_empty());
        assert!(d.validate().is_ok());

        let root = f.node(f.find("/pki/certs/root").unwrap());
        let d = renewal_descriptor(&store, root).await.unwrap();
        assert!(d.self_signed && d.is_ca());
        assert_eq!(d.cert_parameters_paths, vec!["/pki/certs"]);
    }

    #[tokio::test]
    async fn driver_walks_the_list_then_stays_finished() {
        let store = populate(&[
            ("root", None, true, 3650),
            ("int", Some("root"), true, 365),
            ("leaf", Some("int"), false, 30),
        ])
        .await;
        let f = forest(&store).await;
        let mut descriptors = Vec::new();
        for i in select::cascade(&f, "/pki/certs/root").unwrap() {
            descriptors.push(renewal_descriptor(&store, f.node(i)).await.unwrap());
        }
        let before = store.entry("/pki/certs/leaf").unwrap().value;

        let blobs = MemoryBlobStore::new();
        let mut state = publish(&blobs, "bucket", "renewals/", &descriptors).await.unwrap();
        assert_eq!(state.count, 3);
        assert!(state.s3_key.starts_with("renewals/") && state.s3_key.ends_with(".json"));

        let issuer = CertificateIssuer::new(&store);
        let driver = RenewalDriver::new(&blobs, &issuer);
        let mut steps = 0;
        while !state.is_finished {
            state = driver.step(state).await.unwrap();
            steps += 1;
        }
        assert_eq!(steps, 3);
        assert_eq!(state.index, 3);

        let again = driver.step(state.clone()).await.unwrap();
        assert_eq!(again, state);

        // The leaf was re-signed by the renewed intermediate.
        let leaf = store.entry("/pki/certs/leaf").unwrap();
        assert_ne!(leaf.value, before);
        assert_eq!(leaf.version, 2);
        let int_key = keys::from_pem("", &store.entry("/pki/private/int").unwrap().value).unwrap();
        let leaf = CertificateInfo::from_pem("/pki/certs/leaf", &leaf.value).unwrap();
        assert!(leaf.x509.verify(&int_key).unwrap());
    }

    #[tokio::test]
    async fn empty_list_is_finished_from_the_start() {
        let blobs = MemoryBlobStore::new();
        let state = publish(&blobs, "bucket", "", &[]).await.unwrap();
        assert!(state.is_finished);
        assert_eq!(blobs.keys().len(), 1);
    }

    #[tokio::test]
    async fn finished_state_is_returned_unchanged() {
        let store = MemoryParameterStore::new();
        let blobs = MemoryBlobStore::new();
        let issuer = CertificateIssuer::new(&store);
        let driver = RenewalDriver::new(&blobs, &issuer);
        // No list is stored under this key, so any read would fail.
        let state = RenewalState {
            is_finished: true,
            index: 1,
            ..RenewalState::new("bucket", "missing", 3)
        };
        let next = driver.step(state.clone()).await.unwrap();
        assert_eq!(next, state);
    }

    #[tokio::test]
    async fn unfinished_index_past_count_is_marked_finished() {
        let store = MemoryParameterStore::new();
        let blobs = MemoryBlobStore::new();
        let issuer = CertificateIssuer::new(&store);
        let driver = RenewalDriver::new(&blobs, &issuer);
        let state = RenewalState {
            index: 5,
            ..RenewalState::new("bucket", "missing", 2)
        };
        let next = driver.step(state.clone()).await.unwrap();
        assert!(next.is_finished);
        assert_eq!(
            next,
            RenewalState {
                is_finished: true,
                ..state
            }
        );
    }

    #[tokio::test]
    async fn short_list_is_a_data_integrity_error() {
        let store = MemoryParameterStore::new();
        let blobs = MemoryBlobStore::new();
        blobs.put("bucket", "list.json", b"[]".to_vec()).await.unwrap();
        let issuer = CertificateIssuer::new(&store);
        let driver = RenewalDriver::new(&blobs, &issuer);

        let err = driver
            .step(RenewalState::new("bucket", "list.json", 1))
            .await
            .unwrap_err();
        assert!(matches!(err, PkiError::DataIntegrity(_)));
    }

    #[test]
    fn advance_marks_the_last_step() {
        let s = advance(RenewalState::new("b", "k", 2));
        assert_eq!((s.index, s.is_finished), (1, false));
        let s = advance(s);
        assert_eq!((s.index, s.is_finished), (2, true));
    }
}
