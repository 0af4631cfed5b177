//! `certificate`: issue or re-issue one certificate from a descriptor.

use common::protocol::{IssuedRefs, Outcome};
use common::CertificateDescriptor;
use serde_json::Value;

use super::{envelope, parse};
use crate::pki::CertificateIssuer;

pub async fn handle(issuer: &CertificateIssuer<'_>, payload: Value) -> Outcome<IssuedRefs> {
    let result = async {
        let descriptor: CertificateDescriptor = parse(payload)?;
        let refs = issuer.issue(&descriptor).await?;
        let subject = descriptor
            .common_name
            .as_deref()
            .unwrap_or(&descriptor.cert_parameter_name);
        Ok((
            format!("Successfully created/renewed private key and certificate for {subject}"),
            refs,
        ))
    }
    .await;
    envelope("certificate", result)
}
