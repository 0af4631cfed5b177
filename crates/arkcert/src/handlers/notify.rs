//! `notify-certificate-resource`: answer CloudFormation once a cascade
//! renewal workflow started by a CA update has ended.

use common::protocol::NotifyRequest;
use serde_json::Value;
use tracing::{info, warn};

use crate::cfn::{ResponseError, ResponseSender, FAILED, SUCCESS};

pub const FAILURE_REASON: &str =
    "State machine failed to renew certificates; check state machine execution log";

/// Deliver the held-back CloudFormation response.
///
/// The status follows `Outcome.Success`; a missing outcome counts as failure.
/// A request without `CloudFormationData` did not come from a custom
/// resource and is ignored.
///
/// # Errors
///
/// Returns [`ResponseError`] if the payload is malformed or the response
/// cannot be delivered.
pub async fn handle(sender: &dyn ResponseSender, payload: Value) -> Result<(), ResponseError> {
    let request: NotifyRequest = serde_json::from_value(payload)?;
    let Some(pending) = request.cloud_formation_data else {
        info!("no CloudFormation data; nothing to notify");
        return Ok(());
    };

    let success = request.outcome.is_some_and(|o| o.success);
    let mut response = pending.response;
    if success {
        response.status = SUCCESS.into();
        response.reason = "Success".into();
    } else {
        warn!(logical_id = %response.logical_resource_id, "cascade renewal failed");
        response.status = FAILED.into();
        response.reason = FAILURE_REASON.into();
    }

    sender.send(&pending.response_url, &response).await
}
