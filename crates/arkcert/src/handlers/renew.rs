//! `renew-certificate`: one step of the paginated renewal driver.

use common::protocol::{Outcome, RenewalState};
use serde_json::Value;

use super::{envelope, parse};
use crate::renewal::RenewalDriver;

pub async fn handle(driver: &RenewalDriver<'_>, payload: Value) -> Outcome<RenewalState> {
    let result = async {
        let state: RenewalState = parse(payload)?;
        let next = driver.step(state).await?;
        let reason = if next.is_finished {
            format!("All {} certificate(s) renewed", next.count)
        } else {
            format!("Renewed certificate {} of {}", next.index, next.count)
        };
        Ok((reason, next))
    }
    .await;
    envelope("renew-certificate", result)
}
