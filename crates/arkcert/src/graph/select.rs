//! Renewal selection over a [`Forest`].
//!
//! Both selections return node indices in level order, so an issuer is
//! always renewed before anything it signs.

use common::PkiError;
use tracing::{debug, info, warn};

use super::Forest;

const SECONDS_PER_DAY: i64 = 86_400;

/// The certificate named by `name_or_arn` and everything it signed,
/// transitively, breadth-first.
///
/// # Errors
///
/// [`PkiError::CertificateNotFound`] if no scanned certificate has that
/// parameter name or ARN.
pub fn cascade(forest: &Forest, name_or_arn: &str) -> Result<Vec<usize>, PkiError> {
    let target = forest
        .find(name_or_arn)
        .ok_or_else(|| PkiError::CertificateNotFound(name_or_arn.to_owned()))?;
    let selected = forest.subtree(target);
    info!(cert = %name_or_arn, count = selected.len(), "cascade selection");
    Ok(selected)
}

/// Certificates expiring within `threshold_days` of `now` (Unix seconds),
/// plus everything signed by a CA that is itself due.
///
/// Only trees rooted at a self-signed CA are considered. Self-signed
/// certificates that are not CAs are logged and skipped.
pub fn expiring(forest: &Forest, threshold_days: u32, now: i64) -> Vec<usize> {
    let mut selected = Vec::new();

    for root in forest.roots() {
        let node = forest.node(root);
        if !node.is_root() {
            // Orphans were reported while the forest was built.
            continue;
        }
        if !node.is_ca() {
            warn!(cert = %node.cert_parameter_name, "self-signed certificate is not a CA; skipped");
            continue;
        }

        let order = forest.subtree(root);
        // `forced[i]`: an ancestor CA is due, so node `i` must be re-signed.
        let mut forced = vec![false; forest.len()];
        for i in order {
            let node = forest.node(i);
            let days_left = (node.certificate.not_after - now).div_euclid(SECONDS_PER_DAY);
            let due = days_left <= i64::from(threshold_days);
            let needed = due || forced[i];
            if needed {
                debug!(cert = %node.cert_parameter_name, days_left, forced = forced[i], "renewal needed");
                selected.push(i);
            }
            if (needed && node.is_ca()) || forced[i] {
                for &child in &node.children {
                    forced[child] = true;
                }
            }
        }
    }

    info!(threshold_days, count = selected.len(), "expiry selection");
    selected
}
