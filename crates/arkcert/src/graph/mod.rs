//! Certificate forest reconstructed from a flat parameter namespace.
//!
//! Nodes live in a single arena ([`Forest::nodes`]); relationships are plain
//! indices into it. A node's parent is the node whose certificate parameter
//! name equals the node's `cacert` reference. Nodes without a parent are
//! either genuine roots (no `cakey` reference, self-signed) or orphans whose
//! issuer was not among the scanned paths.

pub mod select;

use std::collections::{HashMap, HashSet, VecDeque};

use common::PkiError;
use tracing::{debug, info, warn};

use crate::pki::{CertificateInfo, Lineage};
use crate::store::{Parameter, ParameterStore};

/// One certificate in the forest.
#[derive(Debug, Clone)]
pub struct CertificateNode {
    pub cert_parameter_name: String,
    pub cert_parameter_arn: String,
    pub lineage: Lineage,
    pub certificate: CertificateInfo,
    /// Index of the issuing node, `None` for roots and orphans.
    pub parent: Option<usize>,
    /// Indices of the nodes this certificate signed, in listing order.
    pub children: Vec<usize>,
}

impl CertificateNode {
    /// Decode a node from a certificate parameter.
    ///
    /// # Errors
    ///
    /// [`PkiError::Crypto`] if the value is not a certificate,
    /// [`PkiError::MissingIdentity`] if it carries no `key` reference.
    pub fn from_parameter(parameter: &Parameter) -> Result<Self, PkiError> {
        let certificate = CertificateInfo::from_pem(&parameter.name, &parameter.value)?;
        let lineage = certificate.lineage()?;
        Ok(Self {
            cert_parameter_name: parameter.name.clone(),
            cert_parameter_arn: parameter.arn.clone(),
            lineage,
            certificate,
            parent: None,
            children: Vec::new(),
        })
    }

    pub fn is_ca(&self) -> bool {
        self.certificate.is_ca()
    }

    /// No `cakey` reference: the certificate claims to be self-signed.
    pub fn is_root(&self) -> bool {
        self.lineage.is_root()
    }
}

/// Arena of certificate nodes with parent and child links.
#[derive(Debug, Clone, Default)]
pub struct Forest {
    nodes: Vec<CertificateNode>,
}

impl Forest {
    /// Scan `paths` and build the forest of every certificate found.
    pub async fn build(
        store: &dyn ParameterStore,
        paths: &[String],
        page_size: i32,
    ) -> Result<Self, PkiError> {
        let parameters = collect_parameters(store, paths, page_size).await?;
        let nodes = parameters
            .iter()
            .map(CertificateNode::from_parameter)
            .collect::<Result<Vec<_>, _>>()?;
        let forest = Self::from_nodes(nodes)?;
        info!(certificates = forest.len(), roots = forest.roots().count(), "certificate forest built");
        Ok(forest)
    }

    /// Link `nodes` into a forest.
    ///
    /// # Errors
    ///
    /// [`PkiError::DataIntegrity`] if a node claims to be a root but its
    /// subject and issuer differ.
    pub fn from_nodes(mut nodes: Vec<CertificateNode>) -> Result<Self, PkiError> {
        let by_name: HashMap<String, usize> = nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.cert_parameter_name.clone(), i))
            .collect();

        for i in 0..nodes.len() {
            let node = &nodes[i];
            if node.is_root() {
                if !node.certificate.is_self_signed() {
                    return Err(PkiError::DataIntegrity(format!(
                        "certificate {} names no issuer key but is not self-signed",
                        node.cert_parameter_name
                    )));
                }
                continue;
            }
            let issuer = node.lineage.ca_cert_parameter_name.as_deref().unwrap_or("");
            match by_name.get(issuer).copied() {
                Some(p) if p == i => {
                    warn!(cert = %node.cert_parameter_name, "certificate names itself as issuer");
                }
                Some(p) => {
                    nodes[i].parent = Some(p);
                    nodes[p].children.push(i);
                }
                None => warn!(
                    cert = %node.cert_parameter_name,
                    issuer = %issuer,
                    "issuer not among scanned certificates; treating as orphan"
                ),
            }
        }

        Ok(Self { nodes })
    }

    pub fn nodes(&self) -> &[CertificateNode] {
        &self.nodes
    }

    pub fn node(&self, index: usize) -> &CertificateNode {
        &self.nodes[index]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Indices of nodes without a parent, in listing order.
    pub fn roots(&self) -> impl Iterator<Item = usize> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.parent.is_none())
            .map(|(i, _)| i)
    }

    /// Index of the node whose parameter name or ARN is `name_or_arn`.
    pub fn find(&self, name_or_arn: &str) -> Option<usize> {
        self.nodes.iter().position(|n| {
            n.cert_parameter_name == name_or_arn || n.cert_parameter_arn == name_or_arn
        })
    }

    /// Breadth-first traversal of the subtree rooted at `root`, root first.
    pub fn subtree(&self, root: usize) -> Vec<usize> {
        let mut order = Vec::new();
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([root]);
        while let Some(i) = queue.pop_front() {
            if !seen.insert(i) {
                continue;
            }
            order.push(i);
            queue.extend(self.nodes[i].children.iter().copied());
        }
        order
    }
}

/// List every parameter under `paths`, following continuation tokens.
///
/// A parameter reachable from more than one path is returned once, at its
/// first position.
pub async fn collect_parameters(
    store: &dyn ParameterStore,
    paths: &[String],
    page_size: i32,
) -> Result<Vec<Parameter>, PkiError> {
    let mut seen = HashSet::new();
    let mut parameters = Vec::new();

    for path in paths {
        let mut next_token = None;
        let mut pages = 0usize;
        loop {
            let page = store.list_by_path(path, page_size, next_token).await?;
            pages += 1;
            for parameter in page.parameters {
                if seen.insert(parameter.name.clone()) {
                    parameters.push(parameter);
                }
            }
            next_token = page.next_token;
            if next_token.is_none() {
                break;
            }
        }
        debug!(path = %path, pages, "path scanned");
    }

    Ok(parameters)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::pki::CertificateIssuer;
    use crate::store::memory::MemoryParameterStore;
    use common::CertificateDescriptor;
    use serde_json::json;

    /// Descriptor for `name` under `/pki/certs`, signed by `issuer` or self-signed.
    pub(crate) fn descriptor(name: &str, issuer: Option<&str>, ca: bool, days: u32) -> CertificateDescriptor {
        let mut value = json!({
            "KeySize": 1024,
            "ValidityDays": days,
            "CommonName": name,
            "KeyParameterName": format!("/pki/private/{name}"),
            "CertParameterName": format!("/pki/certs/{name}"),
        });
        match issuer {
            Some(issuer) => {
                value["CaKeyParameterName"] = json!(format!("/pki/private/{issuer}"));
                value["CaCertParameterName"] = json!(format!("/pki/certs/{issuer}"));
            }
            None => value["SelfSigned"] = json!(true),
        }
        if ca {
            value["BasicConstraints"] = json!({"Critical": true, "CA": true});
            value["CertParametersPaths"] = json!(["/pki/certs"]);
        }
        serde_json::from_value(value).unwrap()
    }

    /// Issue `specs` in order into a fresh store.
    pub(crate) async fn populate(specs: &[(&str, Option<&str>, bool, u32)]) -> MemoryParameterStore {
        let store = MemoryParameterStore::new();
        {
            let issuer = CertificateIssuer::new(&store);
            for (name, parent, ca, days) in specs {
                issuer
                    .issue(&descriptor(name, *parent, *ca, *days))
                    .await
                    .unwrap();
            }
        }
        store
    }

    fn names(forest: &Forest, indices: &[usize]) -> Vec<String> {
        indices
            .iter()
            .map(|&i| forest.node(i).certificate.subject.common_name.clone().unwrap())
            .collect()
    }

    #[tokio::test]
    async fn links_parents_and_children() {
        let store = populate(&[
            ("root", None, true, 3650),
            ("int", Some("root"), true, 1825),
            ("a", Some("int"), false, 90),
            ("b", Some("root"), false, 90),
        ])
        .await;
        let forest = Forest::build(&store, &["/pki/certs".into()], 2).await.unwrap();

        assert_eq!(forest.len(), 4);
        let roots: Vec<usize> = forest.roots().collect();
        assert_eq!(names(&forest, &roots), vec!["root"]);

        let int = forest.find("/pki/certs/int").unwrap();
        let root = forest.find(&MemoryParameterStore::arn("/pki/certs/root")).unwrap();
        assert_eq!(forest.node(int).parent, Some(root));
        assert_eq!(names(&forest, &forest.node(root).children), vec!["b", "int"]);
        assert_eq!(names(&forest, &forest.subtree(root)), vec!["root", "b", "int", "a"]);
    }

    #[tokio::test]
    async fn overlapping_paths_are_deduplicated() {
        let store = populate(&[("root", None, true, 3650), ("a", Some("root"), false, 30)]).await;
        let params = collect_parameters(&store, &["/pki".into(), "/pki/certs".into()], 10)
            .await
            .unwrap();
        // Keys under /pki/private are listed too, but only once.
        assert_eq!(params.len(), 4);
    }

    #[tokio::test]
    async fn unknown_issuer_leaves_an_orphan() {
        let store = populate(&[("root", None, true, 3650), ("a", Some("root"), false, 30)]).await;
        store.delete("/pki/certs/root").await.unwrap();
        let forest = Forest::build(&store, &["/pki/certs".into()], 10).await.unwrap();
        assert_eq!(forest.len(), 1);
        assert_eq!(forest.node(0).parent, None);
        assert!(!forest.node(0).is_root());
    }

    #[tokio::test]
    async fn non_certificate_values_fail() {
        let store = MemoryParameterStore::new();
        store.set_value("/pki/certs/junk", "not a certificate");
        assert!(matches!(
            Forest::build(&store, &["/pki/certs".into()], 10).await,
            Err(PkiError::Crypto(_))
        ));
    }

    #[tokio::test]
    async fn root_that_is_not_self_signed_is_rejected() {
        let store = populate(&[("root", None, true, 3650), ("int", Some("root"), true, 365)]).await;
        let param = store.get("/pki/certs/int", false).await.unwrap();
        let mut node = CertificateNode::from_parameter(&param).unwrap();
        // Claims to be a root, but was signed by someone else.
        node.lineage.ca_key_parameter_name = None;
        assert!(node.is_root());

        assert!(matches!(Forest::from_nodes(vec![node]), Err(PkiError::DataIntegrity(_))));
    }

    #[tokio::test]
    async fn subtree_survives_cycles() {
        let store = populate(&[("root", None, true, 3650), ("a", Some("root"), true, 30)]).await;
        let mut forest = Forest::build(&store, &["/pki/certs".into()], 10).await.unwrap();
        let root = forest.find("/pki/certs/root").unwrap();
        let a = forest.find("/pki/certs/a").unwrap();
        forest.nodes[a].children.push(root);

        assert_eq!(forest.subtree(root), vec![root, a]);
        assert_eq!(forest.subtree(a), vec![a, root]);
    }
}
