//! In-memory store fakes used by unit tests.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use common::{StoreError, Tag};

use super::{BlobStore, Parameter, ParameterPage, ParameterStore, ServerCertificateStore};

/// A stored parameter with everything the fake records about it.
#[derive(Debug, Clone)]
pub struct StoredParameter {
    pub value: String,
    pub description: String,
    pub secure: bool,
    pub version: u64,
    pub tags: Vec<Tag>,
}

/// Parameter store backed by a sorted map, so path listings are deterministic.
#[derive(Debug, Default)]
pub struct MemoryParameterStore {
    inner: Mutex<BTreeMap<String, StoredParameter>>,
}

impl MemoryParameterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arn(name: &str) -> String {
        format!("arn:aws:ssm:us-east-1:000000000000:parameter{name}")
    }

    pub fn entry(&self, name: &str) -> Option<StoredParameter> {
        self.inner.lock().unwrap().get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.inner.lock().unwrap().keys().cloned().collect()
    }

    /// Overwrite a value directly, bypassing versioning; used to plant fixtures.
    pub fn set_value(&self, name: &str, value: &str) {
        let mut map = self.inner.lock().unwrap();
        map.entry(name.to_owned())
            .and_modify(|p| p.value = value.to_owned())
            .or_insert_with(|| StoredParameter {
                value: value.to_owned(),
                description: String::new(),
                secure: false,
                version: 1,
                tags: Vec::new(),
            });
    }
}

#[async_trait]
impl ParameterStore for MemoryParameterStore {
    async fn get(&self, name: &str, _decrypt: bool) -> Result<Parameter, StoreError> {
        let map = self.inner.lock().unwrap();
        let p = map
            .get(name)
            .ok_or_else(|| StoreError::NotFound(name.to_owned()))?;
        Ok(Parameter {
            name: name.to_owned(),
            arn: Self::arn(name),
            value: p.value.clone(),
        })
    }

    async fn put(
        &self,
        name: &str,
        value: &str,
        description: &str,
        secure: bool,
    ) -> Result<String, StoreError> {
        let mut map = self.inner.lock().unwrap();
        let entry = map.entry(name.to_owned()).or_insert_with(|| StoredParameter {
            value: String::new(),
            description: String::new(),
            secure,
            version: 0,
            tags: Vec::new(),
        });
        entry.value = value.to_owned();
        entry.description = description.to_owned();
        entry.secure = secure;
        entry.version += 1;
        Ok(Self::arn(name))
    }

    async fn list_tags(&self, name: &str) -> Result<Vec<Tag>, StoreError> {
        let map = self.inner.lock().unwrap();
        map.get(name)
            .map(|p| p.tags.clone())
            .ok_or_else(|| StoreError::NotFound(name.to_owned()))
    }

    async fn replace_tags(&self, name: &str, tags: &[Tag]) -> Result<(), StoreError> {
        let mut map = self.inner.lock().unwrap();
        let p = map
            .get_mut(name)
            .ok_or_else(|| StoreError::NotFound(name.to_owned()))?;
        p.tags = tags.to_vec();
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<(), StoreError> {
        self.inner.lock().unwrap().remove(name);
        Ok(())
    }

    async fn list_by_path(
        &self,
        path: &str,
        page_size: i32,
        next_token: Option<String>,
    ) -> Result<ParameterPage, StoreError> {
        let prefix = format!("{}/", path.trim_end_matches('/'));
        let start: usize = match next_token {
            Some(t) => t
                .parse()
                .map_err(|_| StoreError::Backend(format!("bad token {t}")))?,
            None => 0,
        };
        let map = self.inner.lock().unwrap();
        let matching: Vec<Parameter> = map
            .iter()
            .filter(|(name, _)| name.starts_with(&prefix))
            .map(|(name, p)| Parameter {
                name: name.clone(),
                arn: Self::arn(name),
                value: p.value.clone(),
            })
            .collect();
        let end = (start + page_size as usize).min(matching.len());
        let next_token = (end < matching.len()).then(|| end.to_string());
        Ok(ParameterPage {
            parameters: matching[start.min(end)..end].to_vec(),
            next_token,
        })
    }
}

/// A certificate uploaded to the fake server certificate store.
#[derive(Debug, Clone)]
pub struct UploadedCertificate {
    pub path: String,
    pub body: String,
    pub chain: Option<String>,
    pub arn: String,
}

/// Server certificate store that rejects duplicate names like the real one.
#[derive(Debug, Default)]
pub struct MemoryServerCertificateStore {
    inner: Mutex<BTreeMap<String, UploadedCertificate>>,
    deletes: Mutex<Vec<String>>,
}

impl MemoryServerCertificateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<UploadedCertificate> {
        self.inner.lock().unwrap().get(name).cloned()
    }

    pub fn deletes(&self) -> Vec<String> {
        self.deletes.lock().unwrap().clone()
    }
}

#[async_trait]
impl ServerCertificateStore for MemoryServerCertificateStore {
    async fn upload(
        &self,
        path: &str,
        name: &str,
        certificate_body: &str,
        _private_key: &str,
        chain: Option<String>,
    ) -> Result<String, StoreError> {
        let mut map = self.inner.lock().unwrap();
        if map.contains_key(name) {
            return Err(StoreError::AlreadyExists(name.to_owned()));
        }
        let arn = format!("arn:aws:iam::000000000000:server-certificate{path}{name}");
        map.insert(
            name.to_owned(),
            UploadedCertificate {
                path: path.to_owned(),
                body: certificate_body.to_owned(),
                chain,
                arn: arn.clone(),
            },
        );
        Ok(arn)
    }

    async fn delete(&self, name: &str) -> Result<(), StoreError> {
        self.deletes.lock().unwrap().push(name.to_owned());
        self.inner.lock().unwrap().remove(name);
        Ok(())
    }
}

/// Blob store keyed by `(bucket, key)`.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    inner: Mutex<BTreeMap<(String, String), Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn keys(&self) -> Vec<(String, String)> {
        self.inner.lock().unwrap().keys().cloned().collect()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<(), StoreError> {
        self.inner
            .lock()
            .unwrap()
            .insert((bucket.to_owned(), key.to_owned()), body);
        Ok(())
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StoreError> {
        self.inner
            .lock()
            .unwrap()
            .get(&(bucket.to_owned(), key.to_owned()))
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("s3://{bucket}/{key}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn listing_pages_until_exhausted() {
        let store = MemoryParameterStore::new();
        for i in 0..5 {
            store.set_value(&format!("/certs/c{i}"), "x");
        }
        store.set_value("/other/c", "x");

        let mut seen = Vec::new();
        let mut token = None;
        loop {
            let page = store.list_by_path("/certs", 2, token).await.unwrap();
            assert!(page.parameters.len() <= 2);
            seen.extend(page.parameters.into_iter().map(|p| p.name));
            token = page.next_token;
            if token.is_none() {
                break;
            }
        }
        assert_eq!(seen.len(), 5);
        assert!(seen.iter().all(|n| n.starts_with("/certs/")));
    }

    #[tokio::test]
    async fn put_overwrites_and_bumps_version() {
        let store = MemoryParameterStore::new();
        store.put("/k", "one", "d", true).await.unwrap();
        store.put("/k", "two", "d", true).await.unwrap();
        let e = store.entry("/k").unwrap();
        assert_eq!(e.value, "two");
        assert_eq!(e.version, 2);
    }
}
