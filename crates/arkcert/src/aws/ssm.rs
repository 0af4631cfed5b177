//! [`ParameterStore`] on SSM Parameter Store.

use async_trait::async_trait;
use aws_sdk_ssm::types::{ParameterType, ResourceTypeForTagging};
use common::{StoreError, Tag};
use tracing::debug;

use super::backend;
use crate::store::{Parameter, ParameterPage, ParameterStore};

pub struct SsmParameterStore {
    client: aws_sdk_ssm::Client,
}

impl SsmParameterStore {
    pub fn new(client: aws_sdk_ssm::Client) -> Self {
        Self { client }
    }
}

fn to_parameter(p: &aws_sdk_ssm::types::Parameter) -> Parameter {
    Parameter {
        name: p.name().unwrap_or_default().to_owned(),
        arn: p.arn().unwrap_or_default().to_owned(),
        value: p.value().unwrap_or_default().to_owned(),
    }
}

#[async_trait]
impl ParameterStore for SsmParameterStore {
    async fn get(&self, name: &str, decrypt: bool) -> Result<Parameter, StoreError> {
        let out = self
            .client
            .get_parameter()
            .name(name)
            .with_decryption(decrypt)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error().is_some_and(|s| s.is_parameter_not_found()) {
                    StoreError::NotFound(name.to_owned())
                } else {
                    backend(format!("GetParameter {name}"))(e)
                }
            })?;
        out.parameter()
            .map(to_parameter)
            .ok_or_else(|| StoreError::NotFound(name.to_owned()))
    }

    async fn put(
        &self,
        name: &str,
        value: &str,
        description: &str,
        secure: bool,
    ) -> Result<String, StoreError> {
        let kind = if secure {
            ParameterType::SecureString
        } else {
            ParameterType::String
        };
        let out = self
            .client
            .put_parameter()
            .name(name)
            .value(value)
            .description(description)
            .r#type(kind)
            .overwrite(true)
            .send()
            .await
            .map_err(backend(format!("PutParameter {name}")))?;
        debug!(parameter = %name, version = out.version(), "parameter written");

        // PutParameter does not return the ARN.
        let stored = self.get(name, false).await?;
        Ok(stored.arn)
    }

    async fn list_tags(&self, name: &str) -> Result<Vec<Tag>, StoreError> {
        let out = self
            .client
            .list_tags_for_resource()
            .resource_type(ResourceTypeForTagging::Parameter)
            .resource_id(name)
            .send()
            .await
            .map_err(backend(format!("ListTagsForResource {name}")))?;
        Ok(out
            .tag_list()
            .iter()
            .map(|t| Tag::new(t.key(), t.value()))
            .collect())
    }

    async fn replace_tags(&self, name: &str, tags: &[Tag]) -> Result<(), StoreError> {
        let existing: Vec<String> = self
            .list_tags(name)
            .await?
            .into_iter()
            .map(|t| t.key)
            .collect();
        if !existing.is_empty() {
            self.client
                .remove_tags_from_resource()
                .resource_type(ResourceTypeForTagging::Parameter)
                .resource_id(name)
                .set_tag_keys(Some(existing))
                .send()
                .await
                .map_err(backend(format!("RemoveTagsFromResource {name}")))?;
        }

        if tags.is_empty() {
            return Ok(());
        }
        let tags = tags
            .iter()
            .map(|t| {
                aws_sdk_ssm::types::Tag::builder()
                    .key(&t.key)
                    .value(&t.value)
                    .build()
                    .map_err(|e| StoreError::Backend(format!("invalid tag {}: {e}", t.key)))
            })
            .collect::<Result<Vec<_>, _>>()?;
        self.client
            .add_tags_to_resource()
            .resource_type(ResourceTypeForTagging::Parameter)
            .resource_id(name)
            .set_tags(Some(tags))
            .send()
            .await
            .map_err(backend(format!("AddTagsToResource {name}")))?;
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<(), StoreError> {
        match self.client.delete_parameter().name(name).send().await {
            Ok(_) => Ok(()),
            Err(e) if e.as_service_error().is_some_and(|s| s.is_parameter_not_found()) => {
                debug!(parameter = %name, "parameter already absent");
                Ok(())
            }
            Err(e) => Err(backend(format!("DeleteParameter {name}"))(e)),
        }
    }

    async fn list_by_path(
        &self,
        path: &str,
        page_size: i32,
        next_token: Option<String>,
    ) -> Result<ParameterPage, StoreError> {
        let out = self
            .client
            .get_parameters_by_path()
            .path(path)
            .recursive(true)
            .max_results(page_size)
            .set_next_token(next_token)
            .send()
            .await
            .map_err(backend(format!("GetParametersByPath {path}")))?;
        Ok(ParameterPage {
            parameters: out.parameters().iter().map(to_parameter).collect(),
            next_token: out.next_token().map(str::to_owned),
        })
    }
}
