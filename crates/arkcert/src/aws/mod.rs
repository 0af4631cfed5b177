//! AWS implementations of the store traits.
//!
//! | Trait                                         | Service               |
//! |-----------------------------------------------|-----------------------|
//! | [`ParameterStore`](crate::store::ParameterStore) | SSM Parameter Store |
//! | [`ServerCertificateStore`](crate::store::ServerCertificateStore) | IAM |
//! | [`BlobStore`](crate::store::BlobStore)         | S3                    |
//! | [`WorkflowStarter`](crate::store::WorkflowStarter) | Step Functions    |

pub mod clients;
pub mod iam;
pub mod s3;
pub mod sfn;
pub mod ssm;

pub use clients::AwsClients;
pub use iam::IamServerCertificateStore;
pub use s3::S3BlobStore;
pub use sfn::StepFunctionsStarter;
pub use ssm::SsmParameterStore;

use aws_smithy_types::error::display::DisplayErrorContext;
use common::StoreError;

/// Map an SDK error to [`StoreError::Backend`], keeping the full source chain.
pub(crate) fn backend<E>(context: String) -> impl FnOnce(E) -> StoreError
where
    E: std::error::Error + 'static,
{
    move |e| StoreError::Backend(format!("{context}: {}", DisplayErrorContext(&e)))
}
