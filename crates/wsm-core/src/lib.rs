mod cloud;
pub mod error;
pub mod types;
mod validation;

pub use cloud::{CloudError, CloudErrorKind};
pub use error::*;
pub use types::*;
pub use validation::{
    validate_bucket_name, validate_cluster_id, validate_kubernetes_namespace,
    validate_managed_identity_name,
};
