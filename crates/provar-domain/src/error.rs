use thiserror::Error;

use crate::types::ResourceKind;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("invalid resource group: {0}")]
    InvalidResourceGroup(String),

    #[error("invalid resource name: {0}")]
    InvalidResourceName(String),

    #[error("invalid {kind} spec: {message}")]
    InvalidSpec { kind: ResourceKind, message: String },

    #[error("invalid tag term '{0}' (expected 'key' or 'key:value')")]
    InvalidTagTerm(String),
}
