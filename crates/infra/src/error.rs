//! Service-level error model.

use thiserror::Error;

use freshcart_core::DomainError;

use crate::store::StoreError;

/// Errors returned by [`crate::PricingResolver`], [`crate::PricingAdmin`] and
/// [`crate::InventoryLedger`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0} already exists")]
    AlreadyExists(&'static str),

    /// Optimistic concurrency retries ran out.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error(transparent)]
    Store(StoreError),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

impl From<DomainError> for ServiceError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) => ServiceError::InvalidInput(msg),
            DomainError::InvalidId(msg) => ServiceError::InvalidInput(msg),
            DomainError::NotFound(what) => ServiceError::NotFound(what),
            DomainError::AlreadyExists(what) => ServiceError::AlreadyExists(what),
            DomainError::Conflict(msg) => ServiceError::Conflict(msg),
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Concurrency(msg) => ServiceError::Conflict(msg),
            other => ServiceError::Store(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_errors_map_to_service_kinds() {
        assert_eq!(
            ServiceError::from(DomainError::validation("bad")),
            ServiceError::InvalidInput("bad".to_string())
        );
        assert_eq!(
            ServiceError::from(DomainError::not_found("product")),
            ServiceError::NotFound("product")
        );
        assert_eq!(
            ServiceError::from(DomainError::already_exists("inventory")).to_string(),
            "inventory already exists"
        );
    }

    #[test]
    fn store_concurrency_becomes_conflict() {
        assert!(matches!(
            ServiceError::from(StoreError::Concurrency("stale".to_string())),
            ServiceError::Conflict(_)
        ));
        assert!(matches!(
            ServiceError::from(StoreError::Backend("down".to_string())),
            ServiceError::Store(StoreError::Backend(_))
        ));
    }
}
