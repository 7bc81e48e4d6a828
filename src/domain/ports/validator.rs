//! Validator port: certifies an IR draft against external consistency checks.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::{IrDocument, ValidationReport};

/// Certifies drafts.
#[async_trait]
pub trait Validator: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &'static str;

    /// Check `ir`. An `Err` is treated by callers as a `pending` verdict.
    async fn validate(&self, ir: &IrDocument) -> DomainResult<ValidationReport>;
}
