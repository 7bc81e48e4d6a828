//! Local structural validator.

use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::{IrDocument, Slot, ValidationReport};
use crate::domain::ports::Validator;
use crate::domain::text;

/// Checks an IR for internal consistency without executing anything.
///
/// A document is invalid when any field still holds a placeholder, when a
/// parameter name is empty or repeated, when a type is missing or names no
/// concrete type, or when an assertion mentions a name that is neither a
/// parameter, the function itself, nor a predicate keyword.
#[derive(Debug, Clone, Default)]
pub struct ConsistencyValidator;

impl ConsistencyValidator {
    /// New validator.
    pub fn new() -> Self {
        Self
    }

    /// All diagnostics for `ir`, in document order.
    pub fn diagnostics(ir: &IrDocument) -> Vec<String> {
        let mut out = Vec::new();

        for (at, slot) in ir.fields() {
            if let Some(hole) = slot.hole_id() {
                out.push(format!(
                    "{}.{} is still a placeholder for '{hole}'",
                    at.entity_id,
                    at.field.as_str()
                ));
            }
        }

        let mut seen = BTreeSet::new();
        for param in &ir.signature.parameters {
            if let Slot::Value(ref name) = param.name {
                if name.trim().is_empty() {
                    out.push(format!("parameter '{}' has an empty name", param.id));
                } else if !seen.insert(name.as_str()) {
                    out.push(format!("parameter name '{name}' is declared more than once"));
                }
            }
            if let Slot::Value(ref ty) = param.type_hint {
                if text::is_unresolved_type(ty) {
                    out.push(format!("parameter '{}' has unresolved type '{ty}'", param.id));
                }
            }
        }

        if let Some(Slot::Value(ref ty)) = ir.signature.returns {
            if text::is_unresolved_type(ty) {
                out.push(format!("return type '{ty}' is unresolved"));
            }
        }

        let mut known: BTreeSet<&str> = ir.parameter_names().into_iter().collect();
        if let Slot::Value(ref name) = ir.signature.name {
            known.insert(name.as_str());
        }
        for assertion in &ir.assertions {
            let Slot::Value(ref predicate) = assertion.predicate else {
                continue;
            };
            if predicate.trim().is_empty() {
                out.push(format!("assertion '{}' has an empty predicate", assertion.id));
                continue;
            }
            for ident in text::free_identifiers(predicate) {
                if !known.contains(ident.as_str()) && !text::is_predicate_keyword(&ident) {
                    out.push(format!(
                        "assertion '{}' references unknown name '{ident}'",
                        assertion.id
                    ));
                }
            }
        }

        out
    }
}

#[async_trait]
impl Validator for ConsistencyValidator {
    fn name(&self) -> &'static str {
        "consistency"
    }

    async fn validate(&self, ir: &IrDocument) -> DomainResult<ValidationReport> {
        let diagnostics = Self::diagnostics(ir);
        if diagnostics.is_empty() {
            Ok(ValidationReport::valid())
        } else {
            Ok(ValidationReport::invalid(diagnostics))
        }
    }
}
