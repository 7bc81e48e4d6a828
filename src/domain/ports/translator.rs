//! Translator port: natural-language prompt to an initial IR draft.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::errors::TranslationError;
use crate::domain::models::{IrDocument, TypedHole};

/// Raw translator output. The holes are the ones the translator already knew
/// about; the session engine merges them into the document's registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Translation {
    /// The document, including any holes already in its registry
    pub ir: IrDocument,
    /// Holes described outside the document
    #[serde(default)]
    pub holes: Vec<TypedHole>,
}

/// Turns a prompt into draft v0.
#[async_trait]
pub trait Translator: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &'static str;

    /// Translate `prompt`. Errors abort session creation.
    async fn translate(&self, prompt: &str) -> Result<Translation, TranslationError>;
}
