//! User decisions that close a hole.

use serde::{Deserialize, Serialize};

use super::ir::{Clause, FieldKind};

/// Kind of answer a resolution provides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionType {
    /// Rewrite the intent summary
    ClarifyIntent,
    /// Give a concrete type
    SpecifyType,
    /// Give a name
    NameEntity,
    /// Describe a side effect
    DescribeEffect,
    /// Add a predicate
    AddConstraint,
}

impl ResolutionType {
    /// Wire name of the resolution type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ClarifyIntent => "clarify_intent",
            Self::SpecifyType => "specify_type",
            Self::NameEntity => "name_entity",
            Self::DescribeEffect => "describe_effect",
            Self::AddConstraint => "add_constraint",
        }
    }

    /// Parse a wire name; `-` and `_` are interchangeable.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.replace('-', "_").as_str() {
            "clarify_intent" => Some(Self::ClarifyIntent),
            "specify_type" => Some(Self::SpecifyType),
            "name_entity" => Some(Self::NameEntity),
            "describe_effect" => Some(Self::DescribeEffect),
            "add_constraint" => Some(Self::AddConstraint),
            _ => None,
        }
    }

    /// The only resolution type that can fill `field`.
    pub fn for_field(field: FieldKind) -> Self {
        match field {
            FieldKind::IntentSummary => Self::ClarifyIntent,
            FieldKind::SignatureName | FieldKind::ParameterName => Self::NameEntity,
            FieldKind::SignatureReturns | FieldKind::ParameterType => Self::SpecifyType,
            FieldKind::EffectDescription => Self::DescribeEffect,
            FieldKind::AssertionPredicate => Self::AddConstraint,
        }
    }

    /// Resolution type accepted by an open-ended hole of `clause`.
    pub fn for_open_clause(clause: Clause) -> Option<Self> {
        match clause {
            Clause::Intent => Some(Self::ClarifyIntent),
            Clause::Effects => Some(Self::DescribeEffect),
            Clause::Assertions => Some(Self::AddConstraint),
            Clause::Signature => None,
        }
    }
}

impl std::fmt::Display for ResolutionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resolution payload, tagged by its type.
///
/// Wire form: `{"resolution_type": "specify_type", "resolution_text": "int"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "resolution_type", content = "resolution_text", rename_all = "snake_case")]
pub enum Resolution {
    /// Intent summary
    ClarifyIntent(String),
    /// Type name
    SpecifyType(String),
    /// Identifier
    NameEntity(String),
    /// Effect description
    DescribeEffect(String),
    /// Predicate text
    AddConstraint(String),
}

impl Resolution {
    /// Resolution of type `kind` carrying `text`.
    pub fn new(kind: ResolutionType, text: impl Into<String>) -> Self {
        let text = text.into();
        match kind {
            ResolutionType::ClarifyIntent => Self::ClarifyIntent(text),
            ResolutionType::SpecifyType => Self::SpecifyType(text),
            ResolutionType::NameEntity => Self::NameEntity(text),
            ResolutionType::DescribeEffect => Self::DescribeEffect(text),
            ResolutionType::AddConstraint => Self::AddConstraint(text),
        }
    }

    /// The resolution type.
    pub fn kind(&self) -> ResolutionType {
        match self {
            Self::ClarifyIntent(_) => ResolutionType::ClarifyIntent,
            Self::SpecifyType(_) => ResolutionType::SpecifyType,
            Self::NameEntity(_) => ResolutionType::NameEntity,
            Self::DescribeEffect(_) => ResolutionType::DescribeEffect,
            Self::AddConstraint(_) => ResolutionType::AddConstraint,
        }
    }

    /// The resolution text.
    pub fn text(&self) -> &str {
        match self {
            Self::ClarifyIntent(t)
            | Self::SpecifyType(t)
            | Self::NameEntity(t)
            | Self::DescribeEffect(t)
            | Self::AddConstraint(t) => t,
        }
    }
}
