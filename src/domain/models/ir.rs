//! Intermediate representation of a behavior under refinement.
//!
//! An [`IrDocument`] is the specification body (intent, signature, effects,
//! assertions). Any textual field is a [`Slot`]: either a concrete value or a
//! reference to a [`TypedHole`] kept in the document's hole registry. One hole
//! may be referenced by several fields; resolving it fills all of them.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Reserved entity id of the intent clause.
pub const INTENT_ID: &str = "intent";

/// Reserved entity id of the signature clause.
pub const SIGNATURE_ID: &str = "signature";

/// A field value that is either concrete or a typed-hole placeholder.
///
/// Serialized untagged: a placeholder is `{"hole": "<id>"}`, a value is the
/// value itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Slot<T> {
    /// Placeholder referencing a hole in the registry
    Hole {
        /// Id of the referenced hole
        hole: String,
    },
    /// Concrete value
    Value(T),
}

impl<T> Slot<T> {
    /// Placeholder for hole `id`.
    pub fn hole(id: impl Into<String>) -> Self {
        Self::Hole { hole: id.into() }
    }

    /// The concrete value, if any.
    pub fn as_value(&self) -> Option<&T> {
        match self {
            Self::Value(v) => Some(v),
            Self::Hole { .. } => None,
        }
    }

    /// The referenced hole id, if this is a placeholder.
    pub fn hole_id(&self) -> Option<&str> {
        match self {
            Self::Hole { hole } => Some(hole.as_str()),
            Self::Value(_) => None,
        }
    }

    /// Whether this slot is a placeholder.
    pub fn is_hole(&self) -> bool {
        matches!(self, Self::Hole { .. })
    }
}

impl From<&str> for Slot<String> {
    fn from(value: &str) -> Self {
        Self::Value(value.to_string())
    }
}

impl From<String> for Slot<String> {
    fn from(value: String) -> Self {
        Self::Value(value)
    }
}

/// What the behavior is for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Intent {
    /// One-line description of the behavior
    pub summary: Slot<String>,
    /// Why the behavior exists
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
}

/// A named, typed input of the signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    /// Stable entity id, e.g. `param_a`
    pub id: String,
    /// Parameter name
    pub name: Slot<String>,
    /// Parameter type
    pub type_hint: Slot<String>,
}

impl Parameter {
    /// Parameter with entity id `id`.
    pub fn new(id: impl Into<String>, name: impl Into<Slot<String>>, type_hint: Slot<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            type_hint,
        }
    }
}

/// Name, inputs and output of the behavior.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    /// Function name
    pub name: Slot<String>,
    /// Inputs in declaration order
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    /// Output type. `None` for a procedure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub returns: Option<Slot<String>>,
}

/// An observable side effect of the behavior.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Effect {
    /// Stable entity id, e.g. `effect_1`
    pub id: String,
    /// What changes outside the behavior
    pub description: Slot<String>,
}

/// A checkable predicate over parameters and `result`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assertion {
    /// Stable entity id, e.g. `assert_1`
    pub id: String,
    /// Predicate text, e.g. `result == a + b`
    pub predicate: Slot<String>,
    /// Why the assertion must hold
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
}

/// The clause of the document a hole belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Clause {
    /// The intent clause
    Intent,
    /// The signature clause
    Signature,
    /// The effects clause
    Effects,
    /// The assertions clause
    Assertions,
}

impl Clause {
    /// Wire name of the clause.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Intent => "intent",
            Self::Signature => "signature",
            Self::Effects => "effects",
            Self::Assertions => "assertions",
        }
    }
}

/// Whether a hole still needs an answer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HoleStatus {
    /// Awaiting a resolution
    #[default]
    Open,
    /// Filled by an accepted resolution
    Resolved,
}

/// How a hole came to exist.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HoleKind {
    /// Explicit `{"hole": ..}` placeholder or an empty field.
    #[default]
    Placeholder,
    /// Concrete type hint that names no type (`any`, `unknown`, `?`).
    UnresolvedType,
    /// Cross-clause consistency check failed.
    Contradiction,
}

/// Contradictions outrank omissions when prioritizing suggestions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// A required detail is missing
    #[default]
    Omission,
    /// Two details disagree
    Contradiction,
}

/// A single addressable textual field of the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// `intent.summary`
    IntentSummary,
    /// `signature.name`
    SignatureName,
    /// `signature.returns`
    SignatureReturns,
    /// Name of one parameter
    ParameterName,
    /// Type of one parameter
    ParameterType,
    /// Description of one effect
    EffectDescription,
    /// Predicate of one assertion
    AssertionPredicate,
}

impl FieldKind {
    /// Clause the field lives in.
    pub fn clause(&self) -> Clause {
        match self {
            Self::IntentSummary => Clause::Intent,
            Self::SignatureName
            | Self::SignatureReturns
            | Self::ParameterName
            | Self::ParameterType => Clause::Signature,
            Self::EffectDescription => Clause::Effects,
            Self::AssertionPredicate => Clause::Assertions,
        }
    }

    /// Type hint given to holes synthesized on this field.
    pub fn default_type_hint(&self) -> &'static str {
        match self {
            Self::IntentSummary | Self::EffectDescription => "text",
            Self::SignatureName | Self::ParameterName => "identifier",
            Self::SignatureReturns | Self::ParameterType => "type",
            Self::AssertionPredicate => "predicate",
        }
    }

    /// Wire name of the field kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::IntentSummary => "intent_summary",
            Self::SignatureName => "signature_name",
            Self::SignatureReturns => "signature_returns",
            Self::ParameterName => "parameter_name",
            Self::ParameterType => "parameter_type",
            Self::EffectDescription => "effect_description",
            Self::AssertionPredicate => "assertion_predicate",
        }
    }
}

/// Location of a field: owning entity plus which field of it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FieldRef {
    /// Id of the parameter, effect, assertion, or a reserved clause id
    pub entity_id: String,
    /// Which field of the entity
    pub field: FieldKind,
}

impl FieldRef {
    /// Reference to `field` of `entity_id`.
    pub fn new(entity_id: impl Into<String>, field: FieldKind) -> Self {
        Self {
            entity_id: entity_id.into(),
            field,
        }
    }
}

/// An unresolved or contradictory detail of the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypedHole {
    /// Unique hole id, e.g. `hole_param_type`
    pub id: String,
    /// Owning clause
    pub clause: Clause,
    /// Kind of answer expected: `type`, `identifier`, `text` or `predicate`
    pub type_hint: String,
    /// Human-readable explanation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Open until resolved
    #[serde(default)]
    pub status: HoleStatus,
    /// How the hole came to exist
    #[serde(default)]
    pub kind: HoleKind,
    /// Derived from `kind`
    #[serde(default)]
    pub severity: Severity,
    /// Fields this hole stands in for. Empty for open-ended holes, whose
    /// resolution adds a new entity to the clause.
    #[serde(default)]
    pub targets: Vec<FieldRef>,
}

impl TypedHole {
    /// New open placeholder hole with no targets.
    pub fn new(id: impl Into<String>, clause: Clause, type_hint: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            clause,
            type_hint: type_hint.into(),
            description: None,
            status: HoleStatus::Open,
            kind: HoleKind::Placeholder,
            severity: Severity::Omission,
            targets: Vec::new(),
        }
    }

    /// Attach a human-readable explanation.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the kind and the matching severity.
    pub fn with_kind(mut self, kind: HoleKind) -> Self {
        self.kind = kind;
        self.severity = match kind {
            HoleKind::Contradiction => Severity::Contradiction,
            HoleKind::Placeholder | HoleKind::UnresolvedType => Severity::Omission,
        };
        self
    }

    /// Set the fields the hole stands in for.
    pub fn with_targets(mut self, targets: Vec<FieldRef>) -> Self {
        self.targets = targets;
        self
    }

    /// Whether the hole still needs an answer.
    pub fn is_open(&self) -> bool {
        self.status == HoleStatus::Open
    }
}

/// The specification body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IrDocument {
    /// What the behavior is for
    pub intent: Intent,
    /// Name, parameters and return type
    pub signature: Signature,
    /// Observable side effects
    #[serde(default)]
    pub effects: Vec<Effect>,
    /// Checkable predicates
    #[serde(default)]
    pub assertions: Vec<Assertion>,
    /// Hole registry keyed by hole id. Resolved holes stay here for audit.
    #[serde(default)]
    pub holes: BTreeMap<String, TypedHole>,
}

impl IrDocument {
    /// Empty document with no effects, assertions or holes.
    pub fn new(intent: Intent, signature: Signature) -> Self {
        Self {
            intent,
            signature,
            effects: Vec::new(),
            assertions: Vec::new(),
            holes: BTreeMap::new(),
        }
    }

    /// Every addressable entity id, including hole ids.
    pub fn entity_ids(&self) -> BTreeSet<String> {
        let mut ids = BTreeSet::new();
        ids.insert(INTENT_ID.to_string());
        ids.insert(SIGNATURE_ID.to_string());
        ids.extend(self.signature.parameters.iter().map(|p| p.id.clone()));
        ids.extend(self.effects.iter().map(|e| e.id.clone()));
        ids.extend(self.assertions.iter().map(|a| a.id.clone()));
        ids.extend(self.holes.keys().cloned());
        ids
    }

    /// Whether `id` names an entity or a registered hole.
    pub fn contains(&self, id: &str) -> bool {
        id == INTENT_ID
            || id == SIGNATURE_ID
            || self.holes.contains_key(id)
            || self.signature.parameters.iter().any(|p| p.id == id)
            || self.effects.iter().any(|e| e.id == id)
            || self.assertions.iter().any(|a| a.id == id)
    }

    /// Parameter with entity id `id`.
    pub fn parameter(&self, id: &str) -> Option<&Parameter> {
        self.signature.parameters.iter().find(|p| p.id == id)
    }

    /// Concrete parameter names in declaration order.
    pub fn parameter_names(&self) -> Vec<&str> {
        self.signature
            .parameters
            .iter()
            .filter_map(|p| p.name.as_value().map(String::as_str))
            .collect()
    }

    /// Slot addressed by `at`, if the entity exists.
    pub fn slot(&self, at: &FieldRef) -> Option<&Slot<String>> {
        match at.field {
            FieldKind::IntentSummary => Some(&self.intent.summary),
            FieldKind::SignatureName => Some(&self.signature.name),
            FieldKind::SignatureReturns => self.signature.returns.as_ref(),
            FieldKind::ParameterName => self.parameter(&at.entity_id).map(|p| &p.name),
            FieldKind::ParameterType => self.parameter(&at.entity_id).map(|p| &p.type_hint),
            FieldKind::EffectDescription => self
                .effects
                .iter()
                .find(|e| e.id == at.entity_id)
                .map(|e| &e.description),
            FieldKind::AssertionPredicate => self
                .assertions
                .iter()
                .find(|a| a.id == at.entity_id)
                .map(|a| &a.predicate),
        }
    }

    /// Every field with its slot, in document order.
    pub fn fields(&self) -> Vec<(FieldRef, &Slot<String>)> {
        let mut fields = vec![
            (FieldRef::new(INTENT_ID, FieldKind::IntentSummary), &self.intent.summary),
            (FieldRef::new(SIGNATURE_ID, FieldKind::SignatureName), &self.signature.name),
        ];
        if let Some(returns) = &self.signature.returns {
            fields.push((FieldRef::new(SIGNATURE_ID, FieldKind::SignatureReturns), returns));
        }
        for p in &self.signature.parameters {
            fields.push((FieldRef::new(&p.id, FieldKind::ParameterName), &p.name));
            fields.push((FieldRef::new(&p.id, FieldKind::ParameterType), &p.type_hint));
        }
        for e in &self.effects {
            fields.push((FieldRef::new(&e.id, FieldKind::EffectDescription), &e.description));
        }
        for a in &self.assertions {
            fields.push((FieldRef::new(&a.id, FieldKind::AssertionPredicate), &a.predicate));
        }
        fields
    }

    /// Placeholder references grouped by hole id.
    pub fn placeholder_refs(&self) -> BTreeMap<String, Vec<FieldRef>> {
        let mut refs: BTreeMap<String, Vec<FieldRef>> = BTreeMap::new();
        for (at, slot) in self.fields() {
            if let Some(id) = slot.hole_id() {
                refs.entry(id.to_string()).or_default().push(at);
            }
        }
        refs
    }

    /// Whether any field still holds a placeholder.
    pub fn has_placeholders(&self) -> bool {
        self.fields().iter().any(|(_, slot)| slot.is_hole())
    }

    /// Structural checks: unique non-reserved ids, registry keys matching hole
    /// ids, and no placeholder pointing at a resolved hole.
    pub fn check_well_formed(&self) -> Result<(), Vec<String>> {
        let mut problems = Vec::new();
        let mut seen = BTreeSet::new();

        let entity_ids = self
            .signature
            .parameters
            .iter()
            .map(|p| p.id.as_str())
            .chain(self.effects.iter().map(|e| e.id.as_str()))
            .chain(self.assertions.iter().map(|a| a.id.as_str()))
            .chain(self.holes.keys().map(String::as_str));

        for id in entity_ids {
            if id.trim().is_empty() {
                problems.push("entity id must not be empty".to_string());
            } else if id == INTENT_ID || id == SIGNATURE_ID {
                problems.push(format!("entity id '{id}' is reserved"));
            } else if !seen.insert(id) {
                problems.push(format!("duplicate entity id '{id}'"));
            }
        }

        for (key, hole) in &self.holes {
            if key != &hole.id {
                problems.push(format!("hole registered as '{key}' has id '{}'", hole.id));
            }
        }

        for (id, refs) in self.placeholder_refs() {
            if let Some(hole) = self.holes.get(&id) {
                if !hole.is_open() {
                    problems.push(format!(
                        "field {}.{} references resolved hole '{id}'",
                        refs[0].entity_id,
                        refs[0].field.as_str()
                    ));
                }
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(problems)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adder() -> IrDocument {
        let mut doc = IrDocument::new(
            Intent {
                summary: "Add two numbers".into(),
                rationale: None,
            },
            Signature {
                name: "add".into(),
                parameters: vec![
                    Parameter::new("param_a", "a", Slot::hole("hole_param_type")),
                    Parameter::new("param_b", "b", Slot::hole("hole_param_type")),
                ],
                returns: Some(Slot::hole("hole_param_type")),
            },
        );
        doc.holes.insert(
            "hole_param_type".to_string(),
            TypedHole::new("hole_param_type", Clause::Signature, "type"),
        );
        doc
    }

    #[test]
    fn test_slot_serializes_untagged() {
        let value: Slot<String> = "int".into();
        let hole: Slot<String> = Slot::hole("h1");
        assert_eq!(serde_json::to_string(&value).unwrap(), "\"int\"");
        assert_eq!(serde_json::to_string(&hole).unwrap(), "{\"hole\":\"h1\"}");

        let parsed: Slot<String> = serde_json::from_str("{\"hole\":\"h2\"}").unwrap();
        assert_eq!(parsed.hole_id(), Some("h2"));
        let parsed: Slot<String> = serde_json::from_str("\"str\"").unwrap();
        assert_eq!(parsed.as_value().map(String::as_str), Some("str"));
    }

    #[test]
    fn test_placeholder_refs_group_shared_hole() {
        let doc = adder();
        let refs = doc.placeholder_refs();
        assert_eq!(refs.len(), 1);
        assert_eq!(refs["hole_param_type"].len(), 3);
        assert_eq!(refs["hole_param_type"][0].field, FieldKind::SignatureReturns);
    }

    #[test]
    fn test_entity_ids_include_reserved_and_holes() {
        let doc = adder();
        let ids = doc.entity_ids();
        assert!(ids.contains(INTENT_ID));
        assert!(ids.contains(SIGNATURE_ID));
        assert!(ids.contains("param_a"));
        assert!(ids.contains("hole_param_type"));
        assert!(doc.contains("param_b"));
        assert!(!doc.contains("param_c"));
    }

    #[test]
    fn test_well_formed_rejects_duplicates_and_reserved_ids() {
        let mut doc = adder();
        doc.signature.parameters[1].id = "param_a".to_string();
        doc.effects.push(Effect {
            id: "intent".to_string(),
            description: "prints".into(),
        });

        let problems = doc.check_well_formed().unwrap_err();
        assert!(problems.iter().any(|p| p.contains("duplicate entity id 'param_a'")));
        assert!(problems.iter().any(|p| p.contains("reserved")));
    }

    #[test]
    fn test_well_formed_rejects_reference_to_resolved_hole() {
        let mut doc = adder();
        doc.holes.get_mut("hole_param_type").unwrap().status = HoleStatus::Resolved;
        let problems = doc.check_well_formed().unwrap_err();
        assert!(problems[0].contains("resolved hole"));
    }

    #[test]
    fn test_with_kind_sets_severity() {
        let hole = TypedHole::new("h", Clause::Assertions, "predicate").with_kind(HoleKind::Contradiction);
        assert_eq!(hole.severity, Severity::Contradiction);
        assert!(Severity::Contradiction > Severity::Omission);
    }
}
