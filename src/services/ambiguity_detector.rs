//! Ambiguity detection over an IR snapshot.
//!
//! The detector is a pure function of the document. It reports:
//! - placeholders (`{"hole": id}`) grouped by hole id, plus open registry holes
//!   that no field references (open-ended holes);
//! - empty fields and type hints that name no concrete type;
//! - contradictions between clauses: duplicate parameter names and assertions
//!   referring to names the signature does not declare.
//!
//! Synthesized holes get ids derived from their location. When such an id is
//! already in the registry the ambiguity is a new one and receives the next
//! generation id (`hole_param_a_type~2`).

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::domain::models::{
    Clause, FieldKind, FieldRef, HoleKind, IrDocument, TypedHole, SIGNATURE_ID,
};
use crate::domain::text;

/// Scans documents for holes.
#[derive(Debug, Clone, Default)]
pub struct AmbiguityDetector;

impl AmbiguityDetector {
    /// Stateless detector.
    pub fn new() -> Self {
        Self
    }

    /// Every open hole of `doc`, sorted by id.
    pub fn detect(&self, doc: &IrDocument) -> Vec<TypedHole> {
        let mut found: BTreeMap<String, TypedHole> = BTreeMap::new();

        self.collect_placeholders(doc, &mut found);
        self.collect_open_ended(doc, &mut found);
        self.collect_empty_and_unresolved(doc, &mut found);
        self.collect_duplicate_names(doc, &mut found);
        self.collect_unknown_references(doc, &mut found);

        debug!(holes = found.len(), "ambiguity scan complete");
        found.into_values().collect()
    }

    /// Ids of [`Self::detect`], for a session's open-hole set.
    pub fn open_hole_ids(&self, doc: &IrDocument) -> BTreeSet<String> {
        self.detect(doc).into_iter().map(|h| h.id).collect()
    }

    fn collect_placeholders(&self, doc: &IrDocument, found: &mut BTreeMap<String, TypedHole>) {
        for (id, targets) in doc.placeholder_refs() {
            let hole = match doc.holes.get(&id) {
                Some(registered) if registered.is_open() => registered.clone(),
                Some(_) => {
                    debug!(hole_id = %id, "placeholder points at resolved hole; skipped");
                    continue;
                }
                None => {
                    let first = targets[0].field;
                    TypedHole::new(&id, first.clause(), first.default_type_hint())
                }
            };
            found.insert(id, hole.with_targets(targets));
        }
    }

    fn collect_open_ended(&self, doc: &IrDocument, found: &mut BTreeMap<String, TypedHole>) {
        for (id, hole) in &doc.holes {
            if hole.is_open() && !found.contains_key(id) {
                found.insert(id.clone(), hole.clone().with_targets(Vec::new()));
            }
        }
    }

    fn collect_empty_and_unresolved(&self, doc: &IrDocument, found: &mut BTreeMap<String, TypedHole>) {
        for (at, slot) in doc.fields() {
            let Some(value) = slot.as_value() else {
                continue;
            };
            let is_type = matches!(at.field, FieldKind::ParameterType | FieldKind::SignatureReturns);

            let kind = if value.trim().is_empty() {
                HoleKind::Placeholder
            } else if is_type && text::is_unresolved_type(value) {
                HoleKind::UnresolvedType
            } else {
                continue;
            };

            let base = format!("hole_{}_{}", at.entity_id, field_suffix(at.field));
            let id = next_generation(doc, &base);
            let description = describe_gap(doc, &at, kind, value);
            let hole = TypedHole::new(&id, at.field.clause(), at.field.default_type_hint())
                .with_kind(kind)
                .with_description(description)
                .with_targets(vec![at]);
            found.insert(id, hole);
        }
    }

    fn collect_duplicate_names(&self, doc: &IrDocument, found: &mut BTreeMap<String, TypedHole>) {
        let mut seen: BTreeSet<&str> = BTreeSet::new();
        for p in &doc.signature.parameters {
            let Some(name) = p.name.as_value() else {
                continue;
            };
            let name = name.trim();
            if name.is_empty() || seen.insert(name) {
                continue;
            }

            let id = next_generation(doc, &format!("hole_{}_duplicate", p.id));
            let hole = TypedHole::new(&id, Clause::Signature, FieldKind::ParameterName.default_type_hint())
                .with_kind(HoleKind::Contradiction)
                .with_description(format!("Parameter name '{name}' is declared more than once"))
                .with_targets(vec![FieldRef::new(&p.id, FieldKind::ParameterName)]);
            found.insert(id, hole);
        }
    }

    fn collect_unknown_references(&self, doc: &IrDocument, found: &mut BTreeMap<String, TypedHole>) {
        // Names are not settled yet; any reference check would be premature.
        let names_settled = doc
            .signature
            .parameters
            .iter()
            .all(|p| p.name.as_value().is_some_and(|n| !n.trim().is_empty()));
        if !names_settled {
            return;
        }

        let mut known: BTreeSet<&str> = doc.parameter_names().into_iter().collect();
        if let Some(name) = doc.signature.name.as_value() {
            known.insert(name.as_str());
        }

        for a in &doc.assertions {
            let Some(predicate) = a.predicate.as_value() else {
                continue;
            };
            let unknown: Vec<String> = text::free_identifiers(predicate)
                .into_iter()
                .filter(|ident| !known.contains(ident.as_str()) && !text::is_predicate_keyword(ident))
                .collect();
            if unknown.is_empty() {
                continue;
            }

            let id = next_generation(doc, &format!("hole_{}_refs", a.id));
            let hole = TypedHole::new(&id, Clause::Assertions, FieldKind::AssertionPredicate.default_type_hint())
                .with_kind(HoleKind::Contradiction)
                .with_description(format!(
                    "Assertion references names the signature does not declare: {}",
                    unknown.join(", ")
                ))
                .with_targets(vec![FieldRef::new(&a.id, FieldKind::AssertionPredicate)]);
            found.insert(id, hole);
        }
    }
}

fn field_suffix(field: FieldKind) -> &'static str {
    match field {
        FieldKind::IntentSummary => "summary",
        FieldKind::SignatureName | FieldKind::ParameterName => "name",
        FieldKind::SignatureReturns => "returns",
        FieldKind::ParameterType => "type",
        FieldKind::EffectDescription => "description",
        FieldKind::AssertionPredicate => "predicate",
    }
}

/// First id in `base`, `base~2`, `base~3`, .. not in the registry.
///
/// Synthesized holes enter the registry only once resolved, so a registered
/// id is either spent or owned by an explicit placeholder.
fn next_generation(doc: &IrDocument, base: &str) -> String {
    if !doc.holes.contains_key(base) {
        return base.to_string();
    }
    let mut generation = 2;
    loop {
        let candidate = format!("{base}~{generation}");
        if !doc.holes.contains_key(&candidate) {
            return candidate;
        }
        generation += 1;
    }
}

fn describe_gap(doc: &IrDocument, at: &FieldRef, kind: HoleKind, value: &str) -> String {
    let owner = match at.field {
        FieldKind::ParameterName | FieldKind::ParameterType => doc
            .parameter(&at.entity_id)
            .and_then(|p| p.name.as_value())
            .filter(|n| !n.trim().is_empty())
            .map_or_else(|| format!("parameter {}", at.entity_id), |n| format!("parameter '{n}'")),
        _ if at.entity_id == SIGNATURE_ID => "signature".to_string(),
        _ => at.entity_id.clone(),
    };

    match (kind, at.field) {
        (HoleKind::UnresolvedType, _) => format!("Type of {owner} is unresolved ('{}')", value.trim()),
        (_, FieldKind::IntentSummary) => "Intent summary is empty".to_string(),
        (_, FieldKind::SignatureName) => "Function name is empty".to_string(),
        (_, FieldKind::SignatureReturns) => "Return type is empty".to_string(),
        (_, FieldKind::ParameterName) => format!("Name of {owner} is empty"),
        (_, FieldKind::ParameterType) => format!("Type of {owner} is empty"),
        (_, FieldKind::EffectDescription) => format!("Effect {owner} has no description"),
        (_, FieldKind::AssertionPredicate) => format!("Assertion {owner} has no predicate"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{
        Assertion, Effect, HoleStatus, Intent, Parameter, Severity, Signature, Slot,
    };

    fn doc(params: Vec<Parameter>, returns: Option<Slot<String>>) -> IrDocument {
        IrDocument::new(
            Intent {
                summary: "Add two numbers".into(),
                rationale: None,
            },
            Signature {
                name: "add".into(),
                parameters: params,
                returns,
            },
        )
    }

    fn typed(id: &str, name: &str, ty: &str) -> Parameter {
        Parameter::new(id, name, Slot::Value(ty.to_string()))
    }

    #[test]
    fn test_shared_placeholder_is_one_hole_with_all_targets() {
        let mut d = doc(
            vec![
                Parameter::new("param_a", "a", Slot::hole("hole_param_type")),
                Parameter::new("param_b", "b", Slot::hole("hole_param_type")),
            ],
            Some(Slot::hole("hole_param_type")),
        );
        d.holes.insert(
            "hole_param_type".into(),
            TypedHole::new("hole_param_type", Clause::Signature, "type"),
        );

        let holes = AmbiguityDetector::new().detect(&d);
        assert_eq!(holes.len(), 1);
        assert_eq!(holes[0].id, "hole_param_type");
        assert_eq!(holes[0].targets.len(), 3);
    }

    #[test]
    fn test_unregistered_placeholder_is_synthesized() {
        let d = doc(vec![Parameter::new("param_a", Slot::<String>::hole("h_name"), "int".into())], None);
        let holes = AmbiguityDetector::new().detect(&d);
        assert_eq!(holes[0].id, "h_name");
        assert_eq!(holes[0].type_hint, "identifier");
        assert_eq!(holes[0].clause, Clause::Signature);
    }

    #[test]
    fn test_complete_document_has_no_holes() {
        let mut d = doc(vec![typed("param_a", "a", "int"), typed("param_b", "b", "int")], Some("int".into()));
        d.assertions.push(Assertion {
            id: "assert_1".into(),
            predicate: "result == a + b".into(),
            rationale: None,
        });
        assert!(AmbiguityDetector::new().detect(&d).is_empty());
    }

    #[test]
    fn test_unresolved_and_empty_fields() {
        let mut d = doc(vec![typed("param_a", "a", "any"), typed("param_b", "", "int")], Some("".into()));
        d.effects.push(Effect {
            id: "effect_1".into(),
            description: " ".into(),
        });

        let holes = AmbiguityDetector::new().detect(&d);
        let ids: Vec<&str> = holes.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "hole_effect_1_description",
                "hole_param_a_type",
                "hole_param_b_name",
                "hole_signature_returns",
            ]
        );
        let unresolved = holes.iter().find(|h| h.id == "hole_param_a_type").unwrap();
        assert_eq!(unresolved.kind, HoleKind::UnresolvedType);
        assert!(unresolved.description.as_deref().unwrap().contains("parameter 'a'"));
    }

    #[test]
    fn test_contradictions_are_flagged() {
        let mut d = doc(vec![typed("param_a", "x", "int"), typed("param_b", "x", "int")], Some("int".into()));
        d.assertions.push(Assertion {
            id: "assert_1".into(),
            predicate: "result == x + y".into(),
            rationale: None,
        });

        let holes = AmbiguityDetector::new().detect(&d);
        assert_eq!(holes.len(), 2);
        assert!(holes.iter().all(|h| h.severity == Severity::Contradiction));
        let refs = holes.iter().find(|h| h.id == "hole_assert_1_refs").unwrap();
        assert!(refs.description.as_deref().unwrap().ends_with(": y"));
        assert!(holes.iter().any(|h| h.id == "hole_param_b_duplicate"));
    }

    #[test]
    fn test_capitalized_keywords_are_not_undeclared_names() {
        let mut d = doc(vec![typed("param_a", "flag", "bool")], Some("bool".into()));
        d.assertions.push(Assertion {
            id: "assert_1".into(),
            predicate: "result != None and flag == True".into(),
            rationale: None,
        });
        assert!(AmbiguityDetector::new().detect(&d).is_empty());
    }

    #[test]
    fn test_reference_check_waits_for_parameter_names() {
        let mut d = doc(vec![Parameter::new("param_a", Slot::<String>::hole("h_name"), "int".into())], None);
        d.assertions.push(Assertion {
            id: "assert_1".into(),
            predicate: "result > n".into(),
            rationale: None,
        });
        let holes = AmbiguityDetector::new().detect(&d);
        assert_eq!(holes.len(), 1);
        assert_eq!(holes[0].id, "h_name");
    }

    #[test]
    fn test_recurring_ambiguity_gets_new_generation() {
        let mut d = doc(vec![typed("param_a", "a", "?")], None);
        let mut resolved = TypedHole::new("hole_param_a_type", Clause::Signature, "type");
        resolved.status = HoleStatus::Resolved;
        d.holes.insert(resolved.id.clone(), resolved);

        let holes = AmbiguityDetector::new().detect(&d);
        assert_eq!(holes.len(), 1);
        assert_eq!(holes[0].id, "hole_param_a_type~2");
    }

    #[test]
    fn test_open_registry_hole_without_refs_is_open_ended() {
        let mut d = doc(vec![typed("param_a", "a", "int")], Some("int".into()));
        d.holes.insert(
            "hole_postcondition".into(),
            TypedHole::new("hole_postcondition", Clause::Assertions, "predicate"),
        );
        let holes = AmbiguityDetector::new().detect(&d);
        assert_eq!(holes.len(), 1);
        assert!(holes[0].targets.is_empty());
    }

    #[test]
    fn test_detection_is_deterministic() {
        let d = doc(vec![typed("param_a", "a", "unknown"), typed("param_b", "b", "")], None);
        let detector = AmbiguityDetector::new();
        assert_eq!(detector.detect(&d), detector.detect(&d));
    }
}
