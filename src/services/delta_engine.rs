//! Computes and applies [`IrDelta`]s.
//!
//! `compute_delta` turns a hole resolution into a targeted change set: one
//! field patch per field referencing the hole, an added entity for open-ended
//! holes, and the bookkeeping entry that marks the hole resolved. Nothing else
//! is touched. `apply_delta` is a pure reducer over a cloned document; on any
//! problem it returns `DeltaConflict` and the prior draft is left as it was.

use std::collections::BTreeMap;

use tracing::{debug, instrument};

use crate::domain::errors::{SessionError, SessionResult};
use crate::domain::models::{
    Assertion, Clause, Draft, Effect, Entity, FieldKind, HoleStatus, IrDelta, IrDocument, Patch,
    Producer, Resolution, ResolutionType, Slot, TypedHole, INTENT_ID, SIGNATURE_ID,
};
use crate::domain::text;

/// Computes and applies deltas. Holds no state.
#[derive(Debug, Clone, Default)]
pub struct DeltaEngine;

impl DeltaEngine {
    /// Stateless engine.
    pub fn new() -> Self {
        Self
    }

    /// Resolution types `hole` accepts.
    pub fn accepted_types(hole: &TypedHole) -> Vec<ResolutionType> {
        if hole.targets.is_empty() {
            return ResolutionType::for_open_clause(hole.clause).into_iter().collect();
        }
        let mut types: Vec<ResolutionType> = hole
            .targets
            .iter()
            .map(|t| ResolutionType::for_field(t.field))
            .collect();
        types.sort();
        types.dedup();
        types
    }

    /// Map `resolution` of `hole` onto a delta against `prior`.
    #[instrument(skip(self, prior, hole, resolution), fields(hole_id = %hole.id, version = prior.version), err)]
    pub fn compute_delta(
        &self,
        prior: &Draft,
        hole: &TypedHole,
        resolution: &Resolution,
        produced_by: Producer,
        confidence: f64,
    ) -> SessionResult<IrDelta> {
        let got = resolution.kind();
        let expected = Self::accepted_types(hole);
        let invalid = |detail: Option<String>| SessionError::InvalidResolution {
            hole_id: hole.id.clone(),
            expected: expected.clone(),
            got,
            detail,
        };

        let value = resolution.text().trim();
        if value.is_empty() {
            return Err(invalid(Some("resolution text is empty".to_string())));
        }
        if !expected.contains(&got) {
            return Err(invalid(None));
        }
        let fills_type = hole
            .targets
            .iter()
            .any(|t| matches!(t.field, FieldKind::ParameterType | FieldKind::SignatureReturns));
        if fills_type && text::is_unresolved_type(value) {
            return Err(invalid(Some(format!("'{value}' does not name a concrete type"))));
        }

        let doc = &prior.ir;
        let mut delta = IrDelta::new(
            format!("resolve {} with {} '{}'", hole.id, got, value),
            produced_by,
            confidence,
        );

        if hole.targets.is_empty() {
            delta = open_ended_change(doc, hole, value, delta)?;
        } else {
            let mut patches: BTreeMap<String, Patch> = BTreeMap::new();
            for target in &hole.targets {
                if doc.slot(target).is_none() {
                    return Err(SessionError::DeltaConflict(vec![format!(
                        "hole '{}' targets missing field {}.{}",
                        hole.id,
                        target.entity_id,
                        target.field.as_str()
                    )]));
                }
                let (id, patch) = field_patch(&target.entity_id, target.field, value);
                let merged = match patches.remove(&id) {
                    Some(existing) => existing.merge(patch).ok_or_else(|| {
                        SessionError::DeltaConflict(vec![format!("conflicting patches for '{id}'")])
                    })?,
                    None => patch,
                };
                patches.insert(id, merged);
            }
            delta.update = patches;
        }

        if doc.holes.contains_key(&hole.id) {
            delta = delta.with_update(
                &hole.id,
                Patch::Hole {
                    status: HoleStatus::Resolved,
                },
            );
        } else {
            let mut record = hole.clone();
            record.status = HoleStatus::Resolved;
            delta = delta.with_add(Entity::Hole(record));
        }

        debug!(touched = delta.touched_ids().len(), "delta computed");
        Ok(delta)
    }

    /// Apply `delta` to `prior`: adds, then updates, then removals.
    #[instrument(skip(self, prior, delta), fields(version = prior.version), err)]
    pub fn apply_delta(&self, prior: &Draft, delta: IrDelta) -> SessionResult<Draft> {
        let mut ir = prior.ir.clone();
        let mut problems = Vec::new();

        if !(0.0..=1.0).contains(&delta.confidence) {
            problems.push(format!("confidence {} is outside [0, 1]", delta.confidence));
        }

        for entity in &delta.add {
            let id = entity.id();
            if ir.contains(id) {
                problems.push(format!("entity '{id}' already exists"));
                continue;
            }
            match entity {
                Entity::Parameter(p) => ir.signature.parameters.push(p.clone()),
                Entity::Effect(e) => ir.effects.push(e.clone()),
                Entity::Assertion(a) => ir.assertions.push(a.clone()),
                Entity::Hole(h) => {
                    ir.holes.insert(h.id.clone(), h.clone());
                }
            }
        }

        for (id, patch) in &delta.update {
            if let Err(problem) = apply_patch(&mut ir, id, patch) {
                problems.push(problem);
            }
        }

        for id in &delta.remove {
            if let Err(problem) = remove_entity(&mut ir, id) {
                problems.push(problem);
            }
        }

        if problems.is_empty() {
            if let Err(structural) = ir.check_well_formed() {
                problems.extend(structural);
            }
        }

        if !problems.is_empty() {
            return Err(SessionError::DeltaConflict(problems));
        }
        Ok(Draft::successor(prior, ir, delta))
    }
}

fn field_patch(entity_id: &str, field: FieldKind, value: &str) -> (String, Patch) {
    let v = Some(value.to_string());
    let patch = match field {
        FieldKind::IntentSummary => Patch::Intent {
            summary: v,
            rationale: None,
        },
        FieldKind::SignatureName => Patch::Signature { name: v, returns: None },
        FieldKind::SignatureReturns => Patch::Signature { name: None, returns: v },
        FieldKind::ParameterName => Patch::Parameter {
            name: v,
            type_hint: None,
        },
        FieldKind::ParameterType => Patch::Parameter {
            name: None,
            type_hint: v,
        },
        FieldKind::EffectDescription => Patch::Effect { description: v },
        FieldKind::AssertionPredicate => Patch::Assertion {
            predicate: v,
            rationale: None,
        },
    };
    (entity_id.to_string(), patch)
}

fn open_ended_change(doc: &IrDocument, hole: &TypedHole, value: &str, delta: IrDelta) -> SessionResult<IrDelta> {
    let delta = match hole.clause {
        Clause::Assertions => delta.with_add(Entity::Assertion(Assertion {
            id: next_entity_id(doc, "assert"),
            predicate: Slot::Value(value.to_string()),
            rationale: hole.description.clone(),
        })),
        Clause::Effects => delta.with_add(Entity::Effect(Effect {
            id: next_entity_id(doc, "effect"),
            description: Slot::Value(value.to_string()),
        })),
        Clause::Intent => delta.with_update(
            INTENT_ID,
            Patch::Intent {
                summary: None,
                rationale: Some(value.to_string()),
            },
        ),
        Clause::Signature => {
            return Err(SessionError::DeltaConflict(vec![format!(
                "signature hole '{}' is not referenced by any field",
                hole.id
            )]));
        }
    };
    Ok(delta)
}

fn next_entity_id(doc: &IrDocument, prefix: &str) -> String {
    let mut n = 1;
    loop {
        let id = format!("{prefix}_{n}");
        if !doc.contains(&id) {
            return id;
        }
        n += 1;
    }
}

fn no_such(ir: &IrDocument, id: &str, kind: &str) -> String {
    if ir.contains(id) {
        format!("patch for {kind} does not match entity '{id}'")
    } else {
        format!("unknown entity '{id}'")
    }
}

fn apply_patch(ir: &mut IrDocument, id: &str, patch: &Patch) -> Result<(), String> {
    let set = |slot: &mut Slot<String>, value: &Option<String>| {
        if let Some(v) = value {
            *slot = Slot::Value(v.clone());
        }
    };

    match patch {
        Patch::Intent { summary, rationale } => {
            if id != INTENT_ID {
                return Err(no_such(ir, id, patch.kind()));
            }
            set(&mut ir.intent.summary, summary);
            if let Some(r) = rationale {
                ir.intent.rationale = Some(r.clone());
            }
        }
        Patch::Signature { name, returns } => {
            if id != SIGNATURE_ID {
                return Err(no_such(ir, id, patch.kind()));
            }
            set(&mut ir.signature.name, name);
            if let Some(r) = returns {
                ir.signature.returns = Some(Slot::Value(r.clone()));
            }
        }
        Patch::Parameter { name, type_hint } => {
            let Some(p) = ir.signature.parameters.iter_mut().find(|p| p.id == id) else {
                return Err(no_such(ir, id, patch.kind()));
            };
            set(&mut p.name, name);
            set(&mut p.type_hint, type_hint);
        }
        Patch::Effect { description } => {
            let Some(e) = ir.effects.iter_mut().find(|e| e.id == id) else {
                return Err(no_such(ir, id, patch.kind()));
            };
            set(&mut e.description, description);
        }
        Patch::Assertion { predicate, rationale } => {
            let Some(a) = ir.assertions.iter_mut().find(|a| a.id == id) else {
                return Err(no_such(ir, id, patch.kind()));
            };
            set(&mut a.predicate, predicate);
            if let Some(r) = rationale {
                a.rationale = Some(r.clone());
            }
        }
        Patch::Hole { status } => {
            let Some(h) = ir.holes.get_mut(id) else {
                return Err(no_such(ir, id, patch.kind()));
            };
            h.status = *status;
        }
    }
    Ok(())
}

fn remove_entity(ir: &mut IrDocument, id: &str) -> Result<(), String> {
    if id == INTENT_ID || id == SIGNATURE_ID {
        return Err(format!("'{id}' cannot be removed"));
    }
    if ir.holes.contains_key(id) {
        return Err(format!("hole '{id}' cannot be removed; resolve it instead"));
    }

    let before = ir.signature.parameters.len() + ir.effects.len() + ir.assertions.len();
    ir.signature.parameters.retain(|p| p.id != id);
    ir.effects.retain(|e| e.id != id);
    ir.assertions.retain(|a| a.id != id);
    let after = ir.signature.parameters.len() + ir.effects.len() + ir.assertions.len();

    if before == after {
        return Err(format!("unknown entity '{id}'"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{FieldRef, Intent, Parameter, Signature, ValidationReport};

    fn adder() -> Draft {
        let mut ir = IrDocument::new(
            Intent {
                summary: "Add two numbers".into(),
                rationale: None,
            },
            Signature {
                name: "add_numbers".into(),
                parameters: vec![
                    Parameter::new("param_a", "a", Slot::hole("hole_param_type")),
                    Parameter::new("param_b", "b", Slot::hole("hole_param_type")),
                ],
                returns: Some(Slot::hole("hole_param_type")),
            },
        );
        ir.holes.insert(
            "hole_param_type".into(),
            TypedHole::new("hole_param_type", Clause::Signature, "type"),
        );
        Draft::initial(ir, ValidationReport::invalid(vec!["placeholders remain".into()]))
    }

    fn shared_type_hole() -> TypedHole {
        TypedHole::new("hole_param_type", Clause::Signature, "type").with_targets(vec![
            FieldRef::new("signature", FieldKind::SignatureReturns),
            FieldRef::new("param_a", FieldKind::ParameterType),
            FieldRef::new("param_b", FieldKind::ParameterType),
        ])
    }

    #[test]
    fn test_resolving_shared_hole_fills_every_reference() {
        let engine = DeltaEngine::new();
        let prior = adder();
        let delta = engine
            .compute_delta(&prior, &shared_type_hole(), &Resolution::SpecifyType("int".into()), Producer::User, 1.0)
            .unwrap();
        assert_eq!(delta.update.len(), 4);
        assert_eq!(delta.reason, "resolve hole_param_type with specify_type 'int'");

        let next = engine.apply_delta(&prior, delta).unwrap();
        assert_eq!(next.version, 1);
        let int = Slot::Value("int".to_string());
        assert_eq!(next.ir.signature.parameters[0].type_hint, int);
        assert_eq!(next.ir.signature.parameters[1].type_hint, int);
        assert_eq!(next.ir.signature.returns, Some(int));
        assert!(!next.ir.holes["hole_param_type"].is_open());
        assert_eq!(next.ir.intent, prior.ir.intent);
    }

    #[test]
    fn test_wrong_resolution_type_is_rejected() {
        let err = DeltaEngine::new()
            .compute_delta(&adder(), &shared_type_hole(), &Resolution::NameEntity("x".into()), Producer::User, 1.0)
            .unwrap_err();
        match err {
            SessionError::InvalidResolution { expected, got, .. } => {
                assert_eq!(expected, vec![ResolutionType::SpecifyType]);
                assert_eq!(got, ResolutionType::NameEntity);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_placeholder_type_text_is_rejected() {
        let result = DeltaEngine::new().compute_delta(
            &adder(),
            &shared_type_hole(),
            &Resolution::SpecifyType("any".into()),
            Producer::User,
            1.0,
        );
        assert!(matches!(result, Err(SessionError::InvalidResolution { detail: Some(_), .. })));
    }

    #[test]
    fn test_empty_text_is_rejected() {
        let result = DeltaEngine::new().compute_delta(
            &adder(),
            &shared_type_hole(),
            &Resolution::SpecifyType("  ".into()),
            Producer::User,
            1.0,
        );
        assert!(matches!(result, Err(SessionError::InvalidResolution { .. })));
    }

    #[test]
    fn test_open_ended_assertion_hole_adds_entity() {
        let engine = DeltaEngine::new();
        let prior = adder();
        let hole = TypedHole::new("hole_postcondition", Clause::Assertions, "predicate");
        let delta = engine
            .compute_delta(&prior, &hole, &Resolution::AddConstraint("result == a + b".into()), Producer::User, 1.0)
            .unwrap();
        let next = engine.apply_delta(&prior, delta).unwrap();
        assert_eq!(next.ir.assertions.len(), 1);
        assert_eq!(next.ir.assertions[0].id, "assert_1");
        assert_eq!(next.ir.holes["hole_postcondition"].status, HoleStatus::Resolved);
    }

    #[test]
    fn test_conflicting_delta_reports_every_problem() {
        let prior = adder();
        let delta = IrDelta::new("bad", Producer::User, 1.0)
            .with_update(
                "param_z",
                Patch::Parameter {
                    name: Some("z".into()),
                    type_hint: None,
                },
            )
            .with_update("param_a", Patch::Effect { description: None })
            .with_remove("intent")
            .with_remove("hole_param_type");

        match DeltaEngine::new().apply_delta(&prior, delta) {
            Err(SessionError::DeltaConflict(problems)) => {
                assert_eq!(problems.len(), 4);
                assert!(problems.iter().any(|p| p.contains("unknown entity 'param_z'")));
                assert!(problems.iter().any(|p| p.contains("does not match")));
            }
            other => panic!("expected conflict, got {other:?}"),
        }
        assert_eq!(prior, adder_with_same_timestamp(&prior));
    }

    fn adder_with_same_timestamp(prior: &Draft) -> Draft {
        let mut fresh = adder();
        fresh.created_at = prior.created_at;
        fresh
    }

    #[test]
    fn test_adding_existing_id_conflicts() {
        let delta = IrDelta::new("dup", Producer::User, 1.0).with_add(Entity::Effect(Effect {
            id: "param_a".into(),
            description: "prints".into(),
        }));
        assert!(matches!(
            DeltaEngine::new().apply_delta(&adder(), delta),
            Err(SessionError::DeltaConflict(_))
        ));
    }

    #[test]
    fn test_reference_to_resolved_hole_conflicts() {
        let delta = IrDelta::new("close early", Producer::User, 1.0).with_update(
            "hole_param_type",
            Patch::Hole {
                status: HoleStatus::Resolved,
            },
        );
        let err = DeltaEngine::new().apply_delta(&adder(), delta).unwrap_err();
        assert!(err.to_string().contains("resolved hole"));
    }

    #[test]
    fn test_removal_of_plain_entity() {
        let engine = DeltaEngine::new();
        let mut prior = adder();
        prior.ir.effects.push(Effect {
            id: "effect_1".into(),
            description: "logs".into(),
        });
        let next = engine
            .apply_delta(&prior, IrDelta::new("drop effect", Producer::User, 1.0).with_remove("effect_1"))
            .unwrap();
        assert!(next.ir.effects.is_empty());
        assert_eq!(next.delta.as_ref().map(|d| d.reason.as_str()), Some("drop effect"));
    }
}
