//! The unit of change between two drafts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::ir::{Assertion, Effect, HoleStatus, Parameter, TypedHole};

/// Who produced a delta: a user, or the inference rule whose suggestion was
/// accepted. Serialized as `"user"` or the rule id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Producer {
    /// A person typed the resolution
    User,
    /// An accepted suggestion of the named rule
    Rule(String),
}

impl Producer {
    /// Id of the rule, for rule-produced deltas.
    pub fn rule_id(&self) -> Option<&str> {
        match self {
            Self::User => None,
            Self::Rule(id) => Some(id.as_str()),
        }
    }
}

impl From<String> for Producer {
    fn from(value: String) -> Self {
        if value == "user" {
            Self::User
        } else {
            Self::Rule(value)
        }
    }
}

impl From<Producer> for String {
    fn from(value: Producer) -> Self {
        match value {
            Producer::User => "user".to_string(),
            Producer::Rule(id) => id,
        }
    }
}

impl std::fmt::Display for Producer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => f.write_str("user"),
            Self::Rule(id) => f.write_str(id),
        }
    }
}

/// A new entity introduced by a delta.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "entity", rename_all = "snake_case")]
pub enum Entity {
    /// New parameter
    Parameter(Parameter),
    /// New effect
    Effect(Effect),
    /// New assertion
    Assertion(Assertion),
    /// New hole in the registry
    Hole(TypedHole),
}

impl Entity {
    /// Id of the introduced entity.
    pub fn id(&self) -> &str {
        match self {
            Self::Parameter(p) => &p.id,
            Self::Effect(e) => &e.id,
            Self::Assertion(a) => &a.id,
            Self::Hole(h) => &h.id,
        }
    }
}

/// Field-level changes to one existing entity. `None` leaves a field as is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "entity", rename_all = "snake_case")]
pub enum Patch {
    /// Change to the intent clause
    Intent {
        /// New summary
        #[serde(default, skip_serializing_if = "Option::is_none")]
        summary: Option<String>,
        /// New rationale
        #[serde(default, skip_serializing_if = "Option::is_none")]
        rationale: Option<String>,
    },
    /// Change to the signature header
    Signature {
        /// New function name
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        /// New return type
        #[serde(default, skip_serializing_if = "Option::is_none")]
        returns: Option<String>,
    },
    /// Change to one parameter
    Parameter {
        /// New parameter name
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        /// New parameter type
        #[serde(default, skip_serializing_if = "Option::is_none")]
        type_hint: Option<String>,
    },
    /// Change to one effect
    Effect {
        /// New description
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
    /// Change to one assertion
    Assertion {
        /// New predicate
        #[serde(default, skip_serializing_if = "Option::is_none")]
        predicate: Option<String>,
        /// New rationale
        #[serde(default, skip_serializing_if = "Option::is_none")]
        rationale: Option<String>,
    },
    /// Status change of a registered hole
    Hole {
        /// New status
        status: HoleStatus,
    },
}

impl Patch {
    /// Entity kind the patch applies to.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Intent { .. } => "intent",
            Self::Signature { .. } => "signature",
            Self::Parameter { .. } => "parameter",
            Self::Effect { .. } => "effect",
            Self::Assertion { .. } => "assertion",
            Self::Hole { .. } => "hole",
        }
    }

    /// Combine two patches on the same entity; fields set in `other` win.
    /// Returns `None` when the patches target different entity kinds.
    pub fn merge(self, other: Patch) -> Option<Patch> {
        match (self, other) {
            (
                Self::Intent { summary, rationale },
                Self::Intent {
                    summary: s,
                    rationale: r,
                },
            ) => Some(Self::Intent {
                summary: s.or(summary),
                rationale: r.or(rationale),
            }),
            (Self::Signature { name, returns }, Self::Signature { name: n, returns: r }) => {
                Some(Self::Signature {
                    name: n.or(name),
                    returns: r.or(returns),
                })
            }
            (
                Self::Parameter { name, type_hint },
                Self::Parameter {
                    name: n,
                    type_hint: t,
                },
            ) => Some(Self::Parameter {
                name: n.or(name),
                type_hint: t.or(type_hint),
            }),
            (Self::Effect { description }, Self::Effect { description: d }) => Some(Self::Effect {
                description: d.or(description),
            }),
            (
                Self::Assertion {
                    predicate,
                    rationale,
                },
                Self::Assertion {
                    predicate: p,
                    rationale: r,
                },
            ) => Some(Self::Assertion {
                predicate: p.or(predicate),
                rationale: r.or(rationale),
            }),
            (Self::Hole { .. }, Self::Hole { status }) => Some(Self::Hole { status }),
            _ => None,
        }
    }
}

/// Atomic, targeted change set: `add`, then `update`, then `remove`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IrDelta {
    /// Entities introduced by the delta
    #[serde(default)]
    pub add: Vec<Entity>,
    /// Field patches keyed by entity id
    #[serde(default)]
    pub update: BTreeMap<String, Patch>,
    /// Entity ids to remove
    #[serde(default)]
    pub remove: Vec<String>,
    /// Why the change was made
    pub reason: String,
    /// Confidence of the producer, in `[0, 1]`
    pub confidence: f64,
    /// Who made the change
    pub produced_by: Producer,
    /// When the delta was computed
    pub timestamp: DateTime<Utc>,
}

impl IrDelta {
    /// Empty delta from `produced_by`.
    pub fn new(reason: impl Into<String>, produced_by: Producer, confidence: f64) -> Self {
        Self {
            add: Vec::new(),
            update: BTreeMap::new(),
            remove: Vec::new(),
            reason: reason.into(),
            confidence,
            produced_by,
            timestamp: Utc::now(),
        }
    }

    /// Introduce `entity`.
    pub fn with_add(mut self, entity: Entity) -> Self {
        self.add.push(entity);
        self
    }

    /// Patch entity `id`.
    pub fn with_update(mut self, id: impl Into<String>, patch: Patch) -> Self {
        self.update.insert(id.into(), patch);
        self
    }

    /// Remove entity `id`.
    pub fn with_remove(mut self, id: impl Into<String>) -> Self {
        self.remove.push(id.into());
        self
    }

    /// Whether the delta changes nothing.
    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.update.is_empty() && self.remove.is_empty()
    }

    /// Ids this delta adds, updates or removes.
    pub fn touched_ids(&self) -> BTreeSet<String> {
        self.add
            .iter()
            .map(|e| e.id().to_string())
            .chain(self.update.keys().cloned())
            .chain(self.remove.iter().cloned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::ir::Slot;

    #[test]
    fn test_producer_serializes_as_plain_string() {
        assert_eq!(serde_json::to_string(&Producer::User).unwrap(), "\"user\"");
        assert_eq!(
            serde_json::to_string(&Producer::Rule("numeric-int".into())).unwrap(),
            "\"numeric-int\""
        );
        let parsed: Producer = serde_json::from_str("\"user\"").unwrap();
        assert_eq!(parsed, Producer::User);
    }

    #[test]
    fn test_patch_merge_prefers_later_fields() {
        let a = Patch::Signature {
            name: Some("add".into()),
            returns: None,
        };
        let b = Patch::Signature {
            name: None,
            returns: Some("int".into()),
        };
        assert_eq!(
            a.merge(b),
            Some(Patch::Signature {
                name: Some("add".into()),
                returns: Some("int".into()),
            })
        );
    }

    #[test]
    fn test_patch_merge_rejects_mixed_kinds() {
        let a = Patch::Effect { description: None };
        let b = Patch::Hole {
            status: HoleStatus::Resolved,
        };
        assert!(a.merge(b).is_none());
    }

    #[test]
    fn test_touched_ids() {
        let delta = IrDelta::new("test", Producer::User, 1.0)
            .with_add(Entity::Effect(Effect {
                id: "effect_1".into(),
                description: Slot::Value("writes a log line".into()),
            }))
            .with_update(
                "param_a",
                Patch::Parameter {
                    name: None,
                    type_hint: Some("int".into()),
                },
            )
            .with_remove("assert_1");

        let touched = delta.touched_ids();
        assert_eq!(touched.len(), 3);
        assert!(touched.contains("effect_1"));
        assert!(!delta.is_empty());
    }

    #[test]
    fn test_entity_tag_does_not_clash_with_hole_kind() {
        let hole = TypedHole::new("h1", crate::domain::models::ir::Clause::Effects, "text");
        let json = serde_json::to_value(Entity::Hole(hole)).unwrap();
        assert_eq!(json["entity"], "hole");
        assert_eq!(json["kind"], "placeholder");
    }
}
