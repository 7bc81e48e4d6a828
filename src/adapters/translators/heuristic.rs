//! Deterministic local translator.
//!
//! Reads the prompt word by word: the function name comes from the first
//! meaningful words, the parameter count from a number word ("two numbers"),
//! parameter types from type nouns ("a string"). Anything it cannot tell is
//! left as a typed hole for the session to resolve.

use async_trait::async_trait;

use crate::domain::errors::TranslationError;
use crate::domain::models::{
    Clause, Effect, Intent, IrDocument, Parameter, Signature, Slot, TypedHole,
};
use crate::domain::ports::{Translation, Translator};
use crate::domain::text;

/// Shared hole for parameter types the prompt leaves open.
pub const PARAM_TYPE_HOLE: &str = "hole_param_type";

/// Hole for a return type the prompt leaves open.
pub const RETURN_TYPE_HOLE: &str = "hole_return_type";

const NUMBER_WORDS: &[(&str, usize)] = &[
    ("one", 1),
    ("single", 1),
    ("two", 2),
    ("pair", 2),
    ("both", 2),
    ("three", 3),
    ("four", 4),
    ("five", 5),
];

const TYPE_WORDS: &[(&str, &str)] = &[
    ("integer", "int"),
    ("int", "int"),
    ("float", "float"),
    ("decimal", "float"),
    ("string", "str"),
    ("text", "str"),
    ("word", "str"),
    ("sentence", "str"),
    ("list", "list"),
    ("array", "list"),
    ("boolean", "bool"),
];

const PREDICATE_VERBS: &[&str] = &["is", "check", "whether", "validate", "verify", "contain"];

const NUMERIC_VERBS: &[&str] = &["add", "sum", "subtract", "multiply", "divide", "average", "increment"];

const EFFECT_PHRASES: &[(&str, &str)] = &[
    ("print", "prints the result to standard output"),
    ("display", "prints the result to standard output"),
    ("log", "writes a log entry"),
    ("write", "writes the result to a file"),
    ("save", "writes the result to a file"),
    ("send", "sends the result over the network"),
];

/// Offline translator that reads the prompt for signatures and constraints.
#[derive(Debug, Clone, Default)]
pub struct HeuristicTranslator;

impl HeuristicTranslator {
    /// New translator.
    pub fn new() -> Self {
        Self
    }

    fn parameter_names(count: usize) -> Vec<String> {
        if count <= 1 {
            return vec!["input".to_string()];
        }
        (0..count)
            .map(|i| {
                let letter = u8::try_from(i).map_or('x', |i| char::from(b'a' + i % 26));
                letter.to_string()
            })
            .collect()
    }
}

#[async_trait]
impl Translator for HeuristicTranslator {
    fn name(&self) -> &'static str {
        "heuristic"
    }

    async fn translate(&self, prompt: &str) -> Result<Translation, TranslationError> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(TranslationError::EmptyPrompt);
        }
        let name = text::derive_identifier(prompt).ok_or_else(|| {
            TranslationError::Malformed(format!("no function name can be derived from '{prompt}'"))
        })?;

        let words: Vec<String> = text::words(prompt)
            .iter()
            .map(|w| text::singular(w).to_string())
            .collect();
        let has = |list: &[&str]| words.iter().any(|w| list.contains(&w.as_str()));

        let count = words
            .iter()
            .find_map(|w| {
                NUMBER_WORDS
                    .iter()
                    .find(|(word, _)| word == w)
                    .map(|(_, n)| *n)
                    .or_else(|| w.parse::<usize>().ok().filter(|n| (1..=8).contains(n)))
            })
            .unwrap_or(1);
        let known_type = words
            .iter()
            .find_map(|w| TYPE_WORDS.iter().find(|(word, _)| word == w).map(|(_, t)| *t));

        let mut holes = Vec::new();
        let param_type: Slot<String> = match known_type {
            Some(t) => Slot::Value(t.to_string()),
            None => {
                holes.push(
                    TypedHole::new(PARAM_TYPE_HOLE, Clause::Signature, "type")
                        .with_description("Parameter types are not specified"),
                );
                Slot::hole(PARAM_TYPE_HOLE)
            }
        };

        let parameters = Self::parameter_names(count)
            .into_iter()
            .map(|n| Parameter::new(format!("param_{n}"), n, param_type.clone()))
            .collect();

        let returns = if has(PREDICATE_VERBS) {
            Slot::Value("bool".to_string())
        } else if has(NUMERIC_VERBS) {
            param_type.clone()
        } else {
            holes.push(
                TypedHole::new(RETURN_TYPE_HOLE, Clause::Signature, "type")
                    .with_description("Return type is not specified"),
            );
            Slot::hole(RETURN_TYPE_HOLE)
        };

        let mut ir = IrDocument::new(
            Intent {
                summary: prompt.into(),
                rationale: None,
            },
            Signature {
                name: name.into(),
                parameters,
                returns: Some(returns),
            },
        );

        let mut described: Vec<&str> = Vec::new();
        for (verb, description) in EFFECT_PHRASES {
            if words.iter().any(|w| w == verb) && !described.contains(description) {
                described.push(*description);
                ir.effects.push(Effect {
                    id: format!("effect_{}", ir.effects.len() + 1),
                    description: (*description).into(),
                });
            }
        }

        Ok(Translation { ir, holes })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_adder_prompt_shares_one_type_hole() {
        let t = HeuristicTranslator::new()
            .translate("A function that adds two numbers")
            .await
            .unwrap();
        assert_eq!(t.ir.signature.name, Slot::Value("add_numbers".to_string()));
        assert_eq!(t.ir.signature.parameters.len(), 2);
        assert_eq!(t.ir.signature.parameters[0].type_hint.hole_id(), Some(PARAM_TYPE_HOLE));
        assert_eq!(
            t.ir.signature.returns.as_ref().and_then(Slot::hole_id),
            Some(PARAM_TYPE_HOLE)
        );
        assert_eq!(t.holes.len(), 1);
        assert_eq!(t.holes[0].id, PARAM_TYPE_HOLE);
    }

    #[tokio::test]
    async fn test_known_type_and_predicate_return() {
        let t = HeuristicTranslator::new()
            .translate("Check whether a string is a palindrome")
            .await
            .unwrap();
        assert_eq!(t.ir.signature.parameters.len(), 1);
        assert_eq!(t.ir.signature.parameters[0].type_hint, Slot::Value("str".to_string()));
        assert_eq!(t.ir.signature.returns, Some(Slot::Value("bool".to_string())));
        assert!(t.holes.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_return_gets_its_own_hole() {
        let t = HeuristicTranslator::new().translate("Reverse a string").await.unwrap();
        assert_eq!(t.holes.len(), 1);
        assert_eq!(t.holes[0].id, RETURN_TYPE_HOLE);
    }

    #[tokio::test]
    async fn test_effect_phrases_become_effects() {
        let t = HeuristicTranslator::new()
            .translate("Print and log three integers")
            .await
            .unwrap();
        assert_eq!(t.ir.effects.len(), 2);
        assert_eq!(t.ir.signature.parameters.len(), 3);
        assert_eq!(t.ir.signature.parameters[2].id, "param_c");
    }

    #[tokio::test]
    async fn test_stopword_only_prompt_is_malformed() {
        let err = HeuristicTranslator::new().translate("a the of").await.unwrap_err();
        assert!(matches!(err, TranslationError::Malformed(_)));
    }
}
