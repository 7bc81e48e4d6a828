//! Text helpers shared by the detector, curator and translators.

/// Words that carry no meaning for naming or rule matching.
const STOPWORDS: &[&str] = &[
    "a", "an", "the", "that", "which", "who", "function", "method", "procedure", "routine",
    "program", "to", "of", "and", "or", "for", "from", "with", "by", "in", "on", "it", "its",
    "given", "takes", "take", "returns", "return", "one", "two", "three", "four", "five",
    "some", "any", "all", "each", "then", "should", "will", "can", "me", "please", "write",
];

/// Type hints that name no concrete type.
const UNRESOLVED_TYPES: &[&str] = &["any", "unknown", "?", "auto", "_", "todo", "tbd"];

/// Names a predicate may use without declaring them.
const PREDICATE_KEYWORDS: &[&str] = &[
    "result", "return", "old", "true", "false", "and", "or", "not", "in", "is", "none", "null",
    "self", "forall", "exists", "len",
];

/// Lowercase alphanumeric words of `text`.
pub fn words(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric() && c != '_')
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Crude singular form: `numbers` → `number`, `adds` → `add`.
pub fn singular(word: &str) -> &str {
    if word.len() > 3 && word.ends_with('s') && !word.ends_with("ss") {
        &word[..word.len() - 1]
    } else {
        word
    }
}

/// Whether `word` is a stopword.
pub fn is_stopword(word: &str) -> bool {
    STOPWORDS.contains(&word)
}

/// Normalized form used to compare resolution texts: trimmed, lowercased,
/// inner whitespace collapsed.
pub fn normalize(text: &str) -> String {
    text.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Whether a concrete type hint still leaves the type open.
pub fn is_unresolved_type(type_hint: &str) -> bool {
    let t = type_hint.trim().to_lowercase();
    t.is_empty() || t.ends_with('?') || UNRESOLVED_TYPES.contains(&t.as_str())
}

/// Whether `ident` is a built-in name of the predicate language, in any case
/// (`None`, `TRUE`, `Result`).
pub fn is_predicate_keyword(ident: &str) -> bool {
    PREDICATE_KEYWORDS.iter().any(|k| k.eq_ignore_ascii_case(ident))
}

/// Snake-case identifier from the first two meaningful words of `text`.
///
/// `"A function that adds two numbers"` → `"add_numbers"`.
pub fn derive_identifier(text: &str) -> Option<String> {
    let picked: Vec<String> = words(text)
        .into_iter()
        .filter(|w| !is_stopword(w) && w.chars().next().is_some_and(char::is_alphabetic))
        .take(2)
        .collect();

    let first = picked.first()?;
    let mut ident = singular(first).to_string();
    if let Some(second) = picked.get(1) {
        ident.push('_');
        ident.push_str(second);
    }
    Some(ident)
}

/// Free identifiers of a predicate expression.
///
/// Skips quoted strings, numbers, member accesses (`x.len`) and call heads
/// (`abs(x)`), which name functions rather than values.
pub fn free_identifiers(expr: &str) -> Vec<String> {
    let chars: Vec<char> = expr.chars().collect();
    let mut idents = Vec::new();
    let mut quote: Option<char> = None;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            i += 1;
            continue;
        }

        if c == '"' || c == '\'' {
            quote = Some(c);
            i += 1;
            continue;
        }

        if c.is_ascii_digit() {
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '.' || chars[i] == '_') {
                i += 1;
            }
            continue;
        }

        if c.is_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            let ident: String = chars[start..i].iter().collect();

            let after_dot = start > 0 && chars[start - 1] == '.';
            let next = chars[i..].iter().find(|c| !c.is_whitespace());
            let is_call = next == Some(&'(');

            if !after_dot && !is_call && !idents.contains(&ident) {
                idents.push(ident);
            }
            continue;
        }

        i += 1;
    }

    idents
}
