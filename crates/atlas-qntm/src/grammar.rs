//! QNTM grammar (§4.2, normative EBNF):
//!
//! ```text
//! relationship = expression "~" expression "~" expression
//! expression   = concept | collection
//! concept      = identifier [":" value]
//! identifier   = snake_case_word
//! collection   = "[" expression_list "]"
//! ```
//!
//! Whitespace around `~` is required in canonical form; [`crate::sanitize`]
//! collapses it when deriving a collection name.

use once_cell::sync::Lazy;
use regex::Regex;

use atlas_types::{AtlasError, Result};

static IDENTIFIER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z][a-z0-9_]*$").unwrap());

fn is_identifier(s: &str) -> bool {
    IDENTIFIER_RE.is_match(s)
}

/// A concept is `identifier` or `identifier:value`; `value` may be any
/// non-empty text that doesn't itself contain grammar delimiters.
fn is_concept(s: &str) -> bool {
    match s.split_once(':') {
        None => is_identifier(s),
        Some((ident, value)) => {
            is_identifier(ident) && !value.is_empty() && !value.contains(['~', '[', ']'])
        }
    }
}

/// Splits a bracketed expression list on top-level commas (none of these
/// expressions nest brackets further per the grammar, so no depth tracking
/// is required beyond stripping the outer `[...]`).
fn split_expression_list(inner: &str) -> Vec<&str> {
    inner.split(',').map(|s| s.trim()).collect()
}

fn is_expression(s: &str) -> bool {
    let s = s.trim();
    if let Some(inner) = s.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
        let inner = inner.trim();
        if inner.is_empty() {
            return false;
        }
        return split_expression_list(inner).into_iter().all(is_expression);
    }
    is_concept(s)
}

/// Validates that `raw` is a well-formed QNTM relationship:
/// `expression "~" expression "~" expression`.
pub fn validate_key(raw: &str) -> Result<()> {
    let parts: Vec<&str> = raw.split('~').map(|p| p.trim()).collect();
    if parts.len() != 3 {
        return Err(AtlasError::validation(format!(
            "QNTM key must have exactly 3 `~`-separated parts, got {}: {raw:?}",
            parts.len()
        )));
    }
    for part in &parts {
        if part.is_empty() || !is_expression(part) {
            return Err(AtlasError::validation(format!(
                "QNTM key part {part:?} is not a valid expression in {raw:?}"
            )));
        }
    }
    Ok(())
}

pub fn is_valid_key(raw: &str) -> bool {
    validate_key(raw).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_simple_triplet() {
        validate_key("agent ~ emits ~ chunk").unwrap();
    }

    #[test]
    fn accepts_concept_with_value() {
        validate_key("content ~ type ~ markdown:v2").unwrap();
    }

    #[test]
    fn accepts_bracketed_collection_object() {
        validate_key("doc ~ references ~ [section_a, section_b]").unwrap();
    }

    #[test]
    fn rejects_wrong_arity() {
        assert!(validate_key("agent ~ emits").is_err());
        assert!(validate_key("a ~ b ~ c ~ d").is_err());
    }

    #[test]
    fn rejects_non_snake_case_identifier() {
        assert!(validate_key("Agent ~ emits ~ chunk").is_err());
        assert!(validate_key("agent ~ EMITS ~ chunk").is_err());
    }

    #[test]
    fn rejects_empty_part() {
        assert!(validate_key("agent ~  ~ chunk").is_err());
    }

    #[test]
    fn rejects_empty_collection() {
        assert!(validate_key("agent ~ emits ~ []").is_err());
    }
}
