//! Sanitization: the deterministic mapping from a QNTM key to a collection
//! name (§4.2, §8 properties 1–2).
//!
//! Strip `@`, replace `~` and runs of whitespace with `_`, drop characters
//! outside `[A-Za-z0-9_-]`, lowercase. Collisions between distinct keys are
//! accepted as intentional semantic aliasing, not a bug.

use once_cell::sync::Lazy;
use regex::Regex;

static WHITESPACE_OR_TILDE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[~\s]+").unwrap());
static DISALLOWED: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9_-]").unwrap());

/// Sanitizes a QNTM key into a valid collection name.
///
/// Idempotent: `sanitize(sanitize(k)) == sanitize(k)` (§8 property 2).
pub fn sanitize(key: &str) -> String {
    let without_at = key.replace('@', "");
    let underscored = WHITESPACE_OR_TILDE.replace_all(&without_at, "_");
    let stripped = DISALLOWED.replace_all(&underscored, "");
    stripped.to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn collapses_tilde_and_whitespace() {
        assert_eq!(sanitize("agent ~ emits ~ chunk"), "agent_emits_chunk");
    }

    #[test]
    fn strips_at_sign() {
        assert_eq!(sanitize("@agent ~ emits ~ chunk"), "agent_emits_chunk");
    }

    #[test]
    fn drops_disallowed_characters() {
        assert_eq!(sanitize("a ~ b! ~ c?"), "a_b_c");
    }

    #[test]
    fn lowercases() {
        assert_eq!(sanitize("Agent ~ Emits ~ Chunk"), "agent_emits_chunk");
    }

    proptest! {
        #[test]
        fn is_idempotent(key in "[ -~]{0,40}") {
            let once = sanitize(&key);
            let twice = sanitize(&once);
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn always_matches_collection_name_charset(key in "[ -~]{0,40}") {
            let s = sanitize(&key);
            prop_assert!(s.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-'));
        }
    }
}
