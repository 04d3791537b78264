//! Query expansion (§4.4 step 1): ask the LLM for additional QNTM-shaped
//! keys likely to match relevant content, to union into the candidate
//! filter.

use atlas_context::JsonLlm;
use atlas_qntm::is_valid_key;
use atlas_types::{AtlasError, Result};
use serde::Deserialize;
use tracing::warn;

#[derive(Debug, Deserialize)]
struct RawExpansion {
    #[serde(default)]
    keys: Vec<String>,
}

/// Returns additional QNTM keys the model thinks are relevant to `query`.
/// Keys failing grammar validation are dropped with a warning rather than
/// failing the whole search (expansion is an optimization, not load-bearing).
pub async fn expand_query(llm: &dyn JsonLlm, query: &str) -> Result<Vec<String>> {
    let prompt = format!(
        "Given the search query below, suggest up to 3 QNTM keys of the form \
         `subject ~ predicate ~ object` (snake_case parts) likely to match \
         relevant stored content. Respond as JSON: {{\"keys\": [...]}}.\n\n\
         Query: {query}"
    );
    let value = llm.complete_json(&prompt, 0.1).await?;
    let raw: RawExpansion = serde_json::from_value(value)
        .map_err(|e| AtlasError::validation(format!("query expansion response malformed: {e}")))?;

    let valid: Vec<String> = raw
        .keys
        .into_iter()
        .filter(|k| {
            let ok = is_valid_key(k);
            if !ok {
                warn!(key = %k, "dropping invalid QNTM key from query expansion");
            }
            ok
        })
        .collect();
    Ok(valid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct StubLlm(serde_json::Value);

    #[async_trait]
    impl JsonLlm for StubLlm {
        async fn complete_json(&self, _prompt: &str, _temperature: f32) -> Result<serde_json::Value> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn drops_invalid_keys_but_keeps_valid_ones() {
        let llm = StubLlm(serde_json::json!({"keys": ["a ~ b ~ c", "Not Valid"]}));
        let keys = expand_query(&llm, "q").await.unwrap();
        assert_eq!(keys, vec!["a ~ b ~ c".to_string()]);
    }
}
