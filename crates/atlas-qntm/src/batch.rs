//! Batch QNTM generation (§4.2 "Batch Generation", §4.3 step 6d).
//!
//! Dispatches generation for every chunk of a file concurrently, under a
//! bounded-concurrency cap; the i-th result corresponds to the i-th input
//! chunk.

use std::sync::Arc;

use futures::stream::{self, StreamExt};

use atlas_types::Result;

use crate::generator::{GenerationResult, KeyGenerator};
use crate::reuse_cache::ReuseCache;

/// Generates keys for every `(chunk_text, context)` pair in `chunks`,
/// running up to `concurrency` generation calls at a time. Order of the
/// returned `Vec` matches the order of `chunks`.
pub async fn generate_batch(
    generator: &Arc<dyn KeyGenerator>,
    chunks: &[(String, Option<String>)],
    reuse_cache: &ReuseCache,
    existing_keys_sample_size: usize,
    concurrency: usize,
) -> Vec<Result<GenerationResult>> {
    let sample = reuse_cache.sample(existing_keys_sample_size);

    stream::iter(chunks.iter().cloned())
        .map(|(text, context)| {
            let generator = generator.clone();
            let sample = sample.clone();
            async move {
                generator
                    .generate(&text, &sample, context.as_deref())
                    .await
            }
        })
        .buffered(concurrency.max(1))
        .collect()
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::MockKeyGenerator;

    #[tokio::test]
    async fn preserves_input_order() {
        let generator: Arc<dyn KeyGenerator> = Arc::new(MockKeyGenerator::new(vec![
            "agent ~ emits ~ chunk".to_string(),
        ]));
        let chunks: Vec<(String, Option<String>)> = (0..20)
            .map(|i| (format!("chunk {i}"), None))
            .collect();
        let cache = ReuseCache::default();

        let results = generate_batch(&generator, &chunks, &cache, 50, 4).await;
        assert_eq!(results.len(), 20);
        for r in results {
            assert!(r.is_ok());
        }
    }
}
