//! Hierarchical semantic splitter (§4.3 step 6b).
//!
//! Tries separators in priority order (`["\n\n", "\n", ". ", " ", ""]` by
//! default), recursing into oversized pieces with the next, narrower
//! separator; merges adjacent pieces up to a target chunk size with
//! trailing overlap carried into the next chunk. Token size is estimated
//! (chars / 4), since no tokenizer is mandated by this layer.

fn estimate_tokens(s: &str) -> usize {
    ((s.chars().count() as f64) / 4.0).ceil() as usize
}

fn split_recursive(text: &str, separators: &[String], chunk_size: usize, overlap: usize) -> Vec<String> {
    if estimate_tokens(text) <= chunk_size || separators.is_empty() {
        return vec![text.to_string()];
    }

    let sep = &separators[0];
    let rest = &separators[1..];

    let parts: Vec<&str> = if sep.is_empty() {
        // Character-level fallback: every remaining grapheme is its own part.
        text.char_indices()
            .map(|(i, c)| &text[i..i + c.len_utf8()])
            .collect()
    } else {
        text.split(sep.as_str()).collect()
    };

    let mut chunks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut current_tokens = 0usize;

    for part in parts {
        let part_tokens = estimate_tokens(part);

        if part_tokens > chunk_size {
            if !current.is_empty() {
                chunks.push(current.join(sep));
                current.clear();
                current_tokens = 0;
            }
            chunks.extend(split_recursive(part, rest, chunk_size, overlap));
            continue;
        }

        if current_tokens + part_tokens > chunk_size && !current.is_empty() {
            chunks.push(current.join(sep));

            // Carry trailing parts worth up to `overlap` tokens into the
            // next chunk so context isn't lost at the boundary.
            let mut carried: Vec<&str> = Vec::new();
            let mut carried_tokens = 0usize;
            for p in current.iter().rev() {
                let t = estimate_tokens(p);
                if carried_tokens + t > overlap {
                    break;
                }
                carried.insert(0, *p);
                carried_tokens += t;
            }
            current = carried;
            current_tokens = carried_tokens;
        }

        current.push(part);
        current_tokens += part_tokens;
    }

    if !current.is_empty() {
        chunks.push(current.join(sep));
    }

    chunks
}

/// Splits `text` into chunks, skipping any that are empty after trimming
/// (§4.3 step 6b).
pub fn chunk_text(text: &str, separators: &[String], chunk_size: usize, overlap: usize) -> Vec<String> {
    split_recursive(text, separators, chunk_size, overlap)
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
