//! Cycle prevention (§4.5 "Cycle Prevention", §8 property 7 "DAG
//! acyclicity"). Before writing a new consolidated chunk, verify its own id
//! is not already reachable by walking `consolidated -> parents` edges up
//! from its proposed parents; if it were, writing `new -> parent -> ... ->
//! new` would close a cycle.

use std::collections::HashSet;

use atlas_types::{Chunk, ChunkId};

/// Returns true if `candidate_id` is reachable by following `parents` edges
/// upward from any of `proposed_parents`, using `lookup` to resolve a
/// chunk's own parents.
pub fn would_create_cycle<F>(candidate_id: &ChunkId, proposed_parents: &[Chunk], lookup: F) -> bool
where
    F: Fn(&ChunkId) -> Option<Chunk>,
{
    let mut visited: HashSet<ChunkId> = HashSet::new();
    let mut stack: Vec<ChunkId> = proposed_parents.iter().map(|c| c.id.clone()).collect();

    while let Some(id) = stack.pop() {
        if &id == candidate_id {
            return true;
        }
        if !visited.insert(id.clone()) {
            continue;
        }
        if let Some(chunk) = lookup(&id) {
            if let Some(meta) = &chunk.consolidation {
                stack.extend(meta.parents.iter().cloned());
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use atlas_types::{ConsolidationDirection, ConsolidationMeta, ConsolidationType, Importance};
    use std::collections::HashMap;

    fn leaf(id: &str) -> Chunk {
        let mut c = Chunk::new(
            "f.md".into(),
            0,
            1,
            vec![1.0],
            "t".into(),
            vec![],
            Importance::Normal,
        );
        c.id = ChunkId(id.to_string());
        c
    }

    fn consolidated(id: &str, parents: &[&str]) -> Chunk {
        let mut c = leaf(id);
        c.consolidated = true;
        c.consolidation = Some(ConsolidationMeta {
            occurrences: parents.len() as u32,
            parents: parents.iter().map(|p| ChunkId(p.to_string())).collect(),
            consolidated_from: parents.iter().map(|p| ChunkId(p.to_string())).collect(),
            consolidation_type: ConsolidationType::DuplicateWork,
            consolidation_direction: ConsolidationDirection::Convergent,
            consolidation_reasoning: "r".into(),
        });
        c
    }

    #[test]
    fn no_cycle_for_fresh_leaf_parents() {
        let a = leaf("a");
        let b = leaf("b");
        let store: HashMap<String, Chunk> = HashMap::new();
        let candidate = ChunkId("new".into());
        assert!(!would_create_cycle(&candidate, &[a, b], |id| {
            store.get(id.as_str()).cloned()
        }));
    }

    #[test]
    fn no_cycle_for_diamond_shaped_ancestry() {
        // p1 and p2 both descend from `root`, but neither is an ancestor of
        // `new` itself - that's a diamond, not a cycle.
        let mut store: HashMap<String, Chunk> = HashMap::new();
        store.insert("root".into(), leaf("root"));
        store.insert("p1".into(), consolidated("p1", &["root"]));
        store.insert("p2".into(), consolidated("p2", &["root"]));
        let p1 = store.get("p1").unwrap().clone();
        let p2 = store.get("p2").unwrap().clone();
        let candidate = ChunkId("new".into());
        assert!(!would_create_cycle(&candidate, &[p1, p2], |id| {
            store.get(id.as_str()).cloned()
        }));
    }

    #[test]
    fn detects_cycle_when_candidate_id_is_its_own_ancestor() {
        let mut store: HashMap<String, Chunk> = HashMap::new();
        store.insert("p1".into(), consolidated("p1", &["new"]));
        let p1 = store.get("p1").unwrap().clone();
        let candidate = ChunkId("new".into());
        assert!(would_create_cycle(&candidate, &[p1], |id| {
            store.get(id.as_str()).cloned()
        }));
    }
}
