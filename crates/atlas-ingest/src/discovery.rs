//! File discovery (§4.3 "Inputs", step 1-2).
//!
//! Root computation: a single directory is the root; a single file's parent
//! is the root; multiple paths fall back to their longest common ancestor.
//! Directories are walked (recursively if requested) with symlinks not
//! followed and ignored directories pruned.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use atlas_types::{AtlasError, Result};
use walkdir::WalkDir;

/// Directory/file-name patterns pruned during discovery by default (§4.3
/// "an ignore list ... is applied during discovery"), extended here with a
/// few more common build/VCS directory names beyond the handful named
/// there.
pub fn default_ignore_patterns() -> Vec<String> {
    vec![
        ".git".to_string(),
        ".hg".to_string(),
        ".svn".to_string(),
        "node_modules".to_string(),
        "target".to_string(),
        "dist".to_string(),
        "build".to_string(),
        "*.lock".to_string(),
        "*.pyc".to_string(),
    ]
}

/// Matches a single path component against a glob pattern. Only a leading
/// or trailing `*` wildcard is supported, which covers every pattern this
/// component actually emits.
fn glob_match(pattern: &str, name: &str) -> bool {
    if let Some(suffix) = pattern.strip_prefix('*') {
        return name.ends_with(suffix);
    }
    if let Some(prefix) = pattern.strip_suffix('*') {
        return name.starts_with(prefix);
    }
    pattern == name
}

fn is_ignored(name: &str, patterns: &[String]) -> bool {
    patterns.iter().any(|p| glob_match(p, name))
}

/// Computes the ingestion root from the input paths (§4.3 step 1).
pub fn compute_root(paths: &[PathBuf]) -> Result<PathBuf> {
    if paths.is_empty() {
        return Err(AtlasError::validation("no paths given to ingest"));
    }
    if paths.len() == 1 {
        let p = &paths[0];
        return if p.is_dir() {
            Ok(p.clone())
        } else {
            Ok(p.parent().map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from(".")))
        };
    }

    let component_lists: Vec<Vec<std::ffi::OsString>> = paths
        .iter()
        .map(|p| {
            p.canonicalize()
                .unwrap_or_else(|_| p.clone())
                .components()
                .map(|c| c.as_os_str().to_os_string())
                .collect()
        })
        .collect();

    let shortest = component_lists.iter().map(Vec::len).min().unwrap_or(0);
    let mut common = PathBuf::new();
    for i in 0..shortest {
        let candidate = &component_lists[0][i];
        if component_lists.iter().all(|c| &c[i] == candidate) {
            common.push(candidate);
        } else {
            break;
        }
    }
    Ok(common)
}

/// Expands `paths` into a flat list of files to ingest, honoring
/// `recursive` and `ignore_patterns` (§4.3 step 2).
pub fn expand_paths(paths: &[PathBuf], recursive: bool, ignore_patterns: &[String]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let mut seen: HashSet<PathBuf> = HashSet::new();

    for path in paths {
        if path.is_file() {
            if seen.insert(path.clone()) {
                files.push(path.clone());
            }
            continue;
        }
        if !path.is_dir() {
            continue;
        }

        let max_depth = if recursive { usize::MAX } else { 1 };
        let walker = WalkDir::new(path)
            .max_depth(max_depth)
            .follow_links(false)
            .into_iter()
            .filter_entry(|entry| {
                entry
                    .file_name()
                    .to_str()
                    .map(|name| !is_ignored(name, ignore_patterns))
                    .unwrap_or(true)
            });

        for entry in walker.filter_map(|e| e.ok()) {
            if entry.file_type().is_file() && seen.insert(entry.path().to_path_buf()) {
                files.push(entry.path().to_path_buf());
            }
        }
    }

    files.sort();
    files
}
