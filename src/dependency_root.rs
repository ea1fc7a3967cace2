use std::path::PathBuf;

use tracing::debug;

use crate::error::{BundleError, Result};

/// Locates the installed-dependencies directory by scanning a list of
/// library search paths for the one whose path contains `marker`.
///
/// Exactly one entry may match: zero and several matches (e.g. two
/// installed versions) both fail, with every candidate listed. Pure
/// function of its inputs, so repeated calls agree.
pub fn resolve_dependency_root(search_paths: &[PathBuf], marker: &str) -> Result<PathBuf> {
    let candidates: Vec<PathBuf> = search_paths
        .iter()
        .filter(|path| path.to_string_lossy().contains(marker))
        .cloned()
        .collect();

    match candidates.as_slice() {
        [root] => {
            debug!(root = %root.display(), "resolved dependency root");
            Ok(root.clone())
        }
        _ => Err(BundleError::DependencyRootNotFound {
            marker: marker.to_string(),
            candidates,
        }),
    }
}
