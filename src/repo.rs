use anyhow::{anyhow, Result};
use std::path::{Path, PathBuf};

use crate::config::RepoMapping;

/// Marker file written by git into a repository after a successful fetch.
/// Its presence is the reuse signal for an existing cache entry.
const FETCH_MARKER: &str = "FETCH_HEAD";

/// Immutable descriptor for one repository to mirror
///
/// `root` is deterministic from the cache root and the repository name, so
/// descriptors built from a validated mapping file never share a cache
/// subtree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorRepo {
    /// Repository name from the mapping file
    pub name: String,

    /// Local bare mirror location: `cache_root/name`
    pub root: PathBuf,

    /// Source remote connection string
    pub source: String,

    /// Destination remote connection string
    pub destination: String,
}

impl MirrorRepo {
    /// Build a descriptor from a mapping record rooted under `cache_root`
    pub fn from_mapping(cache_root: &Path, mapping: &RepoMapping) -> Self {
        Self {
            name: mapping.name.clone(),
            root: cache_root.join(&mapping.name),
            source: mapping.source.clone(),
            destination: mapping.destination.clone(),
        }
    }

    /// Derive the push-remote name from the destination connection string
    ///
    /// Takes the host-like token between `@` and `:`, e.g.
    /// `git@bb:org/a` -> `bb`. The token doubles as the registration
    /// filename under `remotes/`.
    pub fn remote_name(&self) -> Result<String> {
        let after_at = self.destination.split('@').nth(1).ok_or_else(|| {
            anyhow!(
                "destination {} has no user@host part to derive a remote name from",
                self.destination
            )
        })?;

        let host = after_at.split_once(':').map_or(after_at, |(host, _)| host);
        if host.is_empty() {
            return Err(anyhow!(
                "destination {} has an empty host part",
                self.destination
            ));
        }

        Ok(host.to_string())
    }

    /// Check for the post-fetch marker file inside the local mirror
    ///
    /// A heuristic, not an integrity check: it only tells us a fetch once
    /// completed here.
    pub fn has_fetch_marker(&self) -> bool {
        self.root.join(FETCH_MARKER).exists()
    }

    /// Path of the remote-registration file for the given remote name
    pub fn remotes_file(&self, remote_name: &str) -> PathBuf {
        self.root.join("remotes").join(remote_name)
    }
}

/// Build descriptors for all mapping records under one cache root
pub fn build_repos(cache_root: &Path, mappings: &[RepoMapping]) -> Vec<MirrorRepo> {
    mappings
        .iter()
        .map(|mapping| MirrorRepo::from_mapping(cache_root, mapping))
        .collect()
}
