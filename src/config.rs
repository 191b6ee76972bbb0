use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Repository mapping file contents
///
/// The mapping file is a YAML document with a single `repos` list, one entry
/// per repository to mirror:
///
/// ```yaml
/// repos:
///   - name: widgets
///     source: ssh://src.example.com/widgets
///     destination: git@dest.example.com:org/widgets
/// ```
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RepoMappings {
    /// Ordered list of repository mapping records
    pub repos: Vec<RepoMapping>,
}

/// One repository mapping record from the mapping file
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RepoMapping {
    /// Unique repository name, used as the cache subdirectory and in logs
    pub name: String,

    /// Source remote connection string (any scheme git supports)
    pub source: String,

    /// Destination remote connection string for mirroring
    pub destination: String,
}

impl RepoMappings {
    /// Load and validate a mapping file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read mapping file: {:?}", path))?;

        let mappings: RepoMappings = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse mapping file: {:?}", path))?;

        mappings
            .validate()
            .with_context(|| format!("Invalid mapping file: {:?}", path))?;

        Ok(mappings)
    }

    /// Validate mapping records
    ///
    /// Names must be non-empty and unique: the cache tree is partitioned by
    /// name, so two records sharing a name would fight over one directory.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();

        for mapping in &self.repos {
            if mapping.name.is_empty() {
                bail!("Mapping record has an empty name");
            }
            if mapping.source.is_empty() {
                bail!("Repository {} has an empty source", mapping.name);
            }
            if !seen.insert(mapping.name.as_str()) {
                bail!("Duplicate repository name: {}", mapping.name);
            }
        }

        Ok(())
    }
}

/// Runtime options for a mirror run
///
/// Constructed once at startup from command-line flags and passed into the
/// engine; there is no process-wide mutable configuration.
#[derive(Debug, Clone)]
pub struct MirrorOptions {
    /// Root directory holding one bare mirror per repository
    pub cache_dir: PathBuf,

    /// Whether to register destination remotes and push to them
    pub mirror_enabled: bool,

    /// Number of concurrent sync workers
    pub workers: usize,

    /// Wall-clock timeout applied to every git subprocess
    pub git_timeout: Duration,

    /// Name or path of the git binary to invoke
    pub git_program: String,
}

impl MirrorOptions {
    pub const DEFAULT_WORKERS: usize = 5;
    pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

    /// Create options for the given cache directory with default settings
    pub fn new(cache_dir: PathBuf) -> Self {
        Self {
            cache_dir,
            mirror_enabled: false,
            workers: Self::DEFAULT_WORKERS,
            git_timeout: Duration::from_secs(Self::DEFAULT_TIMEOUT_SECS),
            git_program: "git".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_yaml_parsing() {
        let yaml_content = r#"
repos:
  - name: widgets
    source: "ssh://src.example.com/widgets"
    destination: "git@dest.example.com:org/widgets"
  - name: gadgets
    source: "https://src.example.com/gadgets.git"
    destination: "git@dest.example.com:org/gadgets"
"#;

        let mappings: RepoMappings =
            serde_yaml::from_str(yaml_content).expect("Failed to parse YAML");

        assert_eq!(mappings.repos.len(), 2);
        assert_eq!(mappings.repos[0].name, "widgets");
        assert_eq!(mappings.repos[0].source, "ssh://src.example.com/widgets");
        assert_eq!(
            mappings.repos[1].destination,
            "git@dest.example.com:org/gadgets"
        );
    }

    #[test]
    fn test_load_valid_file() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = temp_dir.path().join("repos.yaml");
        std::fs::write(
            &path,
            "repos:\n  - name: a\n    source: ssh://src/a\n    destination: git@bb:org/a\n",
        )
        .expect("Failed to write mapping file");

        let mappings = RepoMappings::load(&path).expect("Failed to load mapping file");
        assert_eq!(mappings.repos.len(), 1);
        assert_eq!(mappings.repos[0].name, "a");
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = RepoMappings::load(Path::new("/nonexistent/path/repos.yaml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_malformed_yaml() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = temp_dir.path().join("repos.yaml");
        std::fs::write(&path, "repos: [invalid: yaml: content").expect("Failed to write");

        assert!(RepoMappings::load(&path).is_err());
    }

    #[test]
    fn test_validate_rejects_duplicate_names() {
        let mappings = RepoMappings {
            repos: vec![
                RepoMapping {
                    name: "dup".to_string(),
                    source: "ssh://src/dup".to_string(),
                    destination: "git@bb:org/dup".to_string(),
                },
                RepoMapping {
                    name: "dup".to_string(),
                    source: "ssh://src/other".to_string(),
                    destination: "git@bb:org/other".to_string(),
                },
            ],
        };

        let err = mappings.validate().unwrap_err();
        assert!(err.to_string().contains("Duplicate"));
    }

    #[test]
    fn test_validate_rejects_empty_name() {
        let mappings = RepoMappings {
            repos: vec![RepoMapping {
                name: String::new(),
                source: "ssh://src/a".to_string(),
                destination: "git@bb:org/a".to_string(),
            }],
        };

        assert!(mappings.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_source() {
        let mappings = RepoMappings {
            repos: vec![RepoMapping {
                name: "a".to_string(),
                source: String::new(),
                destination: "git@bb:org/a".to_string(),
            }],
        };

        assert!(mappings.validate().is_err());
    }

    #[test]
    fn test_options_defaults() {
        let options = MirrorOptions::new(PathBuf::from("/tmp/cache"));

        assert_eq!(options.cache_dir, PathBuf::from("/tmp/cache"));
        assert!(!options.mirror_enabled);
        assert_eq!(options.workers, 5);
        assert_eq!(options.git_timeout, Duration::from_secs(30));
        assert_eq!(options.git_program, "git");
    }
}
