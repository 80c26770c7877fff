//! Registry policy configuration: the enumerated knobs from the Registry component's
//! configuration surface, independent of which storage or auth adapter backs a deployment.
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Default `max_manifest_size`: 4 MiB.
pub const DEFAULT_MAX_MANIFEST_SIZE: u64 = 4 * 1024 * 1024;
/// Default `max_blob_upload_chunk_size`: 10 MiB.
pub const DEFAULT_MAX_BLOB_UPLOAD_CHUNK_SIZE: u64 = 10 * 1024 * 1024;

fn default_repo_name_pattern() -> String {
    r#"^[a-z0-9]+([._-][a-z0-9]+)*(/[a-z0-9]+([._-][a-z0-9]+)*)*$"#.to_string()
}

fn default_max_manifest_size() -> u64 {
    DEFAULT_MAX_MANIFEST_SIZE
}

fn default_max_blob_upload_chunk_size() -> u64 {
    DEFAULT_MAX_BLOB_UPLOAD_CHUNK_SIZE
}

fn default_realm() -> String {
    "registry".to_string()
}

/// The Registry's policy configuration, as described in the Registry component design:
/// size limits, deletion flags, repository name validation, and the realm used in auth
/// challenges. Storage and auth adapter selection live alongside this in the top-level process
/// configuration (see `registryd`'s `Config`), not here, since this struct is adapter-agnostic.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RegistryConfig {
    #[serde(default = "default_realm")]
    pub realm: String,

    #[serde(default = "default_max_manifest_size")]
    pub max_manifest_size: u64,

    #[serde(default = "default_max_blob_upload_chunk_size")]
    pub max_blob_upload_chunk_size: u64,

    #[serde(default)]
    pub enable_blob_deletion: bool,

    #[serde(default)]
    pub enable_manifest_deletion: bool,

    #[serde(default = "default_repo_name_pattern")]
    pub repo_name_pattern: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            realm: default_realm(),
            max_manifest_size: default_max_manifest_size(),
            max_blob_upload_chunk_size: default_max_blob_upload_chunk_size(),
            enable_blob_deletion: false,
            enable_manifest_deletion: false,
            repo_name_pattern: default_repo_name_pattern(),
        }
    }
}

impl RegistryConfig {
    /// Compile `repo_name_pattern` into a [`Regex`]. Callers should cache the result; this is not
    /// memoized here so the config struct stays plain-old-data and `Deserialize`-friendly.
    pub fn compile_repo_name_pattern(&self) -> std::result::Result<Regex, regex::Error> {
        Regex::new(&self.repo_name_pattern)
    }

    /// The largest body this Registry will ever read into memory, per §5's bounded-memory rule.
    pub fn max_body_size(&self) -> u64 {
        std::cmp::max(self.max_manifest_size, self.max_blob_upload_chunk_size)
    }
}

static DEFAULT_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(&default_repo_name_pattern()).expect("default pattern is valid"));

/// Validate a repository name against the default pattern, for callers that have not loaded a
/// custom [`RegistryConfig`] (eg standalone tests).
pub fn is_valid_default_repository_name(name: &str) -> bool {
    DEFAULT_PATTERN.is_match(name)
}

/// A statically-provisioned registry definition, used to pre-create repositories at process
/// startup rather than relying solely on implicit creation-on-first-write.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RegistryDefinition {
    pub name: String,
    #[serde(default)]
    pub repositories: Vec<RepositoryDefinition>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RepositoryDefinition {
    pub name: String,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn default_pattern_allows_single_component() {
        assert!(is_valid_default_repository_name("nginx"));
    }

    #[test]
    fn default_pattern_allows_multi_component() {
        assert!(is_valid_default_repository_name("lib/x"));
        assert!(is_valid_default_repository_name("a/b/c"));
    }

    #[test]
    fn default_pattern_rejects_uppercase() {
        assert!(!is_valid_default_repository_name("Lib/X"));
    }

    #[test]
    fn default_pattern_rejects_empty() {
        assert!(!is_valid_default_repository_name(""));
    }
}
