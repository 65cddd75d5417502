//! Resolver configuration.

use crate::error::{ResolverError, Result};
use crate::util::to_env_prefix;
use std::path::{Path, PathBuf};

/// Default macOS resolver directory.
pub const DEFAULT_RESOLVER_DIR: &str = "/etc/resolver";

/// Default marker and file-name prefix.
pub const DEFAULT_PREFIX: &str = "telepresence";

/// Default root cluster domain.
pub const DEFAULT_ROOT_DOMAIN: &str = "cluster.local";

/// How the primary resolver file is rewritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteStrategy {
    /// Delete the file, then write it fresh. macOS releases before Big Sur
    /// only notice a resolver change when the file is recreated.
    #[default]
    ForceRefresh,
    /// Truncate and rewrite in place.
    Overwrite,
}

impl std::str::FromStr for WriteStrategy {
    type Err = ResolverError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "force-refresh" => Ok(Self::ForceRefresh),
            "overwrite" => Ok(Self::Overwrite),
            other => Err(ResolverError::InvalidConfig(format!(
                "unknown write strategy {other:?} (expected force-refresh or overwrite)"
            ))),
        }
    }
}

/// Where and how resolver files are managed.
///
/// # Example
///
/// ```
/// use cluster_resolver::ResolverConfig;
///
/// let config = ResolverConfig::new("telepresence").with_dir("/tmp/resolver");
///
/// assert_eq!(config.root_domain, "cluster.local");
/// assert_eq!(
///     config.namespace_path("team-a"),
///     std::path::Path::new("/tmp/resolver/telepresence.team-a.local"),
/// );
/// ```
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Directory scanned by the OS resolver.
    pub resolver_dir: PathBuf,

    /// Marker prefix, also used to name the files.
    pub prefix: String,

    /// Root cluster domain. Always the last search entry.
    pub root_domain: String,

    /// Rewrite strategy for the primary file.
    pub write_strategy: WriteStrategy,
}

impl ResolverConfig {
    /// Creates a config for `prefix` with the default directory and domain.
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            resolver_dir: PathBuf::from(DEFAULT_RESOLVER_DIR),
            prefix: prefix.into(),
            root_domain: DEFAULT_ROOT_DOMAIN.to_string(),
            write_strategy: WriteStrategy::default(),
        }
    }

    /// Builds a config for `prefix`, overridden by environment variables.
    ///
    /// | variable | field |
    /// |---|---|
    /// | `<PREFIX>_RESOLVER_DIR` | `resolver_dir` |
    /// | `<PREFIX>_DNS_DOMAIN` | `root_domain` |
    /// | `<PREFIX>_RESOLVER_WRITE` | `write_strategy` (`force-refresh` or `overwrite`) |
    ///
    /// # Errors
    ///
    /// Returns [`ResolverError::InvalidConfig`] for an unknown write
    /// strategy or a config that fails [`validate`](Self::validate).
    pub fn from_env(prefix: impl Into<String>) -> Result<Self> {
        Self::from_lookup(prefix, |key| std::env::var(key).ok())
    }

    fn from_lookup(
        prefix: impl Into<String>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let mut config = Self::new(prefix);
        let env = to_env_prefix(&config.prefix);

        if let Some(dir) = lookup(&format!("{env}_RESOLVER_DIR")) {
            config.resolver_dir = PathBuf::from(dir);
        }
        if let Some(domain) = lookup(&format!("{env}_DNS_DOMAIN")) {
            config = config.with_root_domain(domain);
        }
        if let Some(strategy) = lookup(&format!("{env}_RESOLVER_WRITE")) {
            config.write_strategy = strategy.parse()?;
        }
        config.validate()?;
        Ok(config)
    }

    /// Overrides the resolver directory (useful for testing).
    #[must_use]
    pub fn with_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.resolver_dir = dir.into();
        self
    }

    /// Overrides the root cluster domain. A trailing `.` is dropped.
    #[must_use]
    pub fn with_root_domain(mut self, domain: impl Into<String>) -> Self {
        let mut domain: String = domain.into();
        domain.truncate(domain.trim_end_matches('.').len());
        self.root_domain = domain;
        self
    }

    /// Overrides the primary file rewrite strategy.
    #[must_use]
    pub const fn with_write_strategy(mut self, strategy: WriteStrategy) -> Self {
        self.write_strategy = strategy;
        self
    }

    /// Checks that the prefix and root domain are usable.
    ///
    /// # Errors
    ///
    /// Returns [`ResolverError::InvalidConfig`] describing the first problem.
    pub fn validate(&self) -> Result<()> {
        if self.prefix.is_empty() || self.prefix.contains(['/', '\\']) {
            return Err(ResolverError::InvalidConfig(format!(
                "prefix {:?} cannot be used in a file name",
                self.prefix
            )));
        }
        let root = self.root_domain.trim_end_matches('.');
        if root.is_empty() || !root.contains('.') {
            return Err(ResolverError::InvalidConfig(format!(
                "root domain {:?} must be a dotted domain",
                self.root_domain
            )));
        }
        Ok(())
    }

    /// Path of the primary file, `<dir>/<prefix>.local`.
    #[must_use]
    pub fn primary_path(&self) -> PathBuf {
        self.resolver_dir.join(format!("{}.local", self.prefix))
    }

    /// Path of a per-namespace file, `<dir>/<prefix>.<namespace>.local`.
    #[must_use]
    pub fn namespace_path(&self, namespace: &str) -> PathBuf {
        self.resolver_dir
            .join(format!("{}.{namespace}.local", self.prefix))
    }

    /// Returns the resolver directory.
    #[must_use]
    pub fn resolver_dir(&self) -> &Path {
        &self.resolver_dir
    }

    /// Text following `# Generated by` in files written by this process.
    #[must_use]
    pub fn generator(&self) -> String {
        format!("{} (pid={})", self.prefix, std::process::id())
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self::new(DEFAULT_PREFIX)
    }
}
