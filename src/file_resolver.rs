//! Management of the files under the resolver directory.
//!
//! Each file written by this module starts with a `# Generated by` marker
//! carrying the creating process's PID, enabling ownership checks and
//! orphan cleanup.

use crate::config::{ResolverConfig, WriteStrategy};
use crate::error::Result;
use crate::fs::{OsFs, ResolverFs};
use crate::resolve_file::ResolveFile;
use crate::util::is_process_alive;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const GENERATED_BY: &str = "# Generated by ";

/// Reads, writes and removes resolver files for one [`ResolverConfig`].
///
/// # Permissions
///
/// `/etc/resolver/` requires root. The caller must handle elevation.
pub struct FileResolver<F: ResolverFs = OsFs> {
    config: ResolverConfig,
    fs: Arc<F>,
}

impl FileResolver<OsFs> {
    /// Creates a resolver on the real filesystem.
    #[must_use]
    pub fn new(config: ResolverConfig) -> Self {
        Self::with_fs(config, Arc::new(OsFs))
    }
}

impl<F: ResolverFs> FileResolver<F> {
    /// Creates a resolver on the given filesystem.
    #[must_use]
    pub const fn with_fs(config: ResolverConfig, fs: Arc<F>) -> Self {
        Self { config, fs }
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Returns the filesystem handle.
    #[must_use]
    pub const fn fs(&self) -> &Arc<F> {
        &self.fs
    }

    /// Creates the resolver directory if it is missing.
    ///
    /// # Errors
    ///
    /// Returns the I/O error from directory creation.
    pub fn ensure_dir(&self) -> io::Result<()> {
        self.fs.create_dir_all(self.config.resolver_dir())
    }

    /// Writes `record` to `path`, creating or truncating it.
    ///
    /// # Errors
    ///
    /// Returns the I/O error from the write.
    pub fn write(&self, path: &Path, record: &ResolveFile) -> io::Result<()> {
        self.fs
            .write(path, &record.serialize(&self.config.generator()))
    }

    /// Writes `record` to `path` using the configured [`WriteStrategy`].
    ///
    /// With [`WriteStrategy::ForceRefresh`] the old file is deleted first.
    /// A failed delete is logged and the write is still attempted.
    ///
    /// # Errors
    ///
    /// Returns the I/O error from the write.
    pub fn force_refresh_write(&self, path: &Path, record: &ResolveFile) -> io::Result<()> {
        if self.config.write_strategy == WriteStrategy::ForceRefresh {
            if let Err(e) = self.remove(path) {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Failed to remove resolver file before rewrite"
                );
            }
        }
        self.write(path, record)
    }

    /// Reads and parses the resolver file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ResolverError::Io`](crate::ResolverError::Io) if the file
    /// cannot be read, or [`ResolverError::Parse`](crate::ResolverError::Parse)
    /// if it is malformed.
    pub fn read(&self, path: &Path) -> Result<ResolveFile> {
        let content = self.fs.read_to_string(path)?;
        ResolveFile::parse(&path.display().to_string(), &content)
    }

    /// Removes the file at `path`.
    ///
    /// Returns `Ok(false)` if it did not exist.
    ///
    /// # Errors
    ///
    /// Returns any I/O error other than `NotFound`.
    pub fn remove(&self, path: &Path) -> io::Result<bool> {
        match self.fs.remove_file(path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "Resolver file does not exist, skipping");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Removes `path`, logging instead of failing. Returns `true` if a file
    /// was removed.
    pub fn remove_logged(&self, path: &Path) -> bool {
        match self.remove(path) {
            Ok(removed) => {
                if removed {
                    tracing::info!(path = %path.display(), "Removed resolver file");
                }
                removed
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Failed to remove resolver file"
                );
                false
            }
        }
    }

    /// Lists files in the resolver directory that carry our marker.
    ///
    /// Returns an empty vec if the directory does not exist.
    ///
    /// # Errors
    ///
    /// Returns the I/O error if the directory cannot be listed.
    pub fn list_managed(&self) -> io::Result<Vec<PathBuf>> {
        let files = match self.fs.list_files(self.config.resolver_dir()) {
            Ok(files) => files,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        let mut managed: Vec<PathBuf> = files
            .into_iter()
            .filter(|path| self.owner_pid(path).is_some())
            .collect();
        managed.sort();
        Ok(managed)
    }

    /// Removes managed files whose creating PID is no longer running.
    ///
    /// Returns the number of files removed. Unmanaged files and files
    /// belonging to live processes are left untouched.
    ///
    /// # Errors
    ///
    /// Returns the I/O error if the directory cannot be listed.
    pub fn cleanup_orphaned(&self) -> io::Result<usize> {
        let mut removed = 0;
        for path in self.list_managed()? {
            let Some(pid) = self.owner_pid(&path) else {
                continue;
            };
            if is_process_alive(pid) {
                continue;
            }
            tracing::info!(
                path = %path.display(),
                pid,
                "Removing orphaned resolver file (process dead)"
            );
            if self.remove_logged(&path) {
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Extracts the PID from `# Generated by <prefix> (pid=<N>)`.
    fn owner_pid(&self, path: &Path) -> Option<u32> {
        let content = self.fs.read_to_string(path).ok()?;
        let first = content.lines().next()?;
        extract_pid(first, &self.config.prefix)
    }
}

fn extract_pid(line: &str, prefix: &str) -> Option<u32> {
    let rest = line.strip_prefix(GENERATED_BY)?.strip_prefix(prefix)?;
    rest.trim()
        .strip_prefix("(pid=")?
        .strip_suffix(')')?
        .parse()
        .ok()
}
