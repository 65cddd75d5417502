//! Filesystem access used by the resolver.
//!
//! The reconciler only ever talks to the resolver directory through
//! [`ResolverFs`], so tests can swap in [`MemoryFs`] to simulate partial
//! failures without touching disk.

use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Minimal set of filesystem operations the resolver performs.
pub trait ResolverFs: Send + Sync {
    /// Creates `path` and any missing parents. Succeeds if it already exists.
    fn create_dir_all(&self, path: &Path) -> io::Result<()>;

    /// Reads a whole file as UTF-8.
    fn read_to_string(&self, path: &Path) -> io::Result<String>;

    /// Creates or truncates `path` and writes `contents`.
    fn write(&self, path: &Path, contents: &str) -> io::Result<()>;

    /// Removes a file.
    fn remove_file(&self, path: &Path) -> io::Result<()>;

    /// Lists regular files directly inside `dir`.
    fn list_files(&self, dir: &Path) -> io::Result<Vec<PathBuf>>;
}

/// [`ResolverFs`] backed by `std::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsFs;

impl ResolverFs for OsFs {
    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        std::fs::create_dir_all(path)
    }

    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn write(&self, path: &Path, contents: &str) -> io::Result<()> {
        std::fs::write(path, contents)
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        std::fs::remove_file(path)
    }

    fn list_files(&self, dir: &Path) -> io::Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_file() {
                files.push(path);
            }
        }
        Ok(files)
    }
}

#[derive(Debug, Default)]
struct MemoryInner {
    dirs: BTreeSet<PathBuf>,
    files: BTreeMap<PathBuf, String>,
    fail_write: BTreeSet<PathBuf>,
    fail_remove: BTreeSet<PathBuf>,
    fail_dirs: bool,
    writes: BTreeMap<PathBuf, usize>,
    removes: BTreeMap<PathBuf, usize>,
}

/// In-memory [`ResolverFs`] with failure injection.
///
/// Every path is treated as a plain key; parent directories are only
/// tracked for [`list_files`](ResolverFs::list_files). Writes and removals
/// are counted per path so callers can tell a recreated file from an
/// untouched one.
///
/// ```
/// use cluster_resolver::fs::{MemoryFs, ResolverFs};
/// use std::path::Path;
///
/// let fs = MemoryFs::new();
/// fs.write(Path::new("/etc/resolver/a"), "port 53\n").unwrap();
/// assert!(fs.exists(Path::new("/etc/resolver/a")));
/// assert_eq!(fs.write_count(Path::new("/etc/resolver/a")), 1);
/// ```
#[derive(Debug, Default)]
pub struct MemoryFs {
    inner: Mutex<MemoryInner>,
}

impl MemoryFs {
    /// Creates an empty filesystem.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Makes every subsequent write to `path` fail with `PermissionDenied`.
    pub fn fail_write(&self, path: impl Into<PathBuf>) {
        self.lock().fail_write.insert(path.into());
    }

    /// Makes every subsequent removal of `path` fail with `PermissionDenied`.
    pub fn fail_remove(&self, path: impl Into<PathBuf>) {
        self.lock().fail_remove.insert(path.into());
    }

    /// Makes directory creation fail with `PermissionDenied`.
    pub fn fail_create_dir(&self) {
        self.lock().fail_dirs = true;
    }

    /// Clears all injected failures.
    pub fn heal(&self) {
        let mut inner = self.lock();
        inner.fail_write.clear();
        inner.fail_remove.clear();
        inner.fail_dirs = false;
    }

    /// Returns `true` if a file exists at `path`.
    #[must_use]
    pub fn exists(&self, path: &Path) -> bool {
        self.lock().files.contains_key(path)
    }

    /// Returns the content of `path`, if present.
    #[must_use]
    pub fn content(&self, path: &Path) -> Option<String> {
        self.lock().files.get(path).cloned()
    }

    /// All file paths currently stored, sorted.
    #[must_use]
    pub fn paths(&self) -> Vec<PathBuf> {
        self.lock().files.keys().cloned().collect()
    }

    /// Number of successful writes to `path`.
    #[must_use]
    pub fn write_count(&self, path: &Path) -> usize {
        self.lock().writes.get(path).copied().unwrap_or(0)
    }

    /// Number of successful removals of `path`.
    #[must_use]
    pub fn remove_count(&self, path: &Path) -> usize {
        self.lock().removes.get(path).copied().unwrap_or(0)
    }
}

fn denied(op: &str, path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::PermissionDenied,
        format!("injected {op} failure for {}", path.display()),
    )
}

impl ResolverFs for MemoryFs {
    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        let mut inner = self.lock();
        if inner.fail_dirs {
            return Err(denied("mkdir", path));
        }
        inner.dirs.insert(path.to_path_buf());
        Ok(())
    }

    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        self.lock()
            .files
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotFound))
    }

    fn write(&self, path: &Path, contents: &str) -> io::Result<()> {
        let mut inner = self.lock();
        if inner.fail_write.contains(path) {
            return Err(denied("write", path));
        }
        inner.files.insert(path.to_path_buf(), contents.to_string());
        *inner.writes.entry(path.to_path_buf()).or_default() += 1;
        Ok(())
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        let mut inner = self.lock();
        if inner.fail_remove.contains(path) {
            return Err(denied("remove", path));
        }
        if inner.files.remove(path).is_none() {
            return Err(io::Error::from(io::ErrorKind::NotFound));
        }
        *inner.removes.entry(path.to_path_buf()).or_default() += 1;
        Ok(())
    }

    fn list_files(&self, dir: &Path) -> io::Result<Vec<PathBuf>> {
        let inner = self.lock();
        if !inner.dirs.contains(dir) && !inner.files.keys().any(|p| p.parent() == Some(dir)) {
            return Err(io::Error::from(io::ErrorKind::NotFound));
        }
        Ok(inner
            .files
            .keys()
            .filter(|p| p.parent() == Some(dir))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn os_fs_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("resolver");
        OsFs.create_dir_all(&sub).unwrap();
        OsFs.create_dir_all(&sub).unwrap();

        let file = sub.join("a.local");
        OsFs.write(&file, "port 53\n").unwrap();
        assert_eq!(OsFs.read_to_string(&file).unwrap(), "port 53\n");
        assert_eq!(OsFs.list_files(&sub).unwrap(), vec![file.clone()]);

        OsFs.remove_file(&file).unwrap();
        let e = OsFs.remove_file(&file).unwrap_err();
        assert_eq!(e.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn memory_fs_injected_failures() {
        let fs = MemoryFs::new();
        let p = Path::new("/r/a");
        fs.fail_write(p);
        assert_eq!(
            fs.write(p, "x").unwrap_err().kind(),
            io::ErrorKind::PermissionDenied
        );
        fs.heal();
        fs.write(p, "x").unwrap();

        fs.fail_remove(p);
        assert!(fs.remove_file(p).is_err());
        assert!(fs.exists(p));
        fs.heal();
        fs.remove_file(p).unwrap();
        assert_eq!(fs.remove_count(p), 1);
        assert_eq!(
            fs.remove_file(p).unwrap_err().kind(),
            io::ErrorKind::NotFound
        );
    }

    #[test]
    fn memory_fs_lists_direct_children() {
        let fs = MemoryFs::new();
        fs.create_dir_all(Path::new("/r")).unwrap();
        assert!(fs.list_files(Path::new("/r")).unwrap().is_empty());
        assert!(fs.list_files(Path::new("/missing")).is_err());

        fs.write(Path::new("/r/a"), "").unwrap();
        fs.write(Path::new("/r/sub/b"), "").unwrap();
        assert_eq!(
            fs.list_files(Path::new("/r")).unwrap(),
            vec![PathBuf::from("/r/a")]
        );
    }
}
