//! Reconciles the resolver directory with the requested search paths.
//!
//! On macOS, resolution of `NAME.NAMESPACE` is provided by one resolver file
//! per namespace, `<prefix>.<namespace>.local`, each pointing at the local
//! DNS listener. Dotted paths become the search list of the primary file
//! `<prefix>.local`, with the root cluster domain always tried last.

use crate::file_resolver::FileResolver;
use crate::fs::{OsFs, ResolverFs};
use crate::resolve_file::ResolveFile;
use crate::state::ReconcilerState;
use crate::util::{is_valid_namespace, is_valid_search_domain};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Applies search-path updates to the resolver directory.
///
/// Every [`update`](Self::update) runs entirely under one lock, so the
/// effect of concurrent calls is that of some sequential order.
pub struct Reconciler<F: ResolverFs = OsFs> {
    files: FileResolver<F>,
    listener: SocketAddr,
    state: Mutex<ReconcilerState>,
    closed: AtomicBool,
}

impl<F: ResolverFs> Reconciler<F> {
    /// Creates a reconciler whose files point at `listener`.
    #[must_use]
    pub fn new(files: FileResolver<F>, listener: SocketAddr) -> Self {
        Self {
            files,
            listener,
            state: Mutex::new(ReconcilerState::default()),
            closed: AtomicBool::new(false),
        }
    }

    /// Returns the file manager.
    #[must_use]
    pub const fn files(&self) -> &FileResolver<F> {
        &self.files
    }

    /// Returns the listener address written as nameserver.
    #[must_use]
    pub const fn listener(&self) -> SocketAddr {
        self.listener
    }

    /// The primary file as written at startup: the root domain as both
    /// domain and sole search entry.
    #[must_use]
    pub fn initial_record(&self) -> ResolveFile {
        let root = &self.files.config().root_domain;
        ResolveFile::for_nameserver(self.listener, root.as_str()).with_search([root.as_str()])
    }

    fn lock(&self) -> MutexGuard<'_, ReconcilerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of the active namespaces, sorted.
    #[must_use]
    pub fn active_namespaces(&self) -> Vec<String> {
        self.lock().namespaces.iter().cloned().collect()
    }

    /// Snapshot of the active search domains, in request order.
    #[must_use]
    pub fn active_search_domains(&self) -> Vec<String> {
        self.lock().search.clone()
    }

    /// Moves the resolver directory to the state described by `paths`.
    ///
    /// Paths containing a `.` are search domains; other non-empty paths are
    /// namespaces. Per-namespace files are added and removed by diff
    /// against the previous call, then the primary file is rewritten with
    /// the new search list. Failures are logged per file and never
    /// returned. After [`remove_all`](Self::remove_all) this does nothing.
    pub fn update<S: AsRef<str>>(&self, paths: &[S]) {
        let next = split_paths(paths);
        tracing::info!(
            namespaces = ?next.namespaces,
            search = ?next.search,
            "Setting search paths"
        );

        let mut state = self.lock();
        if self.closed.load(Ordering::Acquire) {
            tracing::debug!("Resolver files already removed, ignoring search path update");
            return;
        }
        let search = next.search.clone();
        let diff = state.replace(next);

        for namespace in &diff.removals {
            self.files
                .remove_logged(&self.files.config().namespace_path(namespace));
        }
        for namespace in &diff.additions {
            let path = self.files.config().namespace_path(namespace);
            let record = ResolveFile::for_nameserver(self.listener, namespace.as_str());
            match self.files.write(&path, &record) {
                Ok(()) => tracing::info!(path = %path.display(), "Generated new resolver file"),
                Err(e) => tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Failed to write namespace resolver file"
                ),
            }
        }

        self.rewrite_primary(&search);
        drop(state);
    }

    fn rewrite_primary(&self, search: &[String]) {
        let path = self.files.config().primary_path();
        let mut record = match self.files.read(&path) {
            Ok(record) => record,
            Err(e) if e.is_not_found() => {
                tracing::warn!(path = %path.display(), "Primary resolver file missing, recreating");
                self.initial_record()
            }
            Err(e) => {
                tracing::error!(error = %e, "Cannot update primary resolver file");
                return;
            }
        };
        record.search = search_list(search, &self.files.config().root_domain);

        match self.files.force_refresh_write(&path, &record) {
            Ok(()) => tracing::info!(
                path = %path.display(),
                search = %record.search.join(" "),
                "Updated primary resolver file"
            ),
            Err(e) => tracing::warn!(
                path = %path.display(),
                error = %e,
                "Failed to write primary resolver file"
            ),
        }
    }

    /// Removes the primary file and every active namespace file, clears
    /// the state and rejects later updates. Returns the number of files
    /// removed.
    pub fn remove_all(&self) -> usize {
        let mut state = self.lock();
        self.closed.store(true, Ordering::Release);
        let mut removed = usize::from(
            self.files
                .remove_logged(&self.files.config().primary_path()),
        );
        for namespace in state.take_namespaces() {
            if self
                .files
                .remove_logged(&self.files.config().namespace_path(&namespace))
            {
                removed += 1;
            }
        }
        removed
    }
}

/// Splits requested paths into namespaces and search domains.
///
/// Empty paths, namespace names unusable as a file name and search domains
/// that would not fit on a `search` line are dropped.
#[must_use]
pub fn split_paths<S: AsRef<str>>(paths: &[S]) -> ReconcilerState {
    let mut next = ReconcilerState::default();
    for path in paths.iter().map(AsRef::as_ref) {
        if path.is_empty() {
            continue;
        }
        if path.contains('.') {
            if is_valid_search_domain(path) {
                next.search.push(path.to_string());
            } else {
                tracing::warn!(domain = ?path, "Ignoring search domain that cannot be written to a resolver file");
            }
        } else if is_valid_namespace(path) {
            next.namespaces.insert(path.to_string());
        } else {
            tracing::warn!(namespace = %path, "Ignoring namespace that cannot name a resolver file");
        }
    }
    next
}

/// Builds the primary file's search list: requested domains with trailing
/// dots trimmed, followed by `root` exactly once.
#[must_use]
pub fn search_list(search: &[String], root: &str) -> Vec<String> {
    let root = root.trim_end_matches('.');
    let mut list: Vec<String> = Vec::with_capacity(search.len() + 1);
    for domain in search {
        let domain = domain.trim_end_matches('.');
        if domain.is_empty() || domain == root || list.iter().any(|d| d == domain) {
            continue;
        }
        list.push(domain.to_string());
    }
    list.push(root.to_string());
    list
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResolverConfig;
    use crate::fs::MemoryFs;
    use std::path::PathBuf;
    use std::sync::Arc;

    fn setup() -> (Arc<MemoryFs>, Reconciler<MemoryFs>) {
        let fs = Arc::new(MemoryFs::new());
        let files = FileResolver::with_fs(ResolverConfig::new("tp").with_dir("/r"), fs.clone());
        let reconciler = Reconciler::new(files, "127.0.0.1:5353".parse().unwrap());
        let primary = reconciler.files().config().primary_path();
        reconciler
            .files()
            .write(&primary, &reconciler.initial_record())
            .unwrap();
        (fs, reconciler)
    }

    fn primary_search(r: &Reconciler<MemoryFs>) -> Vec<String> {
        r.files()
            .read(&r.files().config().primary_path())
            .unwrap()
            .search
    }

    #[test]
    fn split_paths_partitions() {
        let s = split_paths(&["a", "", "svc.cluster.local", "b", "x/y", "a"]);
        assert_eq!(s.namespaces.into_iter().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(s.search, vec!["svc.cluster.local"]);
    }

    #[test]
    fn search_list_puts_root_last_once() {
        let root = "cluster.local";
        let s = |v: &[&str]| v.iter().map(ToString::to_string).collect::<Vec<_>>();
        assert_eq!(search_list(&[], root), s(&["cluster.local"]));
        assert_eq!(
            search_list(&s(&["cluster.local.", "a.b", "cluster.local"]), root),
            s(&["a.b", "cluster.local"])
        );
        assert_eq!(
            search_list(&s(&["a.b.", "a.b"]), root),
            s(&["a.b", "cluster.local"])
        );
    }

    #[test]
    fn update_adds_and_removes_namespace_files() {
        let (fs, r) = setup();
        r.update(&["teamA", "svc.cluster.local"]);
        assert!(fs.exists(&PathBuf::from("/r/tp.teamA.local")));
        assert_eq!(primary_search(&r), vec!["svc.cluster.local", "cluster.local"]);

        r.update(&["teamB"]);
        assert!(!fs.exists(&PathBuf::from("/r/tp.teamA.local")));
        assert!(fs.exists(&PathBuf::from("/r/tp.teamB.local")));
        assert_eq!(primary_search(&r), vec!["cluster.local"]);
        assert_eq!(r.active_namespaces(), vec!["teamB"]);
        assert!(r.active_search_domains().is_empty());
    }

    #[test]
    fn namespace_file_points_at_listener() {
        let (_fs, r) = setup();
        r.update(&["ns"]);
        let rf = r
            .files()
            .read(&r.files().config().namespace_path("ns"))
            .unwrap();
        assert_eq!(rf, ResolveFile::for_nameserver(r.listener(), "ns"));
    }

    #[test]
    fn repeated_update_only_recreates_primary() {
        let (fs, r) = setup();
        let ns = PathBuf::from("/r/tp.a.local");
        let primary = PathBuf::from("/r/tp.local");

        r.update(&["a", "x.y"]);
        let before = fs.content(&primary);
        r.update(&["a", "x.y"]);

        assert_eq!(fs.write_count(&ns), 1);
        assert_eq!(fs.remove_count(&primary), 2);
        assert_eq!(fs.content(&primary), before);
    }

    #[test]
    fn primary_domain_is_preserved_from_disk() {
        let (fs, r) = setup();
        let primary = PathBuf::from("/r/tp.local");
        fs.write(
            &primary,
            "# Generated by tp\nport 5353\ndomain custom.domain\nnameserver 127.0.0.1\n",
        )
        .unwrap();

        r.update(&["a.b"]);
        let rf = r.files().read(&primary).unwrap();
        assert_eq!(rf.domain.as_deref(), Some("custom.domain"));
        assert_eq!(rf.search, vec!["a.b", "cluster.local"]);
    }

    #[test]
    fn malformed_primary_still_applies_namespace_changes() {
        let (fs, r) = setup();
        let primary = PathBuf::from("/r/tp.local");
        fs.write(&primary, "port 53\nbogus key\n").unwrap();

        r.update(&["a"]);
        assert!(fs.exists(&PathBuf::from("/r/tp.a.local")));
        assert_eq!(fs.content(&primary).as_deref(), Some("port 53\nbogus key\n"));
    }

    #[test]
    fn missing_primary_is_recreated() {
        let (fs, r) = setup();
        let primary = PathBuf::from("/r/tp.local");
        fs.remove_file(&primary).unwrap();

        r.update(&["a.b"]);
        assert_eq!(primary_search(&r), vec!["a.b", "cluster.local"]);
    }

    #[test]
    fn failed_removal_does_not_stop_update() {
        let (fs, r) = setup();
        r.update(&["a", "b"]);
        fs.fail_remove("/r/tp.a.local");

        r.update(&["c"]);
        assert!(fs.exists(&PathBuf::from("/r/tp.a.local")));
        assert!(!fs.exists(&PathBuf::from("/r/tp.b.local")));
        assert!(fs.exists(&PathBuf::from("/r/tp.c.local")));
        assert_eq!(r.active_namespaces(), vec!["c"]);
    }

    #[test]
    fn unwritable_search_domain_does_not_wedge_primary() {
        let (_fs, r) = setup();
        r.update(&["x.y\nbogus", "a b.c"]);
        assert_eq!(primary_search(&r), vec!["cluster.local"]);
        assert!(r.active_search_domains().is_empty());

        r.update(&["a.b"]);
        assert_eq!(primary_search(&r), vec!["a.b", "cluster.local"]);
    }

    #[test]
    fn update_after_remove_all_is_ignored() {
        let (fs, r) = setup();
        r.update(&["a"]);
        r.remove_all();

        r.update(&["b", "x.y"]);
        assert!(fs.paths().is_empty());
        assert!(r.active_namespaces().is_empty());
    }

    #[test]
    fn remove_all_clears_files_and_state() {
        let (fs, r) = setup();
        r.update(&["a", "b", "x.y"]);
        assert_eq!(r.remove_all(), 3);
        assert!(fs.paths().is_empty());
        assert!(r.active_namespaces().is_empty());
    }
}
