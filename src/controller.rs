//! Startup and shutdown of the resolver files around a DNS listener.

use crate::error::{ResolverError, Result};
use crate::file_resolver::FileResolver;
use crate::fs::{OsFs, ResolverFs};
use crate::reconciler::Reconciler;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

/// Callback handed to the upstream path provider.
pub type SearchPathFn = Arc<dyn Fn(&[String]) + Send + Sync>;

/// The local DNS server the resolver files point at.
pub trait DnsListener {
    /// Address the listener is bound to.
    ///
    /// # Errors
    ///
    /// Returns the I/O error if the socket address cannot be read.
    fn local_addr(&self) -> io::Result<SocketAddr>;

    /// Starts answering queries.
    ///
    /// # Errors
    ///
    /// Returns the I/O error if the server cannot start.
    fn start(&mut self) -> io::Result<()>;

    /// Stops answering queries and releases the socket.
    fn close(&mut self);
}

/// Flushes the OS DNS cache. Fire-and-forget.
pub trait CacheFlush {
    /// Flushes, logging any failure.
    fn flush(&self);
}

/// Flushes the macOS resolver cache via `dscacheutil` and `mDNSResponder`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCacheFlush;

impl CacheFlush for SystemCacheFlush {
    #[cfg(target_os = "macos")]
    fn flush(&self) {
        run_quiet("dscacheutil", &["-flushcache"]);
        run_quiet("killall", &["-HUP", "mDNSResponder"]);
    }

    #[cfg(not(target_os = "macos"))]
    fn flush(&self) {
        tracing::debug!("DNS cache flush not supported on this platform");
    }
}

#[cfg(target_os = "macos")]
fn run_quiet(program: &str, args: &[&str]) {
    match std::process::Command::new(program).args(args).status() {
        Ok(status) if status.success() => {}
        Ok(status) => tracing::warn!(program, %status, "DNS cache flush command failed"),
        Err(e) => tracing::warn!(program, error = %e, "Cannot run DNS cache flush command"),
    }
}

/// Owns the resolver files for the lifetime of a DNS listener.
///
/// # Lifecycle
///
/// 1. [`start`](Self::start) creates the resolver directory, removes
///    orphans left by crashed processes, writes the primary file, hands the
///    update callback to the path provider, starts the listener, flushes
///    the DNS cache and signals readiness.
/// 2. The path provider calls the callback whenever the search paths
///    change.
/// 3. [`stop`](Self::stop), or dropping the controller, closes the
///    listener, removes every installed file and flushes the cache once.
///
/// # Example
///
/// ```rust,ignore
/// use cluster_resolver::{FileResolver, ResolverConfig, ResolverController, SystemCacheFlush};
///
/// let files = FileResolver::new(ResolverConfig::from_env("telepresence")?);
/// let mut controller = ResolverController::new(files, listener, SystemCacheFlush);
/// controller.start(|update| provider.set_search_path_fn(update), || ready.notify())?;
/// // ...
/// controller.stop();
/// ```
pub struct ResolverController<L, C = SystemCacheFlush, F = OsFs>
where
    L: DnsListener,
    C: CacheFlush,
    F: ResolverFs + 'static,
{
    files: Option<FileResolver<F>>,
    listener: L,
    flusher: C,
    reconciler: Option<Arc<Reconciler<F>>>,
}

impl<L, C, F> ResolverController<L, C, F>
where
    L: DnsListener,
    C: CacheFlush,
    F: ResolverFs + 'static,
{
    /// Creates a controller. Nothing is touched until [`start`](Self::start).
    #[must_use]
    pub const fn new(files: FileResolver<F>, listener: L, flusher: C) -> Self {
        Self {
            files: Some(files),
            listener,
            flusher,
            reconciler: None,
        }
    }

    /// Returns the reconciler once started.
    #[must_use]
    pub const fn reconciler(&self) -> Option<&Arc<Reconciler<F>>> {
        self.reconciler.as_ref()
    }

    /// Returns the listener.
    #[must_use]
    pub const fn listener(&self) -> &L {
        &self.listener
    }

    /// Installs the resolver files and starts the listener.
    ///
    /// `install` receives the update callback for the path provider;
    /// `on_ready` runs last, after the listener has started.
    ///
    /// # Errors
    ///
    /// - [`ResolverError::Listener`] if the listener address is unavailable
    ///   or the listener fails to start.
    /// - [`ResolverError::DirCreate`] if the resolver directory cannot be
    ///   created.
    /// - [`ResolverError::InitialWrite`] if the primary file cannot be
    ///   written.
    /// - [`ResolverError::InvalidConfig`] if called twice.
    pub fn start(
        &mut self,
        install: impl FnOnce(SearchPathFn),
        on_ready: impl FnOnce(),
    ) -> Result<()> {
        let Some(files) = self.files.take() else {
            return Err(ResolverError::InvalidConfig(
                "resolver controller already started".into(),
            ));
        };
        let addr = self.listener.local_addr().map_err(ResolverError::Listener)?;

        files.ensure_dir().map_err(|source| ResolverError::DirCreate {
            path: files.config().resolver_dir().to_path_buf(),
            source,
        })?;
        match files.cleanup_orphaned() {
            Ok(0) => {}
            Ok(n) => tracing::info!(removed = n, "Removed orphaned resolver files"),
            Err(e) => tracing::warn!(error = %e, "Failed to scan for orphaned resolver files"),
        }

        let reconciler = Arc::new(Reconciler::new(files, addr));
        let primary = reconciler.files().config().primary_path();
        reconciler
            .files()
            .write(&primary, &reconciler.initial_record())
            .map_err(|source| ResolverError::InitialWrite {
                path: primary.clone(),
                source,
            })?;
        tracing::info!(path = %primary.display(), listener = %addr, "Generated new resolver file");
        self.reconciler = Some(Arc::clone(&reconciler));

        install(Arc::new(move |paths: &[String]| reconciler.update(paths)));

        self.listener.start().map_err(ResolverError::Listener)?;
        self.flusher.flush();

        on_ready();
        Ok(())
    }

    /// Closes the listener, removes all installed files and flushes the
    /// DNS cache. Runs at most once; a no-op if never started. Calls to the
    /// update callback after this are ignored.
    pub fn stop(&mut self) {
        let Some(reconciler) = self.reconciler.take() else {
            return;
        };
        self.listener.close();
        let removed = reconciler.remove_all();
        tracing::info!(removed, "Removed resolver files");
        self.flusher.flush();
    }
}

impl<L, C, F> Drop for ResolverController<L, C, F>
where
    L: DnsListener,
    C: CacheFlush,
    F: ResolverFs + 'static,
{
    fn drop(&mut self) {
        self.stop();
    }
}
