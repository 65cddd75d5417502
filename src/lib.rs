//! # cluster-resolver
//!
//! Make cluster DNS names resolvable from a macOS workstation by managing
//! `/etc/resolver/` files that point at a local DNS listener.
//!
//! macOS reads files under `/etc/resolver/<name>` to route DNS queries for
//! specific domain suffixes to designated nameservers. This crate keeps
//! those files in step with the set of active cluster namespaces and
//! search domains:
//!
//! - `<prefix>.local` is the primary file for the root cluster domain. Its
//!   `search` line lists the requested search domains, root domain last.
//! - `<prefix>.<namespace>.local` exists for every active namespace so
//!   that `NAME.NAMESPACE` resolves.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use cluster_resolver::{FileResolver, ResolverConfig, ResolverController, SystemCacheFlush};
//!
//! let files = FileResolver::new(ResolverConfig::from_env("telepresence")?);
//! let mut controller = ResolverController::new(files, listener, SystemCacheFlush);
//!
//! // Requires root.
//! controller.start(|update| provider.install(update), || println!("ready"))?;
//!
//! // The provider later calls:
//! // update(&["team-a".into(), "svc.cluster.local".into()]);
//!
//! // Removes every file and flushes the DNS cache (also runs on drop).
//! controller.stop();
//! ```
//!
//! ## Crash recovery
//!
//! Each file records the PID of the process that created it. Startup
//! removes files left by processes that are no longer running.
//!
//! ## Verification
//!
//! ```bash
//! scutil --dns              # show all registered resolvers
//! dscacheutil -q host -a name my-svc.team-a
//! ```
//!
//! **Note:** `dig` bypasses the macOS system resolver and will *not* show
//! these entries.

#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod controller;
pub mod error;
pub mod file_resolver;
pub mod fs;
pub mod reconciler;
pub mod resolve_file;
pub mod state;
pub mod util;

pub use config::{ResolverConfig, WriteStrategy};
pub use controller::{CacheFlush, DnsListener, ResolverController, SearchPathFn, SystemCacheFlush};
pub use error::{ParseProblem, ResolverError, Result};
pub use file_resolver::FileResolver;
pub use reconciler::Reconciler;
pub use resolve_file::ResolveFile;
pub use state::ReconcilerState;
pub use util::to_env_prefix;
