//! Internal utilities.

/// Checks whether the process with the given PID is still alive.
///
/// Uses `kill(pid, 0)`. `EPERM` means the process exists but belongs to
/// another user, so it counts as alive.
#[must_use]
pub fn is_process_alive(pid: u32) -> bool {
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        return false;
    };
    if pid <= 0 {
        return false;
    }
    // SAFETY: signal 0 performs the existence and permission checks only.
    if unsafe { libc::kill(pid, 0) } == 0 {
        return true;
    }
    std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}

/// Converts a marker prefix to an environment variable prefix.
///
/// ```
/// use cluster_resolver::to_env_prefix;
///
/// assert_eq!(to_env_prefix("telepresence"), "TELEPRESENCE");
/// assert_eq!(to_env_prefix("my-app.dev"), "MY_APP_DEV");
/// ```
#[must_use]
pub fn to_env_prefix(prefix: &str) -> String {
    prefix
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}

/// Returns `true` if `name` can be embedded in a resolver file name as a
/// single path component.
#[must_use]
pub fn is_valid_namespace(name: &str) -> bool {
    !name.is_empty()
        && name != ".."
        && !name.contains(['/', '\\', '\0'])
        && !name.chars().any(char::is_whitespace)
}

/// Returns `true` if `domain` fits on a resolver file `search` line as a
/// single field.
#[must_use]
pub fn is_valid_search_domain(domain: &str) -> bool {
    !domain.is_empty()
        && !domain.contains(['#', '\0'])
        && !domain.chars().any(char::is_whitespace)
}
