//! Program lookup on the search path.
//!
//! Resolution happens in the parent before the fork so the child never
//! allocates. A name that cannot be found is handed to exec unchanged and
//! fails there with `ENOENT`, which reaches the caller as a launch failure.

use std::ffi::{CStr, CString, OsStr, OsString};
use std::fs::Metadata;
use std::os::unix::ffi::{OsStrExt, OsStringExt};
use std::os::unix::fs::{MetadataExt, PermissionsExt};
use std::path::{Path, PathBuf};

/// Search path used when `PATH` is unset.
const DEFAULT_SEARCH_PATH: &str = "/bin:/usr/bin";

/// Resolve `name` to the path that will be passed to exec.
///
/// Names containing `/` are used as-is. Bare names are looked up in the
/// `PATH` the child will run with: the override's entry when `env` replaces
/// the environment, the caller's otherwise.
pub(crate) fn resolve_program(name: &CStr, env: Option<&[CString]>) -> CString {
    let bytes = name.to_bytes();
    if bytes.contains(&b'/') {
        return name.to_owned();
    }

    let search = match env {
        Some(entries) => override_search_path(entries),
        None => std::env::var_os("PATH"),
    }
    .unwrap_or_else(|| OsString::from(DEFAULT_SEARCH_PATH));
    search_path(bytes, &search).unwrap_or_else(|| name.to_owned())
}

/// Value of `PATH` among `KEY=VALUE` entries.
fn override_search_path(entries: &[CString]) -> Option<OsString> {
    entries
        .iter()
        .find_map(|entry| entry.as_bytes().strip_prefix(b"PATH="))
        .map(|value| OsStr::from_bytes(value).to_owned())
}

/// Find the first executable regular file called `name` in `search`.
fn search_path(name: &[u8], search: &OsStr) -> Option<CString> {
    if name.is_empty() {
        return None;
    }

    let creds = Credentials::current();
    std::env::split_paths(search)
        .map(|dir| {
            // An empty entry means the current directory.
            let dir = if dir.as_os_str().is_empty() {
                PathBuf::from(".")
            } else {
                dir
            };
            dir.join(OsStr::from_bytes(name))
        })
        .find(|candidate| is_executable_file(candidate, &creds))
        .and_then(|found| CString::new(found.into_os_string().into_vec()).ok())
}

fn is_executable_file(path: &Path, creds: &Credentials) -> bool {
    match std::fs::metadata(path) {
        Ok(metadata) => metadata.is_file() && is_executable(&metadata, creds),
        Err(_) => false,
    }
}

/// Effective identity that exec checks permissions against.
#[derive(Debug)]
struct Credentials {
    uid: libc::uid_t,
    gid: libc::gid_t,
    groups: Vec<libc::gid_t>,
}

impl Credentials {
    fn current() -> Self {
        Self {
            uid: unsafe { libc::geteuid() },
            gid: unsafe { libc::getegid() },
            groups: supplementary_groups(),
        }
    }

    fn in_group(&self, gid: libc::gid_t) -> bool {
        self.gid == gid || self.groups.contains(&gid)
    }
}

/// Supplementary group list. Empty if it cannot be read.
fn supplementary_groups() -> Vec<libc::gid_t> {
    let count = unsafe { libc::getgroups(0, std::ptr::null_mut()) };
    if count <= 0 {
        return Vec::new();
    }

    let mut groups: Vec<libc::gid_t> = vec![0; count as usize];
    let filled = unsafe { libc::getgroups(count, groups.as_mut_ptr()) };
    // The list may have changed between the two calls.
    groups.truncate(filled.max(0) as usize);
    groups
}

/// Check if a file is executable by `creds`.
fn is_executable(metadata: &Metadata, creds: &Credentials) -> bool {
    let mode = metadata.permissions().mode();

    if creds.uid == 0 {
        return (mode & 0o111) != 0;
    }
    if creds.uid == metadata.uid() {
        return (mode & 0o100) != 0;
    }
    if creds.in_group(metadata.gid()) {
        return (mode & 0o010) != 0;
    }
    (mode & 0o001) != 0
}
