//! Everything the child needs to call exec, built before the fork.

use crate::resolve::resolve_program;
use nix::errno::Errno;
use std::ffi::{CStr, CString};
use std::marker::PhantomData;
use std::os::raw::c_char;
use std::ptr;

/// Null-terminated pointer arrays for `execv`/`execve`.
///
/// The pointers borrow the `CString`s owned by the prepared request, so the
/// image must not outlive it.
pub(crate) struct ExecImage<'a> {
    name: &'a CStr,
    program: CString,
    argv: Vec<*const c_char>,
    envp: Option<Vec<*const c_char>>,
    _borrow: PhantomData<&'a CString>,
}

impl<'a> ExecImage<'a> {
    /// Build the image. `argv` must be non-empty; `env` entries are `KEY=VALUE`.
    pub(crate) fn new(argv: &'a [CString], env: Option<&'a [CString]>) -> Self {
        let name = argv[0].as_c_str();
        Self {
            name,
            program: resolve_program(name, env),
            argv: null_terminated(argv),
            envp: env.map(null_terminated),
            _borrow: PhantomData,
        }
    }

    /// `argv[0]` as the caller gave it.
    pub(crate) fn name(&self) -> &CStr {
        self.name
    }

    /// The path exec will be called with.
    pub(crate) fn program(&self) -> &CStr {
        &self.program
    }

    pub(crate) fn replaces_env(&self) -> bool {
        self.envp.is_some()
    }

    /// Replace the current process image. Only returns on failure.
    ///
    /// # Safety
    ///
    /// Intended for the forked child: performs no allocation.
    pub(crate) unsafe fn exec(&self) -> Errno {
        match &self.envp {
            Some(envp) => {
                libc::execve(self.program.as_ptr(), self.argv.as_ptr(), envp.as_ptr());
            }
            None => {
                libc::execv(self.program.as_ptr(), self.argv.as_ptr());
            }
        }
        Errno::last()
    }
}

fn null_terminated(strings: &[CString]) -> Vec<*const c_char> {
    strings
        .iter()
        .map(|s| s.as_ptr())
        .chain(std::iter::once(ptr::null()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cstrings(items: &[&str]) -> Vec<CString> {
        items.iter().map(|s| CString::new(*s).unwrap()).collect()
    }

    #[test]
    fn test_argv_is_null_terminated() {
        let argv = cstrings(&["/bin/echo", "a", "b"]);
        let image = ExecImage::new(&argv, None);

        assert_eq!(image.argv.len(), 4);
        assert!(image.argv[3].is_null());
        let second = unsafe { CStr::from_ptr(image.argv[1]) };
        assert_eq!(second.to_bytes(), b"a");
        assert!(!image.replaces_env());
    }

    #[test]
    fn test_env_override_kept_separately() {
        let argv = cstrings(&["/usr/bin/env"]);
        let env = cstrings(&["A=1", "B=2"]);
        let image = ExecImage::new(&argv, Some(&env));

        assert!(image.replaces_env());
        let envp = image.envp.as_ref().unwrap();
        assert_eq!(envp.len(), 3);
        assert!(envp[2].is_null());
    }

    #[test]
    fn test_empty_env_override_is_just_terminator() {
        let argv = cstrings(&["/usr/bin/env"]);
        let env: Vec<CString> = Vec::new();
        let image = ExecImage::new(&argv, Some(&env));

        let envp = image.envp.as_ref().unwrap();
        assert_eq!(envp.len(), 1);
        assert!(envp[0].is_null());
    }

    #[test]
    fn test_name_and_program() {
        let argv = cstrings(&["/bin/thisdoesntexist/no/no/no"]);
        let image = ExecImage::new(&argv, None);
        assert_eq!(image.name().to_bytes(), b"/bin/thisdoesntexist/no/no/no");
        assert_eq!(image.program(), image.name());
    }
}
