//! Pointer-literal redaction for user-visible error strings (§6, §7, E5).
//!
//! Error messages surfaced to users are normalized so that two runs that
//! differ only in heap addresses compare equal. A secondary requirement is
//! that redaction is transparent to `IsNotFound`/`IsAlreadyExists`-style
//! checks: wrapping an error in [`Redacted`] must not hide its underlying
//! `kube::Error` from callers that need to branch on it.

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

static POINTER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\(0x[0-9a-fA-F]{5,}\)").unwrap());

/// Replaces pointer literals of the form `(0x[0-9a-f]{5,})` with `(..ptr..)`.
pub fn redact_pointers(message: &str) -> String {
    POINTER.replace_all(message, "(..ptr..)").into_owned()
}

/// Wraps an error so its `Display` output is redacted, while leaving the
/// inner error reachable via `source`/`Deref`-style unwrapping so
/// `kube::core::ErrorResponse` introspection (e.g. `is_not_found`,
/// `is_already_exists`-equivalent checks on a wrapped `StatusError`) still
/// works across the redaction (E5).
#[derive(Debug)]
pub struct Redacted<E>(pub E);

impl<E: fmt::Display> fmt::Display for Redacted<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", redact_pointers(&self.0.to_string()))
    }
}

impl<E: std::error::Error + 'static> std::error::Error for Redacted<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.0)
    }
}

impl<E> std::ops::Deref for Redacted<E> {
    type Target = E;
    fn deref(&self) -> &E {
        &self.0
    }
}

/// Returns `true` if `err`, or anything in its `source()` chain, is a
/// `kube::Error::Api` with a 404 status — i.e. `IsNotFound` semantics
/// preserved across a [`Redacted`] wrapper (§7).
pub fn is_not_found(err: &(dyn std::error::Error + 'static)) -> bool {
    find_kube_error(err).is_some_and(|e| matches!(e, kube::Error::Api(ae) if ae.code == 404))
}

/// Same as [`is_not_found`] but for 409 Conflict. `AlreadyExists` is also a
/// 409, so this is `true` for both; use [`is_already_exists`] to tell them
/// apart by `reason`.
pub fn is_conflict(err: &(dyn std::error::Error + 'static)) -> bool {
    find_kube_error(err).is_some_and(|e| matches!(e, kube::Error::Api(ae) if ae.code == 409))
}

/// Returns `true` if `err`, or anything in its `source()` chain, is a
/// `kube::Error::Api` with `reason == "AlreadyExists"` — `IsAlreadyExists`
/// semantics preserved across a [`Redacted`] wrapper (§7, E5).
pub fn is_already_exists(err: &(dyn std::error::Error + 'static)) -> bool {
    find_kube_error(err).is_some_and(|e| matches!(e, kube::Error::Api(ae) if ae.reason == "AlreadyExists"))
}

fn find_kube_error(mut err: &(dyn std::error::Error + 'static)) -> Option<&kube::Error> {
    loop {
        if let Some(kube_err) = err.downcast_ref::<kube::Error>() {
            return Some(kube_err);
        }
        err = err.source()?;
    }
}
