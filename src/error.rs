//! Error taxonomy: sentinel conditions and their HTTP status codes.
//!
//! Handlers, models and middleware report failures as [`Error`]. When the
//! failure is one of the well-known [`Sentinel`] conditions, the router's
//! [`ErrorMap`] translates it into a status code; everything else becomes a
//! `500 Internal Server Error`.
//!
//! Sentinel messages are two lower-case words so API error bodies stay short:
//!
//! ```text
//! {"errors":["invalid id"]}
//! ```

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;

use thiserror::Error;

use crate::http::StatusCode;

/// A fixed, named error condition used as a lookup key for status codes.
///
/// Two sentinels are equal when their messages are equal, so collaborators
/// can declare their own as constants:
///
/// ```
/// use restkit::error::Sentinel;
///
/// const QUOTA_EXCEEDED: Sentinel = Sentinel::new("quota exceeded");
/// assert_eq!(QUOTA_EXCEEDED.message(), "quota exceeded");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Sentinel(&'static str);

impl Sentinel {
    pub const ACCOUNT_LOCKED: Sentinel = Sentinel("account locked");
    pub const EXPIRED_SESSION: Sentinel = Sentinel("expired session");
    pub const INVALID_CREDS: Sentinel = Sentinel("invalid credentials");
    pub const INVALID_EMAIL: Sentinel = Sentinel("invalid email");
    pub const INVALID_FILE: Sentinel = Sentinel("invalid file");
    pub const INVALID_ID: Sentinel = Sentinel("invalid id");
    pub const INVALID_INPUT: Sentinel = Sentinel("invalid input");
    pub const INVALID_JSON: Sentinel = Sentinel("invalid json");
    pub const INVALID_JSONP: Sentinel = Sentinel("invalid jsonp");
    pub const INVALID_XML: Sentinel = Sentinel("invalid xml");
    pub const INVALID_YAML: Sentinel = Sentinel("invalid yaml");
    pub const INVALID_PARAMETER: Sentinel = Sentinel("invalid parameter");
    pub const INVALID_PASSWORD: Sentinel = Sentinel("invalid password");
    pub const INVALID_PERMISSION: Sentinel = Sentinel("invalid permission");
    pub const INVALID_REGISTRATION: Sentinel = Sentinel("invalid registration");
    pub const INVALID_SESSION: Sentinel = Sentinel("invalid session");
    pub const INVALID_USER: Sentinel = Sentinel("invalid user");
    pub const MISSING_SESSION: Sentinel = Sentinel("missing session");
    pub const MISSING_USER: Sentinel = Sentinel("missing user");
    /// No route matched the request path.
    pub const NOT_FOUND: Sentinel = Sentinel("not found");

    /// Declares a new sentinel. Register its status with
    /// [`ErrorMap::apply_error_code`] before serving.
    pub const fn new(message: &'static str) -> Self {
        Self(message)
    }

    /// The short message used both as the error text and the lookup key.
    pub fn message(self) -> &'static str {
        self.0
    }
}

impl fmt::Display for Sentinel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

impl std::error::Error for Sentinel {}

/// Errors produced by handlers, resource actions and models.
#[derive(Debug, Error)]
pub enum Error {
    /// A well-known condition with a registered status code.
    #[error(transparent)]
    Sentinel(#[from] Sentinel),

    /// Anything else, rendered as `500 Internal Server Error`.
    #[error(transparent)]
    Other(Box<dyn std::error::Error + Send + Sync + 'static>),
}

impl Error {
    /// Wraps an arbitrary error (or message) that has no status mapping.
    pub fn other<E>(err: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
    {
        Self::Other(err.into())
    }

    /// Returns the sentinel behind this error, if any.
    pub fn sentinel(&self) -> Option<Sentinel> {
        match self {
            Self::Sentinel(s) => Some(*s),
            Self::Other(_) => None,
        }
    }

    /// Returns `true` if this error is exactly `sentinel`.
    pub fn is(&self, sentinel: Sentinel) -> bool {
        self.sentinel() == Some(sentinel)
    }
}

/// Mapping from sentinel errors to HTTP status codes.
///
/// Owned by the router while routes are wired, then frozen behind an `Arc` and
/// shared read-only with every request [`Context`](crate::context::Context).
#[derive(Debug, Clone)]
pub struct ErrorMap {
    codes: HashMap<Sentinel, StatusCode>,
}

impl Default for ErrorMap {
    fn default() -> Self {
        Self::new()
    }
}

impl ErrorMap {
    /// Creates a map populated with the built-in sentinel catalogue.
    pub fn new() -> Self {
        use StatusCode::{BadRequest, Forbidden, NotFound};

        let defaults = [
            (Sentinel::ACCOUNT_LOCKED, Forbidden),
            (Sentinel::EXPIRED_SESSION, BadRequest),
            (Sentinel::INVALID_CREDS, BadRequest),
            (Sentinel::INVALID_EMAIL, BadRequest),
            (Sentinel::INVALID_FILE, BadRequest),
            (Sentinel::INVALID_ID, BadRequest),
            (Sentinel::INVALID_INPUT, BadRequest),
            (Sentinel::INVALID_JSON, BadRequest),
            (Sentinel::INVALID_JSONP, BadRequest),
            (Sentinel::INVALID_XML, BadRequest),
            (Sentinel::INVALID_YAML, BadRequest),
            (Sentinel::INVALID_PARAMETER, BadRequest),
            (Sentinel::INVALID_PASSWORD, BadRequest),
            (Sentinel::INVALID_PERMISSION, Forbidden),
            (Sentinel::INVALID_REGISTRATION, BadRequest),
            (Sentinel::INVALID_SESSION, BadRequest),
            (Sentinel::INVALID_USER, BadRequest),
            (Sentinel::MISSING_SESSION, BadRequest),
            (Sentinel::MISSING_USER, BadRequest),
            (Sentinel::NOT_FOUND, NotFound),
        ];

        Self {
            codes: defaults.into_iter().collect(),
        }
    }

    /// Registers `status` for `sentinel` unless a mapping already exists.
    ///
    /// Returns `false` and leaves the map untouched when `sentinel` is
    /// already present.
    ///
    /// ```
    /// use restkit::error::{ErrorMap, Sentinel};
    /// use restkit::StatusCode;
    ///
    /// let mut map = ErrorMap::new();
    /// let quota = Sentinel::new("quota exceeded");
    /// assert!(map.apply_error_code(quota, StatusCode::TooManyRequests));
    /// assert!(!map.apply_error_code(quota, StatusCode::BadRequest));
    /// assert_eq!(map.get(quota), Some(StatusCode::TooManyRequests));
    /// ```
    pub fn apply_error_code(&mut self, sentinel: Sentinel, status: StatusCode) -> bool {
        match self.codes.entry(sentinel) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(status);
                true
            }
        }
    }

    pub fn get(&self, sentinel: Sentinel) -> Option<StatusCode> {
        self.codes.get(&sentinel).copied()
    }

    /// Status code for `err`; unmapped errors fall back to `500`.
    pub fn status_of(&self, err: &Error) -> StatusCode {
        err.sentinel()
            .and_then(|s| self.get(s))
            .unwrap_or(StatusCode::InternalServerError)
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_map_client_errors() {
        let map = ErrorMap::new();
        assert_eq!(map.get(Sentinel::INVALID_ID), Some(StatusCode::BadRequest));
        assert_eq!(map.get(Sentinel::ACCOUNT_LOCKED), Some(StatusCode::Forbidden));
        assert_eq!(map.get(Sentinel::INVALID_PERMISSION), Some(StatusCode::Forbidden));
        assert_eq!(map.get(Sentinel::NOT_FOUND), Some(StatusCode::NotFound));
    }

    #[test]
    fn apply_error_code_does_not_overwrite() {
        let mut map = ErrorMap::new();
        let e = Sentinel::new("rate limited");
        assert!(map.apply_error_code(e, StatusCode::BadRequest));
        assert!(!map.apply_error_code(e, StatusCode::InternalServerError));
        assert_eq!(map.get(e), Some(StatusCode::BadRequest));
    }

    #[test]
    fn apply_error_code_refuses_builtin() {
        let mut map = ErrorMap::new();
        let before = map.len();
        assert!(!map.apply_error_code(Sentinel::INVALID_ID, StatusCode::Conflict));
        assert_eq!(map.len(), before);
        assert_eq!(map.get(Sentinel::INVALID_ID), Some(StatusCode::BadRequest));
    }

    #[test]
    fn unmapped_errors_are_server_errors() {
        let map = ErrorMap::new();
        let err = Error::other("disk on fire");
        assert_eq!(map.status_of(&err), StatusCode::InternalServerError);

        let unknown = Error::from(Sentinel::new("never registered"));
        assert_eq!(map.status_of(&unknown), StatusCode::InternalServerError);
    }

    #[test]
    fn sentinel_errors_display_their_message() {
        let err = Error::from(Sentinel::MISSING_USER);
        assert_eq!(err.to_string(), "missing user");
        assert!(err.is(Sentinel::MISSING_USER));
        assert!(!err.is(Sentinel::INVALID_USER));
    }
}
