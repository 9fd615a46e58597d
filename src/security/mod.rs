//! Security middleware.
//!
//! - [`KeysMiddleware`]: API-key validation with optional per-key host
//!   restrictions.

mod keys;

pub use keys::{INVALID_KEY, KEY_HEADER, KEY_PARAM, KeysMiddleware};
