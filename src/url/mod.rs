//! URI identity for the frontier
//!
//! This module turns URIs into the two keys the frontier is organised around: the
//! class key that picks a politeness queue, and the 64-bit fingerprint used for
//! dedup.

mod classkey;
mod fingerprint;

pub use classkey::{authority_key, class_key, host_key, parse_absolute, robots_uri};
pub use fingerprint::{fingerprint, fingerprint_str, hash64};
