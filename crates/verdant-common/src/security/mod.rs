//! Security primitives for Verdant
//!
//! Privileged entry points (credential intake, administrative updates) are
//! gated by capability tokens rather than a single hardcoded identity.

pub mod authority;

pub use authority::{AccessToken, AuthorityRegistry, Capability, Grant};
