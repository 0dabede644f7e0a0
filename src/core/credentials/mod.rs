//! Shared API credential rotation
//!
//! The pool owns one slot per configured credential and the model
//! identifier every worker transcribes with. Slots move between
//! `available`, `working`, `rate_limited` and `error`; only the first
//! three keep a credential in rotation.

pub mod pool;
pub mod types;

pub use pool::CredentialPool;
pub use types::{CredentialLease, CredentialState, CredentialStatus};
