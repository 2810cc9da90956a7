//! Shared utilities.
//!
//! Hashing, filesystem helpers, external tool invocation and test helpers.

pub mod fs;
pub mod hash;
pub mod process;

#[cfg(test)]
pub mod testutil;
