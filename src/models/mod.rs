//! Core data models for the media sanitization pipeline.
//!
//! These types describe what flows through one invocation: the resolved
//! object reference, the file metadata fetched from the store, and the
//! single result returned to the caller. They serialize with `serde` using
//! the store's and runtime's camelCase wire names.

pub mod file;
pub mod invocation;
pub mod reference;
pub mod result;
