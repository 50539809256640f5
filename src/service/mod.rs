//! Service layer module.
//!
//! Contains the property operations, JSON-Patch application and the per-id
//! lock registry that serializes fetch-then-mutate flows.

pub mod locks;
pub mod patch;
pub mod property;

pub use locks::KeyedLocks;
pub use property::PropertyService;
