//! Domain models for the property service.
//!
//! A [`Property`] is a plain data record: a store-assigned `id`, an open set of
//! attributes, and the managed `createdAt`/`updatedAt` timestamps.

pub mod property;

pub use property::{Property, PropertyFields, RESERVED_KEYS};
