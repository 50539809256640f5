//! HTTP handlers.

pub mod health;
pub mod property;
pub mod respond;
