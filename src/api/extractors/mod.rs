//! Request extractors.
//!
//! Both reject with [`crate::error::AppError::BadRequest`] so malformed input
//! gets the same JSON error body as every other failure.

mod json_body;
mod property_id;

pub use json_body::JsonBody;
pub use property_id::PropertyId;
