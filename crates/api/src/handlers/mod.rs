//! Request handlers.
//!
//! Handlers authenticate, validate the request body and delegate to
//! [`crate::services`]. Request bodies are camelCase; responses wrap the
//! service result in [`crate::response::DataResponse`].

pub mod evaluation;
pub mod proposal;
pub mod rubric;
