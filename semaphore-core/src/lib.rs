//! Shared primitives and traits for the Semaphore sign-recognition workspace.
//!
//! `semaphore-core` provides the foundation the model selection crate builds on:
//!
//! - **Error types**: [`SemaphoreError`] and [`Result`] for structured error handling
//! - **Traits**: Small shared abstractions like [`Summarizable`] and [`Annotated`]

pub mod error;
pub mod traits;

pub use error::{SemaphoreError, Result};
pub use traits::*;
