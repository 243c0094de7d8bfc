//! Core types for gitdep
//!
//! This module provides the error types shared across the crate:
//! - [`GitdepError`] - strongly-typed failure cases for precise handling
//! - [`ErrorContext`] - user-facing wrapper adding suggestions and details
//!
//! All fallible APIs in gitdep return [`anyhow::Result`] so call sites can
//! attach context with `.context()`; the typed variants remain reachable via
//! `downcast_ref::<GitdepError>()` wherever a caller needs to distinguish
//! failure kinds (for example, the one-shot shallow-clone fallback inspects
//! the captured stderr of a [`GitdepError::GitCloneFailed`]).

mod error;

pub use error::{ErrorContext, GitdepError};
