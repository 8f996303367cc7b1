//! Result type alias shared across the workspace.
//!
//! Defaults the error type to the common `HubError`, so functions can simply
//! return `Result<T>`.
use crate::error::HubError;

/// Workspace-wide `Result` alias with `HubError` as the default error.
pub type Result<T, E = HubError> = std::result::Result<T, E>;
