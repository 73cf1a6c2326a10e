//! API request handlers.
//!
//! This module contains all HTTP request handlers organized by functionality.

/// Artifact listing and download handlers.
pub mod artifacts;
/// Progress event streaming handlers (SSE).
pub mod events;
/// Workflow execution and session lifecycle handlers.
pub mod sessions;
/// Data file upload handlers.
pub mod upload;
