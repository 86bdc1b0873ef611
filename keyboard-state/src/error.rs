//! Error types for keyboard-state
//!
//! The running tracker never reports errors; these only surface at the
//! public edge when something is configured wrong.

use crate::gesture::GestureKind;
use crate::view::ViewId;

/// Result type for keyboard-state operations
pub type Result<T> = std::result::Result<T, KeyboardError>;

/// Errors that can occur while wiring keyboard tracking
#[derive(Debug, thiserror::Error)]
pub enum KeyboardError {
    /// Invalid configuration provided
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The view is not part of the hierarchy
    #[error("Unknown view: {0}")]
    UnknownView(ViewId),

    /// Only one recognizer per (view, gesture kind) pair is allowed
    #[error("A {kind:?} recognizer is already attached to view {view}")]
    GestureAlreadyAttached {
        /// The view the recognizer is attached to
        view: ViewId,
        /// The gesture kind
        kind: GestureKind,
    },
}
