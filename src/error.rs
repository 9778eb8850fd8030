//! Error types for the circuit simulator core.
//!
//! This module provides a unified error type [`CircuitError`] that covers
//! structural edits, property updates, persistence and numerical solving.
//! Errors raised inside a simulation tick never reach the caller; they are
//! logged and the tick continues with stale values.

use thiserror::Error;

use crate::circuit::{ComponentId, Terminal};

/// Result type alias using [`CircuitError`].
pub type Result<T> = std::result::Result<T, CircuitError>;

/// Unified error type for all circuit operations.
#[derive(Error, Debug)]
pub enum CircuitError {
    // ============ Structural Errors ============
    /// Component id not present in the circuit
    #[error("Component {id} not found in circuit")]
    UnknownComponent { id: ComponentId },

    /// Terminal not declared by the component's kind
    #[error("Component {id} ({kind}) has no terminal '{terminal}'")]
    UnknownTerminal {
        id: ComponentId,
        kind: &'static str,
        terminal: String,
    },

    /// Attempt to connect a terminal to itself
    #[error("Cannot connect terminal {terminal} of component {id} to itself")]
    SelfConnection { id: ComponentId, terminal: Terminal },

    /// The connection already exists
    #[error("Terminals {from_id}.{from_terminal} and {to_id}.{to_terminal} are already connected")]
    DuplicateConnection {
        from_id: ComponentId,
        from_terminal: Terminal,
        to_id: ComponentId,
        to_terminal: Terminal,
    },

    /// Disconnect requested for a pair that is not connected
    #[error("Terminals {from_id}.{from_terminal} and {to_id}.{to_terminal} are not connected")]
    ConnectionNotFound {
        from_id: ComponentId,
        from_terminal: Terminal,
        to_id: ComponentId,
        to_terminal: Terminal,
    },

    /// Component id already used
    #[error("Duplicate component id {id}")]
    DuplicateComponent { id: ComponentId },

    // ============ Property Errors ============
    /// Property name not known for this kind
    #[error("Component kind '{kind}' has no property '{property}'")]
    UnknownProperty {
        kind: &'static str,
        property: String,
    },

    /// Property value of the wrong type or out of range
    #[error("Invalid value for property '{property}' of '{kind}': {message}")]
    InvalidProperty {
        kind: &'static str,
        property: String,
        message: String,
    },

    // ============ Document Errors ============
    /// A loaded circuit document is internally inconsistent
    #[error("Invalid circuit document: {message}")]
    InvalidDocument { message: String },

    // ============ Simulation Errors ============
    /// Matrix is singular and cannot be solved
    #[error("Singular matrix - circuit may have a short circuit or floating node")]
    SingularMatrix,

    /// Invalid simulation parameter
    #[error("Invalid simulation parameter: {message}")]
    InvalidSimulationParam { message: String },

    // ============ I/O Errors ============
    /// Error reading a circuit or configuration file
    #[error("Failed to read file '{path}': {source}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Error writing a circuit or configuration file
    #[error("Failed to write file '{path}': {source}")]
    FileWriteError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// JSON encoding or decoding failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CircuitError {
    /// Create an unknown terminal error
    pub fn unknown_terminal(id: ComponentId, kind: &'static str, terminal: impl Into<String>) -> Self {
        Self::UnknownTerminal {
            id,
            kind,
            terminal: terminal.into(),
        }
    }

    /// Create an unknown property error
    pub fn unknown_property(kind: &'static str, property: impl Into<String>) -> Self {
        Self::UnknownProperty {
            kind,
            property: property.into(),
        }
    }

    /// Create an invalid property error
    pub fn invalid_property(
        kind: &'static str,
        property: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidProperty {
            kind,
            property: property.into(),
            message: message.into(),
        }
    }

    /// Create an invalid document error
    pub fn invalid_document(message: impl Into<String>) -> Self {
        Self::InvalidDocument {
            message: message.into(),
        }
    }

    /// Create an invalid simulation parameter error
    pub fn invalid_param(message: impl Into<String>) -> Self {
        Self::InvalidSimulationParam {
            message: message.into(),
        }
    }

    /// Whether this error came from a structural edit (no state was changed).
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::UnknownComponent { .. }
                | Self::UnknownTerminal { .. }
                | Self::SelfConnection { .. }
                | Self::DuplicateConnection { .. }
                | Self::ConnectionNotFound { .. }
                | Self::DuplicateComponent { .. }
        )
    }
}
