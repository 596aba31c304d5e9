//! Unified error handling system
//!
//! Provides structured error types with context, recovery hints, and proper
//! error chaining across the workspace.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type RoundtableResult<T> = Result<T, RoundtableError>;

/// Error context providing additional information for debugging and recovery
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorContext {
    /// Unique error ID for tracking
    pub error_id: String,
    /// Timestamp when the error occurred
    pub timestamp: DateTime<Utc>,
    /// Component where the error originated
    pub component: String,
    /// Operation being performed when the error occurred
    pub operation: Option<String>,
    /// Recovery suggestions
    pub recovery_suggestions: Vec<String>,
}

impl ErrorContext {
    pub fn new(component: &str) -> Self {
        Self {
            error_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            component: component.to_string(),
            operation: None,
            recovery_suggestions: Vec::new(),
        }
    }

    pub fn with_operation(mut self, operation: &str) -> Self {
        self.operation = Some(operation.to_string());
        self
    }

    pub fn with_suggestion(mut self, suggestion: &str) -> Self {
        self.recovery_suggestions.push(suggestion.to_string());
        self
    }
}

/// Main error type for the Roundtable system
#[derive(Error, Debug)]
pub enum RoundtableError {
    #[error("Service unavailable: {message}")]
    ServiceUnavailable {
        message: String,
        /// Which external capability failed (generator or a provider name)
        capability: Option<String>,
        context: ErrorContext,
    },

    #[error("Invalid schema: {message}")]
    InvalidSchema {
        message: String,
        context: ErrorContext,
    },

    #[error("Resource not found: {resource}")]
    NotFound {
        resource: String,
        context: ErrorContext,
    },

    #[error("Storage error: {message}")]
    Storage {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        context: ErrorContext,
    },

    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        context: ErrorContext,
    },

    #[error("Validation error: {message}")]
    Validation {
        message: String,
        field: Option<String>,
        context: ErrorContext,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {message}")]
    Internal {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        context: ErrorContext,
    },
}

impl RoundtableError {
    /// Create a service-unavailable error for an external capability
    pub fn service_unavailable(message: impl Into<String>, capability: &str) -> Self {
        Self::ServiceUnavailable {
            message: message.into(),
            capability: Some(capability.to_string()),
            context: ErrorContext::new(capability)
                .with_suggestion("Check service availability")
                .with_suggestion("The call is retried with backoff before failing the branch"),
        }
    }

    /// Create an invalid-schema error for a structured-generation mismatch
    pub fn invalid_schema(message: impl Into<String>, component: &str) -> Self {
        Self::InvalidSchema {
            message: message.into(),
            context: ErrorContext::new(component)
                .with_suggestion("Verify the output schema passed to the generator"),
        }
    }

    /// Get the error context
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            RoundtableError::ServiceUnavailable { context, .. } => Some(context),
            RoundtableError::InvalidSchema { context, .. } => Some(context),
            RoundtableError::NotFound { context, .. } => Some(context),
            RoundtableError::Storage { context, .. } => Some(context),
            RoundtableError::Config { context, .. } => Some(context),
            RoundtableError::Validation { context, .. } => Some(context),
            RoundtableError::Internal { context, .. } => Some(context),
            _ => None,
        }
    }

    /// Check if the error is recoverable by retrying the failing call
    pub fn is_recoverable(&self) -> bool {
        matches!(self, RoundtableError::ServiceUnavailable { .. })
    }

    /// Get retry delay in milliseconds for recoverable errors
    pub fn retry_delay_ms(&self) -> Option<u64> {
        match self {
            RoundtableError::ServiceUnavailable { .. } => Some(1000),
            _ => None,
        }
    }
}

/// Convenience macro for creating not-found errors with context
#[macro_export]
macro_rules! not_found_error {
    ($resource:expr, $component:expr) => {
        $crate::error::RoundtableError::NotFound {
            resource: $resource.to_string(),
            context: $crate::error::ErrorContext::new($component)
                .with_suggestion("Verify the run identifier")
                .with_suggestion("Check if the checkpoint still exists"),
        }
    };
}

/// Convenience macro for creating storage errors with context
#[macro_export]
macro_rules! storage_error {
    ($msg:expr, $component:expr) => {
        $crate::error::RoundtableError::Storage {
            message: $msg.to_string(),
            source: None,
            context: $crate::error::ErrorContext::new($component),
        }
    };
    ($msg:expr, $component:expr, $source:expr) => {
        $crate::error::RoundtableError::Storage {
            message: $msg.to_string(),
            source: Some(Box::new($source)),
            context: $crate::error::ErrorContext::new($component),
        }
    };
}
