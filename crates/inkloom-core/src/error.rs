//! Error types for inkloom-core
//!
//! This module provides error types and user-friendly error formatting.

use crate::agents::PlanError;
use thiserror::Error;

/// Core error type
#[derive(Debug, Error)]
pub enum Error {
    /// Plan could not be built; nothing was executed
    #[error("planning error: {0}")]
    Plan(#[from] PlanError),

    /// Malformed pipeline request
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Invalid configuration value
    #[error("invalid configuration for {field}: {message}")]
    InvalidConfig {
        /// Config field name
        field: String,
        /// Detailed message
        message: String,
    },

    /// Configuration could not be loaded or saved
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Backend routing error
    #[error("llm error: {0}")]
    Llm(#[from] inkloom_llm::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Trait for user-friendly error messages
pub trait UserFriendlyError {
    /// Get a user-friendly error message
    fn user_message(&self) -> String;

    /// Get a suggestion for how to fix the error
    fn suggestion(&self) -> Option<String>;
}

impl UserFriendlyError for Error {
    fn user_message(&self) -> String {
        match self {
            Error::Plan(PlanError::NoUsableBackends) => {
                "🔌 No backend is currently usable.".to_string()
            }
            Error::Plan(e) => format!("📋 Planning failed: {e}"),
            Error::InvalidRequest(msg) => format!("📝 Invalid pipeline request: {msg}"),
            Error::InvalidConfig { field, message } => {
                format!("⚙️ Configuration error in '{field}': {message}")
            }
            Error::Configuration(msg) => format!("⚙️ Configuration error: {msg}"),
            Error::Llm(e) => format!("🤖 Backend error: {e}"),
        }
    }

    fn suggestion(&self) -> Option<String> {
        match self {
            Error::Plan(PlanError::NoUsableBackends) => Some(
                "💡 Enable a backend, check its api_key, or wait for open circuits to cool down."
                    .to_string(),
            ),
            Error::InvalidConfig { field, .. } => Some(format!(
                "💡 Check the '{field}' setting in inkloom.toml or the INKLOOM_ environment variables."
            )),
            Error::Configuration(_) => {
                Some("💡 Check inkloom.toml syntax, or pass another file with --config.".to_string())
            }
            _ => None,
        }
    }
}

/// Format an error for display in the CLI
pub fn format_error_for_cli(error: &Error) -> String {
    let mut output = error.user_message();
    if let Some(suggestion) = error.suggestion() {
        output.push_str("\n\n");
        output.push_str(&suggestion);
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_backends_has_suggestion() {
        let error = Error::from(PlanError::NoUsableBackends);
        assert!(error.user_message().contains("No backend"));
        assert!(error.suggestion().is_some());
        assert!(format_error_for_cli(&error).contains("💡"));
    }

    #[test]
    fn test_llm_error_converts() {
        let error: Error = inkloom_llm::Error::NotConfigured("alpha".to_string()).into();
        assert!(matches!(error, Error::Llm(_)));
        assert!(error.suggestion().is_none());
    }
}
