//! Error taxonomy for context operations.
//!
//! The `Display` text of every [`RadioError`] is exactly what lands in the
//! context's error channel, so `strerror` and `err.to_string()` agree.

use std::fmt;

use mlua::Value;
use thiserror::Error;

use crate::pipeline::Operation;

/// An error value captured from a protected call into the runtime.
///
/// Lua may raise any value, not only strings. Textual errors keep their
/// traceback-augmented text; everything else is described by its type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CapturedError {
    Text(String),
    Opaque { type_name: &'static str },
}

impl CapturedError {
    /// Classify the value produced by the traceback message handler.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::String(s) => CapturedError::Text(s.to_string_lossy().to_string()),
            other => CapturedError::Opaque {
                type_name: other.type_name(),
            },
        }
    }
}

impl fmt::Display for CapturedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CapturedError::Text(text) => f.write_str(text),
            CapturedError::Opaque { type_name } => {
                write!(f, "(error object is a {type_name} value)")
            }
        }
    }
}

impl From<mlua::Error> for CapturedError {
    fn from(err: mlua::Error) -> Self {
        match err {
            mlua::Error::SyntaxError { message, .. } => CapturedError::Text(message),
            mlua::Error::RuntimeError(message) => CapturedError::Text(message),
            other => CapturedError::Text(other.to_string()),
        }
    }
}

/// Root error type for all context operations.
#[derive(Error, Debug)]
pub enum RadioError {
    /// Context or runtime construction failed. Never written to a channel:
    /// there is no context to hold it.
    #[error("allocation error")]
    Allocation,

    /// The runtime was created but could not be prepared (library search
    /// path, memory limit).
    #[error("runtime setup failed: {0}")]
    Setup(String),

    /// Library binding, compilation or execution of the script failed.
    #[error("{0}")]
    Script(CapturedError),

    /// The script ran but did not hand back exactly one Pipeline.
    #[error("script did not return a Pipeline instance")]
    Validation,

    /// A lifecycle operation was requested with nothing loaded.
    #[error("no Pipeline loaded to {}", .0.purpose())]
    NoPipeline(Operation),

    /// The named pipeline method raised.
    #[error("{error}")]
    Lifecycle {
        operation: Operation,
        error: CapturedError,
    },

    /// `status()` returned something without a boolean `running` field.
    #[error("status() returned {0}")]
    MalformedStatus(String),

    #[error("config error: {0}")]
    Config(String),
}

pub type RadioResult<T> = Result<T, RadioError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opaque_errors_describe_their_type() {
        let err = CapturedError::Opaque { type_name: "table" };
        assert_eq!(err.to_string(), "(error object is a table value)");
    }

    #[test]
    fn no_pipeline_message_names_the_operation() {
        assert_eq!(
            RadioError::NoPipeline(Operation::Start).to_string(),
            "no Pipeline loaded to start"
        );
        assert_eq!(
            RadioError::NoPipeline(Operation::Wait).to_string(),
            "no Pipeline loaded to wait on"
        );
        assert_eq!(
            RadioError::NoPipeline(Operation::Status).to_string(),
            "no Pipeline loaded to query status"
        );
    }

    #[test]
    fn lifecycle_error_displays_captured_text_verbatim() {
        let err = RadioError::Lifecycle {
            operation: Operation::Stop,
            error: CapturedError::Text("boom\nstack traceback:\n\t[C]: in ?".into()),
        };
        assert!(err.to_string().starts_with("boom\nstack traceback:"));
    }

    #[test]
    fn syntax_errors_keep_their_message() {
        let err = CapturedError::from(mlua::Error::SyntaxError {
            message: "script:1: unexpected symbol near '?'".into(),
            incomplete_input: false,
        });
        assert_eq!(
            err,
            CapturedError::Text("script:1: unexpected symbol near '?'".into())
        );
    }
}
