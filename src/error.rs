//! Error types for symbolic construction, code generation and native execution

use std::path::PathBuf;
use std::process::ExitStatus;
use thiserror::Error;

/// Main error type of the crate
#[derive(Debug, Error)]
pub enum SymError {
    /// An operation that needs a square matrix received another shape
    #[error("Expected a square matrix, got {rows}x{cols}")]
    NotSquare { rows: usize, cols: usize },

    /// Shapes or lengths do not agree
    #[error("Dimension mismatch in {context}: expected {expected}, got {actual}")]
    DimensionMismatch {
        context: &'static str,
        expected: String,
        actual: String,
    },

    /// An input or output index is past the end
    #[error("{kind} index {index} out of range (count {count})")]
    IndexOutOfRange {
        kind: &'static str,
        index: usize,
        count: usize,
    },

    /// Gradient requested for a non-scalar output
    #[error("Output {index} is not scalar ({rows}x{cols})")]
    NotScalar {
        index: usize,
        rows: usize,
        cols: usize,
    },

    /// Function inputs must be distinct symbols
    #[error("Invalid function input: {0}")]
    InvalidInput(String),

    /// An output depends on a symbol that is not an input
    #[error("Free variable '{0}' is not among the function inputs")]
    FreeVariable(String),

    /// The function was used before `init()`
    #[error("Function '{0}' has not been initialized")]
    NotInitialized(String),

    /// A configuration value is unusable
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The compiler binary could not be spawned
    #[error("Failed to run compiler '{compiler}': {source}")]
    CompilerNotFound {
        compiler: String,
        #[source]
        source: std::io::Error,
    },

    /// The compiler ran but did not produce a shared object
    #[error("Compilation of {} failed ({status:?}):\n{stderr}", source_path.display())]
    CompilationFailed {
        source_path: PathBuf,
        status: Option<ExitStatus>,
        stderr: String,
    },

    /// Loading a shared object or resolving a symbol failed
    #[error("Library error for {}: {message}", path.display())]
    Library { path: PathBuf, message: String },
}

impl SymError {
    pub(crate) fn dimension(
        context: &'static str,
        expected: impl ToString,
        actual: impl ToString,
    ) -> Self {
        SymError::DimensionMismatch {
            context,
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, SymError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = SymError::NotSquare { rows: 2, cols: 3 };
        assert_eq!(err.to_string(), "Expected a square matrix, got 2x3");

        let err = SymError::dimension("set_input", 4, 5);
        assert_eq!(
            err.to_string(),
            "Dimension mismatch in set_input: expected 4, got 5"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: SymError = io.into();
        assert!(matches!(err, SymError::Io(_)));
    }
}
