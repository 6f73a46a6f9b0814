//! Host-side error types

use microasm_sys as sys;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for host operations
pub type MasmResult<T> = Result<T, MasmError>;

/// Placeholder used when the runtime reports no error text
pub const UNKNOWN_ERROR: &str = "Unknown error";

/// Failure kind reported by the runtime, mapped from its raw result code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Invalid configuration, out-of-range register, or other generic failure
    General,
    /// Null or unknown interpreter handle
    InvalidHandle,
    /// Missing or malformed bytecode artifact
    LoadFailed,
    /// Runtime fault, or execute in the wrong state
    ExecutionFailed,
    /// Null pointer or unusable argument
    InvalidArgument,
    /// RAM access out of bounds
    Memory,
    /// A code this host does not know
    Unrecognized(i32),
}

impl ErrorKind {
    /// Map a raw result code; `None` for success
    pub fn from_code(code: sys::MasmResult) -> Option<Self> {
        let kind = match code {
            sys::MASM_OK => return None,
            sys::MASM_ERROR_GENERAL => Self::General,
            sys::MASM_ERROR_INVALID_HANDLE => Self::InvalidHandle,
            sys::MASM_ERROR_LOAD_FAILED => Self::LoadFailed,
            sys::MASM_ERROR_EXECUTION_FAILED => Self::ExecutionFailed,
            sys::MASM_ERROR_INVALID_ARGUMENT => Self::InvalidArgument,
            sys::MASM_ERROR_MEMORY => Self::Memory,
            other => Self::Unrecognized(other),
        };
        Some(kind)
    }

    /// The raw result code
    pub fn code(self) -> sys::MasmResult {
        match self {
            Self::General => sys::MASM_ERROR_GENERAL,
            Self::InvalidHandle => sys::MASM_ERROR_INVALID_HANDLE,
            Self::LoadFailed => sys::MASM_ERROR_LOAD_FAILED,
            Self::ExecutionFailed => sys::MASM_ERROR_EXECUTION_FAILED,
            Self::InvalidArgument => sys::MASM_ERROR_INVALID_ARGUMENT,
            Self::Memory => sys::MASM_ERROR_MEMORY,
            Self::Unrecognized(code) => code,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::General => f.write_str("GeneralError"),
            Self::InvalidHandle => f.write_str("InvalidHandle"),
            Self::LoadFailed => f.write_str("LoadFailed"),
            Self::ExecutionFailed => f.write_str("ExecutionFailed"),
            Self::InvalidArgument => f.write_str("InvalidArgument"),
            Self::Memory => f.write_str("MemoryError"),
            Self::Unrecognized(code) => write!(f, "Error({code})"),
        }
    }
}

/// Errors from binding to or calling the interpreter library
#[derive(Debug, Error)]
pub enum MasmError {
    /// The shared library could not be opened
    #[error("Interpreter library not found at '{}': {source}", path.display())]
    LibraryNotFound {
        /// Path that was tried
        path: PathBuf,
        /// Loader error
        #[source]
        source: libloading::Error,
    },

    /// The library lacks an expected export
    #[error("Entry point '{symbol}' missing from interpreter library: {source}")]
    MissingEntryPoint {
        /// Name of the missing symbol
        symbol: &'static str,
        /// Loader error
        #[source]
        source: libloading::Error,
    },

    /// A call returned a failure code
    #[error("[{kind}] {message}")]
    Call {
        /// Mapped result code
        kind: ErrorKind,
        /// Last error text captured right after the call
        message: String,
    },
}

impl MasmError {
    /// Build a call failure, substituting the placeholder for missing text
    pub fn call(kind: ErrorKind, message: Option<String>) -> Self {
        let message = message
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| UNKNOWN_ERROR.to_string());
        Self::Call { kind, message }
    }

    /// Whether the library itself could not be bound
    pub fn is_binding_error(&self) -> bool {
        matches!(
            self,
            Self::LibraryNotFound { .. } | Self::MissingEntryPoint { .. }
        )
    }

    /// Kind of a call failure, `None` for binding errors
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Call { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_round_trip() {
        for code in -6..=-1 {
            let kind = ErrorKind::from_code(code).unwrap();
            assert_eq!(kind.code(), code);
            assert!(!matches!(kind, ErrorKind::Unrecognized(_)));
        }
        assert_eq!(ErrorKind::from_code(sys::MASM_OK), None);
        assert_eq!(ErrorKind::from_code(-99), Some(ErrorKind::Unrecognized(-99)));
    }

    #[test]
    fn test_call_display() {
        let err = MasmError::call(ErrorKind::LoadFailed, Some("no such file".into()));
        assert_eq!(err.to_string(), "[LoadFailed] no such file");
        assert_eq!(err.kind(), Some(ErrorKind::LoadFailed));
        assert!(!err.is_binding_error());
    }

    #[test]
    fn test_missing_text_falls_back() {
        let err = MasmError::call(ErrorKind::General, None);
        assert_eq!(err.to_string(), "[GeneralError] Unknown error");
        let err = MasmError::call(ErrorKind::Memory, Some(String::new()));
        assert_eq!(err.to_string(), "[MemoryError] Unknown error");
    }
}
