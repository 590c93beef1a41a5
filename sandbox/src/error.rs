//! Sandbox failure taxonomy (spec §4.4): six distinct modes so a caller (the Strategy
//! Executor, §4.10) can decide whether a failure is the user's fault (fix the script)
//! or ours (retry the cycle).

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SandboxError {
    #[error("syntax error: {0}")]
    SyntaxError(String),
    #[error("forbidden import: {0}")]
    ForbiddenImport(String),
    #[error("forbidden call: {0}")]
    ForbiddenCall(String),
    #[error("sandbox timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },
    #[error("return value did not match the expected shape: {0}")]
    BadReturn(String),
    #[error("runtime error: {0}")]
    RuntimeError(String),
}

impl SandboxError {
    pub fn kind(&self) -> &'static str {
        match self {
            SandboxError::SyntaxError(_) => "sandbox_syntax_error",
            SandboxError::ForbiddenImport(_) => "sandbox_forbidden_import",
            SandboxError::ForbiddenCall(_) => "sandbox_forbidden_call",
            SandboxError::Timeout { .. } => "sandbox_timeout",
            SandboxError::BadReturn(_) => "sandbox_bad_return",
            SandboxError::RuntimeError(_) => "sandbox_runtime_error",
        }
    }
}
