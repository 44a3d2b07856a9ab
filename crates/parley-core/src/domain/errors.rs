//! Errors - エラー型と分類
//!
//! - `ErrorCode`: host に送る `error` envelope の分類（ワイヤ上の値）
//! - `EnvelopeError`: envelope の decode / encode 失敗
//! - `BridgeError`: `request_input` / `emit_output` の失敗（タスク内に伝播する）
//! - `TaskError`: export されたコードの失敗（タスクだけを終了させる）

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Classification carried by `error` envelopes.
///
/// Serialized with the variant name as-is (`"UnknownExport"`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    /// Inbound frame could not be decoded, or travelled the wrong way.
    MalformedEnvelope,
    /// Reply for a correlation id that is not pending.
    StaleReply,
    /// Invoke named a function the worker does not export.
    UnknownExport,
    /// The link to the host closed while the task was waiting on it.
    LinkClosed,
    /// Exported code raised, panicked, or returned an unencodable value.
    TaskFailed,
    /// Live task limit reached.
    Busy,
    /// Invoke reused an invocation id that is still running.
    DuplicateInvocation,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::MalformedEnvelope => "MalformedEnvelope",
            ErrorCode::StaleReply => "StaleReply",
            ErrorCode::UnknownExport => "UnknownExport",
            ErrorCode::LinkClosed => "LinkClosed",
            ErrorCode::TaskFailed => "TaskFailed",
            ErrorCode::Busy => "Busy",
            ErrorCode::DuplicateInvocation => "DuplicateInvocation",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("malformed envelope: {0}")]
    Malformed(String),

    #[error("envelope encode failed: {0}")]
    Encode(#[from] serde_json::Error),
}

impl EnvelopeError {
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::Malformed(reason.into())
    }
}

/// Failure of a bridge call, surfaced inside the calling task.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    #[error("link to host closed")]
    LinkClosed,

    #[error("host rejected the request: {0}")]
    HostRejected(String),
}

/// Failure of one task. Terminates that task only.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error(transparent)]
    Bridge(#[from] BridgeError),

    #[error("{0}")]
    Failed(String),

    #[error("could not encode return value: {0}")]
    Encode(String),

    #[error("task panicked: {0}")]
    Panicked(String),
}

impl TaskError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }

    /// Wire classification for the terminal `error` envelope.
    pub fn code(&self) -> ErrorCode {
        match self {
            TaskError::Bridge(BridgeError::LinkClosed) => ErrorCode::LinkClosed,
            _ => ErrorCode::TaskFailed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_code_serializes_as_variant_name() {
        let s = serde_json::to_string(&ErrorCode::UnknownExport).unwrap();
        assert_eq!(s, "\"UnknownExport\"");

        let back: ErrorCode = serde_json::from_str("\"StaleReply\"").unwrap();
        assert_eq!(back, ErrorCode::StaleReply);
        assert_eq!(back.to_string(), "StaleReply");
    }

    #[test]
    fn link_closed_keeps_its_code_through_task_error() {
        let err: TaskError = BridgeError::LinkClosed.into();
        assert_eq!(err.code(), ErrorCode::LinkClosed);
        assert_eq!(err.to_string(), "link to host closed");
    }

    #[test]
    fn other_task_errors_are_task_failed() {
        assert_eq!(TaskError::failed("boom").code(), ErrorCode::TaskFailed);
        assert_eq!(
            TaskError::from(BridgeError::HostRejected("no".into())).code(),
            ErrorCode::TaskFailed
        );
        assert_eq!(TaskError::Panicked("x".into()).code(), ErrorCode::TaskFailed);
    }
}
