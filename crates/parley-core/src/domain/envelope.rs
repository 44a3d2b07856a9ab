//! Envelope - host と worker の間でやり取りするメッセージ単位
//!
//! ワイヤ形式は JSON オブジェクト 1 つで、`kind` タグで種類を区別します。
//! フィールド名は camelCase（`correlationId`, `invocationId`, `functionName`）。
//!
//! # decode の方針
//! - いったん `RawEnvelope`（全フィールド Option）に読み込む
//! - `TryFrom<RawEnvelope>` で kind ごとの必須フィールドを検証する
//! - 失敗はすべて `EnvelopeError::Malformed` になる（worker は落ちない）

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

use super::errors::{EnvelopeError, ErrorCode};
use super::ids::{CorrelationId, InvocationId};

/// Output stream of a `notify` envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stream {
    #[default]
    Stdout,
    Stderr,
}

/// The `kind` tag, without the fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnvelopeKind {
    Invoke,
    Request,
    Reply,
    Notify,
    Result,
    Error,
    Ready,
    Shutdown,
}

impl EnvelopeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EnvelopeKind::Invoke => "invoke",
            EnvelopeKind::Request => "request",
            EnvelopeKind::Reply => "reply",
            EnvelopeKind::Notify => "notify",
            EnvelopeKind::Result => "result",
            EnvelopeKind::Error => "error",
            EnvelopeKind::Ready => "ready",
            EnvelopeKind::Shutdown => "shutdown",
        }
    }

    fn parse(tag: &str) -> Option<Self> {
        let kind = match tag {
            "invoke" => EnvelopeKind::Invoke,
            "request" => EnvelopeKind::Request,
            "reply" => EnvelopeKind::Reply,
            "notify" => EnvelopeKind::Notify,
            "result" => EnvelopeKind::Result,
            "error" => EnvelopeKind::Error,
            "ready" => EnvelopeKind::Ready,
            "shutdown" => EnvelopeKind::Shutdown,
            _ => return None,
        };
        Some(kind)
    }

    /// Host → worker kinds.
    pub fn is_inbound(self) -> bool {
        matches!(
            self,
            EnvelopeKind::Invoke | EnvelopeKind::Reply | EnvelopeKind::Shutdown
        )
    }
}

impl fmt::Display for EnvelopeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One message exchanged across the host/worker boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawEnvelope", into = "RawEnvelope")]
pub enum Envelope {
    /// host → worker: start running an exported function.
    Invoke {
        invocation_id: InvocationId,
        function_name: String,
    },
    /// worker → host: a task needs interactive input.
    Request {
        correlation_id: CorrelationId,
        prompt: String,
    },
    /// host → worker: answer to a pending request, or the host's refusal.
    Reply {
        correlation_id: CorrelationId,
        outcome: Result<Value, String>,
    },
    /// worker → host: fire-and-forget output.
    Notify { stream: Stream, text: String },
    /// worker → host: a task completed.
    Result {
        invocation_id: InvocationId,
        function_name: Option<String>,
        value: Value,
    },
    /// worker → host: a task or dispatch failed, or a diagnostic.
    Error {
        invocation_id: Option<InvocationId>,
        correlation_id: Option<CorrelationId>,
        function_name: Option<String>,
        code: ErrorCode,
        description: String,
    },
    /// worker → host: the worker accepts invokes for these names.
    Ready { exports: Vec<String> },
    /// host → worker: tear the worker down.
    Shutdown,
}

impl Envelope {
    pub fn invoke(invocation_id: InvocationId, function_name: impl Into<String>) -> Self {
        Envelope::Invoke {
            invocation_id,
            function_name: function_name.into(),
        }
    }

    pub fn reply(correlation_id: CorrelationId, value: impl Into<Value>) -> Self {
        Envelope::Reply {
            correlation_id,
            outcome: Ok(value.into()),
        }
    }

    pub fn reply_error(correlation_id: CorrelationId, message: impl Into<String>) -> Self {
        Envelope::Reply {
            correlation_id,
            outcome: Err(message.into()),
        }
    }

    pub fn notify(text: impl Into<String>) -> Self {
        Envelope::Notify {
            stream: Stream::Stdout,
            text: text.into(),
        }
    }

    /// `error` envelope with neither id, used for undecodable frames.
    pub fn diagnostic(code: ErrorCode, description: impl Into<String>) -> Self {
        Envelope::Error {
            invocation_id: None,
            correlation_id: None,
            function_name: None,
            code,
            description: description.into(),
        }
    }

    pub fn kind(&self) -> EnvelopeKind {
        match self {
            Envelope::Invoke { .. } => EnvelopeKind::Invoke,
            Envelope::Request { .. } => EnvelopeKind::Request,
            Envelope::Reply { .. } => EnvelopeKind::Reply,
            Envelope::Notify { .. } => EnvelopeKind::Notify,
            Envelope::Result { .. } => EnvelopeKind::Result,
            Envelope::Error { .. } => EnvelopeKind::Error,
            Envelope::Ready { .. } => EnvelopeKind::Ready,
            Envelope::Shutdown => EnvelopeKind::Shutdown,
        }
    }

    pub fn decode(text: &str) -> Result<Self, EnvelopeError> {
        let raw: RawEnvelope =
            serde_json::from_str(text).map_err(|e| EnvelopeError::Malformed(e.to_string()))?;
        Envelope::try_from(raw)
    }

    pub fn encode(&self) -> Result<String, EnvelopeError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Flat wire shape shared by every kind.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEnvelope {
    kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    correlation_id: Option<CorrelationId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    invocation_id: Option<InvocationId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_name: Option<String>,
    // Some(Value::Null) for an explicit `"payload": null`, None when absent.
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    payload: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    code: Option<ErrorCode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    stream: Option<Stream>,
}

fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

fn required<T>(field: Option<T>, kind: EnvelopeKind, name: &str) -> Result<T, EnvelopeError> {
    field.ok_or_else(|| EnvelopeError::malformed(format!("`{kind}` envelope is missing `{name}`")))
}

fn text_payload(payload: Option<Value>, kind: EnvelopeKind) -> Result<String, EnvelopeError> {
    match required(payload, kind, "payload")? {
        Value::String(s) => Ok(s),
        other => Err(EnvelopeError::malformed(format!(
            "`{kind}` payload must be a string, got {other}"
        ))),
    }
}

impl TryFrom<RawEnvelope> for Envelope {
    type Error = EnvelopeError;

    fn try_from(raw: RawEnvelope) -> Result<Self, EnvelopeError> {
        let kind = EnvelopeKind::parse(&raw.kind)
            .ok_or_else(|| EnvelopeError::malformed(format!("unknown kind `{}`", raw.kind)))?;

        let envelope = match kind {
            EnvelopeKind::Invoke => Envelope::Invoke {
                invocation_id: required(raw.invocation_id, kind, "invocationId")?,
                function_name: required(raw.function_name, kind, "functionName")?,
            },
            EnvelopeKind::Request => Envelope::Request {
                correlation_id: required(raw.correlation_id, kind, "correlationId")?,
                prompt: text_payload(raw.payload, kind)?,
            },
            EnvelopeKind::Reply => {
                let correlation_id = required(raw.correlation_id, kind, "correlationId")?;
                let outcome = match (raw.error, raw.payload) {
                    (Some(message), _) => Err(message),
                    (None, Some(value)) => Ok(value),
                    (None, None) => {
                        return Err(EnvelopeError::malformed(
                            "`reply` envelope needs `payload` or `error`",
                        ));
                    }
                };
                Envelope::Reply {
                    correlation_id,
                    outcome,
                }
            }
            EnvelopeKind::Notify => Envelope::Notify {
                stream: raw.stream.unwrap_or_default(),
                text: text_payload(raw.payload, kind)?,
            },
            EnvelopeKind::Result => Envelope::Result {
                invocation_id: required(raw.invocation_id, kind, "invocationId")?,
                function_name: raw.function_name,
                value: raw.payload.unwrap_or(Value::Null),
            },
            EnvelopeKind::Error => {
                let code = required(raw.code, kind, "code")?;
                if code != ErrorCode::MalformedEnvelope
                    && raw.invocation_id.is_none()
                    && raw.correlation_id.is_none()
                {
                    return Err(EnvelopeError::malformed(
                        "`error` envelope needs `invocationId` or `correlationId`",
                    ));
                }
                let description = match required(raw.payload, kind, "payload")? {
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                Envelope::Error {
                    invocation_id: raw.invocation_id,
                    correlation_id: raw.correlation_id,
                    function_name: raw.function_name,
                    code,
                    description,
                }
            }
            EnvelopeKind::Ready => {
                let exports = serde_json::from_value(required(raw.payload, kind, "payload")?)
                    .map_err(|e| EnvelopeError::malformed(format!("`ready` payload: {e}")))?;
                Envelope::Ready { exports }
            }
            EnvelopeKind::Shutdown => Envelope::Shutdown,
        };
        Ok(envelope)
    }
}

impl From<Envelope> for RawEnvelope {
    fn from(envelope: Envelope) -> Self {
        let mut raw = RawEnvelope {
            kind: envelope.kind().as_str().to_string(),
            ..RawEnvelope::default()
        };
        match envelope {
            Envelope::Invoke {
                invocation_id,
                function_name,
            } => {
                raw.invocation_id = Some(invocation_id);
                raw.function_name = Some(function_name);
            }
            Envelope::Request {
                correlation_id,
                prompt,
            } => {
                raw.correlation_id = Some(correlation_id);
                raw.payload = Some(Value::String(prompt));
            }
            Envelope::Reply {
                correlation_id,
                outcome,
            } => {
                raw.correlation_id = Some(correlation_id);
                match outcome {
                    Ok(value) => raw.payload = Some(value),
                    Err(message) => raw.error = Some(message),
                }
            }
            Envelope::Notify { stream, text } => {
                raw.stream = Some(stream);
                raw.payload = Some(Value::String(text));
            }
            Envelope::Result {
                invocation_id,
                function_name,
                value,
            } => {
                raw.invocation_id = Some(invocation_id);
                raw.function_name = function_name;
                raw.payload = Some(value);
            }
            Envelope::Error {
                invocation_id,
                correlation_id,
                function_name,
                code,
                description,
            } => {
                raw.invocation_id = invocation_id;
                raw.correlation_id = correlation_id;
                raw.function_name = function_name;
                raw.code = Some(code);
                raw.payload = Some(Value::String(description));
            }
            Envelope::Ready { exports } => {
                raw.payload = Some(Value::from(exports));
            }
            Envelope::Shutdown => {}
        }
        raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[test]
    fn decodes_invoke() {
        let env = Envelope::decode(
            r#"{"kind":"invoke","invocationId":1,"functionName":"run_program"}"#,
        )
        .unwrap();
        assert_eq!(env, Envelope::invoke(InvocationId::new(1), "run_program"));
    }

    #[test]
    fn reply_with_null_payload_is_valid() {
        let env = Envelope::decode(r#"{"kind":"reply","correlationId":3,"payload":null}"#).unwrap();
        assert_eq!(env, Envelope::reply(CorrelationId::new(3), Value::Null));
    }

    #[test]
    fn reply_error_wins_over_payload() {
        let env =
            Envelope::decode(r#"{"kind":"reply","correlationId":3,"payload":"x","error":"denied"}"#)
                .unwrap();
        assert_eq!(env, Envelope::reply_error(CorrelationId::new(3), "denied"));
    }

    #[test]
    fn notify_defaults_to_stdout() {
        let env = Envelope::decode(r#"{"kind":"notify","payload":"hi"}"#).unwrap();
        assert_eq!(env, Envelope::notify("hi"));
    }

    #[test]
    fn result_without_payload_is_null() {
        let env = Envelope::decode(r#"{"kind":"result","invocationId":5}"#).unwrap();
        assert!(matches!(env, Envelope::Result { value: Value::Null, .. }));
    }

    #[rstest]
    #[case::not_json("hello")]
    #[case::not_an_object("[1,2]")]
    #[case::missing_kind(r#"{"payload":"x"}"#)]
    #[case::unknown_kind(r#"{"kind":"teleport"}"#)]
    #[case::invoke_without_name(r#"{"kind":"invoke","invocationId":1}"#)]
    #[case::invoke_without_id(r#"{"kind":"invoke","functionName":"f"}"#)]
    #[case::reply_without_id(r#"{"kind":"reply","payload":"x"}"#)]
    #[case::reply_without_body(r#"{"kind":"reply","correlationId":1}"#)]
    #[case::request_numeric_prompt(r#"{"kind":"request","correlationId":1,"payload":5}"#)]
    #[case::correlation_id_not_a_number(r#"{"kind":"reply","correlationId":"a","payload":"x"}"#)]
    #[case::error_without_code(r#"{"kind":"error","invocationId":1,"payload":"x"}"#)]
    #[case::error_without_ids(r#"{"kind":"error","code":"TaskFailed","payload":"x"}"#)]
    fn malformed_frames_are_rejected(#[case] frame: &str) {
        let err = Envelope::decode(frame).unwrap_err();
        assert!(matches!(err, EnvelopeError::Malformed(_)), "{frame}: {err}");
    }

    #[test]
    fn missing_field_is_named_in_the_error() {
        let err = Envelope::decode(r#"{"kind":"invoke","invocationId":1}"#).unwrap_err();
        assert!(err.to_string().contains("functionName"));
    }

    #[test]
    fn request_encodes_with_camel_case_fields() {
        let env = Envelope::Request {
            correlation_id: CorrelationId::new(1),
            prompt: "What is your name? ".into(),
        };
        let v: Value = serde_json::from_str(&env.encode().unwrap()).unwrap();
        assert_eq!(
            v,
            json!({"kind": "request", "correlationId": 1, "payload": "What is your name? "})
        );
    }

    #[test]
    fn result_encodes_null_payload_explicitly() {
        let env = Envelope::Result {
            invocation_id: InvocationId::new(2),
            function_name: Some("run_program".into()),
            value: Value::Null,
        };
        let v: Value = serde_json::from_str(&env.encode().unwrap()).unwrap();
        assert_eq!(
            v,
            json!({"kind": "result", "invocationId": 2, "functionName": "run_program", "payload": null})
        );
    }

    #[test]
    fn diagnostic_error_has_no_ids() {
        let env = Envelope::diagnostic(ErrorCode::MalformedEnvelope, "bad frame");
        let v: Value = serde_json::from_str(&env.encode().unwrap()).unwrap();
        assert_eq!(
            v,
            json!({"kind": "error", "code": "MalformedEnvelope", "payload": "bad frame"})
        );
        assert_eq!(Envelope::decode(&env.encode().unwrap()).unwrap(), env);
    }

    #[test]
    fn ready_and_shutdown_survive_the_wire() {
        let ready = Envelope::Ready {
            exports: vec!["run_program".into()],
        };
        assert_eq!(Envelope::decode(&ready.encode().unwrap()).unwrap(), ready);
        assert_eq!(
            Envelope::decode(r#"{"kind":"shutdown"}"#).unwrap(),
            Envelope::Shutdown
        );
    }

    #[test]
    fn direction_of_kinds() {
        assert!(EnvelopeKind::Invoke.is_inbound());
        assert!(EnvelopeKind::Reply.is_inbound());
        assert!(!EnvelopeKind::Notify.is_inbound());
        assert!(!EnvelopeKind::Result.is_inbound());
    }
}
