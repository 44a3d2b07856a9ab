//! Bridge - export されたコードに渡す `input` / `print` 相当の窓口
//!
//! プログラム作者から見ると `request_input` は普通のブロッキング呼び出しですが、
//! 実際には以下を行います。
//!
//! 1. continuation（oneshot）を CorrelationTable に登録して ID を得る
//! 2. `request` envelope を host へ送る
//! 3. 呼び出したタスクだけを停止する（worker loop と他のタスクは動き続ける）
//! 4. `reply` が届いたらその payload を戻り値として再開する
//!
//! `emit_output` は `notify` を送るだけで停止しません。

pub mod correlation;

pub use self::correlation::{Continuation, CorrelationTable, Resolution};

use std::fmt;
use std::sync::Arc;

use log::debug;
use serde_json::Value;
use tokio::sync::oneshot;

use crate::app::context::WorkerContext;
use crate::domain::{BridgeError, Envelope, Stream, TaskId};

/// Per-task handle to the host.
///
/// Cloning is cheap; clones talk for the same task.
#[derive(Clone)]
pub struct Bridge {
    ctx: Arc<WorkerContext>,
    task_id: TaskId,
    function_name: Arc<str>,
}

impl Bridge {
    pub(crate) fn new(ctx: Arc<WorkerContext>, task_id: TaskId, function_name: Arc<str>) -> Self {
        Self {
            ctx,
            task_id,
            function_name,
        }
    }

    pub fn task_id(&self) -> TaskId {
        self.task_id
    }

    pub fn function_name(&self) -> &str {
        &self.function_name
    }

    /// Ask the host for a line of input and wait for it.
    ///
    /// Fails with `LinkClosed` if the worker is torn down first, and with
    /// `HostRejected` if the host answers with an error.
    pub async fn request_input(&self, prompt: impl Into<String>) -> Result<String, BridgeError> {
        let prompt = prompt.into();
        let (continuation, resumed) = oneshot::channel();

        let correlation_id = self
            .ctx
            .correlations()
            .register(self.task_id, continuation)?;
        self.ctx.tasks().mark_suspended(self.task_id, correlation_id);

        let request = Envelope::Request {
            correlation_id,
            prompt,
        };
        if let Err(err) = self.ctx.send(request) {
            // Nothing will ever reply; resume ourselves through the table.
            self.ctx.correlations().resolve(correlation_id, Err(err));
        } else {
            debug!("{} suspended on {correlation_id}", self.task_id);
        }

        let outcome = resumed.await.unwrap_or(Err(BridgeError::LinkClosed));
        self.ctx.tasks().mark_running(self.task_id);
        outcome.map(reply_text)
    }

    /// Send `text` to the host's stdout. Never suspends.
    pub fn emit_output(&self, text: impl Into<String>) -> Result<(), BridgeError> {
        self.emit(Stream::Stdout, text.into())
    }

    /// Send `text` to the host's stderr. Never suspends.
    pub fn emit_error_output(&self, text: impl Into<String>) -> Result<(), BridgeError> {
        self.emit(Stream::Stderr, text.into())
    }

    fn emit(&self, stream: Stream, text: String) -> Result<(), BridgeError> {
        self.ctx.send(Envelope::Notify { stream, text })
    }
}

impl fmt::Debug for Bridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bridge")
            .field("task_id", &self.task_id)
            .field("function_name", &self.function_name)
            .finish()
    }
}

/// Replies are shown to the program as text: strings as-is, `null` as the
/// empty string, anything else as compact JSON.
fn reply_text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
