//! DispatchGate - host から届いた `invoke` / `reply` の振り分け
//!
//! # フロー
//! - invoke: 名前を trim して ExportTable を引く → 無ければ即 `UnknownExport`
//!   → 制限チェック → TaskId 採番 → TaskTable 登録 → Scheduler に spawn
//! - reply: CorrelationTable::resolve → 該当なしなら `StaleReply` 診断

use std::sync::Arc;

use log::{debug, info, warn};
use serde_json::Value;

use crate::app::context::WorkerContext;
use crate::app::scheduler::Scheduler;
use crate::bridge::{Bridge, Resolution};
use crate::domain::{BridgeError, CorrelationId, Envelope, ErrorCode, InvocationId, TaskId};
use crate::ports::IdGenerator;
use crate::typed::ExportTable;

/// What the gate did with an `invoke`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Dispatch {
    Started(TaskId),
    Rejected(ErrorCode),
}

pub(crate) struct DispatchGate {
    exports: ExportTable,
    max_live_tasks: Option<usize>,
    ids: Box<dyn IdGenerator>,
}

impl DispatchGate {
    pub(crate) fn new(
        exports: ExportTable,
        max_live_tasks: Option<usize>,
        ids: Box<dyn IdGenerator>,
    ) -> Self {
        Self {
            exports,
            max_live_tasks,
            ids,
        }
    }

    pub(crate) fn exports(&self) -> &ExportTable {
        &self.exports
    }

    pub(crate) fn dispatch(
        &self,
        ctx: &Arc<WorkerContext>,
        scheduler: &mut Scheduler,
        invocation_id: InvocationId,
        function_name: &str,
    ) -> Dispatch {
        let name = function_name.trim();

        let Some(export) = self.exports.get(name) else {
            warn!("{invocation_id}: no export named {name:?}");
            return reject(
                ctx,
                invocation_id,
                name,
                ErrorCode::UnknownExport,
                format!("no exported function named '{name}'"),
            );
        };

        // Only one lock at a time; the scheduler loop is the sole writer here.
        let (duplicate, live) = {
            let tasks = ctx.tasks();
            (tasks.contains_invocation(invocation_id), tasks.live_count())
        };
        if duplicate {
            warn!("{invocation_id}: invocation id already running");
            return reject(
                ctx,
                invocation_id,
                name,
                ErrorCode::DuplicateInvocation,
                format!("invocation {} is still running", invocation_id.get()),
            );
        }
        if let Some(max) = self.max_live_tasks
            && live >= max
        {
            warn!("{invocation_id}: rejecting {name}, {live} task(s) live (max {max})");
            return reject(
                ctx,
                invocation_id,
                name,
                ErrorCode::Busy,
                format!("worker is running {live} task(s), the limit is {max}"),
            );
        }

        let task_id = self.ids.generate_task_id();
        let function_name: Arc<str> = Arc::from(name);
        ctx.tasks()
            .insert(task_id, invocation_id, Arc::clone(&function_name));
        let bridge = Bridge::new(Arc::clone(ctx), task_id, function_name);
        scheduler.spawn(task_id, export, bridge);
        info!("{invocation_id}: started {name} as {task_id}");
        Dispatch::Started(task_id)
    }

    pub(crate) fn route_reply(
        &self,
        ctx: &WorkerContext,
        correlation_id: CorrelationId,
        outcome: Result<Value, String>,
    ) -> Resolution {
        let outcome = outcome.map_err(BridgeError::HostRejected);
        let resolution = ctx.correlations().resolve(correlation_id, outcome);
        match resolution {
            Resolution::Resumed(task_id) => debug!("{correlation_id}: resumed {task_id}"),
            Resolution::Orphaned(task_id) => {
                warn!("{correlation_id}: reply arrived after {task_id} went away")
            }
            Resolution::Stale => {
                warn!("{correlation_id}: stale reply, no pending request");
                let diagnostic = Envelope::Error {
                    invocation_id: None,
                    correlation_id: Some(correlation_id),
                    function_name: None,
                    code: ErrorCode::StaleReply,
                    description: format!(
                        "no pending request with correlation id {}",
                        correlation_id.get()
                    ),
                };
                if ctx.send(diagnostic).is_err() {
                    debug!("{correlation_id}: link gone, stale reply diagnostic dropped");
                }
            }
        }
        resolution
    }
}

fn reject(
    ctx: &WorkerContext,
    invocation_id: InvocationId,
    name: &str,
    code: ErrorCode,
    description: String,
) -> Dispatch {
    let envelope = Envelope::Error {
        invocation_id: Some(invocation_id),
        correlation_id: None,
        function_name: Some(name.to_string()),
        code,
        description,
    };
    if ctx.send(envelope).is_err() {
        debug!("{invocation_id}: link gone, {code} not delivered");
    }
    Dispatch::Rejected(code)
}
