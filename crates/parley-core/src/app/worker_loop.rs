//! Worker - 1 本の link を捌くイベントループ
//!
//! # フロー
//! 1. （設定次第で）`ready` を送る
//! 2. 以下を `select!` で待ち続ける
//!    - outbound キュー: タスクが積んだ envelope を transport へ
//!    - Scheduler: 終わったタスクを `result` / `error` に変換
//!    - transport: host からの frame を decode して DispatchGate へ
//! 3. `shutdown` か end-of-stream で teardown
//!
//! # 設計
//! - transport への書き込みはこのループだけが行う（envelope の順序がキュー順になる）
//! - ループ自体はタスクの完了を待たない。待つのは各タスクの future だけ
//! - teardown 後は terminal envelope を一切送らない

use std::sync::Arc;

use log::{debug, error, info, warn};
use tokio::sync::mpsc;

use crate::app::config::WorkerConfig;
use crate::app::context::WorkerContext;
use crate::app::gate::{Dispatch, DispatchGate};
use crate::app::scheduler::{Finished, Scheduler};
use crate::app::status::WorkerStatus;
use crate::domain::{BridgeError, Envelope, ErrorCode, TaskState};
use crate::ports::{IdGenerator, Transport, TransportError};
use crate::typed::ExportTable;

#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("transport failed: {0}")]
    Transport(#[from] TransportError),

    #[error("worker has already been torn down")]
    TornDown,
}

/// Read-only view of a worker's counters, usable while `run` holds the worker.
#[derive(Clone)]
pub struct StatusProbe {
    ctx: Arc<WorkerContext>,
}

impl StatusProbe {
    pub fn status(&self) -> WorkerStatus {
        self.ctx.status()
    }

    /// True once teardown has cancelled the pending requests.
    pub fn is_torn_down(&self) -> bool {
        self.ctx.correlations().is_closed()
    }
}

enum Event {
    Outbound(Envelope),
    Finished(Finished),
    Inbound(Result<Option<String>, TransportError>),
}

enum Flow {
    Continue,
    Shutdown,
}

pub struct Worker {
    ctx: Arc<WorkerContext>,
    gate: DispatchGate,
    scheduler: Scheduler,
    outbound: mpsc::UnboundedReceiver<Envelope>,
    config: WorkerConfig,
    torn_down: bool,
}

impl Worker {
    pub(crate) fn new(exports: ExportTable, config: WorkerConfig, ids: Box<dyn IdGenerator>) -> Self {
        let (tx, outbound) = mpsc::unbounded_channel();
        Self {
            ctx: Arc::new(WorkerContext::new(tx)),
            gate: DispatchGate::new(exports, config.max_live_tasks, ids),
            scheduler: Scheduler::new(),
            outbound,
            config,
            torn_down: false,
        }
    }

    pub fn exports(&self) -> Vec<String> {
        self.gate.exports().names()
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn status(&self) -> WorkerStatus {
        self.ctx.status()
    }

    pub fn probe(&self) -> StatusProbe {
        StatusProbe {
            ctx: Arc::clone(&self.ctx),
        }
    }

    /// Serve `transport` until the host sends `shutdown` or closes the link,
    /// then tear down.
    ///
    /// A worker runs once; a second call returns `TornDown`.
    pub async fn run<T>(&mut self, transport: &mut T) -> Result<(), WorkerError>
    where
        T: Transport + ?Sized,
    {
        if self.torn_down {
            return Err(WorkerError::TornDown);
        }
        info!("worker up, exports: {:?}", self.exports());
        if self.config.announce_ready {
            self.emit(Envelope::Ready {
                exports: self.exports(),
            });
        }

        let served = self.serve(transport).await;
        if let Err(err) = &served {
            error!("link failed: {err}");
        }
        self.teardown().await;
        served
    }

    async fn serve<T>(&mut self, transport: &mut T) -> Result<(), WorkerError>
    where
        T: Transport + ?Sized,
    {
        loop {
            // outbound を先に見る: 終了したタスクの result が、
            // そのタスクが直前に積んだ notify を追い越さないように
            let event = tokio::select! {
                biased;
                Some(envelope) = self.outbound.recv() => Event::Outbound(envelope),
                Some(finished) = self.scheduler.next_finished() => Event::Finished(finished),
                frame = transport.recv() => Event::Inbound(frame),
            };

            match event {
                Event::Outbound(envelope) => deliver(transport, envelope).await?,
                Event::Finished(finished) => self.settle(finished),
                Event::Inbound(Ok(Some(frame))) => {
                    if let Flow::Shutdown = self.on_frame(&frame) {
                        info!("host requested shutdown");
                        self.flush(transport).await?;
                        return Ok(());
                    }
                }
                Event::Inbound(Ok(None)) => {
                    info!("host closed the link");
                    return Ok(());
                }
                Event::Inbound(Err(err)) if err.is_recoverable() => {
                    self.report_malformed(err.to_string());
                }
                Event::Inbound(Err(err)) => return Err(err.into()),
            }
        }
    }

    fn on_frame(&mut self, frame: &str) -> Flow {
        let envelope = match Envelope::decode(frame) {
            Ok(envelope) => envelope,
            Err(err) => {
                self.report_malformed(err.to_string());
                return Flow::Continue;
            }
        };
        let kind = envelope.kind();
        if !kind.is_inbound() {
            self.report_malformed(format!("`{kind}` envelopes only travel from worker to host"));
            return Flow::Continue;
        }
        debug!("inbound {kind}");

        match envelope {
            Envelope::Invoke {
                invocation_id,
                function_name,
            } => {
                let dispatched = self.gate.dispatch(
                    &self.ctx,
                    &mut self.scheduler,
                    invocation_id,
                    &function_name,
                );
                match dispatched {
                    Dispatch::Started(task_id) => debug!("{invocation_id} -> {task_id}"),
                    Dispatch::Rejected(code) => debug!("{invocation_id} rejected: {code}"),
                }
            }
            Envelope::Reply {
                correlation_id,
                outcome,
            } => {
                self.gate.route_reply(&self.ctx, correlation_id, outcome);
            }
            Envelope::Shutdown => return Flow::Shutdown,
            // outbound kinds were turned away above
            _ => {}
        }
        Flow::Continue
    }

    /// Turn an ended task into its single terminal envelope.
    fn settle(&mut self, finished: Finished) {
        let terminal = match finished.outcome {
            Ok(_) => TaskState::Completed,
            Err(_) => TaskState::Failed,
        };
        let Some(record) = self.ctx.tasks().finish(finished.task_id, terminal) else {
            debug!("{} already released", finished.task_id);
            return;
        };
        let function_name = Some(record.function_name.to_string());

        let envelope = match finished.outcome {
            Ok(value) => {
                info!(
                    "{}: {} completed ({})",
                    record.invocation_id, record.function_name, finished.task_id
                );
                Envelope::Result {
                    invocation_id: record.invocation_id,
                    function_name,
                    value,
                }
            }
            Err(err) => {
                warn!(
                    "{}: {} failed: {err}",
                    record.invocation_id, record.function_name
                );
                Envelope::Error {
                    invocation_id: Some(record.invocation_id),
                    correlation_id: None,
                    function_name,
                    code: err.code(),
                    description: err.to_string(),
                }
            }
        };
        self.emit(envelope);
    }

    fn report_malformed(&self, reason: String) {
        warn!("dropping inbound frame: {reason}");
        self.emit(Envelope::diagnostic(ErrorCode::MalformedEnvelope, reason));
    }

    fn emit(&self, envelope: Envelope) {
        // The receiver lives in `self`, so this only fails after teardown.
        if self.ctx.send(envelope).is_err() {
            debug!("outbound queue closed");
        }
    }

    async fn flush<T>(&mut self, transport: &mut T) -> Result<(), WorkerError>
    where
        T: Transport + ?Sized,
    {
        while let Ok(envelope) = self.outbound.try_recv() {
            deliver(transport, envelope).await?;
        }
        Ok(())
    }

    /// Cancel every pending request and release every task.
    ///
    /// Suspended tasks resume with `LinkClosed`; anything still running after
    /// the grace period is aborted. No terminal envelopes are sent for them.
    /// Calling this twice is a no-op.
    pub async fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;

        let waiting = self.ctx.correlations().cancel_all(BridgeError::LinkClosed);
        info!(
            "teardown: {} pending request(s), {} live task(s)",
            waiting.len(),
            self.scheduler.len()
        );

        self.scheduler.drain(self.config.teardown_grace()).await;

        let live = self.ctx.tasks().live_ids();
        for task_id in live {
            self.ctx.tasks().finish(task_id, TaskState::Cancelled);
        }

        // 終了処理中にタスクが積んだものは host に届けない
        let mut dropped = 0usize;
        while self.outbound.try_recv().is_ok() {
            dropped += 1;
        }
        if dropped > 0 {
            debug!("teardown discarded {dropped} outbound envelope(s)");
        }
    }
}

async fn deliver<T>(transport: &mut T, envelope: Envelope) -> Result<(), WorkerError>
where
    T: Transport + ?Sized,
{
    let kind = envelope.kind();
    match envelope.encode() {
        Ok(frame) => {
            transport.send(frame).await?;
            debug!("outbound {kind}");
        }
        Err(err) => error!("could not encode {kind} envelope: {err}"),
    }
    Ok(())
}
