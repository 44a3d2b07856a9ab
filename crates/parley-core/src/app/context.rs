//! WorkerContext - worker 1 インスタンス分の共有状態
//!
//! ambient なグローバル状態は持たず、worker ごとにこのオブジェクトを 1 つ作って
//! Bridge と worker loop で共有します。
//!
//! # ロック方針
//! - `std::sync::Mutex` で、クリティカルセクションは短く同期的
//! - ガードを await をまたいで保持しない
//! - 2 つのロックを同時に取らない

use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;

use crate::app::scheduler::TaskTable;
use crate::app::status::WorkerStatus;
use crate::bridge::CorrelationTable;
use crate::domain::{BridgeError, Envelope};

pub(crate) struct WorkerContext {
    correlations: Mutex<CorrelationTable>,
    tasks: Mutex<TaskTable>,
    outbound: mpsc::UnboundedSender<Envelope>,
}

impl WorkerContext {
    pub(crate) fn new(outbound: mpsc::UnboundedSender<Envelope>) -> Self {
        Self {
            correlations: Mutex::new(CorrelationTable::new()),
            tasks: Mutex::new(TaskTable::new()),
            outbound,
        }
    }

    pub(crate) fn correlations(&self) -> MutexGuard<'_, CorrelationTable> {
        self.correlations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn tasks(&self) -> MutexGuard<'_, TaskTable> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue an envelope for the host. Never waits.
    pub(crate) fn send(&self, envelope: Envelope) -> Result<(), BridgeError> {
        self.outbound
            .send(envelope)
            .map_err(|_| BridgeError::LinkClosed)
    }

    pub(crate) fn status(&self) -> WorkerStatus {
        let pending_requests = self.correlations().len();
        let mut status = self.tasks().status();
        status.pending_requests = pending_requests;
        status
    }
}
