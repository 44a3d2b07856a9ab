//! ChannelTransport - 同一プロセス内の host と worker を tokio mpsc でつなぐ
//!
//! テストと `parley demo` 用です。host 側は `HostEnd` で envelope 単位に
//! 読み書きし、worker 側は `Transport` として frame（JSON テキスト）を扱います。
//! `HostEnd` を drop すると worker からは end-of-stream に見えます。

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::domain::{Envelope, EnvelopeError};
use crate::ports::{Transport, TransportError};

#[derive(Debug, Error)]
pub enum HostError {
    #[error(transparent)]
    Envelope(#[from] EnvelopeError),

    #[error("worker end of the channel is gone")]
    Disconnected,
}

/// Worker side of an in-process link.
pub struct ChannelTransport {
    inbound: mpsc::UnboundedReceiver<String>,
    outbound: mpsc::UnboundedSender<String>,
}

/// Host side of an in-process link.
pub struct HostEnd {
    to_worker: mpsc::UnboundedSender<String>,
    from_worker: mpsc::UnboundedReceiver<String>,
}

pub fn channel_pair() -> (ChannelTransport, HostEnd) {
    let (to_worker, inbound) = mpsc::unbounded_channel();
    let (outbound, from_worker) = mpsc::unbounded_channel();
    (
        ChannelTransport { inbound, outbound },
        HostEnd {
            to_worker,
            from_worker,
        },
    )
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn recv(&mut self) -> Result<Option<String>, TransportError> {
        Ok(self.inbound.recv().await)
    }

    async fn send(&mut self, frame: String) -> Result<(), TransportError> {
        self.outbound
            .send(frame)
            .map_err(|_| TransportError::Closed)
    }
}

impl HostEnd {
    pub fn send(&self, envelope: &Envelope) -> Result<(), HostError> {
        self.send_raw(envelope.encode()?)
    }

    /// Send a frame as-is, valid or not.
    pub fn send_raw(&self, frame: impl Into<String>) -> Result<(), HostError> {
        self.to_worker
            .send(frame.into())
            .map_err(|_| HostError::Disconnected)
    }

    /// Next envelope from the worker, `None` once the worker has hung up.
    pub async fn recv(&mut self) -> Result<Option<Envelope>, HostError> {
        match self.from_worker.recv().await {
            Some(frame) => Ok(Some(Envelope::decode(&frame)?)),
            None => Ok(None),
        }
    }

    /// Next raw frame from the worker.
    pub async fn recv_raw(&mut self) -> Option<String> {
        self.from_worker.recv().await
    }
}
