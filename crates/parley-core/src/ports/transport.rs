//! Transport port - host との物理的なメッセージ経路
//!
//! worker は 1 フレーム = 1 envelope の JSON テキストとして送受信します。
//! 経路そのもの（Worker の postMessage, パイプ, ソケット）は外部の関心事です。
//!
//! # 実装
//! - `impls::ChannelTransport`: tokio mpsc（テスト・同一プロセス host 用）
//! - `impls::StdioTransport`: 改行区切り JSON（stdin/stdout）

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport i/o: {0}")]
    Io(#[from] std::io::Error),

    #[error("transport closed")]
    Closed,

    #[error("frame of {len} bytes exceeds the {max} byte limit")]
    FrameTooLarge { len: usize, max: usize },

    #[error("frame of {len} bytes is not valid UTF-8")]
    InvalidUtf8 { len: usize },
}

impl TransportError {
    /// The link is still usable after this error; only the offending frame is lost.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            TransportError::FrameTooLarge { .. } | TransportError::InvalidUtf8 { .. }
        )
    }
}

/// Transport は worker 側から見たメッセージ経路
///
/// # 契約
/// - `recv` は cancel-safe であること（worker loop が `select!` で待つため）
/// - `Ok(None)` はストリーム終端（host が切断した）
#[async_trait]
pub trait Transport: Send {
    async fn recv(&mut self) -> Result<Option<String>, TransportError>;

    async fn send(&mut self, frame: String) -> Result<(), TransportError>;
}
