//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **ChannelTransport / HostEnd**: 同一プロセス内の link（テスト・デモ用）
//! - **StdioTransport**: 改行区切り JSON の link（`parley serve`）

pub mod channel;
pub mod stdio;

// 主要な型を再エクスポート
pub use self::channel::{ChannelTransport, HostEnd, HostError, channel_pair};
pub use self::stdio::StdioTransport;
