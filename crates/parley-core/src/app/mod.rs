//! App - アプリケーション層
//!
//! domain と ports を組み合わせて worker を組み立てます。
//!
//! # 主要コンポーネント
//! - **WorkerBuilder**: export の登録と起動時検証
//! - **Worker**: transport を捌くイベントループと teardown
//! - **DispatchGate**: invoke / reply の振り分け
//! - **Scheduler**: export 呼び出しごとのタスク管理

pub mod builder;
pub mod config;
pub(crate) mod context;
pub(crate) mod gate;
pub(crate) mod scheduler;
pub mod status;
pub mod worker_loop;

// 主要な型を再エクスポート
pub use self::builder::{BuildError, WorkerBuilder};
pub use self::config::WorkerConfig;
pub use self::status::WorkerStatus;
pub use self::worker_loop::{StatusProbe, Worker, WorkerError};
