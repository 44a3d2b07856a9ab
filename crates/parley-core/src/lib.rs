//! parley-core
//!
//! host と worker の間で、ブロッキングな `input()` / `print()` を
//! メッセージの往復に変換する対話 I/O ブリッジ。
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, envelope, state, errors）
//! - **ports**: 抽象化レイヤー（Transport, IdGenerator, Clock）
//! - **bridge**: タスクに渡す窓口（Bridge）と CorrelationTable
//! - **app**: worker の組み立てとイベントループ（builder, worker_loop, gate, scheduler）
//! - **typed**: 型付き export API（Program trait, ExportTable）
//! - **impls**: Transport の実装（channel, stdio）
//! - **sample**: サンプルプログラム `run_program`

pub mod app;
pub mod bridge;
pub mod domain;
pub mod impls;
pub mod ports;
pub mod sample;
pub mod typed;

pub use crate::app::{
    BuildError, StatusProbe, Worker, WorkerBuilder, WorkerConfig, WorkerError, WorkerStatus,
};
pub use crate::bridge::Bridge;
pub use crate::domain::{Envelope, TaskError};
pub use crate::typed::Program;
