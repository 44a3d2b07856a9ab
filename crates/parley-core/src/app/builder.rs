//! WorkerBuilder - worker の構築とワイヤリング
//!
//! # 学習ポイント
//! - Builder パターンの実装
//! - 起動時検証（Fail-fast 設計）
//! - 開発体験の改善（明確なエラーメッセージ）

use std::future::Future;
use std::sync::Arc;

use serde_json::Value;

use crate::app::config::WorkerConfig;
use crate::app::worker_loop::Worker;
use crate::bridge::Bridge;
use crate::domain::TaskError;
use crate::ports::{IdGenerator, SystemClock, UlidGenerator};
use crate::typed::{ExportTable, FnExport, Program, RegistryError, TypedExport};

/// WorkerBuilder は worker を構築
///
/// # 使用例
/// ```ignore
/// let worker = WorkerBuilder::new()
///     .export(RunProgram)?
///     .expect_exports(&["run_program"])
///     .build()?;
/// ```
///
/// # Fail-fast 設計
/// - expect_exports() で宣言された export 名（`__export__` 相当）を登録
/// - build() 時に「宣言集合 ⊆ 登録済み集合」をチェック
/// - 不足があれば BuildError を返す
pub struct WorkerBuilder {
    exports: ExportTable,
    expected: Option<Vec<String>>,
    config: WorkerConfig,
    ids: Option<Box<dyn IdGenerator>>,
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Missing exports: {0:?}. These names were declared but not registered.")]
    MissingExports(Vec<String>),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl WorkerBuilder {
    pub fn new() -> Self {
        Self {
            exports: ExportTable::new(),
            expected: None,
            config: WorkerConfig::default(),
            ids: None,
        }
    }

    /// Export a typed program under `P::NAME`.
    pub fn export<P: Program>(mut self, program: P) -> Result<Self, BuildError> {
        self.exports
            .insert(P::NAME, Arc::new(TypedExport::new(program)))?;
        Ok(self)
    }

    /// Export a closure under `name`.
    pub fn export_fn<F, Fut>(mut self, name: &str, f: F) -> Result<Self, BuildError>
    where
        F: Fn(Bridge) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, TaskError>> + Send + 'static,
    {
        self.exports.insert(name, Arc::new(FnExport::new(f)))?;
        Ok(self)
    }

    /// Declare the names the program promises to export.
    pub fn expect_exports(mut self, names: &[&str]) -> Self {
        self.expected = Some(names.iter().map(|n| n.trim().to_string()).collect());
        self
    }

    pub fn config(mut self, config: WorkerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn id_generator(mut self, ids: impl IdGenerator + 'static) -> Self {
        self.ids = Some(Box::new(ids));
        self
    }

    pub fn build(self) -> Result<Worker, BuildError> {
        if let Some(expected) = &self.expected {
            let missing: Vec<String> = expected
                .iter()
                .filter(|name| !self.exports.contains(name))
                .cloned()
                .collect();
            if !missing.is_empty() {
                return Err(BuildError::MissingExports(missing));
            }
        }
        let ids = self
            .ids
            .unwrap_or_else(|| Box::new(UlidGenerator::new(SystemClock)));
        Ok(Worker::new(self.exports, self.config, ids))
    }
}

impl Default for WorkerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
