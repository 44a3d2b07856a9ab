//! DynExport - 型消去された export
//!
//! # 学習ポイント
//! - Object-safe trait (DynExport)
//! - Type erasure パターン (TypedExport<P> / FnExport<F> → DynExport)

use std::future::Future;

use async_trait::async_trait;
use serde_json::Value;

use super::program::Program;
use crate::bridge::Bridge;
use crate::domain::TaskError;

/// DynExport は object-safe な export の抽象化
///
/// `BTreeMap<String, Arc<dyn DynExport>>` に格納できるよう、
/// 戻り値は JSON の `Value` に揃えます。
#[async_trait]
pub trait DynExport: Send + Sync {
    async fn call(&self, bridge: Bridge) -> Result<Value, TaskError>;
}

pub struct TypedExport<P: Program> {
    program: P,
}

impl<P: Program> TypedExport<P> {
    pub fn new(program: P) -> Self {
        Self { program }
    }
}

#[async_trait]
impl<P: Program> DynExport for TypedExport<P> {
    async fn call(&self, bridge: Bridge) -> Result<Value, TaskError> {
        let output = self.program.run(bridge).await?;
        serde_json::to_value(output).map_err(|e| TaskError::Encode(e.to_string()))
    }
}

/// Closure-backed export, for programs that do not warrant their own type.
pub struct FnExport<F> {
    f: F,
}

impl<F> FnExport<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F, Fut> DynExport for FnExport<F>
where
    F: Fn(Bridge) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, TaskError>> + Send,
{
    async fn call(&self, bridge: Bridge) -> Result<Value, TaskError> {
        (self.f)(bridge).await
    }
}
