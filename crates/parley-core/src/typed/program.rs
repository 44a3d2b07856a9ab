//! Program trait - 型付き export の定義
//!
//! # 学習ポイント
//! - Associated Constants (`const NAME`)
//! - Associated Types (`type Output`) で戻り値を JSON にできる型に限定

use async_trait::async_trait;
use serde::Serialize;

use crate::bridge::Bridge;
use crate::domain::TaskError;

/// Program は export 名と実装を対応付ける
///
/// # 使用例
/// ```ignore
/// struct Greet;
///
/// #[async_trait]
/// impl Program for Greet {
///     const NAME: &'static str = "greet";
///     type Output = String;
///
///     async fn run(&self, bridge: Bridge) -> Result<String, TaskError> {
///         let name = bridge.request_input("Name? ").await?;
///         Ok(format!("hi {name}"))
///     }
/// }
/// ```
///
/// # Trait Bounds
/// - `Send + Sync + 'static`: `Arc<dyn DynExport>` に格納してタスク間で共有するため
/// - `Output: Serialize`: `result` envelope の payload にするため
#[async_trait]
pub trait Program: Send + Sync + 'static {
    /// export 名。`[A-Za-z_][A-Za-z0-9_]*` に従うこと。
    const NAME: &'static str;

    type Output: Serialize + Send;

    async fn run(&self, bridge: Bridge) -> Result<Self::Output, TaskError>;
}
