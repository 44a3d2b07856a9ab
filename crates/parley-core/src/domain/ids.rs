//! Domain identifiers (strongly-typed IDs).
//!
//! # 2 種類の ID
//! - **TaskId**: worker 内部のタスク識別子。ULID ベースで、`IdGenerator` が生成する。
//! - **CorrelationId / InvocationId**: ワイヤ上に載る整数 ID。
//!   CorrelationId は worker が 1 から単調増加で採番し、InvocationId は host が決める。
//!
//! ## Phantom Type パターン
//! `Id<T>` は `T` をマーカーとしてだけ使い（PhantomData）、
//! 別種の ULID ID を型レベルで区別します。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use ulid::Ulid;

/// IdMarker は各 ID 型のマーカー trait
///
/// Display で使うプレフィックス（"task-" など）を提供します。
pub trait IdMarker: Send + Sync + 'static {
    fn prefix() -> &'static str;
}

/// ジェネリック ULID ID 型
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Id<T: IdMarker> {
    ulid: Ulid,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T: IdMarker> Id<T> {
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self {
            ulid,
            _marker: PhantomData,
        }
    }

    pub fn as_ulid(&self) -> Ulid {
        self.ulid
    }
}

impl<T: IdMarker> From<Ulid> for Id<T> {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl<T: IdMarker> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", T::prefix(), self.ulid)
    }
}

/// Task のマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Task {}

impl IdMarker for Task {
    fn prefix() -> &'static str {
        "task-"
    }
}

/// Identifier of one in-flight execution of an exported function.
pub type TaskId = Id<Task>;

/// Pairs a `request` envelope with its `reply`.
///
/// Assigned by the correlation table, starting at 1 and strictly increasing for
/// the lifetime of one worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(u64);

impl CorrelationId {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "corr-{}", self.0)
    }
}

/// Host-chosen identifier of one `invoke`, echoed on its `result` / `error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InvocationId(u64);

impl InvocationId {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for InvocationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "inv-{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_id_display_has_prefix() {
        let ulid = Ulid::new();
        let task = TaskId::from_ulid(ulid);

        assert_eq!(task.as_ulid(), ulid);
        assert!(task.to_string().starts_with("task-"));
    }

    #[test]
    fn wire_ids_serialize_as_plain_numbers() {
        assert_eq!(serde_json::to_string(&CorrelationId::new(7)).unwrap(), "7");
        assert_eq!(serde_json::to_string(&InvocationId::new(3)).unwrap(), "3");

        let back: CorrelationId = serde_json::from_str("42").unwrap();
        assert_eq!(back.get(), 42);
    }

    #[test]
    fn wire_ids_display_with_prefix() {
        assert_eq!(CorrelationId::new(1).to_string(), "corr-1");
        assert_eq!(InvocationId::new(9).to_string(), "inv-9");
    }

    #[test]
    fn correlation_ids_order_numerically() {
        assert!(CorrelationId::new(2) < CorrelationId::new(10));
    }

    #[test]
    fn phantom_data_does_not_consume_memory() {
        use std::mem::size_of;

        assert_eq!(size_of::<TaskId>(), size_of::<Ulid>());
    }
}
