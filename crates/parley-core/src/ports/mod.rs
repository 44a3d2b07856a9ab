//! Ports - 抽象化レイヤー
//!
//! worker の外側（時刻、ID 採番、host とのメッセージ経路）へのインターフェースです。

pub mod clock;
pub mod id_generator;
pub mod transport;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::transport::{Transport, TransportError};
