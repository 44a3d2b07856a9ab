//! Typed - 型付き export API
//!
//! # 二層構造
//! - **表層（Typed）**: `Program` trait - 名前と戻り値の型を静的に結びつける
//! - **内部（Dyn）**: `DynExport` trait - object-safe, type erasure

pub mod export;
pub mod program;
pub mod registry;

pub use self::export::{DynExport, FnExport, TypedExport};
pub use self::program::Program;
pub use self::registry::{ExportTable, RegistryError, validate_export_name};
