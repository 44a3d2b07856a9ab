//! ExportTable - export 名から呼び出し対象への不変マップ
//!
//! 起動時に `WorkerBuilder` が組み立て、以降は読み取り専用です。
//! 実行時リフレクションは使わず、名前はここで一度だけ検証します。
//!
//! # 学習ポイント
//! - BTreeMap で型消去された trait object を管理（`names()` の順序が安定する）
//! - Arc による共有所有権（タスクごとに clone して spawn する）

use std::collections::BTreeMap;
use std::sync::Arc;

use super::export::DynExport;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("export '{0}' is already registered")]
    AlreadyExported(String),

    #[error("invalid export name '{0}': expected [A-Za-z_][A-Za-z0-9_]*")]
    InvalidName(String),
}

/// Trim `raw` and check it is an identifier.
pub fn validate_export_name(raw: &str) -> Result<&str, RegistryError> {
    let name = raw.trim();
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) if first == '_' || first.is_ascii_alphabetic() => {
            chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
        }
        _ => false,
    };
    if valid {
        Ok(name)
    } else {
        Err(RegistryError::InvalidName(raw.to_string()))
    }
}

#[derive(Default, Clone)]
pub struct ExportTable {
    exports: BTreeMap<String, Arc<dyn DynExport>>,
}

impl ExportTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &str, export: Arc<dyn DynExport>) -> Result<(), RegistryError> {
        let name = validate_export_name(name)?;
        if self.exports.contains_key(name) {
            return Err(RegistryError::AlreadyExported(name.to_string()));
        }
        self.exports.insert(name.to_string(), export);
        Ok(())
    }

    /// Look up an export, ignoring surrounding whitespace in `name`.
    pub fn get(&self, name: &str) -> Option<Arc<dyn DynExport>> {
        self.exports.get(name.trim()).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.exports.contains_key(name.trim())
    }

    pub fn names(&self) -> Vec<String> {
        self.exports.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.exports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exports.is_empty()
    }
}
