use std::collections::HashMap;
use std::path::Path;
use serde::{Deserialize, Serialize};
use crate::error::Result;

/// Display metadata for one base symbol.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct SymbolInfo {
    pub symbol: String,
    #[serde(default)]
    pub name_ko: Option<String>,
    #[serde(default)]
    pub name_en: Option<String>,
    #[serde(default)]
    pub icon_url: Option<String>,
}

/// Read-only symbol directory, loaded once at startup.
#[derive(Clone, Debug, Default)]
pub struct ReferenceDirectory {
    by_symbol: HashMap<String, SymbolInfo>,
}

impl ReferenceDirectory {
    pub fn empty() -> Self {
        ReferenceDirectory::default()
    }

    pub fn from_entries(entries: impl IntoIterator<Item = SymbolInfo>) -> Self {
        let by_symbol = entries
            .into_iter()
            .map(|info| (info.symbol.trim().to_ascii_uppercase(), info))
            .collect();
        ReferenceDirectory { by_symbol }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let entries: Vec<SymbolInfo> = serde_json::from_str(&raw)?;
        Ok(ReferenceDirectory::from_entries(entries))
    }

    /// Loads `path` if configured. A missing or invalid file leaves the directory empty.
    pub fn load_or_empty(path: Option<&str>) -> Self {
        let Some(path) = path else {
            return ReferenceDirectory::empty();
        };

        match ReferenceDirectory::load(path) {
            Ok(directory) => {
                tracing::info!(path, symbols = directory.len(), "Loaded symbol reference data");
                directory
            }
            Err(e) => {
                tracing::warn!(path, error = %e, "Could not load symbol reference data");
                ReferenceDirectory::empty()
            }
        }
    }

    pub fn get(&self, symbol: &str) -> Option<&SymbolInfo> {
        self.by_symbol.get(symbol)
    }

    pub fn len(&self) -> usize {
        self.by_symbol.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_symbol.is_empty()
    }
}
