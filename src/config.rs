//! Loader configuration
//!
//! Values come from three places, later ones winning:
//!
//! 1. environment (`WASM_URL`, the counterpart of the page's `window.WASM_URL`)
//! 2. a JSON file passed with `--config`
//! 3. the command line

use crate::error::{LoaderError, Result};
use crate::fetch::DEFAULT_MAX_FETCH_BYTES;
use crate::memory::DEFAULT_STRING_OFFSET;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Environment variable naming the module to load at startup.
pub const WASM_URL_ENV: &str = "WASM_URL";

/// Name of the guest export driven by the REPL.
pub const DEFAULT_EVAL_EXPORT: &str = "eval";

/// How the i32 returned by the guest's eval export is turned into text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultMode {
    /// The result is a pointer to a zero-terminated string in guest memory.
    #[default]
    Pointer,
    /// The result is printed as a decimal number.
    Value,
}

impl ResultMode {
    pub fn parse(spec: &str) -> Option<Self> {
        match spec.to_ascii_lowercase().as_str() {
            "pointer" | "ptr" | "string" => Some(Self::Pointer),
            "value" | "int" | "i32" => Some(Self::Value),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoaderConfig {
    /// Module to load at startup; `None` skips the automatic load.
    pub wasm_url: Option<String>,
    /// Offset used when writing REPL input into guest memory.
    pub string_offset: u32,
    pub result_mode: ResultMode,
    pub eval_export: String,
    pub max_fetch_bytes: u64,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            wasm_url: None,
            string_offset: DEFAULT_STRING_OFFSET,
            result_mode: ResultMode::Pointer,
            eval_export: DEFAULT_EVAL_EXPORT.to_string(),
            max_fetch_bytes: DEFAULT_MAX_FETCH_BYTES,
        }
    }
}

impl LoaderConfig {
    /// Defaults with `wasm_url` taken from `WASM_URL` when set and non-empty.
    pub fn from_env() -> Self {
        let url = std::env::var(WASM_URL_ENV).ok();
        Self::default().with_env_url(url.as_deref())
    }

    fn with_env_url(mut self, url: Option<&str>) -> Self {
        if let Some(url) = url.map(str::trim).filter(|u| !u.is_empty()) {
            self.wasm_url = Some(url.to_string());
        }
        self
    }

    /// Parse a JSON config document. Missing keys keep their defaults.
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text).map_err(|e| LoaderError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a JSON config file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| LoaderError::io(path.display().to_string(), e))?;
        Self::from_json(&text)
    }

    /// Layer `file` over `self`; the file's URL only wins when it sets one.
    pub fn merged_with(self, file: LoaderConfig) -> Self {
        Self {
            wasm_url: file.wasm_url.or(self.wasm_url),
            ..file
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.eval_export.is_empty() {
            return Err(LoaderError::Config("eval_export must not be empty".to_string()));
        }
        if self.max_fetch_bytes == 0 {
            return Err(LoaderError::Config("max_fetch_bytes must be positive".to_string()));
        }
        Ok(())
    }
}
