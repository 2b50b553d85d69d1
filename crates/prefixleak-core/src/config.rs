// Copyright (c) 2026 Joseph Verdicchio and EvidenceOS Contributors
// SPDX-License-Identifier: Apache-2.0

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::alphabet::Alphabet;
use crate::error::{PrefixLeakError, PrefixLeakResult};
use crate::oracle::{PredicateTemplate, DEFAULT_MARKER, DEFAULT_PREDICATE_TEMPLATE};

pub const DEFAULT_KEY_LEN: usize = 32;
pub const DEFAULT_MAX_LENGTH: usize = 1000;
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_EXPRESSION: &str = "file('/app/.secretkey')";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// `base64`, `hex` or `raw:<symbols>`.
    pub alphabet: String,
    pub max_length: usize,
    pub expression: String,
    pub marker: String,
    pub predicate_template: String,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            alphabet: "base64".to_string(),
            max_length: DEFAULT_MAX_LENGTH,
            expression: DEFAULT_EXPRESSION.to_string(),
            marker: DEFAULT_MARKER.to_string(),
            predicate_template: DEFAULT_PREDICATE_TEMPLATE.to_string(),
        }
    }
}

impl ExtractionConfig {
    pub fn alphabet(&self) -> PrefixLeakResult<Alphabet> {
        Alphabet::parse(&self.alphabet)
    }

    pub fn template(&self) -> PrefixLeakResult<PredicateTemplate> {
        PredicateTemplate::new(self.predicate_template.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyFillConfig {
    pub key_len: usize,
}

impl Default for KeyFillConfig {
    fn default() -> Self {
        Self {
            key_len: DEFAULT_KEY_LEN,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleEndpoints {
    pub plant_url: String,
    pub observe_url: String,
    pub timeout_ms: u64,
}

impl Default for OracleEndpoints {
    fn default() -> Self {
        Self {
            plant_url: String::new(),
            observe_url: String::new(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub extraction: ExtractionConfig,
    pub keyfill: KeyFillConfig,
    pub endpoints: OracleEndpoints,
}

impl PipelineConfig {
    /// Reads a JSON config file; missing fields keep their defaults.
    pub fn load(path: impl AsRef<Path>) -> PrefixLeakResult<Self> {
        let path = path.as_ref();
        let payload = fs::read(path)
            .map_err(|e| PrefixLeakError::Config(format!("read {}: {e}", path.display())))?;
        serde_json::from_slice(&payload)
            .map_err(|e| PrefixLeakError::Config(format!("parse {}: {e}", path.display())))
    }

    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        cfg.apply_env(|name| std::env::var(name).ok());
        cfg
    }

    /// Overrides fields from `PREFIXLEAK_*` variables. Empty, zero or
    /// unparsable numeric values are ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let read_string = |name: &str| lookup(name).filter(|v| !v.is_empty());
        let read_usize = |name: &str| {
            lookup(name)
                .and_then(|v| v.parse::<usize>().ok())
                .filter(|v| *v > 0)
        };

        if let Some(v) = read_string("PREFIXLEAK_ALPHABET") {
            self.extraction.alphabet = v;
        }
        if let Some(v) = read_usize("PREFIXLEAK_MAX_LENGTH") {
            self.extraction.max_length = v;
        }
        if let Some(v) = read_string("PREFIXLEAK_EXPRESSION") {
            self.extraction.expression = v;
        }
        if let Some(v) = read_string("PREFIXLEAK_MARKER") {
            self.extraction.marker = v;
        }
        if let Some(v) = read_usize("PREFIXLEAK_KEY_LEN") {
            self.keyfill.key_len = v;
        }
        if let Some(v) = read_string("PREFIXLEAK_PLANT_URL") {
            self.endpoints.plant_url = v;
        }
        if let Some(v) = read_string("PREFIXLEAK_OBSERVE_URL") {
            self.endpoints.observe_url = v;
        }
        if let Some(v) = read_usize("PREFIXLEAK_TIMEOUT_MS") {
            self.endpoints.timeout_ms = v as u64;
        }
    }
}
