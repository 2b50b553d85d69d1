// Copyright (c) 2026 Joseph Verdicchio and EvidenceOS Contributors
// SPDX-License-Identifier: Apache-2.0

use crate::alphabet::{Alphabet, SymbolEncoding};
use crate::config::ExtractionConfig;
use crate::error::{PrefixLeakError, PrefixLeakResult};
use crate::oracle::PrefixOracle;

/// Symbols confirmed so far. Only the extractor can append; nothing removes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LeakedSecret {
    symbols: String,
}

impl LeakedSecret {
    pub fn as_str(&self) -> &str {
        &self.symbols
    }

    /// Number of symbols, not bytes.
    pub fn len(&self) -> usize {
        self.symbols.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    fn with_candidate(&self, candidate: char) -> String {
        let mut prefix = String::with_capacity(self.symbols.len() + candidate.len_utf8());
        prefix.push_str(&self.symbols);
        prefix.push(candidate);
        prefix
    }

    fn append(&mut self, symbol: char) {
        self.symbols.push(symbol);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// No candidate matched at `position`; the secret has exactly that many symbols.
    AlphabetExhausted { position: usize },
    /// Stopped at the configured bound; the secret may continue.
    MaxLengthReached,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub leaked: LeakedSecret,
    pub probes: u64,
    pub termination: Termination,
    encoding: SymbolEncoding,
}

impl Extraction {
    pub fn decode(&self) -> PrefixLeakResult<Vec<u8>> {
        self.encoding.decode(self.leaked.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct PrefixExtractor {
    alphabet: Alphabet,
    max_length: usize,
}

impl PrefixExtractor {
    pub fn new(alphabet: Alphabet, max_length: usize) -> Self {
        Self {
            alphabet,
            max_length,
        }
    }

    pub fn from_config(config: &ExtractionConfig) -> PrefixLeakResult<Self> {
        if config.max_length == 0 {
            return Err(PrefixLeakError::Config(
                "max_length must be > 0".to_string(),
            ));
        }
        Ok(Self::new(config.alphabet()?, config.max_length))
    }

    pub fn alphabet(&self) -> &Alphabet {
        &self.alphabet
    }

    /// Upper bound on oracle calls for one extraction.
    pub fn max_probes(&self) -> u64 {
        (self.max_length as u64).saturating_mul(self.alphabet.len() as u64)
    }

    /// Exhaustive scan per position, first hit wins, no backtracking.
    pub async fn extract<O: PrefixOracle>(
        &self,
        oracle: &mut O,
        expression: &str,
    ) -> PrefixLeakResult<Extraction> {
        let mut leaked = LeakedSecret::default();
        let mut probes = 0u64;

        for position in 0..self.max_length {
            let mut found = None;
            for &candidate in self.alphabet.symbols() {
                let prefix = leaked.with_candidate(candidate);
                probes += 1;
                let hit = oracle.probe(expression, &prefix).await.map_err(|e| {
                    PrefixLeakError::OracleUnresponsive {
                        position,
                        reason: e.to_string(),
                    }
                })?;
                if hit {
                    found = Some(candidate);
                    break;
                }
            }

            let Some(symbol) = found else {
                tracing::info!(position, probes, "alphabet exhausted; extraction finished");
                return Ok(Extraction {
                    leaked,
                    probes,
                    termination: Termination::AlphabetExhausted { position },
                    encoding: self.alphabet.encoding(),
                });
            };
            leaked.append(symbol);
            tracing::info!(found = %leaked.as_str(), "recovered symbol");
        }

        tracing::warn!(
            max_length = self.max_length,
            probes,
            "max_length reached; secret may be longer"
        );
        Ok(Extraction {
            leaked,
            probes,
            termination: Termination::MaxLengthReached,
            encoding: self.alphabet.encoding(),
        })
    }
}
