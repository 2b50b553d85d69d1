// Copyright (c) 2026 Joseph Verdicchio and EvidenceOS Contributors
// SPDX-License-Identifier: Apache-2.0

use thiserror::Error;

pub type PrefixLeakResult<T> = Result<T, PrefixLeakError>;

#[derive(Debug, Error)]
pub enum PrefixLeakError {
    #[error("oracle unresponsive at position {position}: {reason}")]
    OracleUnresponsive { position: usize, reason: String },

    #[error("key recovery exhausted after {tried} candidate(s) for {unknown_bytes} unknown byte(s)")]
    KeyRecoveryExhausted { tried: u64, unknown_bytes: usize },

    #[error("signature mismatch: {0}")]
    SignatureMismatch(String),

    #[error("malformed token: {0}")]
    MalformedToken(String),

    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    #[error("claim not found: {0}")]
    ClaimNotFound(String),

    #[error("cannot decode leaked symbols: {0}")]
    Decode(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("config error: {0}")]
    Config(String),
}
