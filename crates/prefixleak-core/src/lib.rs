// Copyright (c) 2026 Joseph Verdicchio and EvidenceOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! prefixleak-core
//!
//! Recovery pipeline for secrets that are only observable through a boolean
//! remote oracle:
//! - Oracle probe client: one predicate, one round trip, one boolean
//! - Prefix extraction: append-only, first-match-wins symbol scan
//! - Key completion: zero-byte repair plus bounded suffix search, checked
//!   against a captured HMAC-SHA256 signed token
//! - Token forgery: length-tagged claim rewrite and re-signing

#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

pub mod alphabet;
pub mod config;
pub mod error;
pub mod extract;
pub mod forge;
pub mod keyfill;
pub mod oracle;
pub mod payload;
pub mod pipeline;
pub mod token;

pub use crate::alphabet::{Alphabet, SymbolEncoding};
pub use crate::error::{PrefixLeakError, PrefixLeakResult};
pub use crate::extract::{Extraction, LeakedSecret, PrefixExtractor, Termination};
pub use crate::forge::{ClaimLocator, ClaimRewrite, TokenForger};
pub use crate::keyfill::{KeyCompletion, RecoveredKey};
pub use crate::oracle::{
    HttpTransport, OracleClient, PredicateTemplate, PredicateTransport, PrefixOracle, TransportError,
};
pub use crate::pipeline::{PipelineReport, Stage, StageError};
pub use crate::token::SignedToken;
