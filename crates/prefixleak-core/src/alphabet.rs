// Copyright (c) 2026 Joseph Verdicchio and EvidenceOS Contributors
// SPDX-License-Identifier: Apache-2.0

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use crate::error::{PrefixLeakError, PrefixLeakResult};

const BASE64_SYMBOLS: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/=";
const HEX_SYMBOLS: &str = "0123456789abcdef";

/// Encoding the remote side applies before the prefix test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolEncoding {
    Base64,
    Hex,
    /// Symbols are returned as their UTF-8 bytes.
    Raw,
}

impl SymbolEncoding {
    pub fn decode(self, symbols: &str) -> PrefixLeakResult<Vec<u8>> {
        match self {
            Self::Base64 => STANDARD
                .decode(symbols)
                .map_err(|e| PrefixLeakError::Decode(format!("base64: {e}"))),
            Self::Hex => {
                hex::decode(symbols).map_err(|e| PrefixLeakError::Decode(format!("hex: {e}")))
            }
            Self::Raw => Ok(symbols.as_bytes().to_vec()),
        }
    }
}

/// Ordered candidate set scanned at every position.
///
/// Order only affects how many probes a position costs, never the result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alphabet {
    symbols: Vec<char>,
    encoding: SymbolEncoding,
}

impl Alphabet {
    pub fn new(symbols: &str, encoding: SymbolEncoding) -> PrefixLeakResult<Self> {
        let symbols: Vec<char> = symbols.chars().collect();
        if symbols.is_empty() {
            return Err(PrefixLeakError::InvalidArgument(
                "alphabet must be non-empty".to_string(),
            ));
        }
        for (i, c) in symbols.iter().enumerate() {
            if symbols[..i].contains(c) {
                return Err(PrefixLeakError::InvalidArgument(format!(
                    "alphabet symbol {c:?} repeated"
                )));
            }
        }
        Ok(Self { symbols, encoding })
    }

    pub fn base64() -> Self {
        Self {
            symbols: BASE64_SYMBOLS.chars().collect(),
            encoding: SymbolEncoding::Base64,
        }
    }

    pub fn hex() -> Self {
        Self {
            symbols: HEX_SYMBOLS.chars().collect(),
            encoding: SymbolEncoding::Hex,
        }
    }

    /// Accepts `base64`, `hex`, or `raw:<symbols>`.
    pub fn parse(name: &str) -> PrefixLeakResult<Self> {
        match name {
            "base64" => Ok(Self::base64()),
            "hex" => Ok(Self::hex()),
            other => match other.strip_prefix("raw:") {
                Some(symbols) => Self::new(symbols, SymbolEncoding::Raw),
                None => Err(PrefixLeakError::InvalidArgument(format!(
                    "unknown alphabet {other:?}; expected base64, hex or raw:<symbols>"
                ))),
            },
        }
    }

    pub fn symbols(&self) -> &[char] {
        &self.symbols
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn encoding(&self) -> SymbolEncoding {
        self.encoding
    }
}

impl Default for Alphabet {
    fn default() -> Self {
        Self::base64()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base64_preset_matches_transport_charset() {
        let a = Alphabet::base64();
        assert_eq!(a.len(), 65);
        assert_eq!(a.symbols()[0], 'A');
        assert_eq!(a.symbols()[64], '=');
        assert_eq!(a.encoding(), SymbolEncoding::Base64);
    }

    #[test]
    fn duplicate_symbols_rejected() {
        let err = Alphabet::new("abca", SymbolEncoding::Raw).unwrap_err();
        assert!(matches!(err, PrefixLeakError::InvalidArgument(_)));
        assert!(Alphabet::new("", SymbolEncoding::Raw).is_err());
    }

    #[test]
    fn parse_names() {
        assert_eq!(Alphabet::parse("hex").unwrap(), Alphabet::hex());
        let raw = Alphabet::parse("raw:xyz").unwrap();
        assert_eq!(raw.symbols(), &['x', 'y', 'z']);
        assert_eq!(raw.encoding(), SymbolEncoding::Raw);
        assert!(Alphabet::parse("base32").is_err());
    }

    #[test]
    fn decoding_per_encoding() {
        assert_eq!(SymbolEncoding::Hex.decode("41").unwrap(), vec![0x41]);
        assert_eq!(SymbolEncoding::Base64.decode("QUI=").unwrap(), b"AB".to_vec());
        assert_eq!(SymbolEncoding::Raw.decode("ok").unwrap(), b"ok".to_vec());
        assert!(matches!(
            SymbolEncoding::Hex.decode("4"),
            Err(PrefixLeakError::Decode(_))
        ));
    }
}
