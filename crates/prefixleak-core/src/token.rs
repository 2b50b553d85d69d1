// Copyright (c) 2026 Joseph Verdicchio and EvidenceOS Contributors
// SPDX-License-Identifier: Apache-2.0

use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use percent_encoding::percent_decode_str;
use sha2::Sha256;

use crate::error::{PrefixLeakError, PrefixLeakResult};

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_LEN: usize = 32;
/// base64 of a 32-byte MAC, padding included.
pub const ENCODED_SIGNATURE_LEN: usize = 44;

/// `base64(HMAC-SHA256(key, payload_text)) ++ payload_text`, where
/// `payload_text` is the base64 of the payload bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedToken {
    signature: [u8; SIGNATURE_LEN],
    payload_text: String,
}

impl SignedToken {
    /// Parses a captured token. Cookie-style percent-encoding is undone first.
    pub fn parse(raw: &str) -> PrefixLeakResult<Self> {
        let decoded = percent_decode_str(raw.trim())
            .decode_utf8()
            .map_err(|e| PrefixLeakError::MalformedToken(format!("percent-decoding: {e}")))?;
        if decoded.len() <= ENCODED_SIGNATURE_LEN || !decoded.is_char_boundary(ENCODED_SIGNATURE_LEN)
        {
            return Err(PrefixLeakError::MalformedToken(format!(
                "expected more than {ENCODED_SIGNATURE_LEN} characters, got {}",
                decoded.len()
            )));
        }
        let (sig_text, payload_text) = decoded.split_at(ENCODED_SIGNATURE_LEN);
        let sig = STANDARD
            .decode(sig_text)
            .map_err(|e| PrefixLeakError::MalformedToken(format!("signature: {e}")))?;
        let signature: [u8; SIGNATURE_LEN] = sig.try_into().map_err(|v: Vec<u8>| {
            PrefixLeakError::MalformedToken(format!("signature is {} bytes", v.len()))
        })?;
        Ok(Self {
            signature,
            payload_text: payload_text.to_string(),
        })
    }

    /// Encodes `payload` and signs the encoded text under `key`.
    pub fn issue(key: &[u8], payload: &[u8]) -> PrefixLeakResult<Self> {
        let payload_text = STANDARD.encode(payload);
        let signature = sign(key, payload_text.as_bytes())?;
        Ok(Self {
            signature,
            payload_text,
        })
    }

    pub fn signature(&self) -> &[u8; SIGNATURE_LEN] {
        &self.signature
    }

    /// The exact bytes the MAC covers.
    pub fn payload_text(&self) -> &str {
        &self.payload_text
    }

    pub fn payload(&self) -> PrefixLeakResult<Vec<u8>> {
        STANDARD
            .decode(&self.payload_text)
            .map_err(|e| PrefixLeakError::MalformedPayload(format!("base64: {e}")))
    }

    /// Constant-time check of the stored signature under `key`.
    pub fn verify(&self, key: &[u8]) -> bool {
        let Ok(mut mac) = HmacSha256::new_from_slice(key) else {
            return false;
        };
        mac.update(self.payload_text.as_bytes());
        mac.verify_slice(&self.signature).is_ok()
    }

    pub fn encode(&self) -> String {
        let mut out = STANDARD.encode(self.signature);
        out.push_str(&self.payload_text);
        out
    }
}

impl fmt::Display for SignedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

pub fn sign(key: &[u8], message: &[u8]) -> PrefixLeakResult<[u8; SIGNATURE_LEN]> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| PrefixLeakError::InvalidArgument(format!("hmac key: {e}")))?;
    mac.update(message);
    Ok(mac.finalize().into_bytes().into())
}
