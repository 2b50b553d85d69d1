// Copyright (c) 2026 Joseph Verdicchio and EvidenceOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Length-tagged session payloads.
//!
//! Field names are `<u64 LE length><name bytes>`. Claim values are
//! `<u64 LE length><JSON string literal>`, so a 16-character name carries the
//! tag `0x12` followed by seven zero bytes.

use crate::error::{PrefixLeakError, PrefixLeakResult};

const TAG_LEN: usize = 8;

pub fn encode_field_name(name: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(TAG_LEN + name.len());
    out.extend_from_slice(&(name.len() as u64).to_le_bytes());
    out.extend_from_slice(name.as_bytes());
    out
}

pub fn encode_claim(literal: &str) -> PrefixLeakResult<Vec<u8>> {
    let quoted = serde_json::to_string(literal)
        .map_err(|e| PrefixLeakError::InvalidArgument(format!("claim literal: {e}")))?;
    let mut out = Vec::with_capacity(TAG_LEN + quoted.len());
    out.extend_from_slice(&(quoted.len() as u64).to_le_bytes());
    out.extend_from_slice(quoted.as_bytes());
    Ok(out)
}

/// Reads the claim stored right after the field named `field`.
pub fn read_claim(payload: &[u8], field: &str) -> PrefixLeakResult<String> {
    let needle = encode_field_name(field);
    let mut from = 0;
    let mut overrun = None;
    while let Some(offset) = find(&payload[from..], &needle) {
        let value_at = from + offset + needle.len();
        match claim_at(payload, value_at) {
            Ok(Some(claim)) => return Ok(claim),
            Ok(None) => {}
            Err(err) => {
                overrun.get_or_insert(err);
            }
        }
        from += offset + 1;
    }
    // Only report a bad length when no later match held a claim.
    Err(overrun.unwrap_or_else(|| PrefixLeakError::ClaimNotFound(format!("field {field:?}"))))
}

/// Replaces every occurrence of the encoded `current` claim with `target`,
/// rewriting the length tag.
pub fn rewrite_claim(payload: &[u8], current: &str, target: &str) -> PrefixLeakResult<Vec<u8>> {
    let old = encode_claim(current)?;
    let new = encode_claim(target)?;

    let mut out = Vec::with_capacity(payload.len() + new.len());
    let mut rest = payload;
    let mut replaced = 0usize;
    while let Some(offset) = find(rest, &old) {
        out.extend_from_slice(&rest[..offset]);
        out.extend_from_slice(&new);
        rest = &rest[offset + old.len()..];
        replaced += 1;
    }
    if replaced == 0 {
        return Err(PrefixLeakError::ClaimNotFound(format!("claim {current:?}")));
    }
    out.extend_from_slice(rest);
    tracing::debug!(replaced, current, target, "claim rewritten");
    Ok(out)
}

fn claim_at(payload: &[u8], at: usize) -> PrefixLeakResult<Option<String>> {
    let Some(tag) = payload.get(at..at + TAG_LEN) else {
        return Ok(None);
    };
    let mut len_bytes = [0u8; TAG_LEN];
    len_bytes.copy_from_slice(tag);
    let len = u64::from_le_bytes(len_bytes);
    let start = at + TAG_LEN;
    let end = usize::try_from(len)
        .ok()
        .and_then(|len| start.checked_add(len))
        .filter(|end| *end <= payload.len())
        .ok_or_else(|| {
            PrefixLeakError::MalformedPayload(format!(
                "claim length {len} at offset {at} overruns payload of {} bytes",
                payload.len()
            ))
        })?;
    match serde_json::from_slice::<String>(&payload[start..end]) {
        Ok(claim) => Ok(Some(claim)),
        Err(_) => Ok(None),
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(user: &str) -> Vec<u8> {
        let mut p = Vec::new();
        p.extend_from_slice(&1u64.to_le_bytes());
        p.extend_from_slice(&encode_field_name("username"));
        p.extend_from_slice(&encode_claim(user).unwrap());
        p.extend_from_slice(b"\x00trailer");
        p
    }

    #[test]
    fn claim_tag_is_quoted_length() {
        let encoded = encode_claim("0123456789abcdef").unwrap();
        assert_eq!(encoded[0], 0x12);
        assert_eq!(&encoded[1..8], &[0u8; 7]);
        assert_eq!(&encoded[8..], b"\"0123456789abcdef\"");

        let admin = encode_claim("admin").unwrap();
        assert_eq!(admin[0], 0x07);
        assert_eq!(&admin[8..], b"\"admin\"");
    }

    #[test]
    fn rewrite_changes_length_tag_and_preserves_rest() {
        let payload = session("0123456789abcdef");
        let rewritten = rewrite_claim(&payload, "0123456789abcdef", "admin").unwrap();

        assert_eq!(rewritten.len(), payload.len() - 11);
        assert_eq!(read_claim(&rewritten, "username").unwrap(), "admin");
        assert!(rewritten.ends_with(b"\x00trailer"));
        assert_eq!(&rewritten[..8], &payload[..8]);
    }

    #[test]
    fn rewrite_requires_existing_claim() {
        let payload = session("bob");
        assert!(matches!(
            rewrite_claim(&payload, "alice", "admin"),
            Err(PrefixLeakError::ClaimNotFound(_))
        ));
    }

    #[test]
    fn read_missing_field() {
        assert!(matches!(
            read_claim(&session("bob"), "role"),
            Err(PrefixLeakError::ClaimNotFound(_))
        ));
    }

    #[test]
    fn overrunning_match_does_not_hide_later_claim() {
        let mut payload = encode_field_name("username");
        payload.extend_from_slice(&u64::MAX.to_le_bytes());
        payload.extend_from_slice(&session("carol"));
        assert_eq!(read_claim(&payload, "username").unwrap(), "carol");
    }

    #[test]
    fn read_rejects_overrunning_length() {
        let mut payload = encode_field_name("username");
        payload.extend_from_slice(&u64::MAX.to_le_bytes());
        payload.extend_from_slice(b"\"x\"");
        assert!(matches!(
            read_claim(&payload, "username"),
            Err(PrefixLeakError::MalformedPayload(_))
        ));
    }
}
