// Copyright (c) 2026 Joseph Verdicchio and EvidenceOS Contributors
// SPDX-License-Identifier: Apache-2.0

#![no_main]

use libfuzzer_sys::fuzz_target;
use prefixleak_core::SignedToken;

fuzz_target!(|data: &[u8]| {
    let Ok(raw) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(token) = SignedToken::parse(raw) {
        assert_eq!(token.encode().len(), 44 + token.payload_text().len());
        let _ = token.payload();
        let _ = token.verify(&[0u8; 32]);
    }
});
