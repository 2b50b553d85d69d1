// Copyright (c) 2026 Joseph Verdicchio and EvidenceOS Contributors
// SPDX-License-Identifier: Apache-2.0

#![no_main]

use libfuzzer_sys::fuzz_target;
use prefixleak_core::payload::{encode_claim, read_claim, rewrite_claim};

fuzz_target!(|data: &[u8]| {
    if let Ok(current) = read_claim(data, "username") {
        let _ = rewrite_claim(data, &current, "admin");
    }
    if let Ok(rewritten) = rewrite_claim(data, "guest", "admin") {
        let new = encode_claim("admin").unwrap_or_default();
        assert!(rewritten.windows(new.len()).any(|w| w == new.as_slice()));
    }
});
