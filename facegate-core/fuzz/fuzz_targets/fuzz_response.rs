#![no_main]

//! Fuzz target for verification service replies.
//!
//! Arbitrary bytes are parsed as a reply body and, when they parse,
//! classified into an outcome. Neither step may panic.
//!
//! Run with: cargo +nightly fuzz run fuzz_response

use facegate_core::{VerificationOutcome, VerificationResponse};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(response) = serde_json::from_slice::<VerificationResponse>(data) {
        let matched = response.success && response.matched;
        let outcome = VerificationOutcome::from_response(response);
        assert_eq!(outcome.is_success(), matched);
    }
});
