#![no_main]

//! Fuzz target for `Subject::parse` and the password policy.
//!
//! Run with: cargo +nightly fuzz run fuzz_credentials

use facegate_core::credentials::check_password_policy;
use facegate_core::{NewPassword, Subject};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(subject) = Subject::parse(text) {
        // A parsed subject must parse again unchanged.
        assert_eq!(Subject::parse(subject.as_str()).ok(), Some(subject));
    }
    assert_eq!(
        NewPassword::new(text).is_ok(),
        check_password_policy(text).is_ok()
    );
});
