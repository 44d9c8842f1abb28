#![no_main]

use std::time::Duration;

use arbitrary::Arbitrary;
use gatehouse_core::{LockoutPolicy, LockoutState};
use libfuzzer_sys::fuzz_target;

#[derive(Arbitrary, Debug)]
struct Input<'a> {
    attempts: Option<&'a str>,
    locked_until: Option<&'a str>,
    max_attempts: u8,
    lockout_millis: u32,
    now: u64,
}

fuzz_target!(|input: Input<'_>| {
    // Tampered storage must never panic
    let state = match LockoutState::from_persisted(
        "attempts",
        input.attempts,
        "until",
        input.locked_until,
    ) {
        Ok(state) => state,
        Err(_) => return,
    };

    let policy = match LockoutPolicy::new(
        input.max_attempts as u32,
        Duration::from_millis(input.lockout_millis as u64),
    ) {
        Ok(policy) => policy,
        Err(_) => return,
    };

    let state = policy.normalize(&state);
    if state.locked_until.is_some() {
        assert!(state.failed_attempts >= policy.max_attempts());
    }

    // Transitions at the edges of u64 time
    let failed = policy.on_failure(&state, input.now);
    let _ = policy.status(&failed, input.now);
    let expired = policy.on_expiry(&failed, input.now);
    assert_eq!(policy.on_expiry(&expired, input.now), expired);

    // Round-trip through the persisted form
    let attempts = state.attempts_value();
    let until = state.locked_until_value();
    if let Ok(reparsed) =
        LockoutState::from_persisted("attempts", Some(&attempts), "until", until.as_deref())
    {
        assert_eq!(reparsed, state);
    } else {
        panic!("persisted form failed to parse");
    }
});
