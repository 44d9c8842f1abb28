//! End-to-end lockout tests for the admin login gate
//!
//! These tests run the gate against a file-backed lockout record, a manual
//! clock and an in-process identity provider.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use gatehouse::{
    AuthorizationGate, FailureCause, FileKeyValueStore, GateResult, LockoutPolicy,
    LockoutState, LockoutStatus, ManualClock, PersistedLockoutStore, PrivilegedIdentity,
};
use gatehouse_tests::FakeIdentityProvider;
use tempfile::tempdir;

const T0: u64 = 1_700_000_000_000;
const LOCKOUT_MS: u64 = 900_000;
const ADMIN: &str = "owner@shop.test";
const ADMIN_PW: &str = "correct horse";
const CLERK: &str = "clerk@shop.test";
const CLERK_PW: &str = "clerk pw";

struct Device {
    gate: AuthorizationGate,
    provider: Arc<FakeIdentityProvider>,
    clock: Arc<ManualClock>,
    store: PersistedLockoutStore,
}

fn provider() -> Arc<FakeIdentityProvider> {
    Arc::new(
        FakeIdentityProvider::new()
            .with_account(ADMIN, ADMIN_PW)
            .with_account(CLERK, CLERK_PW),
    )
}

/// Open the gate on a device whose lockout record lives at `path`
fn open_device(
    path: &Path,
    provider: Arc<FakeIdentityProvider>,
    clock: Arc<ManualClock>,
) -> Device {
    let backend = Arc::new(FileKeyValueStore::new(path.to_path_buf()).unwrap());
    let store = PersistedLockoutStore::new(backend);
    let policy = LockoutPolicy::new(5, Duration::from_millis(LOCKOUT_MS)).unwrap();

    let gate = AuthorizationGate::new(
        policy,
        PrivilegedIdentity::new(ADMIN).unwrap(),
        store.clone(),
        provider.clone(),
        clock.clone(),
    )
    .unwrap()
    .with_poll_interval(Duration::from_millis(10));

    Device {
        gate,
        provider,
        clock,
        store,
    }
}

fn new_device(path: &Path) -> Device {
    open_device(path, provider(), Arc::new(ManualClock::new(T0)))
}

/// Scenario A: four failures are rejected, the fifth locks
#[tokio::test]
async fn test_threshold_reached_on_fifth_failure() {
    let dir = tempdir().unwrap();
    let device = new_device(&dir.path().join("lockout.json"));

    for expected_remaining in [4, 3, 2, 1] {
        let result = device.gate.attempt_login(ADMIN, "nope").await.unwrap();
        assert_eq!(
            result,
            GateResult::Rejected {
                attempts_remaining: expected_remaining,
                cause: FailureCause::InvalidCredentials
            }
        );
        device.clock.advance(1_000);
    }

    let result = device.gate.attempt_login(ADMIN, "nope").await.unwrap();
    assert_eq!(
        result,
        GateResult::Locked {
            remaining: Duration::from_millis(LOCKOUT_MS)
        }
    );

    let state = device.store.load().unwrap();
    assert_eq!(state.failed_attempts, 5);
    assert_eq!(state.locked_until, Some(T0 + 4_000 + LOCKOUT_MS));
}

/// Scenario B: while locked, even the right credential is refused locally
#[tokio::test]
async fn test_locked_gate_never_contacts_provider() {
    let dir = tempdir().unwrap();
    let device = new_device(&dir.path().join("lockout.json"));

    for _ in 0..5 {
        device.gate.attempt_login(ADMIN, "nope").await.unwrap();
    }
    let calls_before = device.provider.authenticate_calls();

    device.clock.advance(60_000);
    let result = device.gate.attempt_login(ADMIN, ADMIN_PW).await.unwrap();

    assert_eq!(
        result,
        GateResult::Locked {
            remaining: Duration::from_millis(LOCKOUT_MS - 60_000)
        }
    );
    assert_eq!(device.provider.authenticate_calls(), calls_before);
}

/// Scenario C: a valid non-privileged account is signed out and not counted
#[tokio::test]
async fn test_non_privileged_identity_is_forbidden() {
    let dir = tempdir().unwrap();
    let device = new_device(&dir.path().join("lockout.json"));

    device.gate.attempt_login(ADMIN, "nope").await.unwrap();
    device.gate.attempt_login(ADMIN, "nope").await.unwrap();
    let before = device.store.load().unwrap();

    let result = device.gate.attempt_login(CLERK, CLERK_PW).await.unwrap();

    assert_eq!(result, GateResult::Forbidden);
    assert_eq!(device.provider.revoked(), vec![CLERK.to_string()]);
    assert_eq!(device.store.load().unwrap(), before);
    assert_eq!(before.failed_attempts, 2);
}

/// Scenario D: the privileged identity clears prior failures
#[tokio::test]
async fn test_privileged_login_resets_counter() {
    let dir = tempdir().unwrap();
    let device = new_device(&dir.path().join("lockout.json"));

    for _ in 0..3 {
        device.gate.attempt_login(ADMIN, "nope").await.unwrap();
    }

    // Mixed case is how the form may submit it
    let result = device
        .gate
        .attempt_login("Owner@Shop.Test", ADMIN_PW)
        .await
        .unwrap();

    let session = result.session().expect("admin session");
    assert_eq!(session.identity, ADMIN);
    assert_eq!(device.store.load().unwrap(), LockoutState::ZERO);
    assert!(device.provider.revoked().is_empty());
}

/// Scenario E: one millisecond past the window the provider is consulted again
#[tokio::test]
async fn test_lockout_elapses_lazily() {
    let dir = tempdir().unwrap();
    let device = new_device(&dir.path().join("lockout.json"));

    for _ in 0..5 {
        device.gate.attempt_login(ADMIN, "nope").await.unwrap();
    }
    let calls_before = device.provider.authenticate_calls();

    device.clock.set(T0 + LOCKOUT_MS + 1);
    let result = device.gate.attempt_login(ADMIN, ADMIN_PW).await.unwrap();

    assert!(result.is_authorized());
    assert_eq!(device.provider.authenticate_calls(), calls_before + 1);
}

#[tokio::test]
async fn test_lockout_boundary_is_exclusive() {
    let dir = tempdir().unwrap();
    let device = new_device(&dir.path().join("lockout.json"));

    for _ in 0..5 {
        device.gate.attempt_login(ADMIN, "nope").await.unwrap();
    }

    device.clock.set(T0 + LOCKOUT_MS - 1);
    assert!(matches!(
        device.gate.attempt_login(ADMIN, ADMIN_PW).await.unwrap(),
        GateResult::Locked { .. }
    ));

    device.clock.set(T0 + LOCKOUT_MS);
    assert!(device
        .gate
        .attempt_login(ADMIN, ADMIN_PW)
        .await
        .unwrap()
        .is_authorized());
}

#[tokio::test]
async fn test_lockout_survives_restart() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("lockout.json");
    let clock = Arc::new(ManualClock::new(T0));

    {
        let device = open_device(&path, provider(), clock.clone());
        for _ in 0..5 {
            device.gate.attempt_login(ADMIN, "nope").await.unwrap();
        }
    }

    // New process, same device
    clock.advance(10_000);
    let device = open_device(&path, provider(), clock.clone());
    let result = device.gate.attempt_login(ADMIN, ADMIN_PW).await.unwrap();

    assert_eq!(
        result,
        GateResult::Locked {
            remaining: Duration::from_millis(LOCKOUT_MS - 10_000)
        }
    );
    assert_eq!(device.provider.authenticate_calls(), 0);
}

#[tokio::test]
async fn test_counter_survives_restart() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("lockout.json");
    let clock = Arc::new(ManualClock::new(T0));

    {
        let device = open_device(&path, provider(), clock.clone());
        for _ in 0..3 {
            device.gate.attempt_login(ADMIN, "nope").await.unwrap();
        }
    }

    let device = open_device(&path, provider(), clock);
    assert_eq!(
        device.gate.status().unwrap(),
        LockoutStatus::Open {
            failed_attempts: 3,
            attempts_remaining: 2
        }
    );
}

#[tokio::test]
async fn test_provider_outage_counts_toward_lockout() {
    let dir = tempdir().unwrap();
    let device = new_device(&dir.path().join("lockout.json"));
    device.provider.set_offline(true);

    for _ in 0..4 {
        let result = device.gate.attempt_login(ADMIN, ADMIN_PW).await.unwrap();
        assert!(matches!(
            result,
            GateResult::Rejected {
                cause: FailureCause::Transport,
                ..
            }
        ));
    }
    assert!(matches!(
        device.gate.attempt_login(ADMIN, ADMIN_PW).await.unwrap(),
        GateResult::Locked { .. }
    ));
}

#[tokio::test]
async fn test_timer_converges_without_new_attempt() {
    let dir = tempdir().unwrap();
    let device = new_device(&dir.path().join("lockout.json"));

    for _ in 0..5 {
        device.gate.attempt_login(ADMIN, "nope").await.unwrap();
    }

    let mut handle = device.gate.lockout_timer().spawn();
    assert!(handle.status.borrow().is_locked());

    device.clock.advance(LOCKOUT_MS);
    tokio::time::timeout(Duration::from_secs(5), &mut handle.task)
        .await
        .expect("timer should stop once the lockout has elapsed")
        .unwrap()
        .unwrap();

    assert_eq!(
        *handle.status.borrow(),
        LockoutStatus::Open {
            failed_attempts: 0,
            attempts_remaining: 5
        }
    );
    assert_eq!(device.store.load().unwrap(), LockoutState::ZERO);
    assert!(!dir.path().join("lockout.json.tmp").exists());
}

#[tokio::test]
async fn test_full_cycle_locks_again_after_expiry() {
    let dir = tempdir().unwrap();
    let device = new_device(&dir.path().join("lockout.json"));

    for _ in 0..5 {
        device.gate.attempt_login(ADMIN, "nope").await.unwrap();
    }
    device.clock.advance(LOCKOUT_MS);

    // A fresh window of five attempts
    for expected_remaining in [4, 3, 2, 1] {
        assert_eq!(
            device.gate.attempt_login(ADMIN, "nope").await.unwrap(),
            GateResult::Rejected {
                attempts_remaining: expected_remaining,
                cause: FailureCause::InvalidCredentials
            }
        );
    }
    assert!(matches!(
        device.gate.attempt_login(ADMIN, "nope").await.unwrap(),
        GateResult::Locked { .. }
    ));
}
