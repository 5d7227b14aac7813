//! The session protocol state machine.
//!
//! One function owns the whole lifecycle:
//!
//! ```text
//! Unopened → Initialized → SessionOpen → Authenticated
//!              │               │              │
//!              ▼               ▼              ▼
//!          (finalize)   (close, finalize)  run op
//!                                             │
//!                                             ▼
//!                              TornDown (logout, close, finalize)
//! ```
//!
//! Teardown runs exactly once on every path after initialization, in strict
//! reverse order of acquisition. A teardown failure never replaces the
//! error that put us on the failure path — it is logged and suppressed,
//! because the original failure is the actionable one and a logout error on
//! an already-failing session usually is not.

use crate::{
    device::{HsmDevice, KeyClass, KeyHandle, Pin, SessionHandle, SlotId},
    error::{HsmError, HsmResult},
};

/// Drives one complete session: initialize, open, authenticate, run `op`,
/// tear down. The device must come from a fresh
/// [`HsmConnector::connect`](crate::HsmConnector::connect); it is spent when
/// this returns.
pub(crate) fn run_session<D, T>(
    device: &D,
    slot: SlotId,
    pin: &Pin,
    op: impl FnOnce(&D, SessionHandle) -> HsmResult<T>,
) -> HsmResult<T>
where
    D: HsmDevice,
{
    // Step 2: initialize. On failure nothing was opened, so nothing to
    // release.
    device.initialize()?;

    // Step 3: open a session. From here on, finalization is guaranteed.
    let session = match device.open_session(slot) {
        Ok(session) => session,
        Err(err) => {
            finalize_device(device);
            return Err(err);
        },
    };

    // Step 4: authenticate. The open session must still be closed on
    // failure.
    if let Err(err) = device.login(session, pin) {
        teardown(device, session, false);
        return Err(err);
    }

    // Steps 5-6: locate and execute, supplied by the caller.
    let result = op(device, session);

    // Step 7: teardown in strict reverse order, exactly once.
    teardown(device, session, true);
    result
}

/// Locates exactly one key object for `label` and `class`.
///
/// Zero matches is [`HsmError::KeyNotFound`]; more than one is
/// [`HsmError::AmbiguousKey`]. The device finalizes its search cursor
/// before `find_objects` returns, match or not.
pub(crate) fn find_unique_key<D: HsmDevice>(
    device: &D,
    session: SessionHandle,
    label: &str,
    class: KeyClass,
) -> HsmResult<KeyHandle> {
    let matches = device.find_objects(session, label, class)?;
    match matches.as_slice() {
        [] => Err(HsmError::key_not_found(label)),
        [handle] => Ok(*handle),
        _ => Err(HsmError::ambiguous_key(label, matches.len())),
    }
}

/// Releases an open session and the device context: logout (if
/// authenticated), close, finalize. Errors are logged, never propagated.
fn teardown<D: HsmDevice>(device: &D, session: SessionHandle, authenticated: bool) {
    if authenticated {
        if let Err(err) = device.logout(session) {
            tracing::warn!(error = %err, "logout failed during session teardown");
        }
    }
    if let Err(err) = device.close_session(session) {
        tracing::warn!(error = %err, "close failed during session teardown");
    }
    finalize_device(device);
}

fn finalize_device<D: HsmDevice>(device: &D) {
    if let Err(err) = device.finalize() {
        tracing::warn!(error = %err, "device finalize failed; context may be leaked");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use crate::testutil::MockHsm;

    use super::*;

    #[test]
    fn test_successful_run_balances_every_acquisition() {
        let hsm = MockHsm::new().with_rsa_key_pair("k");

        let result = run_session(&hsm, SlotId(0), &Pin::new("1234"), |device, session| {
            find_unique_key(device, session, "k_priv", KeyClass::Private)
        });
        assert!(result.is_ok());

        let counters = hsm.counters();
        assert_eq!(counters.initializes, 1);
        assert_eq!(counters.finalizes, 1);
        assert_eq!(counters.sessions_opened, 1);
        assert_eq!(counters.sessions_closed, 1);
        assert_eq!(counters.logins, 1);
        assert_eq!(counters.logouts, 1);
    }

    #[test]
    fn test_initialization_failure_releases_nothing() {
        let hsm = MockHsm::new().fail_initialize();

        let result = run_session(&hsm, SlotId(0), &Pin::new("1234"), |_, _| Ok(()));
        assert!(matches!(result, Err(HsmError::Initialization { .. })));

        let counters = hsm.counters();
        assert_eq!(counters.sessions_opened, 0);
        assert_eq!(counters.finalizes, 0, "nothing was initialized, nothing to finalize");
    }

    #[test]
    fn test_open_failure_still_finalizes() {
        let hsm = MockHsm::new().fail_open_session();

        let result = run_session(&hsm, SlotId(0), &Pin::new("1234"), |_, _| Ok(()));
        assert!(matches!(result, Err(HsmError::Session { .. })));

        let counters = hsm.counters();
        assert_eq!(counters.initializes, 1);
        assert_eq!(counters.finalizes, 1);
        assert_eq!(counters.sessions_opened, 0);
        assert_eq!(counters.sessions_closed, 0);
    }

    #[test]
    fn test_login_failure_closes_session_and_finalizes() {
        let hsm = MockHsm::new().fail_login();

        let result = run_session(&hsm, SlotId(0), &Pin::new("wrong"), |_, _| Ok(()));
        assert!(matches!(result, Err(HsmError::Authentication { .. })));

        let counters = hsm.counters();
        assert_eq!(counters.sessions_opened, 1);
        assert_eq!(counters.sessions_closed, 1);
        assert_eq!(counters.logins, 0);
        assert_eq!(counters.logouts, 0, "never authenticated, so no logout");
        assert_eq!(counters.finalizes, 1);
    }

    #[test]
    fn test_op_failure_still_tears_down_exactly_once() {
        let hsm = MockHsm::new();

        let result = run_session(&hsm, SlotId(0), &Pin::new("1234"), |device, session| {
            find_unique_key(device, session, "missing", KeyClass::Private)
        });
        assert!(matches!(result, Err(HsmError::KeyNotFound { .. })));

        let counters = hsm.counters();
        assert_eq!(counters.sessions_opened, 1);
        assert_eq!(counters.sessions_closed, 1);
        assert_eq!(counters.logins, 1);
        assert_eq!(counters.logouts, 1);
        assert_eq!(counters.initializes, 1);
        assert_eq!(counters.finalizes, 1);
    }

    #[test]
    fn test_find_unique_key_rejects_duplicates() {
        let hsm = MockHsm::new()
            .with_rsa_key_pair("dup")
            .with_extra_key("dup_priv", KeyClass::Private);

        let result = run_session(&hsm, SlotId(0), &Pin::new("1234"), |device, session| {
            find_unique_key(device, session, "dup_priv", KeyClass::Private)
        });

        match result {
            Err(HsmError::AmbiguousKey { label, matches }) => {
                assert_eq!(label, "dup_priv");
                assert_eq!(matches, 2);
            },
            other => panic!("expected AmbiguousKey, got {other:?}"),
        }
    }

    #[test]
    fn test_find_unique_key_filters_by_class() {
        let hsm = MockHsm::new().with_rsa_key_pair("k");

        // The private label exists, but not as a public object.
        let result = run_session(&hsm, SlotId(0), &Pin::new("1234"), |device, session| {
            find_unique_key(device, session, "k_priv", KeyClass::Public)
        });
        assert!(matches!(result, Err(HsmError::KeyNotFound { .. })));
    }
}
