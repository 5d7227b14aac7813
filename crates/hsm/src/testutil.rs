//! Shared test utilities for HSM protocol testing.
//!
//! [`MockHsm`] is an in-process stand-in for a PKCS#11 module. It keeps
//! soft key pairs, produces deterministic signatures, counts every protocol
//! call so tests can assert that acquisitions and releases balance, and
//! injects failures at any protocol step.
//!
//! Feature-gated behind `testutil`; enable in `[dev-dependencies]`:
//!
//! ```toml
//! [dev-dependencies]
//! signet-hsm = { path = "../hsm", features = ["testutil"] }
//! ```

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use parking_lot::Mutex;
use sha2::{Digest, Sha256};

use crate::{
    device::{
        HsmConnector, HsmDevice, KeyClass, KeyHandle, KeyPairHandles, KeyPairSpec, Pin,
        SessionHandle, SlotId,
    },
    error::{HsmError, HsmOperation, HsmResult},
};

/// Snapshot of the mock's protocol call counts.
///
/// A correct session leaves `initializes == finalizes`,
/// `sessions_opened == sessions_closed`, and `logins == logouts`
/// (counting successful calls), whatever the outcome of the operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounters {
    /// Successful `initialize` calls.
    pub initializes: usize,
    /// Successful `finalize` calls.
    pub finalizes: usize,
    /// Successfully opened sessions.
    pub sessions_opened: usize,
    /// Successfully closed sessions.
    pub sessions_closed: usize,
    /// Successful logins.
    pub logins: usize,
    /// Successful logouts.
    pub logouts: usize,
    /// Object searches run (each one finalizes its cursor before returning).
    pub searches: usize,
}

#[derive(Default)]
struct Counters {
    initializes: AtomicUsize,
    finalizes: AtomicUsize,
    sessions_opened: AtomicUsize,
    sessions_closed: AtomicUsize,
    logins: AtomicUsize,
    logouts: AtomicUsize,
    searches: AtomicUsize,
}

#[derive(Debug, Clone, Copy, Default)]
struct FailurePlan {
    connect: bool,
    initialize: bool,
    open_session: bool,
    login: bool,
    sign: bool,
}

struct MockKey {
    label: String,
    class: KeyClass,
    /// Shared by both halves of a pair, so a signature made with the
    /// private half checks out against the public half and nothing else.
    secret: Vec<u8>,
}

struct MockSession {
    authenticated: bool,
}

#[derive(Default)]
struct MockState {
    keys: Vec<MockKey>,
    sessions: HashMap<u64, MockSession>,
    /// Issued key handles, mapped to indices into `keys`.
    handles: HashMap<u64, usize>,
    next_session: u64,
    next_handle: u64,
    expected_pin: Option<String>,
    sign_delay: Option<Duration>,
    fail: FailurePlan,
}

/// In-process PKCS#11 device double.
///
/// Clones share all state and counters, so the connector side
/// (`connect` returns a clone) observes the same device as the test.
#[derive(Clone, Default)]
pub struct MockHsm {
    state: Arc<Mutex<MockState>>,
    counters: Arc<Counters>,
}

impl MockHsm {
    /// Creates an empty mock with no keys and no planned failures.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a soft RSA key pair labeled `{label}_pub` / `{label}_priv`.
    #[must_use]
    pub fn with_rsa_key_pair(self, label: &str) -> Self {
        {
            let mut state = self.state.lock();
            let secret = label.as_bytes().to_vec();
            state.keys.push(MockKey {
                label: format!("{label}_pub"),
                class: KeyClass::Public,
                secret: secret.clone(),
            });
            state.keys.push(MockKey {
                label: format!("{label}_priv"),
                class: KeyClass::Private,
                secret,
            });
        }
        self
    }

    /// Registers one extra key object under an exact label, for ambiguity
    /// tests.
    #[must_use]
    pub fn with_extra_key(self, label: &str, class: KeyClass) -> Self {
        {
            let mut state = self.state.lock();
            let secret = format!("{label}#dup").into_bytes();
            state.keys.push(MockKey { label: label.to_owned(), class, secret });
        }
        self
    }

    /// Requires this exact PIN on login; anything else is rejected.
    #[must_use]
    pub fn with_expected_pin(self, pin: &str) -> Self {
        self.state.lock().expected_pin = Some(pin.to_owned());
        self
    }

    /// Stalls every `sign` call by `delay`, for deadline tests.
    #[must_use]
    pub fn with_sign_delay(self, delay: Duration) -> Self {
        self.state.lock().sign_delay = Some(delay);
        self
    }

    /// Makes `connect` fail with `DeviceUnavailable`.
    #[must_use]
    pub fn fail_connect(self) -> Self {
        self.state.lock().fail.connect = true;
        self
    }

    /// Makes `initialize` fail with `Initialization`.
    #[must_use]
    pub fn fail_initialize(self) -> Self {
        self.state.lock().fail.initialize = true;
        self
    }

    /// Makes `open_session` fail with `Session`.
    #[must_use]
    pub fn fail_open_session(self) -> Self {
        self.state.lock().fail.open_session = true;
        self
    }

    /// Makes `login` fail with `Authentication`.
    #[must_use]
    pub fn fail_login(self) -> Self {
        self.state.lock().fail.login = true;
        self
    }

    /// Makes `sign` fail with `Operation`.
    #[must_use]
    pub fn fail_sign(self) -> Self {
        self.state.lock().fail.sign = true;
        self
    }

    /// Snapshot of all protocol call counts.
    #[must_use]
    pub fn counters(&self) -> CallCounters {
        CallCounters {
            initializes: self.counters.initializes.load(Ordering::SeqCst),
            finalizes: self.counters.finalizes.load(Ordering::SeqCst),
            sessions_opened: self.counters.sessions_opened.load(Ordering::SeqCst),
            sessions_closed: self.counters.sessions_closed.load(Ordering::SeqCst),
            logins: self.counters.logins.load(Ordering::SeqCst),
            logouts: self.counters.logouts.load(Ordering::SeqCst),
            searches: self.counters.searches.load(Ordering::SeqCst),
        }
    }

    /// Number of sessions currently open (should be zero between calls).
    #[must_use]
    pub fn open_sessions(&self) -> usize {
        self.state.lock().sessions.len()
    }

    fn mock_signature(secret: &[u8], data: &[u8]) -> Vec<u8> {
        let mut hasher = Sha256::new();
        hasher.update(secret);
        hasher.update(data);
        hasher.finalize().to_vec()
    }
}

impl HsmConnector for MockHsm {
    type Device = MockHsm;

    fn connect(&self) -> HsmResult<MockHsm> {
        if self.state.lock().fail.connect {
            return Err(HsmError::DeviceUnavailable {
                message: "injected connect failure".into(),
                source: None,
            });
        }
        Ok(self.clone())
    }
}

impl HsmDevice for MockHsm {
    fn initialize(&self) -> HsmResult<()> {
        if self.state.lock().fail.initialize {
            return Err(HsmError::initialization("injected initialize failure"));
        }
        self.counters.initializes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn open_session(&self, _slot: SlotId) -> HsmResult<SessionHandle> {
        let mut state = self.state.lock();
        if state.fail.open_session {
            return Err(HsmError::session("injected open failure"));
        }
        state.next_session += 1;
        let id = state.next_session;
        state.sessions.insert(id, MockSession { authenticated: false });
        self.counters.sessions_opened.fetch_add(1, Ordering::SeqCst);
        Ok(SessionHandle(id))
    }

    fn login(&self, session: SessionHandle, pin: &Pin) -> HsmResult<()> {
        let mut state = self.state.lock();
        if state.fail.login {
            return Err(HsmError::authentication("injected login failure"));
        }
        if let Some(expected) = &state.expected_pin {
            if pin.expose() != expected {
                return Err(HsmError::authentication("PIN rejected"));
            }
        }
        let entry = state
            .sessions
            .get_mut(&session.0)
            .ok_or_else(|| HsmError::session("login on unknown session"))?;
        entry.authenticated = true;
        self.counters.logins.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn find_objects(
        &self,
        session: SessionHandle,
        label: &str,
        class: KeyClass,
    ) -> HsmResult<Vec<KeyHandle>> {
        let mut state = self.state.lock();
        if !state.sessions.contains_key(&session.0) {
            return Err(HsmError::operation(HsmOperation::KeyLookup, "unknown session"));
        }
        self.counters.searches.fetch_add(1, Ordering::SeqCst);

        let matching: Vec<usize> = state
            .keys
            .iter()
            .enumerate()
            .filter(|(_, key)| key.label == label && key.class == class)
            .map(|(idx, _)| idx)
            .collect();

        let mut handles = Vec::with_capacity(matching.len());
        for key_idx in matching {
            state.next_handle += 1;
            let id = state.next_handle;
            state.handles.insert(id, key_idx);
            handles.push(KeyHandle(id));
        }
        Ok(handles)
    }

    fn sign(&self, session: SessionHandle, key: KeyHandle, data: &[u8]) -> HsmResult<Vec<u8>> {
        let (secret, delay) = {
            let state = self.state.lock();
            if state.fail.sign {
                return Err(HsmError::operation(HsmOperation::Sign, "injected sign failure"));
            }
            let entry = state
                .sessions
                .get(&session.0)
                .ok_or_else(|| HsmError::operation(HsmOperation::Sign, "unknown session"))?;
            if !entry.authenticated {
                return Err(HsmError::operation(HsmOperation::Sign, "session not authenticated"));
            }
            let key_idx = state
                .handles
                .get(&key.0)
                .copied()
                .ok_or_else(|| HsmError::operation(HsmOperation::Sign, "stale key handle"))?;
            let key = &state.keys[key_idx];
            if key.class != KeyClass::Private {
                return Err(HsmError::operation(HsmOperation::Sign, "not a private key"));
            }
            (key.secret.clone(), state.sign_delay)
        };

        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }
        Ok(Self::mock_signature(&secret, data))
    }

    fn verify(
        &self,
        session: SessionHandle,
        key: KeyHandle,
        data: &[u8],
        signature: &[u8],
    ) -> HsmResult<bool> {
        let state = self.state.lock();
        let entry = state
            .sessions
            .get(&session.0)
            .ok_or_else(|| HsmError::operation(HsmOperation::Verify, "unknown session"))?;
        if !entry.authenticated {
            return Err(HsmError::operation(HsmOperation::Verify, "session not authenticated"));
        }
        let key_idx = state
            .handles
            .get(&key.0)
            .copied()
            .ok_or_else(|| HsmError::operation(HsmOperation::Verify, "stale key handle"))?;
        let key = &state.keys[key_idx];
        if key.class != KeyClass::Public {
            return Err(HsmError::operation(HsmOperation::Verify, "not a public key"));
        }

        Ok(Self::mock_signature(&key.secret, data) == signature)
    }

    fn generate_key_pair(
        &self,
        session: SessionHandle,
        spec: &KeyPairSpec,
    ) -> HsmResult<KeyPairHandles> {
        let mut state = self.state.lock();
        let entry = state.sessions.get(&session.0).ok_or_else(|| {
            HsmError::operation(HsmOperation::GenerateKeyPair, "unknown session")
        })?;
        if !entry.authenticated {
            return Err(HsmError::operation(
                HsmOperation::GenerateKeyPair,
                "session not authenticated",
            ));
        }

        let secret = spec.private_label.as_bytes().to_vec();
        state.keys.push(MockKey {
            label: spec.public_label.clone(),
            class: KeyClass::Public,
            secret: secret.clone(),
        });
        let public_idx = state.keys.len() - 1;
        state.keys.push(MockKey {
            label: spec.private_label.clone(),
            class: KeyClass::Private,
            secret,
        });
        let private_idx = state.keys.len() - 1;

        state.next_handle += 1;
        let public_id = state.next_handle;
        state.handles.insert(public_id, public_idx);
        state.next_handle += 1;
        let private_id = state.next_handle;
        state.handles.insert(private_id, private_idx);

        Ok(KeyPairHandles { public: KeyHandle(public_id), private: KeyHandle(private_id) })
    }

    fn logout(&self, session: SessionHandle) -> HsmResult<()> {
        let mut state = self.state.lock();
        let entry = state
            .sessions
            .get_mut(&session.0)
            .ok_or_else(|| HsmError::session("logout on unknown session"))?;
        if !entry.authenticated {
            return Err(HsmError::session("logout without login"));
        }
        entry.authenticated = false;
        self.counters.logouts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn close_session(&self, session: SessionHandle) -> HsmResult<()> {
        let mut state = self.state.lock();
        if state.sessions.remove(&session.0).is_none() {
            return Err(HsmError::session("close of unknown session"));
        }
        self.counters.sessions_closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn finalize(&self) -> HsmResult<()> {
        self.counters.finalizes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
