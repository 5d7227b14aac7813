//! Production device backend over the [`cryptoki`] PKCS#11 bindings.
//!
//! [`CryptokiConnector`] binds the module's shared library once per service
//! call; the resulting [`CryptokiDevice`] maps the [`HsmDevice`] protocol
//! onto `cryptoki` calls.
//!
//! # Handle mapping
//!
//! `cryptoki` does not expose raw `CK_OBJECT_HANDLE` values, so key handles
//! crossing the [`HsmDevice`] boundary are small indices into a per-session
//! registry of the real object handles. A handle is only meaningful to the
//! session that issued it, which matches the protocol's ownership rules.
//!
//! # Search finalization
//!
//! `cryptoki`'s `find_objects` performs the PKCS#11
//! `C_FindObjectsInit` / `C_FindObjects` / `C_FindObjectsFinal` sequence
//! internally, so the search cursor is terminated before
//! [`find_objects`](HsmDevice::find_objects) returns, match or not.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::atomic::{AtomicU64, Ordering},
};

use cryptoki::{
    context::{CInitializeArgs, Pkcs11},
    error::{Error as CkError, RvError},
    mechanism::Mechanism,
    object::{Attribute, KeyType, ObjectClass, ObjectHandle},
    session::{Session, UserType},
    slot::Slot,
    types::AuthPin,
};
use parking_lot::Mutex;

use crate::{
    device::{
        HsmConnector, HsmDevice, KeyClass, KeyHandle, KeyPairHandles, KeyPairSpec, Pin,
        SessionHandle, SlotId,
    },
    error::{HsmError, HsmOperation, HsmResult},
};

/// Binds a PKCS#11 module from its shared-library path.
#[derive(Debug, Clone)]
pub struct CryptokiConnector {
    library_path: PathBuf,
}

impl CryptokiConnector {
    /// Creates a connector for the module at `library_path`
    /// (e.g. `/usr/lib/softhsm/libsofthsm2.so`).
    pub fn new(library_path: impl Into<PathBuf>) -> Self {
        Self { library_path: library_path.into() }
    }

    /// The configured module path.
    #[must_use]
    pub fn library_path(&self) -> &Path {
        &self.library_path
    }
}

impl HsmConnector for CryptokiConnector {
    type Device = CryptokiDevice;

    fn connect(&self) -> HsmResult<CryptokiDevice> {
        let ctx = Pkcs11::new(&self.library_path).map_err(|e| {
            HsmError::device_unavailable(
                format!("failed to load PKCS#11 module {}", self.library_path.display()),
                e,
            )
        })?;

        Ok(CryptokiDevice {
            ctx: Mutex::new(Some(ctx)),
            sessions: Mutex::new(HashMap::new()),
            next_session: AtomicU64::new(1),
        })
    }
}

struct SessionEntry {
    session: Session,
    /// Object handles issued to the caller, indexed by the `KeyHandle`
    /// value handed out.
    objects: Vec<ObjectHandle>,
}

/// One bound PKCS#11 module context, spent after a single protocol run.
pub struct CryptokiDevice {
    /// `None` once finalized. Finalization drops the context; the binding
    /// calls `C_Finalize` when the context goes away.
    ctx: Mutex<Option<Pkcs11>>,
    sessions: Mutex<HashMap<u64, SessionEntry>>,
    next_session: AtomicU64,
}

impl CryptokiDevice {
    fn with_session<T>(
        &self,
        session: SessionHandle,
        f: impl FnOnce(&mut SessionEntry) -> HsmResult<T>,
    ) -> HsmResult<T> {
        let mut sessions = self.sessions.lock();
        let entry = sessions
            .get_mut(&session.0)
            .ok_or_else(|| HsmError::session("unknown session handle"))?;
        f(entry)
    }

    fn resolve(
        entry: &SessionEntry,
        key: KeyHandle,
        operation: HsmOperation,
    ) -> HsmResult<ObjectHandle> {
        entry
            .objects
            .get(key.0 as usize)
            .copied()
            .ok_or_else(|| HsmError::operation(operation, "stale key handle"))
    }
}

impl HsmDevice for CryptokiDevice {
    fn initialize(&self) -> HsmResult<()> {
        let ctx = self.ctx.lock();
        let ctx = ctx
            .as_ref()
            .ok_or_else(|| HsmError::initialization("device context already finalized"))?;
        ctx.initialize(CInitializeArgs::OsThreads)
            .map_err(|e| HsmError::initialization_with_source("C_Initialize failed", e))
    }

    fn open_session(&self, slot: SlotId) -> HsmResult<SessionHandle> {
        let ctx = self.ctx.lock();
        let ctx =
            ctx.as_ref().ok_or_else(|| HsmError::session("device context already finalized"))?;

        let slot = Slot::try_from(slot.0)
            .map_err(|e| HsmError::session_with_source(format!("invalid slot id {slot}"), e))?;

        // Serial + read/write access, per the protocol.
        let session = ctx
            .open_rw_session(slot)
            .map_err(|e| HsmError::session_with_source("C_OpenSession failed", e))?;

        let id = self.next_session.fetch_add(1, Ordering::Relaxed);
        self.sessions.lock().insert(id, SessionEntry { session, objects: Vec::new() });
        Ok(SessionHandle(id))
    }

    fn login(&self, session: SessionHandle, pin: &Pin) -> HsmResult<()> {
        self.with_session(session, |entry| {
            let pin = AuthPin::new(pin.expose().into());
            entry
                .session
                .login(UserType::User, Some(&pin))
                .map_err(|e| HsmError::authentication_with_source("C_Login failed", e))
        })
    }

    fn find_objects(
        &self,
        session: SessionHandle,
        label: &str,
        class: KeyClass,
    ) -> HsmResult<Vec<KeyHandle>> {
        let object_class = match class {
            KeyClass::Public => ObjectClass::PUBLIC_KEY,
            KeyClass::Private => ObjectClass::PRIVATE_KEY,
        };
        let template =
            [Attribute::Label(label.as_bytes().to_vec()), Attribute::Class(object_class)];

        self.with_session(session, |entry| {
            let found = entry.session.find_objects(&template).map_err(|e| {
                HsmError::operation_with_source(HsmOperation::KeyLookup, "C_FindObjects failed", e)
            })?;

            let mut handles = Vec::with_capacity(found.len());
            for object in found {
                entry.objects.push(object);
                handles.push(KeyHandle((entry.objects.len() - 1) as u64));
            }
            Ok(handles)
        })
    }

    fn sign(&self, session: SessionHandle, key: KeyHandle, data: &[u8]) -> HsmResult<Vec<u8>> {
        self.with_session(session, |entry| {
            let object = Self::resolve(entry, key, HsmOperation::Sign)?;
            entry.session.sign(&Mechanism::RsaPkcs, object, data).map_err(|e| {
                HsmError::operation_with_source(HsmOperation::Sign, "C_Sign failed", e)
            })
        })
    }

    fn verify(
        &self,
        session: SessionHandle,
        key: KeyHandle,
        data: &[u8],
        signature: &[u8],
    ) -> HsmResult<bool> {
        self.with_session(session, |entry| {
            let object = Self::resolve(entry, key, HsmOperation::Verify)?;
            match entry.session.verify(&Mechanism::RsaPkcs, object, data, signature) {
                Ok(()) => Ok(true),
                // A cryptographically invalid signature is a normal negative
                // result, distinct from protocol failures.
                Err(CkError::Pkcs11(
                    RvError::SignatureInvalid | RvError::SignatureLenRange,
                    _,
                )) => Ok(false),
                Err(e) => Err(HsmError::operation_with_source(
                    HsmOperation::Verify,
                    "C_Verify failed",
                    e,
                )),
            }
        })
    }

    fn generate_key_pair(
        &self,
        session: SessionHandle,
        spec: &KeyPairSpec,
    ) -> HsmResult<KeyPairHandles> {
        // The shared CKA_ID ties the two halves together on the token.
        let key_id = spec.public_label.as_bytes().to_vec();

        let public_template = [
            Attribute::Class(ObjectClass::PUBLIC_KEY),
            Attribute::KeyType(KeyType::RSA),
            Attribute::Label(spec.public_label.as_bytes().to_vec()),
            Attribute::Id(key_id.clone()),
            Attribute::Token(true),
            Attribute::ModulusBits(spec.modulus_bits.into()),
            Attribute::Encrypt(true),
            Attribute::Verify(true),
            Attribute::Wrap(true),
        ];
        let private_template = [
            Attribute::Class(ObjectClass::PRIVATE_KEY),
            Attribute::KeyType(KeyType::RSA),
            Attribute::Label(spec.private_label.as_bytes().to_vec()),
            Attribute::Id(key_id),
            Attribute::Token(true),
            Attribute::Decrypt(true),
            Attribute::Sign(true),
            Attribute::Unwrap(true),
            Attribute::Sensitive(true),
            Attribute::Extractable(false),
        ];

        self.with_session(session, |entry| {
            let (public, private) = entry
                .session
                .generate_key_pair(
                    &Mechanism::RsaPkcsKeyPairGen,
                    &public_template,
                    &private_template,
                )
                .map_err(|e| {
                    HsmError::operation_with_source(
                        HsmOperation::GenerateKeyPair,
                        "C_GenerateKeyPair failed",
                        e,
                    )
                })?;

            entry.objects.push(public);
            let public_handle = KeyHandle((entry.objects.len() - 1) as u64);
            entry.objects.push(private);
            let private_handle = KeyHandle((entry.objects.len() - 1) as u64);

            Ok(KeyPairHandles { public: public_handle, private: private_handle })
        })
    }

    fn logout(&self, session: SessionHandle) -> HsmResult<()> {
        self.with_session(session, |entry| {
            entry
                .session
                .logout()
                .map_err(|e| HsmError::session_with_source("C_Logout failed", e))
        })
    }

    fn close_session(&self, session: SessionHandle) -> HsmResult<()> {
        // Dropping the entry closes the underlying session.
        let removed = self.sessions.lock().remove(&session.0);
        match removed {
            Some(_) => Ok(()),
            None => Err(HsmError::session("close of unknown session handle")),
        }
    }

    fn finalize(&self) -> HsmResult<()> {
        // Dropping the context finalizes the module; the binding calls
        // C_Finalize on drop. Taking it makes every later call fail fast.
        let ctx = self.ctx.lock().take();
        match ctx {
            Some(ctx) => {
                drop(ctx);
                Ok(())
            },
            None => Err(HsmError::initialization("device context already finalized")),
        }
    }
}
