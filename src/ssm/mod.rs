//! The Software Security Module (SSM): the one component that ever touches
//! private key material. An SSM owns at most one private key (plus, briefly,
//! the key it is replacing), signs and digests byte strings, verifies
//! signatures, and persists its own key state.
//!
//! Each protocol version is a separate module wrapped in the
//! [`SecurityModule`] sum type; dispatch is a match on the variant. The
//! current writing protocol is `v2` (Ed25519 signatures, SHA-512 digests).

use crate::{
    error::Result,
    value::{Binary, Tag, Version},
};
use std::path::PathBuf;

pub mod v2;

pub use v2::SsmV2;

/// The error-context name for this component.
pub(crate) const MODULE: &str = "ssm";

/// The states of the key-lifecycle machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyState {
    /// No key material at all.
    Keyless,
    /// One live key pair.
    LoneKey,
    /// A fresh key pair plus the pair it is replacing, which must sign once
    /// more before it disappears.
    TwoKeys,
}

impl KeyState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Keyless => "keyless",
            Self::LoneKey => "loneKey",
            Self::TwoKeys => "twoKeys",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "keyless" => Some(Self::Keyless),
            "loneKey" => Some(Self::LoneKey),
            "twoKeys" => Some(Self::TwoKeys),
            _ => None,
        }
    }
}

/// The events that can drive the key-lifecycle machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEvent {
    GenerateKeys,
    SignBytes,
    RotateKeys,
}

impl KeyEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::GenerateKeys => "generateKeys",
            Self::SignBytes => "signBytes",
            Self::RotateKeys => "rotateKeys",
        }
    }
}

/// The complete transition table. Anything not listed here is an illegal
/// event for that state.
pub fn transition(state: KeyState, event: KeyEvent) -> Option<KeyState> {
    match (state, event) {
        (KeyState::Keyless, KeyEvent::GenerateKeys) => Some(KeyState::LoneKey),
        (KeyState::LoneKey, KeyEvent::SignBytes) => Some(KeyState::LoneKey),
        (KeyState::LoneKey, KeyEvent::RotateKeys) => Some(KeyState::TwoKeys),
        (KeyState::TwoKeys, KeyEvent::SignBytes) => Some(KeyState::LoneKey),
        _ => None,
    }
}

/// One security module per protocol version. The notary holds these in a
/// registry ordered by preference: the first entry writes, every entry reads.
#[derive(Debug)]
pub enum SecurityModule {
    /// Ed25519 signatures over SHA-512 digests.
    V2(SsmV2),
}

impl SecurityModule {
    /// A v2 module persisting its key state under `directory`.
    pub fn v2<P: Into<PathBuf>>(directory: P) -> Self {
        Self::V2(SsmV2::new(directory))
    }

    /// The protocol version this module implements.
    pub fn get_protocol(&self) -> Version {
        match self {
            Self::V2(_) => Version::new(vec![2]),
        }
    }

    /// The stable identifier of this module instance.
    pub fn get_tag(&mut self) -> Result<Tag> {
        match self {
            Self::V2(ssm) => ssm.get_tag(),
        }
    }

    /// Generate a fresh key pair and return the public key.
    pub fn generate_keys(&mut self) -> Result<Binary> {
        match self {
            Self::V2(ssm) => ssm.generate_keys(),
        }
    }

    /// Retire the current key pair behind a fresh one and return the fresh
    /// public key. The retired pair signs exactly one more time.
    pub fn rotate_keys(&mut self) -> Result<Binary> {
        match self {
            Self::V2(ssm) => ssm.rotate_keys(),
        }
    }

    /// Sign a byte string. If a retiring key pair is present it produces the
    /// signature and is removed in the same operation.
    pub fn sign_bytes(&mut self, bytes: &[u8]) -> Result<Binary> {
        match self {
            Self::V2(ssm) => ssm.sign_bytes(bytes),
        }
    }

    /// Digest a byte string. Pure; never touches key state.
    pub fn digest_bytes(&self, bytes: &[u8]) -> Binary {
        match self {
            Self::V2(ssm) => ssm.digest_bytes(bytes),
        }
    }

    /// Verify a signature under the supplied public key. Pure; never touches
    /// key state.
    pub fn valid_signature(
        &self,
        public_key: &Binary,
        signature: &Binary,
        bytes: &[u8],
    ) -> Result<bool> {
        match self {
            Self::V2(ssm) => ssm.valid_signature(public_key, signature, bytes),
        }
    }

    /// Destroy all key material, persisted and in-memory. Idempotent. The
    /// next operation starts over with a fresh tag in the keyless state.
    pub fn erase_keys(&mut self) -> Result<bool> {
        match self {
            Self::V2(ssm) => ssm.erase_keys(),
        }
    }
}
