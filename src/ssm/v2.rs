//! The version 2 security module: Ed25519 signatures, SHA-512 digests. This
//! is the active writing protocol.
//!
//! The module's entire key state lives in one configuration catalog that is
//! rewritten atomically after every mutating operation. Private key seeds
//! never leave this file (and this module's memory); every public operation
//! returns only public keys, digests, signatures, or booleans.

use crate::{
    config::ConfigStore,
    error::{Error, Result},
    ssm::{transition, KeyEvent, KeyState, MODULE},
    value::{parse_catalog, Binary, Catalog, Symbol, Tag, Value},
};
use rand::{rngs::OsRng, RngCore};
use sha2::Digest;
use std::path::PathBuf;

/// The configuration file this module owns.
pub const FILENAME: &str = "ssm-v2.bali";

/// The catalog persisted for this module: its identity, its lifecycle state,
/// and up to two key pairs.
struct KeyConfig {
    tag: Tag,
    state: KeyState,
    public_key: Option<Binary>,
    private_key: Option<Binary>,
    previous_public_key: Option<Binary>,
    previous_private_key: Option<Binary>,
}

impl std::fmt::Debug for KeyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // private seeds must never reach a log line
        let redact = |key: &Option<Binary>| key.as_ref().map(|_| "[redacted]");
        f.debug_struct("KeyConfig")
            .field("tag", &self.tag)
            .field("state", &self.state.name())
            .field("public_key", &self.public_key)
            .field("private_key", &redact(&self.private_key))
            .field("previous_public_key", &self.previous_public_key)
            .field("previous_private_key", &redact(&self.previous_private_key))
            .finish()
    }
}

impl KeyConfig {
    fn fresh() -> Self {
        Self {
            tag: Tag::random(),
            state: KeyState::Keyless,
            public_key: None,
            private_key: None,
            previous_public_key: None,
            previous_private_key: None,
        }
    }

    fn to_catalog(&self) -> Catalog {
        let mut catalog = Catalog::new();
        catalog.set("$tag", Value::Tag(self.tag.clone()));
        catalog.set("$state", Value::Symbol(Symbol::new(self.state.name())));
        let slots = [
            ("$publicKey", &self.public_key),
            ("$privateKey", &self.private_key),
            ("$previousPublicKey", &self.previous_public_key),
            ("$previousPrivateKey", &self.previous_private_key),
        ];
        for (key, slot) in slots {
            if let Some(binary) = slot {
                catalog.set(key, Value::Binary(binary.clone()));
            }
        }
        catalog
    }

    fn from_catalog(catalog: &Catalog) -> Result<Self> {
        fn bad(text: String) -> Error {
            Error::InvalidParameter {
                module: MODULE,
                procedure: "loadConfiguration",
                text,
            }
        }
        fn binary(catalog: &Catalog, key: &str) -> Result<Option<Binary>> {
            match catalog.get(key) {
                None => Ok(None),
                Some(value) => match value.as_binary() {
                    Some(bin) => Ok(Some(bin.clone())),
                    None => Err(bad(format!("{} is not a binary", key))),
                },
            }
        }
        let tag = catalog
            .get("$tag")
            .and_then(Value::as_tag)
            .cloned()
            .ok_or_else(|| bad("the configuration has no $tag".into()))?;
        let state = catalog
            .get("$state")
            .and_then(Value::as_symbol)
            .and_then(|symbol| KeyState::from_name(symbol.identifier()))
            .ok_or_else(|| bad("the configuration has no recognizable $state".into()))?;
        Ok(Self {
            tag,
            state,
            public_key: binary(catalog, "$publicKey")?,
            private_key: binary(catalog, "$privateKey")?,
            previous_public_key: binary(catalog, "$previousPublicKey")?,
            previous_private_key: binary(catalog, "$previousPrivateKey")?,
        })
    }
}

/// The v2 software security module.
#[derive(Debug)]
pub struct SsmV2 {
    store: ConfigStore,
    // None until the first operation that needs key state; erase_keys()
    // drops it back to None
    config: Option<KeyConfig>,
}

fn random_seed() -> [u8; 32] {
    let mut seed = [0u8; 32];
    OsRng.fill_bytes(&mut seed);
    seed
}

fn signing_key(seed: &Binary, procedure: &'static str) -> Result<ed25519_consensus::SigningKey> {
    let seed: [u8; 32] = seed
        .as_bytes()
        .try_into()
        .map_err(|_| Error::unexpected(MODULE, procedure, "the stored private key is not 32 bytes"))?;
    Ok(ed25519_consensus::SigningKey::from(seed))
}

impl SsmV2 {
    /// A module persisting its key state in `directory`. Nothing is read or
    /// written until the first operation that needs the configuration.
    pub fn new<P: Into<PathBuf>>(directory: P) -> Self {
        Self {
            store: ConfigStore::new(directory, FILENAME),
            config: None,
        }
    }

    fn config_mut(&mut self) -> Result<&mut KeyConfig> {
        if self.config.is_none() {
            let config = match self.store.load()? {
                Some(text) => {
                    let catalog = parse_catalog(&text)
                        .map_err(|cause| Error::unexpected(MODULE, "loadConfiguration", cause))?;
                    KeyConfig::from_catalog(&catalog)?
                }
                None => {
                    // first contact: establish the fresh keyless catalog on
                    // disk before doing anything with it
                    let fresh = KeyConfig::fresh();
                    self.store.store(&fresh.to_catalog().format())?;
                    fresh
                }
            };
            self.config = Some(config);
        }
        self.config
            .as_mut()
            .ok_or_else(|| Error::unexpected(MODULE, "loadConfiguration", "the configuration vanished"))
    }

    fn persist(&self) -> Result<()> {
        match self.config {
            Some(ref config) => self.store.store(&config.to_catalog().format()),
            None => Ok(()),
        }
    }

    /// The stable identifier of this module instance, derived on first load.
    pub fn get_tag(&mut self) -> Result<Tag> {
        Ok(self.config_mut()?.tag.clone())
    }

    /// Generate a fresh Ed25519 key pair and return the public key. Legal
    /// only in the keyless state.
    pub fn generate_keys(&mut self) -> Result<Binary> {
        let config = self.config_mut()?;
        let next = transition(config.state, KeyEvent::GenerateKeys).ok_or(Error::InvalidEvent {
            module: MODULE,
            procedure: "generateKeys",
            event: "generateKeys",
            state: config.state.name(),
        })?;
        let signing = ed25519_consensus::SigningKey::from(random_seed());
        let public = Binary::new(signing.verification_key().to_bytes().to_vec());
        config.public_key = Some(public.clone());
        config.private_key = Some(Binary::new(signing.to_bytes().to_vec()));
        config.state = next;
        self.persist()?;
        Ok(public)
    }

    /// Retire the current key pair behind a fresh one and return the fresh
    /// public key. Legal only with a single live key.
    pub fn rotate_keys(&mut self) -> Result<Binary> {
        let config = self.config_mut()?;
        let next = transition(config.state, KeyEvent::RotateKeys).ok_or(Error::InvalidEvent {
            module: MODULE,
            procedure: "rotateKeys",
            event: "rotateKeys",
            state: config.state.name(),
        })?;
        config.previous_public_key = config.public_key.take();
        config.previous_private_key = config.private_key.take();
        let signing = ed25519_consensus::SigningKey::from(random_seed());
        let public = Binary::new(signing.verification_key().to_bytes().to_vec());
        config.public_key = Some(public.clone());
        config.private_key = Some(Binary::new(signing.to_bytes().to_vec()));
        config.state = next;
        self.persist()?;
        Ok(public)
    }

    /// Sign a byte string.
    ///
    /// Key selection: if a retiring key pair is present it signs and both of
    /// its halves are removed in the same operation, which is what lets a new
    /// certificate carry its predecessor's signature. Otherwise the current
    /// private key signs.
    pub fn sign_bytes(&mut self, bytes: &[u8]) -> Result<Binary> {
        let config = self.config_mut()?;
        let next = transition(config.state, KeyEvent::SignBytes).ok_or(Error::InvalidEvent {
            module: MODULE,
            procedure: "signBytes",
            event: "signBytes",
            state: config.state.name(),
        })?;
        let seed = match config.previous_private_key.take() {
            Some(previous) => {
                config.previous_public_key = None;
                previous
            }
            None => config.private_key.clone().ok_or_else(|| {
                Error::unexpected(MODULE, "signBytes", "the configuration holds no private key")
            })?,
        };
        let signing = signing_key(&seed, "signBytes")?;
        let signature = Binary::new(signing.sign(bytes).to_bytes().to_vec());
        config.state = next;
        self.persist()?;
        Ok(signature)
    }

    /// The SHA-512 digest of a byte string. Pure; never touches key state.
    pub fn digest_bytes(&self, bytes: &[u8]) -> Binary {
        let mut hasher = sha2::Sha512::new();
        hasher.update(bytes);
        Binary::new(hasher.finalize().as_slice().to_vec())
    }

    /// Verify a signature over `bytes` under the supplied public key. Pure;
    /// never touches key state.
    pub fn valid_signature(
        &self,
        public_key: &Binary,
        signature: &Binary,
        bytes: &[u8],
    ) -> Result<bool> {
        fn bad(text: &str) -> Error {
            Error::InvalidParameter {
                module: MODULE,
                procedure: "validSignature",
                text: text.into(),
            }
        }
        let key_bytes: [u8; 32] = public_key
            .as_bytes()
            .try_into()
            .map_err(|_| bad("an Ed25519 public key must be 32 bytes"))?;
        let signature_bytes: [u8; 64] = signature
            .as_bytes()
            .try_into()
            .map_err(|_| bad("an Ed25519 signature must be 64 bytes"))?;
        let verification = ed25519_consensus::VerificationKey::try_from(key_bytes)
            .map_err(|_| bad("the public key is not a point on the Ed25519 curve"))?;
        let signature = ed25519_consensus::Signature::from(signature_bytes);
        Ok(verification.verify(&signature, bytes).is_ok())
    }

    /// Destroy all key material: delete the configuration file and drop the
    /// in-memory copy (seeds included). Idempotent. The next operation starts
    /// over with a fresh tag in the keyless state.
    pub fn erase_keys(&mut self) -> Result<bool> {
        self.store.delete()?;
        self.config = None;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tmp_ssm() -> (tempfile::TempDir, SsmV2) {
        let dir = tempfile::tempdir().unwrap();
        let ssm = SsmV2::new(dir.path());
        (dir, ssm)
    }

    #[test]
    fn sign_verify_round_trip() {
        let (_dir, mut ssm) = tmp_ssm();
        let public = ssm.generate_keys().unwrap();
        assert_eq!(public.len(), 32);

        let message = b"the deed to the farm, witnessed and sealed";
        let signature = ssm.sign_bytes(message).unwrap();
        assert_eq!(signature.len(), 64);
        assert!(ssm.valid_signature(&public, &signature, message).unwrap());
        assert!(!ssm
            .valid_signature(&public, &signature, b"the deed to the barn")
            .unwrap());
    }

    #[test]
    fn cross_key_rejection() {
        let (_dir1, mut ssm1) = tmp_ssm();
        let (_dir2, mut ssm2) = tmp_ssm();
        let public1 = ssm1.generate_keys().unwrap();
        let public2 = ssm2.generate_keys().unwrap();
        assert!(public1 != public2);

        let message = b"signed by module one";
        let signature = ssm1.sign_bytes(message).unwrap();
        assert!(ssm1.valid_signature(&public1, &signature, message).unwrap());
        assert!(!ssm1.valid_signature(&public2, &signature, message).unwrap());
    }

    #[test]
    fn malformed_keys_are_rejected() {
        let (_dir, ssm) = tmp_ssm();
        let signature = Binary::new(vec![0u8; 64]);
        let short_key = Binary::new(vec![1u8; 16]);
        assert!(ssm.valid_signature(&short_key, &signature, b"x").is_err());
        let good_key = Binary::new(vec![1u8; 32]);
        let short_sig = Binary::new(vec![0u8; 12]);
        assert!(ssm.valid_signature(&good_key, &short_sig, b"x").is_err());
    }

    #[test]
    fn digest_is_sha512() {
        let (_dir, ssm) = tmp_ssm();
        let digest = ssm.digest_bytes(b"");
        // the well-known SHA-512 digest of the empty string
        let expected = "\
cf83e1357eefb8bdf1542850d66d8007d620e4050b5715dc83f4a921d36ce9ce\
47d0d13c5d85f2b0ff8318d2877eec2f63b931bd47417a81a538327af927da3e";
        let hex: String = digest
            .as_bytes()
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect();
        assert_eq!(hex, expected);

        // deterministic, and sensitive to every byte
        assert_eq!(ssm.digest_bytes(b"abc"), ssm.digest_bytes(b"abc"));
        assert!(ssm.digest_bytes(b"abc") != ssm.digest_bytes(b"abd"));
    }

    #[test]
    fn illegal_events_leave_state_alone() {
        let (dir, mut ssm) = tmp_ssm();

        // keyless: signing and rotating are illegal
        let res = ssm.sign_bytes(b"too early");
        assert_eq!(
            res.err(),
            Some(Error::InvalidEvent {
                module: "ssm",
                procedure: "signBytes",
                event: "signBytes",
                state: "keyless",
            })
        );
        assert_eq!(
            ssm.rotate_keys().err(),
            Some(Error::InvalidEvent {
                module: "ssm",
                procedure: "rotateKeys",
                event: "rotateKeys",
                state: "keyless",
            })
        );

        // loneKey: generating again is illegal
        let public = ssm.generate_keys().unwrap();
        assert_eq!(
            ssm.generate_keys().err(),
            Some(Error::InvalidEvent {
                module: "ssm",
                procedure: "generateKeys",
                event: "generateKeys",
                state: "loneKey",
            })
        );

        // twoKeys: generating and rotating are illegal
        ssm.rotate_keys().unwrap();
        assert!(ssm.generate_keys().is_err());
        assert!(ssm.rotate_keys().is_err());

        // none of the refused events disturbed the persisted state: a second
        // instance still signs with the retiring key
        let mut reloaded = SsmV2::new(dir.path());
        let signature = reloaded.sign_bytes(b"still intact").unwrap();
        assert!(reloaded
            .valid_signature(&public, &signature, b"still intact")
            .unwrap());
    }

    #[test]
    fn rotation_signs_once_with_the_retiring_key() {
        let (_dir, mut ssm) = tmp_ssm();
        let old_public = ssm.generate_keys().unwrap();
        let new_public = ssm.rotate_keys().unwrap();
        assert!(old_public != new_public);

        // first signature after rotation comes from the retiring key
        let message = b"the hand-off";
        let signature = ssm.sign_bytes(message).unwrap();
        assert!(ssm
            .valid_signature(&old_public, &signature, message)
            .unwrap());
        assert!(!ssm
            .valid_signature(&new_public, &signature, message)
            .unwrap());

        // and every signature after that from the new key
        let signature = ssm.sign_bytes(message).unwrap();
        assert!(ssm
            .valid_signature(&new_public, &signature, message)
            .unwrap());
        assert!(!ssm
            .valid_signature(&old_public, &signature, message)
            .unwrap());
    }

    #[test]
    fn erase_wipes_and_reinitializes() {
        let (dir, mut ssm) = tmp_ssm();
        ssm.generate_keys().unwrap();
        let tag = ssm.get_tag().unwrap();

        assert!(ssm.erase_keys().unwrap());
        let file = ConfigStore::new(dir.path(), FILENAME);
        assert!(!file.exists());

        // idempotent
        assert!(ssm.erase_keys().unwrap());

        // the next use starts over: fresh tag, keyless state
        let fresh_tag = ssm.get_tag().unwrap();
        assert!(fresh_tag != tag);
        assert!(ssm.sign_bytes(b"no keys yet").is_err());
        ssm.generate_keys().unwrap();
    }

    #[test]
    fn state_survives_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let public = {
            let mut ssm = SsmV2::new(dir.path());
            ssm.generate_keys().unwrap()
        };
        let mut reloaded = SsmV2::new(dir.path());
        let message = b"signed after a restart";
        let signature = reloaded.sign_bytes(message).unwrap();
        assert!(reloaded
            .valid_signature(&public, &signature, message)
            .unwrap());
    }
}
