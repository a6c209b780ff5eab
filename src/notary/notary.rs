//! The `DigitalNotary` facade. One notary serves one account: it drives the
//! security module through key generation, activation, rotation, and erasure,
//! and turns components into notarized documents and documents into
//! citations.

use crate::{
    config::ConfigStore,
    error::{Error, Result},
    notary::{document, transition, NotaryEvent, NotaryState, MODULE},
    ssm::SecurityModule,
    value::{parse_catalog, Catalog, Symbol, Tag, Value, Version},
};
use std::path::PathBuf;

/// The configuration file the notary owns.
pub const FILENAME: &str = "notary.bali";

/// The catalog persisted for the notary: its lifecycle state, the current
/// certificate (unsigned component while `pending`, notarized certificate
/// once `enabled`), and the citation to that certificate.
#[derive(Debug)]
struct NotaryConfig {
    state: NotaryState,
    certificate: Option<Catalog>,
    citation: Option<Catalog>,
}

impl NotaryConfig {
    fn fresh() -> Self {
        Self {
            state: NotaryState::Limited,
            certificate: None,
            citation: None,
        }
    }

    fn to_catalog(&self) -> Catalog {
        let mut catalog = Catalog::new();
        catalog.set("$state", Value::Symbol(Symbol::new(self.state.name())));
        if let Some(ref certificate) = self.certificate {
            catalog.set("$certificate", Value::Catalog(certificate.clone()));
        }
        if let Some(ref citation) = self.citation {
            catalog.set("$citation", Value::Catalog(citation.clone()));
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
        fn catalog_slot(catalog: &Catalog, key: &str) -> Result<Option<Catalog>> {
            match catalog.get(key) {
                None => Ok(None),
                Some(value) => match value.as_catalog() {
                    Some(inner) => Ok(Some(inner.clone())),
                    None => Err(bad(format!("{} is not a catalog", key))),
                },
            }
        }
        let state = catalog
            .get("$state")
            .and_then(Value::as_symbol)
            .and_then(|symbol| NotaryState::from_name(symbol.identifier()))
            .ok_or_else(|| bad("the configuration has no recognizable $state".into()))?;
        Ok(Self {
            state,
            certificate: catalog_slot(catalog, "$certificate")?,
            citation: catalog_slot(catalog, "$citation")?,
        })
    }
}

/// A digital notary bound to a single account.
///
/// The notary holds the protocol registry: an ordered list of security
/// modules of which the first is the active writing protocol and all are
/// eligible for verification.
#[derive(Debug, getset::Getters)]
pub struct DigitalNotary {
    /// The account this notary notarizes on behalf of.
    #[getset(get = "pub")]
    account: Tag,
    modules: Vec<SecurityModule>,
    store: ConfigStore,
    // None until the first operation that needs it; forget_key() drops it
    // back to None
    config: Option<NotaryConfig>,
}

impl DigitalNotary {
    /// A notary for `account` keeping its configuration in `.bali/` under
    /// the user's home directory.
    pub fn new(account: Tag) -> Result<Self> {
        let dirs = directories::UserDirs::new().ok_or_else(|| {
            Error::unexpected(MODULE, "new", "the home directory could not be determined")
        })?;
        Ok(Self::with_directory(account, dirs.home_dir().join(".bali")))
    }

    /// A notary for `account` keeping its configuration in `directory`.
    pub fn with_directory<P: Into<PathBuf>>(account: Tag, directory: P) -> Self {
        let directory = directory.into();
        Self {
            account,
            modules: vec![SecurityModule::v2(&directory)],
            store: ConfigStore::new(directory, FILENAME),
            config: None,
        }
    }

    /// The version of the active writing protocol.
    pub fn get_protocol(&self) -> Result<Version> {
        Ok(self.active()?.get_protocol())
    }

    fn active(&self) -> Result<&SecurityModule> {
        self.modules
            .first()
            .ok_or_else(|| Error::unexpected(MODULE, "securityModule", "the protocol registry is empty"))
    }

    fn active_mut(&mut self) -> Result<&mut SecurityModule> {
        self.modules
            .first_mut()
            .ok_or_else(|| Error::unexpected(MODULE, "securityModule", "the protocol registry is empty"))
    }

    /// The security module registered for `protocol`, for verification and
    /// citation matching.
    fn module_for(&self, protocol: &Version) -> Result<&SecurityModule> {
        self.modules
            .iter()
            .find(|module| module.get_protocol() == *protocol)
            .ok_or_else(|| Error::UnsupportedProtocol {
                expected: self
                    .modules
                    .iter()
                    .map(|module| module.get_protocol().to_string())
                    .collect::<Vec<_>>()
                    .join(", "),
                actual: protocol.to_string(),
            })
    }

    fn config_mut(&mut self) -> Result<&mut NotaryConfig> {
        if self.config.is_none() {
            let config = match self.store.load()? {
                Some(text) => {
                    let catalog = parse_catalog(&text)
                        .map_err(|cause| Error::unexpected(MODULE, "loadConfiguration", cause))?;
                    NotaryConfig::from_catalog(&catalog)?
                }
                None => {
                    let fresh = NotaryConfig::fresh();
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

    /// Validate `event` against the current state and return the state the
    /// notary moves to on success. Each notary operation raises the event of
    /// its own name, so the event doubles as the procedure.
    fn check_event(&mut self, event: NotaryEvent) -> Result<NotaryState> {
        let config = self.config_mut()?;
        transition(config.state, event).ok_or(Error::InvalidEvent {
            module: MODULE,
            procedure: event.name(),
            event: event.name(),
            state: config.state.name(),
        })
    }

    /// Build a citation to `document` under the active protocol: tag and
    /// version from the embedded component, digest over the document's full
    /// canonical bytes.
    fn cite(&self, document: &Catalog, procedure: &'static str) -> Result<Catalog> {
        let component = document::embedded_component(document, procedure)?;
        let tag = document::parameter_tag(component, procedure)?.clone();
        let version = document::parameter_version(component, procedure)?.clone();
        let module = self.active()?;
        let digest = module.digest_bytes(&document.to_bytes());
        Ok(document::citation(&module.get_protocol(), tag, version, digest))
    }

    /// Generate the notary's key pair and return the corresponding *unsigned*
    /// certificate component. Legal only in `limited`.
    ///
    /// The caller either notarizes the component right back through this
    /// notary (the self-signing path) or has it signed externally; either
    /// way, the signed form then goes to [`activate_key`](Self::activate_key).
    pub fn generate_key(&mut self) -> Result<Catalog> {
        let next = self.check_event(NotaryEvent::GenerateKey)?;
        let public_key = self.active_mut()?.generate_keys()?;
        let protocol = self.active()?.get_protocol();
        let component = document::certificate_component(
            &protocol,
            &self.account,
            public_key,
            Tag::random(),
            Version::initial(),
            Value::None,
        );
        let config = self.config_mut()?;
        config.certificate = Some(component.clone());
        config.citation = None;
        config.state = next;
        self.persist()?;
        Ok(component)
    }

    /// Accept the signed form of the certificate produced by
    /// [`generate_key`](Self::generate_key), store it along with a fresh
    /// citation to it, and move to `enabled`. Returns the citation.
    pub fn activate_key(&mut self, certificate: &Catalog) -> Result<Catalog> {
        let next = self.check_event(NotaryEvent::ActivateKey)?;
        document::validate_notarized_document(certificate, "activateKey")?;
        let component = document::embedded_component(certificate, "activateKey")?;
        document::validate_certificate_component(component, "activateKey")?;
        match self.config_mut()?.certificate {
            Some(ref pending) if pending == component => {}
            _ => return Err(Error::InvalidCertificate),
        }
        let citation = self.cite(certificate, "activateKey")?;
        let config = self.config_mut()?;
        config.certificate = Some(certificate.clone());
        config.citation = Some(citation.clone());
        config.state = next;
        self.persist()?;
        Ok(citation)
    }

    /// The citation to the current certificate. Legal only in `enabled`.
    pub fn get_citation(&mut self) -> Result<Catalog> {
        self.check_event(NotaryEvent::GetCitation)?;
        self.config_mut()?.citation.clone().ok_or_else(|| {
            Error::unexpected(MODULE, "getCitation", "the notary is enabled but has no citation")
        })
    }

    /// Wrap `component` in a notarized document signed by the account's
    /// current key. The component must carry the `$tag`, `$version`,
    /// `$permissions`, and `$previous` parameters.
    ///
    /// In `pending` the document's `$certificate` is `none` and the notary is
    /// signing its own brand-new certificate; in `enabled` it is the citation
    /// to the current certificate.
    pub fn notarize_component(&mut self, component: Catalog) -> Result<Catalog> {
        self.check_event(NotaryEvent::NotarizeComponent)?;
        document::validate_component(&component, "notarizeComponent")?;
        let certificate = match self.config_mut()?.citation {
            Some(ref citation) => Value::Catalog(citation.clone()),
            None => Value::None,
        };
        let protocol = self.active()?.get_protocol();
        let mut notarized = document::unsigned_document(&protocol, component, certificate);
        let bytes = notarized.to_bytes();
        let signature = self.active_mut()?.sign_bytes(&bytes)?;
        notarized.set(document::SIGNATURE, Value::Binary(signature));
        Ok(notarized)
    }

    /// Whether `document`'s signature verifies under the public key certified
    /// by `certificate` (itself a notarized certificate). The signed payload
    /// is the document with its `$signature` removed.
    pub fn valid_document(&self, document: &Catalog, certificate: &Catalog) -> Result<bool> {
        document::validate_notarized_document(document, "validDocument")?;
        document::validate_notarized_document(certificate, "validDocument")?;
        let certified = document::embedded_component(certificate, "validDocument")?;
        document::validate_certificate_component(certified, "validDocument")?;
        let protocol = document::attribute_protocol(certified, "validDocument")?;
        let module = self.module_for(protocol)?;
        let public_key = document::attribute_public_key(certified, "validDocument")?;
        let signature = document::document_signature(document, "validDocument")?;
        let bytes = document::unsigned_copy(document).to_bytes();
        module.valid_signature(public_key, signature, &bytes)
    }

    /// A citation to `document`: tag and version from the embedded component,
    /// digest over the document's full canonical bytes (signature included),
    /// protocol and timestamp from right now.
    pub fn cite_document(&self, document: &Catalog) -> Result<Catalog> {
        document::validate_notarized_document(document, "citeDocument")?;
        self.cite(document, "citeDocument")
    }

    /// Whether `citation` actually cites `document`: the digest of the
    /// document's canonical bytes, computed under the citation's protocol,
    /// must match bytewise. Any reserialization difference is a mismatch.
    pub fn citation_matches(&self, citation: &Catalog, document: &Catalog) -> Result<bool> {
        document::validate_citation(citation, "citationMatches")?;
        document::validate_notarized_document(document, "citationMatches")?;
        let protocol = document::attribute_protocol(citation, "citationMatches")?;
        let module = self.module_for(protocol)?;
        let digest = module.digest_bytes(&document.to_bytes());
        let expected = document::attribute_digest(citation, "citationMatches")?;
        Ok(digest == *expected)
    }

    /// Rotate the signing key and return the new notarized certificate,
    /// signed by the key it replaces. The new certificate's component carries
    /// the same `$tag`, the successor `$version`, and the citation to the
    /// current certificate as `$previous`. Legal only in `enabled`.
    pub fn refresh_key(&mut self) -> Result<Catalog> {
        let next = self.check_event(NotaryEvent::RefreshKey)?;
        let (tag, version, citation) = {
            let config = self.config_mut()?;
            let citation = config.citation.clone().ok_or_else(|| {
                Error::unexpected(MODULE, "refreshKey", "the notary is enabled but has no citation")
            })?;
            let current = config.certificate.clone().ok_or_else(|| {
                Error::unexpected(MODULE, "refreshKey", "the notary is enabled but has no certificate")
            })?;
            let component = document::embedded_component(&current, "refreshKey")?;
            let tag = document::parameter_tag(component, "refreshKey")?.clone();
            let version = document::parameter_version(component, "refreshKey")?.next();
            (tag, version, citation)
        };
        let public_key = self.active_mut()?.rotate_keys()?;
        let protocol = self.active()?.get_protocol();
        let component = document::certificate_component(
            &protocol,
            &self.account,
            public_key,
            tag,
            version,
            Value::Catalog(citation.clone()),
        );
        let mut certificate =
            document::unsigned_document(&protocol, component, Value::Catalog(citation));
        let bytes = certificate.to_bytes();
        // the security module signs this one with the retiring key, which is
        // the chain link between the old certificate and the new one
        let signature = self.active_mut()?.sign_bytes(&bytes)?;
        certificate.set(document::SIGNATURE, Value::Binary(signature));
        let new_citation = self.cite(&certificate, "refreshKey")?;
        let config = self.config_mut()?;
        config.certificate = Some(certificate.clone());
        config.citation = Some(new_citation);
        config.state = next;
        self.persist()?;
        Ok(certificate)
    }

    /// Erase all key material and configuration, for the security module and
    /// the notary both. Always legal. The next operation starts over from
    /// `limited`.
    pub fn forget_key(&mut self) -> Result<()> {
        self.active_mut()?.erase_keys()?;
        self.store.delete()?;
        self.config = None;
        Ok(())
    }
}
