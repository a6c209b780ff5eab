//! Welcome to the core of the Bali digital notary.
//!
//! A digital notary manages the lifecycle of an asymmetric signing key pair
//! on behalf of a single account, uses that key to produce and verify
//! cryptographic attestations over structured documents, and produces
//! tamper-evident references ("citations") to such documents.
//!
//! Two components do the work. The [security module](crate::ssm) is the only
//! code that ever touches private key material: it generates, rotates, and
//! erases key pairs, signs and digests byte strings, and persists its own key
//! state. The [notary](crate::notary) drives the security module through a
//! higher-level lifecycle and assembles the three document shapes of the
//! protocol: certificate components, notarized documents, and citations. All
//! three are ordered [catalogs](crate::value) with a deterministic canonical
//! textual form, and every signature and digest is computed over exactly
//! those canonical bytes.
//!
//! Two rules give the system its shape:
//!
//! 1. **Self-signing.** An account's *first* certificate is signed by the key
//! it certifies, which is why a freshly generated (but not yet activated)
//! notary is still allowed to notarize.
//! 1. **The chain link.** Every *subsequent* certificate is signed by the key
//! it replaces: rotating leaves the old private key in place for exactly one
//! more signature, and that signature goes on the new certificate. A reader
//! who trusts certificate *n* can therefore verify certificate *n+1* without
//! trusting anything else.
//!
//! # Usage
//!
//! ```
//! use bali_notary::{
//!     notary::{document, DigitalNotary},
//!     value::{Catalog, Tag, Value, Version},
//! };
//!
//! // each account owns one notary; its configuration (and its security
//! // module's) lives in a directory of your choosing, ~/.bali by default
//! let scratch = tempfile::tempdir().unwrap();
//! let account = Tag::random();
//! let mut notary = DigitalNotary::with_directory(account, scratch.path());
//!
//! // first use: generate a key pair and get back the unsigned certificate
//! // component...
//! let component = notary.generate_key().unwrap();
//! // ...self-sign it (this is the one notarization allowed before
//! // activation)...
//! let certificate = notary.notarize_component(component).unwrap();
//! // ...and activate the signed form, receiving a citation to it
//! let citation = notary.activate_key(&certificate).unwrap();
//! assert_eq!(notary.get_citation().unwrap(), citation);
//!
//! // now any component carrying the chain parameters can be notarized
//! let protocol = notary.get_protocol().unwrap();
//! let mut memo = Catalog::new();
//! memo.set("$text", Value::Text("deliver the goods by tuesday".into()));
//! memo.set_parameter("$tag", Value::Tag(Tag::random()));
//! memo.set_parameter("$version", Value::Version(Version::initial()));
//! memo.set_parameter(
//!     "$permissions",
//!     Value::Name(document::public_permissions(&protocol)),
//! );
//! memo.set_parameter("$previous", Value::None);
//! let notarized = notary.notarize_component(memo).unwrap();
//!
//! // anyone holding the certificate can verify the document...
//! assert!(notary.valid_document(&notarized, &certificate).unwrap());
//! // ...and a citation pins the document down to the byte
//! let reference = notary.cite_document(&notarized).unwrap();
//! assert!(notary.citation_matches(&reference, &notarized).unwrap());
//! ```
//!
//! When the signing key has been in service long enough (or may have been
//! exposed), [`refresh_key()`](crate::notary::DigitalNotary::refresh_key)
//! rotates it and returns the next certificate in the chain, and
//! [`forget_key()`](crate::notary::DigitalNotary::forget_key) erases
//! everything and starts the account over.

pub mod error;
pub mod util;
pub mod value;
pub mod config;
pub mod ssm;
pub mod notary;

pub use error::{Error, Result};
pub use notary::DigitalNotary;
