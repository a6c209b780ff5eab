//! Shared fixtures for the test modules: scratch-directory notaries and a
//! ready-made user component worth notarizing.

use crate::{
    notary::{document, DigitalNotary},
    value::{Catalog, Tag, Value, Version},
};

/// A fresh notary for a random account, persisting into a scratch directory.
/// Keep the `TempDir` alive for as long as the notary is in use.
pub(crate) fn tmp_notary() -> (tempfile::TempDir, DigitalNotary) {
    let dir = tempfile::tempdir().unwrap();
    let notary = DigitalNotary::with_directory(Tag::random(), dir.path());
    (dir, notary)
}

/// A notary that has already generated, self-signed, and activated its key,
/// along with the signed certificate and its citation.
pub(crate) fn activated_notary() -> (tempfile::TempDir, DigitalNotary, Catalog, Catalog) {
    let (dir, mut notary) = tmp_notary();
    let component = notary.generate_key().unwrap();
    let certificate = notary.notarize_component(component).unwrap();
    let citation = notary.activate_key(&certificate).unwrap();
    (dir, notary, certificate, citation)
}

/// A user component carrying the four chain parameters every notarizable
/// component needs.
pub(crate) fn sample_component() -> Catalog {
    let mut component = Catalog::new();
    component.set("$text", Value::Text("the lease on the lighthouse".into()));
    component.set_parameter("$tag", Value::Tag(Tag::random()));
    component.set_parameter("$version", Value::Version(Version::initial()));
    component.set_parameter(
        "$permissions",
        Value::Name(document::public_permissions(&Version::new(vec![2]))),
    );
    component.set_parameter("$previous", Value::None);
    component
}
