//! The three document shapes the notary produces and consumes — certificate
//! components, notarized documents, and citations — as plain catalogs, plus
//! the structural validators that guard every operation's inputs.
//!
//! There are deliberately no per-document structs here: canonical
//! serialization (and therefore every digest and signature) depends on the
//! catalog's ordering rules, so documents stay catalogs and this module
//! provides the builders and typed accessors around them.

use crate::{
    error::{Error, Result},
    notary::MODULE,
    value::{Binary, Catalog, Moment, Name, Tag, Value, Version},
};

// attribute keys
pub const ACCOUNT: &str = "$account";
pub const CERTIFICATE: &str = "$certificate";
pub const COMPONENT: &str = "$component";
pub const DIGEST: &str = "$digest";
pub const PROTOCOL: &str = "$protocol";
pub const PUBLIC_KEY: &str = "$publicKey";
pub const SIGNATURE: &str = "$signature";
pub const TIMESTAMP: &str = "$timestamp";

// parameter keys
pub const PERMISSIONS: &str = "$permissions";
pub const PREVIOUS: &str = "$previous";
pub const TAG: &str = "$tag";
pub const TYPE: &str = "$type";
pub const VERSION: &str = "$version";

fn notary_type(kind: &str, protocol: &Version) -> Name {
    Name::new(vec![
        "bali".to_string(),
        "notary".to_string(),
        kind.to_string(),
        protocol.to_string(),
    ])
}

/// The `$type` name of a certificate for the given protocol version.
pub fn certificate_type(protocol: &Version) -> Name {
    notary_type("Certificate", protocol)
}

/// The `$type` name of a notarized document for the given protocol version.
pub fn document_type(protocol: &Version) -> Name {
    notary_type("Document", protocol)
}

/// The `$type` name of a citation for the given protocol version.
pub fn citation_type(protocol: &Version) -> Name {
    notary_type("Citation", protocol)
}

/// The public permission set certificates are published under.
pub fn public_permissions(protocol: &Version) -> Name {
    Name::new(vec![
        "bali".to_string(),
        "permissions".to_string(),
        "public".to_string(),
        protocol.to_string(),
    ])
}

/// Assemble a certificate component: the public key bound to the account,
/// parameterized with its place in the certificate chain.
pub(crate) fn certificate_component(
    protocol: &Version,
    account: &Tag,
    public_key: Binary,
    tag: Tag,
    version: Version,
    previous: Value,
) -> Catalog {
    let mut component = Catalog::new();
    component.set(PROTOCOL, Value::Version(protocol.clone()));
    component.set(TIMESTAMP, Value::Moment(Moment::now()));
    component.set(ACCOUNT, Value::Tag(account.clone()));
    component.set(PUBLIC_KEY, Value::Binary(public_key));
    component.set_parameter(TYPE, Value::Name(certificate_type(protocol)));
    component.set_parameter(TAG, Value::Tag(tag));
    component.set_parameter(VERSION, Value::Version(version));
    component.set_parameter(PERMISSIONS, Value::Name(public_permissions(protocol)));
    component.set_parameter(PREVIOUS, previous);
    component
}

/// Assemble a notarized document around `component`, minus its `$signature`.
/// The caller serializes this, obtains the signature, and appends it.
pub(crate) fn unsigned_document(
    protocol: &Version,
    component: Catalog,
    certificate: Value,
) -> Catalog {
    let mut document = Catalog::new();
    document.set(COMPONENT, Value::Catalog(component));
    document.set(PROTOCOL, Value::Version(protocol.clone()));
    document.set(TIMESTAMP, Value::Moment(Moment::now()));
    document.set(CERTIFICATE, certificate);
    document.set_parameter(TYPE, Value::Name(document_type(protocol)));
    document
}

/// Assemble a citation for a document carrying `tag`/`version` whose
/// canonical bytes digest to `digest`.
pub(crate) fn citation(protocol: &Version, tag: Tag, version: Version, digest: Binary) -> Catalog {
    let mut citation = Catalog::new();
    citation.set(PROTOCOL, Value::Version(protocol.clone()));
    citation.set(TIMESTAMP, Value::Moment(Moment::now()));
    citation.set(TAG, Value::Tag(tag));
    citation.set(VERSION, Value::Version(version));
    citation.set(DIGEST, Value::Binary(digest));
    citation.set_parameter(TYPE, Value::Name(citation_type(protocol)));
    citation
}

/// A copy of a notarized document with the `$signature` attribute absent:
/// exactly the bytes the signature was computed over.
pub(crate) fn unsigned_copy(document: &Catalog) -> Catalog {
    let mut copy = document.clone();
    copy.remove(SIGNATURE);
    copy
}

fn invalid(procedure: &'static str, text: String) -> Error {
    Error::InvalidParameter {
        module: MODULE,
        procedure,
        text,
    }
}

fn check_keys(
    entries: &[(String, Value)],
    expected: &[&str],
    what: &str,
    procedure: &'static str,
) -> Result<()> {
    let keys: Vec<&str> = entries.iter().map(|(k, _)| k.as_str()).collect();
    if keys != expected {
        return Err(invalid(
            procedure,
            format!("{} must carry exactly {:?}, found {:?}", what, expected, keys),
        ));
    }
    Ok(())
}

fn require<'a, T>(
    value: Option<&'a Value>,
    accessor: fn(&Value) -> Option<&T>,
    what: &str,
    procedure: &'static str,
) -> Result<&'a T> {
    value
        .and_then(|v| accessor(v))
        .ok_or_else(|| invalid(procedure, format!("{} is missing or of the wrong kind", what)))
}

/// Check that `value` is a well-formed citation or the `none` sentinel.
/// Anything else is an invalid parameter.
pub fn validate_citation_slot(value: &Value, procedure: &'static str) -> Result<()> {
    match value {
        Value::None => Ok(()),
        Value::Catalog(catalog) => validate_citation(catalog, procedure),
        _ => Err(invalid(
            procedure,
            "a citation slot holds either a citation or none".into(),
        )),
    }
}

/// Check the structure of a citation: its five attributes, and its `$type`.
pub fn validate_citation(citation: &Catalog, procedure: &'static str) -> Result<()> {
    check_keys(
        citation.attributes(),
        &[PROTOCOL, TIMESTAMP, TAG, VERSION, DIGEST],
        "a citation",
        procedure,
    )?;
    let protocol = require(citation.get(PROTOCOL), Value::as_version, "$protocol", procedure)?;
    require(citation.get(TIMESTAMP), Value::as_moment, "$timestamp", procedure)?;
    require(citation.get(TAG), Value::as_tag, "$tag", procedure)?;
    require(citation.get(VERSION), Value::as_version, "$version", procedure)?;
    require(citation.get(DIGEST), Value::as_binary, "$digest", procedure)?;
    check_keys(citation.parameters(), &[TYPE], "a citation's parameters", procedure)?;
    let kind = require(citation.get_parameter(TYPE), Value::as_name, "$type", procedure)?;
    if *kind != citation_type(protocol) {
        return Err(invalid(
            procedure,
            format!("a citation's $type cannot be {}", kind),
        ));
    }
    Ok(())
}

/// Check the structure of a certificate component: its four attributes, its
/// five parameters, and the chain slot.
pub fn validate_certificate_component(component: &Catalog, procedure: &'static str) -> Result<()> {
    check_keys(
        component.attributes(),
        &[PROTOCOL, TIMESTAMP, ACCOUNT, PUBLIC_KEY],
        "a certificate",
        procedure,
    )?;
    let protocol = require(component.get(PROTOCOL), Value::as_version, "$protocol", procedure)?;
    require(component.get(TIMESTAMP), Value::as_moment, "$timestamp", procedure)?;
    require(component.get(ACCOUNT), Value::as_tag, "$account", procedure)?;
    require(component.get(PUBLIC_KEY), Value::as_binary, "$publicKey", procedure)?;

    check_keys(
        component.parameters(),
        &[TYPE, TAG, VERSION, PERMISSIONS, PREVIOUS],
        "a certificate's parameters",
        procedure,
    )?;
    let kind = require(component.get_parameter(TYPE), Value::as_name, "$type", procedure)?;
    if *kind != certificate_type(protocol) {
        return Err(invalid(
            procedure,
            format!("a certificate's $type cannot be {}", kind),
        ));
    }
    require(component.get_parameter(TAG), Value::as_tag, "$tag", procedure)?;
    require(component.get_parameter(VERSION), Value::as_version, "$version", procedure)?;
    let permissions = require(
        component.get_parameter(PERMISSIONS),
        Value::as_name,
        "$permissions",
        procedure,
    )?;
    if *permissions != public_permissions(protocol) {
        return Err(invalid(
            procedure,
            format!("a certificate must be public, not {}", permissions),
        ));
    }
    match component.get_parameter(PREVIOUS) {
        Some(previous) => validate_citation_slot(previous, procedure),
        None => Err(invalid(procedure, "$previous is missing".into())),
    }
}

/// Check the structure of a notarized document: its five attributes, its
/// `$type`, and the chain parameters of the embedded component.
pub fn validate_notarized_document(document: &Catalog, procedure: &'static str) -> Result<()> {
    check_keys(
        document.attributes(),
        &[COMPONENT, PROTOCOL, TIMESTAMP, CERTIFICATE, SIGNATURE],
        "a notarized document",
        procedure,
    )?;
    let component = require(document.get(COMPONENT), Value::as_catalog, "$component", procedure)?;
    let protocol = require(document.get(PROTOCOL), Value::as_version, "$protocol", procedure)?;
    require(document.get(TIMESTAMP), Value::as_moment, "$timestamp", procedure)?;
    match document.get(CERTIFICATE) {
        Some(certificate) => validate_citation_slot(certificate, procedure)?,
        None => return Err(invalid(procedure, "$certificate is missing".into())),
    }
    require(document.get(SIGNATURE), Value::as_binary, "$signature", procedure)?;

    check_keys(
        document.parameters(),
        &[TYPE],
        "a notarized document's parameters",
        procedure,
    )?;
    let kind = require(document.get_parameter(TYPE), Value::as_name, "$type", procedure)?;
    if *kind != document_type(protocol) {
        return Err(invalid(
            procedure,
            format!("a notarized document's $type cannot be {}", kind),
        ));
    }

    // the embedded component must carry its own chain parameters
    for key in [TAG, VERSION, PERMISSIONS, PREVIOUS] {
        if component.get_parameter(key).is_none() {
            return Err(invalid(
                procedure,
                format!("the notarized component is missing the {} parameter", key),
            ));
        }
    }
    Ok(())
}

/// A component is notarizable when it carries the four chain parameters.
pub fn validate_component(component: &Catalog, procedure: &'static str) -> Result<()> {
    require(component.get_parameter(TAG), Value::as_tag, "$tag", procedure)?;
    require(component.get_parameter(VERSION), Value::as_version, "$version", procedure)?;
    require(component.get_parameter(PERMISSIONS), Value::as_name, "$permissions", procedure)?;
    match component.get_parameter(PREVIOUS) {
        Some(previous) => validate_citation_slot(previous, procedure),
        None => Err(invalid(procedure, "$previous is missing".into())),
    }
}

// typed accessors for fields the notary reads back out of validated documents

pub(crate) fn embedded_component<'a>(
    document: &'a Catalog,
    procedure: &'static str,
) -> Result<&'a Catalog> {
    require(document.get(COMPONENT), Value::as_catalog, "$component", procedure)
}

pub(crate) fn document_signature<'a>(
    document: &'a Catalog,
    procedure: &'static str,
) -> Result<&'a Binary> {
    require(document.get(SIGNATURE), Value::as_binary, "$signature", procedure)
}

pub(crate) fn attribute_protocol<'a>(
    catalog: &'a Catalog,
    procedure: &'static str,
) -> Result<&'a Version> {
    require(catalog.get(PROTOCOL), Value::as_version, "$protocol", procedure)
}

pub(crate) fn attribute_public_key<'a>(
    component: &'a Catalog,
    procedure: &'static str,
) -> Result<&'a Binary> {
    require(component.get(PUBLIC_KEY), Value::as_binary, "$publicKey", procedure)
}

pub(crate) fn attribute_digest<'a>(
    citation: &'a Catalog,
    procedure: &'static str,
) -> Result<&'a Binary> {
    require(citation.get(DIGEST), Value::as_binary, "$digest", procedure)
}

pub(crate) fn parameter_tag<'a>(catalog: &'a Catalog, procedure: &'static str) -> Result<&'a Tag> {
    require(catalog.get_parameter(TAG), Value::as_tag, "$tag", procedure)
}

pub(crate) fn parameter_version<'a>(
    catalog: &'a Catalog,
    procedure: &'static str,
) -> Result<&'a Version> {
    require(catalog.get_parameter(VERSION), Value::as_version, "$version", procedure)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v2() -> Version {
        Version::new(vec![2])
    }

    fn sample_component() -> Catalog {
        certificate_component(
            &v2(),
            &Tag::random(),
            Binary::new(vec![7u8; 32]),
            Tag::random(),
            Version::initial(),
            Value::None,
        )
    }

    fn sample_document() -> Catalog {
        let mut document = unsigned_document(&v2(), sample_component(), Value::None);
        document.set(SIGNATURE, Value::Binary(Binary::new(vec![9u8; 64])));
        document
    }

    fn sample_citation() -> Catalog {
        citation(
            &v2(),
            Tag::random(),
            Version::initial(),
            Binary::new(vec![3u8; 64]),
        )
    }

    #[test]
    fn built_shapes_validate() {
        validate_certificate_component(&sample_component(), "test").unwrap();
        validate_notarized_document(&sample_document(), "test").unwrap();
        validate_citation(&sample_citation(), "test").unwrap();
        validate_citation_slot(&Value::None, "test").unwrap();
        validate_citation_slot(&Value::Catalog(sample_citation()), "test").unwrap();
    }

    #[test]
    fn certificate_rejects_missing_attribute() {
        let mut component = sample_component();
        component.remove(ACCOUNT);
        assert!(validate_certificate_component(&component, "test").is_err());
    }

    #[test]
    fn certificate_rejects_extra_attribute() {
        let mut component = sample_component();
        component.set("$nickname", Value::Text("slick".into()));
        assert!(validate_certificate_component(&component, "test").is_err());
    }

    #[test]
    fn certificate_rejects_misordered_attributes() {
        let original = sample_component();
        let mut shuffled = Catalog::new();
        // same entries, reversed order: not the same certificate
        for (key, value) in original.attributes().iter().rev() {
            shuffled.set(key, value.clone());
        }
        for (key, value) in original.parameters() {
            shuffled.set_parameter(key, value.clone());
        }
        assert!(validate_certificate_component(&shuffled, "test").is_err());
    }

    #[test]
    fn certificate_rejects_wrong_type_name() {
        let mut component = sample_component();
        component.set_parameter(TYPE, Value::Name(document_type(&v2())));
        assert!(validate_certificate_component(&component, "test").is_err());
    }

    #[test]
    fn citation_slot_rejects_other_values() {
        let err = validate_citation_slot(&Value::Text("not a citation".into()), "test")
            .err()
            .unwrap();
        assert!(matches!(err, Error::InvalidParameter { .. }));
    }

    #[test]
    fn document_rejects_component_without_chain_parameters() {
        let mut bare = Catalog::new();
        bare.set("$text", Value::Text("unparameterized".into()));
        let mut document = unsigned_document(&v2(), bare, Value::None);
        document.set(SIGNATURE, Value::Binary(Binary::new(vec![9u8; 64])));
        assert!(validate_notarized_document(&document, "test").is_err());
    }

    #[test]
    fn unsigned_copy_strips_only_the_signature() {
        let document = sample_document();
        let copy = unsigned_copy(&document);
        assert!(copy.get(SIGNATURE).is_none());
        assert_eq!(copy.len(), document.len() - 1);
        assert_eq!(copy.get_parameter(TYPE), document.get_parameter(TYPE));
    }

    #[test]
    fn citation_rejects_wrong_protocol_in_type() {
        let mut cite = sample_citation();
        cite.set(PROTOCOL, Value::Version(Version::new(vec![3])));
        // $type still names v2, so the catalog is inconsistent
        assert!(validate_citation(&cite, "test").is_err());
    }
}
