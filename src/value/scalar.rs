//! The scalar inhabitants of the structured-value notation: tags, versions,
//! moments, binaries, names, and symbols.
//!
//! Each scalar owns its canonical textual form via `Display`, and can be
//! rebuilt from that form via `TryFrom<&str>`. The catalog serializer and the
//! notation parser both lean on these two impls, so the pair must stay exact
//! inverses of each other.

use crate::{
    error::{Error, Result},
    util,
};
use chrono::{DateTime, NaiveDateTime, Timelike, Utc};
use rand::{rngs::OsRng, RngCore};
use std::ops::Deref;

/// How many random bytes back a freshly minted tag.
pub const TAG_SIZE: usize = 20;

fn bad_scalar(procedure: &'static str, text: &str) -> Error {
    Error::InvalidParameter {
        module: "value",
        procedure,
        text: text.into(),
    }
}

/// A unique identifier. Tags name accounts, certificates, and security module
/// instances; equal tags mean "the same thing", so fresh tags must come from
/// [`Tag::random`].
///
/// Canonical form: `#` followed by the base64 of the tag bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag(Vec<u8>);

impl Tag {
    /// Mint a fresh tag from the OS CSPRNG.
    pub fn random() -> Self {
        let mut bytes = [0u8; TAG_SIZE];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes.to_vec())
    }

    /// Return the byte slice backing this tag.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Display for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", util::base64_encode(&self.0))
    }
}

impl TryFrom<&str> for Tag {
    type Error = Error;

    fn try_from(string: &str) -> Result<Self> {
        let encoded = string
            .strip_prefix('#')
            .ok_or_else(|| bad_scalar("parseTag", string))?;
        let bytes = util::base64_decode(encoded).map_err(|_| bad_scalar("parseTag", string))?;
        if bytes.is_empty() {
            return Err(bad_scalar("parseTag", string));
        }
        Ok(Self(bytes))
    }
}

/// A document version: one or more dot-separated integers, `v1` or `v2.4`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Version(Vec<u32>);

impl Version {
    /// The version every document chain starts from.
    pub fn initial() -> Self {
        Self(vec![1])
    }

    /// Build a version from its components, of which there must be at least
    /// one. Outside the crate a version is obtained from [`Version::initial`],
    /// [`Version::next`], or parsing, all of which uphold that invariant.
    pub(crate) fn new(components: Vec<u32>) -> Self {
        Self(components)
    }

    /// The successor of this version: the last component incremented by one.
    pub fn next(&self) -> Self {
        let mut components = self.0.clone();
        if let Some(last) = components.last_mut() {
            *last += 1;
        }
        Self(components)
    }

    pub fn components(&self) -> &[u32] {
        &self.0
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let joined = self
            .0
            .iter()
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .join(".");
        write!(f, "v{}", joined)
    }
}

impl TryFrom<&str> for Version {
    type Error = Error;

    fn try_from(string: &str) -> Result<Self> {
        let body = string
            .strip_prefix('v')
            .ok_or_else(|| bad_scalar("parseVersion", string))?;
        let components = body
            .split('.')
            .map(|c| c.parse::<u32>())
            .collect::<std::result::Result<Vec<u32>, _>>()
            .map_err(|_| bad_scalar("parseVersion", string))?;
        if components.is_empty() {
            return Err(bad_scalar("parseVersion", string));
        }
        Ok(Self(components))
    }
}

/// A point in time, pinned to the millisecond precision of the canonical
/// form so that a moment survives a round trip through text unchanged.
///
/// Canonical form: `<2026-08-02T09:41:30.517Z>`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Moment(DateTime<Utc>);

const MOMENT_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

impl Moment {
    /// The current date/time, truncated to whole milliseconds.
    pub fn now() -> Self {
        let now = Utc::now();
        let millis = now.timestamp_subsec_millis();
        Self(now.with_nanosecond(millis * 1_000_000).unwrap_or(now))
    }
}

impl Deref for Moment {
    type Target = DateTime<Utc>;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<DateTime<Utc>> for Moment {
    fn from(date: DateTime<Utc>) -> Self {
        Self(date)
    }
}

impl std::fmt::Display for Moment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<{}>", self.0.format(MOMENT_FORMAT))
    }
}

impl TryFrom<&str> for Moment {
    type Error = Error;

    fn try_from(string: &str) -> Result<Self> {
        let body = string
            .strip_prefix('<')
            .and_then(|s| s.strip_suffix('>'))
            .ok_or_else(|| bad_scalar("parseMoment", string))?;
        let naive = NaiveDateTime::parse_from_str(body, MOMENT_FORMAT)
            .map_err(|_| bad_scalar("parseMoment", string))?;
        Ok(Self(naive.and_utc()))
    }
}

/// An opaque byte string: public keys, signatures, and digests all travel as
/// binaries.
///
/// Canonical form: the base64 of the bytes in single quotes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binary(Vec<u8>);

impl Binary {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl AsRef<[u8]> for Binary {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Display for Binary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "'{}'", util::base64_encode(&self.0))
    }
}

impl TryFrom<&str> for Binary {
    type Error = Error;

    fn try_from(string: &str) -> Result<Self> {
        let encoded = string
            .strip_prefix('\'')
            .and_then(|s| s.strip_suffix('\''))
            .ok_or_else(|| bad_scalar("parseBinary", string))?;
        let bytes = util::base64_decode(encoded).map_err(|_| bad_scalar("parseBinary", string))?;
        Ok(Self(bytes))
    }
}

/// A slash-separated identifier, `/bali/notary/Certificate/v2`. Names label
/// document types and permission sets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Name(Vec<String>);

fn valid_identifier(part: &str) -> bool {
    let mut chars = part.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
}

impl Name {
    pub fn new<S: Into<String>>(parts: Vec<S>) -> Self {
        Self(parts.into_iter().map(|p| p.into()).collect())
    }

    pub fn parts(&self) -> &[String] {
        &self.0
    }
}

impl std::fmt::Display for Name {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for part in &self.0 {
            write!(f, "/{}", part)?;
        }
        Ok(())
    }
}

impl TryFrom<&str> for Name {
    type Error = Error;

    fn try_from(string: &str) -> Result<Self> {
        let body = string
            .strip_prefix('/')
            .ok_or_else(|| bad_scalar("parseName", string))?;
        let parts: Vec<String> = body.split('/').map(|p| p.to_string()).collect();
        if parts.is_empty() || !parts.iter().all(|p| valid_identifier(p)) {
            return Err(bad_scalar("parseName", string));
        }
        Ok(Self(parts))
    }
}

/// A symbol, `$keyless`. Symbols key catalog entries and name the states of
/// the two lifecycle machines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol(String);

impl Symbol {
    /// Build a symbol from its bare identifier (no leading `$`). The
    /// identifier must be valid; outside the crate a symbol is obtained by
    /// parsing, which enforces that.
    pub(crate) fn new<S: Into<String>>(identifier: S) -> Self {
        Self(identifier.into())
    }

    /// The identifier without the leading `$`.
    pub fn identifier(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "${}", self.0)
    }
}

impl TryFrom<&str> for Symbol {
    type Error = Error;

    fn try_from(string: &str) -> Result<Self> {
        let body = string
            .strip_prefix('$')
            .ok_or_else(|| bad_scalar("parseSymbol", string))?;
        if !valid_identifier(body) {
            return Err(bad_scalar("parseSymbol", string));
        }
        Ok(Self(body.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_random_round_trip() {
        let tag = Tag::random();
        assert_eq!(tag.as_bytes().len(), TAG_SIZE);
        let text = format!("{}", tag);
        assert!(text.starts_with('#'));
        let parsed = Tag::try_from(text.as_str()).unwrap();
        assert_eq!(parsed, tag);
        // two random tags colliding would mean the CSPRNG is broken
        assert!(Tag::random() != tag);
    }

    #[test]
    fn version_display_next() {
        let v1 = Version::initial();
        assert_eq!(format!("{}", v1), "v1");
        assert_eq!(format!("{}", v1.next()), "v2");
        let deep = Version::new(vec![2, 4]);
        assert_eq!(format!("{}", deep), "v2.4");
        assert_eq!(format!("{}", deep.next()), "v2.5");
        assert_eq!(Version::try_from("v2.4").unwrap(), deep);
        assert!(Version::try_from("2.4").is_err());
        assert!(Version::try_from("v2.").is_err());
    }

    #[test]
    fn moment_round_trip() {
        let now = Moment::now();
        let text = format!("{}", now);
        let parsed = Moment::try_from(text.as_str()).unwrap();
        // millisecond truncation makes the round trip exact
        assert_eq!(parsed, now);

        let fixed = Moment::try_from("<2026-08-02T09:41:30.517Z>").unwrap();
        assert_eq!(format!("{}", fixed), "<2026-08-02T09:41:30.517Z>");
    }

    #[test]
    fn binary_round_trip() {
        let bin = Binary::new(vec![1, 2, 3, 255]);
        let text = format!("{}", bin);
        assert!(text.starts_with('\'') && text.ends_with('\''));
        assert_eq!(Binary::try_from(text.as_str()).unwrap(), bin);
        assert!(Binary::try_from("missing quotes").is_err());
    }

    #[test]
    fn name_round_trip() {
        let name = Name::new(vec!["bali", "notary", "Certificate", "v2"]);
        assert_eq!(format!("{}", name), "/bali/notary/Certificate/v2");
        assert_eq!(
            Name::try_from("/bali/notary/Certificate/v2").unwrap(),
            name
        );
        assert!(Name::try_from("bali/notary").is_err());
        assert!(Name::try_from("/bali//notary").is_err());
    }

    #[test]
    fn symbol_round_trip() {
        let sym = Symbol::new("keyless");
        assert_eq!(format!("{}", sym), "$keyless");
        assert_eq!(Symbol::try_from("$keyless").unwrap(), sym);
        assert!(Symbol::try_from("keyless").is_err());
        assert!(Symbol::try_from("$9lives").is_err());
    }
}
