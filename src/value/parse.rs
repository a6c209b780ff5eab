//! A recursive-descent parser for the canonical notation. It accepts exactly
//! what the serializer in [`catalog`](crate::value::catalog) emits (plus
//! incidental whitespace between tokens) and is its inverse: parsing a
//! formatted catalog yields an equal catalog.

use crate::value::{
    catalog::{Catalog, Value},
    scalar::{Binary, Moment, Name, Symbol, Tag, Version},
};

/// Where and why parsing stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    /// Byte offset into the source text.
    pub position: usize,
    /// What the parser expected or found.
    pub message: String,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "parse error at offset {}: {}", self.position, self.message)
    }
}

impl std::error::Error for ParseError {}

type ParseResult<T> = std::result::Result<T, ParseError>;

/// Parse a complete value from its canonical form. Trailing whitespace is
/// tolerated; trailing anything else is an error.
pub fn parse(text: &str) -> ParseResult<Value> {
    let mut parser = Parser::new(text);
    parser.skip_whitespace();
    let value = parser.parse_value()?;
    parser.skip_whitespace();
    if !parser.at_end() {
        return Err(parser.error("trailing characters after the value"));
    }
    Ok(value)
}

/// Parse a catalog from its canonical form. Configuration files and wire
/// documents are all catalogs, so this is the usual entry point.
pub fn parse_catalog(text: &str) -> ParseResult<Catalog> {
    match parse(text)? {
        Value::Catalog(catalog) => Ok(catalog),
        _ => Err(ParseError {
            position: 0,
            message: "expected a catalog".into(),
        }),
    }
}

struct Parser<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(text: &'a str) -> Self {
        Self { text, pos: 0 }
    }

    fn error(&self, message: &str) -> ParseError {
        ParseError {
            position: self.pos,
            message: message.into(),
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.text.len()
    }

    fn peek(&self) -> Option<char> {
        self.text[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.bump();
            } else {
                break;
            }
        }
    }

    fn expect(&mut self, expected: char) -> ParseResult<()> {
        match self.peek() {
            Some(c) if c == expected => {
                self.bump();
                Ok(())
            }
            _ => Err(self.error(&format!("expected '{}'", expected))),
        }
    }

    /// Take the longest run of characters satisfying `keep`, starting at the
    /// current position.
    fn take_while<F: Fn(char) -> bool>(&mut self, keep: F) -> &'a str {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if keep(c) {
                self.bump();
            } else {
                break;
            }
        }
        &self.text[start..self.pos]
    }

    fn parse_value(&mut self) -> ParseResult<Value> {
        match self.peek() {
            Some('[') => Ok(Value::Catalog(self.parse_catalog()?)),
            Some('#') => self.parse_tag(),
            Some('\'') => self.parse_binary(),
            Some('<') => self.parse_moment(),
            Some('/') => self.parse_name(),
            Some('$') => self.parse_symbol().map(Value::Symbol),
            Some('"') => self.parse_text(),
            Some(c) if c.is_ascii_alphabetic() => self.parse_word(),
            _ => Err(self.error("expected a value")),
        }
    }

    fn parse_tag(&mut self) -> ParseResult<Value> {
        let start = self.pos;
        self.expect('#')?;
        self.take_while(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        let token = &self.text[start..self.pos];
        Tag::try_from(token)
            .map(Value::Tag)
            .map_err(|_| self.error("malformed tag"))
    }

    fn parse_binary(&mut self) -> ParseResult<Value> {
        let start = self.pos;
        self.expect('\'')?;
        self.take_while(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        self.expect('\'')?;
        let token = &self.text[start..self.pos];
        Binary::try_from(token)
            .map(Value::Binary)
            .map_err(|_| self.error("malformed binary"))
    }

    fn parse_moment(&mut self) -> ParseResult<Value> {
        let start = self.pos;
        self.expect('<')?;
        self.take_while(|c| c != '>');
        self.expect('>')?;
        let token = &self.text[start..self.pos];
        Moment::try_from(token)
            .map(Value::Moment)
            .map_err(|_| self.error("malformed moment"))
    }

    fn parse_name(&mut self) -> ParseResult<Value> {
        let start = self.pos;
        self.take_while(|c| c.is_ascii_alphanumeric() || c == '/' || c == '.' || c == '-');
        let token = &self.text[start..self.pos];
        Name::try_from(token)
            .map(Value::Name)
            .map_err(|_| self.error("malformed name"))
    }

    fn parse_symbol(&mut self) -> ParseResult<Symbol> {
        let start = self.pos;
        self.expect('$')?;
        self.take_while(|c| c.is_ascii_alphanumeric());
        let token = &self.text[start..self.pos];
        Symbol::try_from(token).map_err(|_| self.error("malformed symbol"))
    }

    fn parse_text(&mut self) -> ParseResult<Value> {
        self.expect('"')?;
        let mut text = String::new();
        loop {
            match self.bump() {
                Some('"') => return Ok(Value::Text(text)),
                Some('\\') => match self.bump() {
                    Some('"') => text.push('"'),
                    Some('\\') => text.push('\\'),
                    _ => return Err(self.error("unknown escape in text")),
                },
                Some('\n') | None => return Err(self.error("unterminated text")),
                Some(c) => text.push(c),
            }
        }
    }

    /// A bare word: the `none` sentinel or a version like `v2.4`.
    fn parse_word(&mut self) -> ParseResult<Value> {
        let token = self.take_while(|c| c.is_ascii_alphanumeric() || c == '.');
        if token == "none" {
            return Ok(Value::None);
        }
        Version::try_from(token)
            .map(Value::Version)
            .map_err(|_| self.error("unknown word"))
    }

    fn parse_entries(&mut self, close: char) -> ParseResult<Vec<(Symbol, Value)>> {
        let mut entries = Vec::new();
        loop {
            self.skip_whitespace();
            match self.peek() {
                Some(c) if c == close => {
                    self.bump();
                    return Ok(entries);
                }
                Some('$') => {
                    let key = self.parse_symbol()?;
                    self.skip_whitespace();
                    self.expect(':')?;
                    self.skip_whitespace();
                    let value = self.parse_value()?;
                    entries.push((key, value));
                }
                _ => return Err(self.error("expected an entry or a closing bracket")),
            }
        }
    }

    fn parse_catalog(&mut self) -> ParseResult<Catalog> {
        self.expect('[')?;
        let mut catalog = Catalog::new();
        self.skip_whitespace();
        if self.peek() == Some(':') {
            // the empty catalog, [:]
            self.bump();
            self.skip_whitespace();
            self.expect(']')?;
        } else {
            for (key, value) in self.parse_entries(']')? {
                catalog.set(&key.to_string(), value);
            }
        }
        // a parameter block binds only when it hugs the closing bracket
        if self.peek() == Some('(') {
            self.bump();
            for (key, value) in self.parse_entries(')')? {
                catalog.set_parameter(&key.to_string(), value);
            }
        }
        Ok(catalog)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalars_parse() {
        assert_eq!(parse("none").unwrap(), Value::None);
        assert_eq!(
            parse("v1.2").unwrap(),
            Value::Version(Version::new(vec![1, 2]))
        );
        assert_eq!(
            parse("/bali/permissions/public/v2").unwrap(),
            Value::Name(Name::new(vec!["bali", "permissions", "public", "v2"]))
        );
        assert_eq!(
            parse("\"plain text\"").unwrap(),
            Value::Text("plain text".into())
        );
        assert_eq!(
            parse("$enabled").unwrap(),
            Value::Symbol(Symbol::new("enabled"))
        );
        assert_eq!(
            parse("'AQID'").unwrap(),
            Value::Binary(Binary::new(vec![1, 2, 3]))
        );
    }

    #[test]
    fn rejects_trailing_garbage() {
        assert!(parse("none none").is_err());
        assert!(parse("[:] x").is_err());
    }

    #[test]
    fn rejects_malformed() {
        assert!(parse("vX").is_err());
        assert!(parse("\"unterminated").is_err());
        assert!(parse("[").is_err());
        assert!(parse("[$key]").is_err());
        assert!(parse("frobnicate").is_err());
    }

    #[test]
    fn empty_catalog() {
        let catalog = parse_catalog("[:]").unwrap();
        assert!(catalog.is_empty());
    }

    #[test]
    fn format_parse_round_trip() {
        let mut inner = Catalog::new();
        inner.set("$text", Value::Text("with \"quotes\" and \\slashes\\".into()));
        inner.set("$when", Value::Moment(Moment::now()));
        inner.set_parameter("$tag", Value::Tag(Tag::random()));
        inner.set_parameter("$version", Value::Version(Version::initial()));

        let mut outer = Catalog::new();
        outer.set("$component", Value::Catalog(inner));
        outer.set("$protocol", Value::Version(Version::new(vec![2])));
        outer.set("$previous", Value::None);
        outer.set("$publicKey", Value::Binary(Binary::new(vec![7; 32])));
        outer.set_parameter(
            "$type",
            Value::Name(Name::new(vec!["bali", "notary", "Document", "v2"])),
        );

        let text = outer.format();
        let reparsed = parse_catalog(&text).unwrap();
        assert_eq!(reparsed, outer);
        // and formatting again is byte-stable
        assert_eq!(reparsed.format(), text);
    }

    #[test]
    fn whitespace_between_tokens_tolerated() {
        let text = "[ $state :  $keyless\n\n  $previous: none ]";
        let catalog = parse_catalog(text).unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(
            catalog.get("$state").unwrap(),
            &Value::Symbol(Symbol::new("keyless"))
        );
    }
}
