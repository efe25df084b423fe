//! XML property-list reading.
//!
//! Preference domains are exported with `defaults export <domain> -` and
//! binary `Info.plist` files are converted with `plutil -convert xml1`, so a
//! single XML reader covers every plist the checks look at.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use compliance::CommandRunner;
use regex::Regex;
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub enum PlistValue {
    String(String),
    Integer(i64),
    Real(f64),
    Bool(bool),
    Date(String),
    Data(String),
    Array(Vec<PlistValue>),
    Dict(BTreeMap<String, PlistValue>),
}

impl PlistValue {
    pub fn get(&self, key: &str) -> Option<&PlistValue> {
        match self {
            Self::Dict(map) => map.get(key),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Integers count as booleans, the way `defaults` stores most flags.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            Self::Integer(n) => Some(*n != 0),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(n) => Some(*n),
            Self::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[PlistValue]> {
        match self {
            Self::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Date(raw) => DateTime::parse_from_rfc3339(raw.trim())
                .ok()
                .map(|d| d.with_timezone(&Utc)),
            _ => None,
        }
    }
}

#[derive(Debug, PartialEq)]
enum Token {
    Open(String),
    Close(String),
    Empty(String),
    Text(String),
}

static TAG: OnceLock<Option<Regex>> = OnceLock::new();

fn tag_regex() -> Option<&'static Regex> {
    TAG.get_or_init(|| {
        Regex::new(r"(?s)<!--.*?-->|<!\[CDATA\[(.*?)\]\]>|<(/?)([A-Za-z0-9]+)[^>]*?(/?)>|([^<]+)").ok()
    })
    .as_ref()
}

fn unescape(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

fn tokenize(xml: &str) -> Vec<Token> {
    let Some(tag) = tag_regex() else {
        return Vec::new();
    };
    let body = xml.find("<plist").map_or(xml, |start| &xml[start..]);
    // Comments match no group and drop out.
    tag.captures_iter(body)
        .filter_map(|caps| {
            if let Some(cdata) = caps.get(1) {
                return Some(Token::Text(cdata.as_str().to_string()));
            }
            if let Some(text) = caps.get(5) {
                return Some(Token::Text(unescape(text.as_str())));
            }
            let name = caps.get(3)?.as_str().to_string();
            let closing = caps.get(2).is_some_and(|m| !m.as_str().is_empty());
            let empty = caps.get(4).is_some_and(|m| !m.as_str().is_empty());
            Some(match (closing, empty) {
                (true, _) => Token::Close(name),
                (false, true) => Token::Empty(name),
                (false, false) => Token::Open(name),
            })
        })
        .collect()
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&mut self) -> Option<&Token> {
        while let Some(Token::Text(text)) = self.tokens.get(self.pos) {
            if !text.trim().is_empty() {
                break;
            }
            self.pos += 1;
        }
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<&Token> {
        self.peek()?;
        self.pos += 1;
        self.tokens.get(self.pos - 1)
    }

    fn text_until(&mut self, tag: &str) -> Option<String> {
        let mut text = String::new();
        loop {
            match self.tokens.get(self.pos)? {
                Token::Text(chunk) => text.push_str(chunk),
                Token::Close(name) if name == tag => {
                    self.pos += 1;
                    return Some(text);
                }
                _ => return None,
            }
            self.pos += 1;
        }
    }

    fn value(&mut self) -> Option<PlistValue> {
        let tag = match self.next()? {
            Token::Empty(tag) => {
                return match tag.as_str() {
                    "true" => Some(PlistValue::Bool(true)),
                    "false" => Some(PlistValue::Bool(false)),
                    "string" => Some(PlistValue::String(String::new())),
                    "array" => Some(PlistValue::Array(Vec::new())),
                    "dict" => Some(PlistValue::Dict(BTreeMap::new())),
                    _ => None,
                };
            }
            Token::Open(tag) => tag.clone(),
            _ => return None,
        };

        match tag.as_str() {
            "plist" => self.value(),
            "dict" => {
                let mut map = BTreeMap::new();
                loop {
                    match self.next()? {
                        Token::Close(name) if name == "dict" => break,
                        Token::Open(name) if name == "key" => {}
                        _ => return None,
                    }
                    let key = self.text_until("key")?;
                    let value = self.value()?;
                    map.insert(key, value);
                }
                Some(PlistValue::Dict(map))
            }
            "array" => {
                let mut items = Vec::new();
                loop {
                    if matches!(self.peek()?, Token::Close(name) if name == "array") {
                        self.pos += 1;
                        break;
                    }
                    items.push(self.value()?);
                }
                Some(PlistValue::Array(items))
            }
            "string" => self.text_until("string").map(PlistValue::String),
            "date" => self.text_until("date").map(PlistValue::Date),
            "data" => self
                .text_until("data")
                .map(|raw| PlistValue::Data(raw.split_whitespace().collect())),
            "integer" => self
                .text_until("integer")
                .and_then(|raw| raw.trim().parse().ok())
                .map(PlistValue::Integer),
            "real" => self
                .text_until("real")
                .and_then(|raw| raw.trim().parse().ok())
                .map(PlistValue::Real),
            "true" | "false" => {
                self.text_until(&tag)?;
                Some(PlistValue::Bool(tag == "true"))
            }
            _ => None,
        }
    }
}

/// Parses an XML property list. `None` for anything malformed.
pub fn parse_xml(xml: &str) -> Option<PlistValue> {
    Parser {
        tokens: tokenize(xml),
        pos: 0,
    }
    .value()
}

/// Exports a preference domain (or plist path without `.plist`) as XML and
/// parses it.
pub fn read_domain(runner: &dyn CommandRunner, domain: &str) -> Option<PlistValue> {
    let args = ["export".to_string(), domain.to_string(), "-".to_string()];
    match runner.output("/usr/bin/defaults", &args) {
        Ok(xml) => parse_xml(&xml),
        Err(err) => {
            debug!(domain, error = %err, "defaults export failed");
            None
        }
    }
}

/// Reads a plist file in any on-disk format. XML files are parsed
/// directly, everything else goes through `plutil`.
pub fn read_file(runner: &dyn CommandRunner, path: &std::path::Path) -> Option<PlistValue> {
    if let Ok(text) = std::fs::read_to_string(path) {
        if let Some(value) = parse_xml(&text) {
            return Some(value);
        }
    }
    let args = [
        "-convert".to_string(),
        "xml1".to_string(),
        "-o".to_string(),
        "-".to_string(),
        path.display().to_string(),
    ];
    match runner.output("/usr/bin/plutil", &args) {
        Ok(xml) => parse_xml(&xml),
        Err(err) => {
            debug!(path = %path.display(), error = %err, "plutil conversion failed");
            None
        }
    }
}
