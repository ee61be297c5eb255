// Copyright 2014-2015 Galen Clark Haynes
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

// Rust XML-RPC library

//! Structural parse of XML-RPC documents into [`Envelope`]s of [`Value`]s.
//!
//! The body is first transcoded to UTF-8 (charset taken from the HTTP header,
//! else from the `<?xml encoding="…"?>` prolog, else UTF-8), then walked as a
//! stream of xml-rs events. Every structural problem, including bad charsets,
//! comes back as the `DECODE` fault.

use std::borrow::Cow;
use std::fmt;
use std::sync::LazyLock;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use encoding_rs::{Encoding, UTF_8};
use regex::{bytes, Regex};
use xml::reader::{EventReader, XmlEvent};
use xml::ParserConfig;

use crate::error::{Error, Result};
use crate::xmlrpc::fault;
use crate::xmlrpc::value::{DateTime, Value};

/// Nesting limit for `<value>` elements.
pub const MAX_DEPTH: usize = 128;

static PROLOG_ENCODING: LazyLock<bytes::Regex> = LazyLock::new(|| {
    bytes::Regex::new(r#"(?i)^\s*<\?xml[^>]*?encoding\s*=\s*["']([^"']+)["']"#).expect("prolog encoding regex")
});

static PROLOG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)^\s*<\?xml.*?\?>").expect("prolog regex"));

static CONTENT_TYPE_CHARSET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)charset\s*=\s*"?([^";\s]+)"?"#).expect("charset regex"));

/// A `<methodCall>` or `<methodResponse>` before projection onto host types.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Envelope {
    pub method_name: Option<String>,
    pub params: Vec<Value>,
    pub fault: Option<Value>,
}

/// Extracts the `charset` parameter of a `Content-Type` header value.
pub fn charset_from_content_type(content_type: &str) -> Option<&str> {
    CONTENT_TYPE_CHARSET
        .captures(content_type)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// Decodes `body` to text and drops the `<?xml …?>` declaration.
///
/// `charset` overrides whatever the prolog declares.
pub fn transcode<'a>(body: &'a [u8], charset: Option<&str>) -> Result<Cow<'a, str>> {
    let declared = match charset {
        Some(label) => Some(label.to_string()),
        None => PROLOG_ENCODING
            .captures(body)
            .map(|c| String::from_utf8_lossy(&c[1]).into_owned()),
    };
    let encoding = match declared {
        Some(ref label) => match Encoding::for_label(label.trim().as_bytes()) {
            Some(encoding) => encoding,
            None => {
                debug!("unknown charset {:?}", label);
                return Err(Error::Fault(fault::DECODE));
            }
        },
        None => UTF_8,
    };
    let (text, actual, malformed) = encoding.decode(body);
    if malformed {
        debug!("body is not valid {}", actual.name());
        return Err(Error::Fault(fault::DECODE));
    }
    trace!("decoded {} bytes as {}", body.len(), actual.name());
    Ok(strip_prolog(text))
}

fn strip_prolog(text: Cow<str>) -> Cow<str> {
    let end = match PROLOG.find(&text) {
        Some(m) => m.end(),
        None => return text,
    };
    match text {
        Cow::Borrowed(s) => Cow::Borrowed(&s[end..]),
        Cow::Owned(mut s) => {
            s.drain(..end);
            Cow::Owned(s)
        }
    }
}

/// Transcodes and parses a whole document.
pub fn parse(body: &[u8], charset: Option<&str>) -> Result<Envelope> {
    let text = transcode(body, charset)?;
    parse_text(&text)
}

/// Parses an already transcoded document (no prolog).
pub fn parse_text(text: &str) -> Result<Envelope> {
    Builder::new(text).build()
}

/// Pulls the `<methodName>` out of a `<methodCall>`.
///
/// The rest of the document is only checked for well-formedness; parameter
/// values are left for a later, typed decode.
pub fn parse_method_name(text: &str) -> Result<String> {
    let mut builder = Builder::new(text);
    builder.expect_start(Tag::MethodCall)?;
    builder.expect_start(Tag::MethodName)?;
    let name = builder.text(Tag::MethodName)?;
    builder.skip_to_eof()?;
    Ok(name.trim().to_string())
}

/// Parses a lone `<value>` element.
pub fn parse_value(xml: &[u8]) -> Result<Value> {
    let text = std::str::from_utf8(xml).map_err(|e| {
        debug!("value is not utf-8: {}", e);
        Error::Fault(fault::DECODE)
    })?;
    let mut builder = Builder::new(text);
    builder.expect_start(Tag::Value)?;
    let value = builder.value()?;
    builder.expect_eof()?;
    match builder.deferred {
        Some(err) => Err(err),
        None => Ok(value),
    }
}

#[derive(Clone, Debug, PartialEq)]
enum Tag {
    MethodCall,
    MethodResponse,
    MethodName,
    Params,
    Param,
    Fault,
    Struct,
    Member,
    Name,
    Value,
    Array,
    Data,
    Boolean,
    Int, // <int>, <i4> or <i8>
    Double,
    String,
    DateTime,
    Base64,
    Nil,
    Unknown(String),
}

impl Tag {
    fn from_name(name: &str) -> Tag {
        match name {
            "methodCall" => Tag::MethodCall,
            "methodResponse" => Tag::MethodResponse,
            "methodName" => Tag::MethodName,
            "params" => Tag::Params,
            "param" => Tag::Param,
            "fault" => Tag::Fault,
            "struct" => Tag::Struct,
            "member" => Tag::Member,
            "name" => Tag::Name,
            "value" => Tag::Value,
            "array" => Tag::Array,
            "data" => Tag::Data,
            "boolean" => Tag::Boolean,
            "int" | "i4" | "i8" => Tag::Int,
            "double" => Tag::Double,
            "string" => Tag::String,
            "dateTime.iso8601" => Tag::DateTime,
            "base64" => Tag::Base64,
            "nil" => Tag::Nil,
            other => Tag::Unknown(other.to_string()),
        }
    }
}

#[derive(Debug, PartialEq)]
enum Token {
    Start(Tag),
    End(Tag),
    Text(String),
    Eof,
}

fn unexpected<D: fmt::Debug>(found: &Token, wanted: D) -> Error {
    debug!("malformed xml-rpc: expected {:?}, got {:?}", wanted, found);
    Error::Fault(fault::DECODE)
}

fn invalid<E: fmt::Display>(kind: &str, text: &str, err: E) -> Error {
    Error::Fault(fault::INVALID_PARAMS.with_detail(format!("bad {} {:?}: {}", kind, text, err)))
}

fn parse_bool(text: &str) -> Option<bool> {
    match text {
        "1" | "true" | "TRUE" | "True" => Some(true),
        "0" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}

struct Builder<'a> {
    parser: EventReader<&'a [u8]>,
    depth: usize,
    // inside <fault>: unparseable scalars keep their raw text
    in_fault: bool,
    // first scalar parse failure, reported once the document is known to carry no fault
    deferred: Option<Error>,
}

impl<'a> Builder<'a> {
    fn new(text: &'a str) -> Builder<'a> {
        let config = ParserConfig::new()
            .trim_whitespace(false)
            .whitespace_to_characters(true)
            .cdata_to_characters(true)
            .ignore_comments(true)
            .coalesce_characters(true);
        Builder {
            parser: EventReader::new_with_config(text.as_bytes(), config),
            depth: 0,
            in_fault: false,
            deferred: None,
        }
    }

    fn next_token(&mut self) -> Result<Token> {
        loop {
            let event = self.parser.next().map_err(|e| {
                debug!("malformed xml: {}", e);
                Error::Fault(fault::DECODE)
            })?;
            return Ok(match event {
                XmlEvent::StartElement { name, .. } => Token::Start(Tag::from_name(&name.local_name)),
                XmlEvent::EndElement { name } => Token::End(Tag::from_name(&name.local_name)),
                XmlEvent::Characters(s) | XmlEvent::Whitespace(s) | XmlEvent::CData(s) => Token::Text(s),
                XmlEvent::EndDocument => Token::Eof,
                _ => continue,
            });
        }
    }

    /// Next token, skipping whitespace between elements.
    fn next_tag(&mut self) -> Result<Token> {
        loop {
            match self.next_token()? {
                Token::Text(ref s) if s.trim().is_empty() => continue,
                token => return Ok(token),
            }
        }
    }

    fn expect_start(&mut self, tag: Tag) -> Result<()> {
        match self.next_tag()? {
            Token::Start(ref found) if *found == tag => Ok(()),
            token => Err(unexpected(&token, Token::Start(tag))),
        }
    }

    fn expect_end(&mut self, tag: Tag) -> Result<()> {
        match self.next_tag()? {
            Token::End(ref found) if *found == tag => Ok(()),
            token => Err(unexpected(&token, Token::End(tag))),
        }
    }

    fn expect_eof(&mut self) -> Result<()> {
        match self.next_tag()? {
            Token::Eof => Ok(()),
            token => Err(unexpected(&token, Token::Eof)),
        }
    }

    fn skip_to_eof(&mut self) -> Result<()> {
        loop {
            if let Token::Eof = self.next_token()? {
                return Ok(());
            }
        }
    }

    /// Character content up to the closing `tag`.
    fn text(&mut self, tag: Tag) -> Result<String> {
        match self.next_token()? {
            Token::Text(s) => {
                self.expect_end(tag)?;
                Ok(s)
            }
            Token::End(ref found) if *found == tag => Ok(String::new()),
            token => Err(unexpected(&token, "text")),
        }
    }

    fn build(&mut self) -> Result<Envelope> {
        let mut envelope = Envelope::default();
        match self.next_tag()? {
            Token::Start(Tag::MethodCall) => {
                let mut token = self.next_tag()?;
                if token == Token::Start(Tag::MethodName) {
                    envelope.method_name = Some(self.text(Tag::MethodName)?.trim().to_string());
                    token = self.next_tag()?;
                }
                match token {
                    Token::Start(Tag::Params) => {
                        envelope.params = self.params()?;
                        self.expect_end(Tag::MethodCall)?;
                    }
                    Token::End(Tag::MethodCall) => {}
                    token => return Err(unexpected(&token, Tag::Params)),
                }
            }
            Token::Start(Tag::MethodResponse) => loop {
                match self.next_tag()? {
                    Token::Start(Tag::Params) => envelope.params = self.params()?,
                    Token::Start(Tag::Fault) => {
                        self.expect_start(Tag::Value)?;
                        self.in_fault = true;
                        let value = self.value()?;
                        self.in_fault = false;
                        // a fault without members is no fault
                        if value.as_struct().map_or(false, |members| !members.is_empty()) {
                            envelope.fault = Some(value);
                        } else {
                            debug!("ignoring empty fault value");
                        }
                        self.expect_end(Tag::Fault)?;
                    }
                    Token::End(Tag::MethodResponse) => break,
                    token => return Err(unexpected(&token, "params or fault")),
                }
            },
            token => return Err(unexpected(&token, "methodCall or methodResponse")),
        }
        self.expect_eof()?;
        if envelope.fault.is_none() {
            if let Some(err) = self.deferred.take() {
                return Err(err);
            }
        }
        Ok(envelope)
    }

    fn defer(&mut self, err: Error) -> Value {
        if self.deferred.is_none() {
            self.deferred = Some(err);
        }
        Value::Nil
    }

    fn params(&mut self) -> Result<Vec<Value>> {
        let mut params = Vec::new();
        loop {
            match self.next_tag()? {
                Token::End(Tag::Params) => return Ok(params),
                Token::Start(Tag::Param) => {
                    self.expect_start(Tag::Value)?;
                    params.push(self.value()?);
                    self.expect_end(Tag::Param)?;
                }
                token => return Err(unexpected(&token, Tag::Param)),
            }
        }
    }

    /// Body of a `<value>` whose start tag was consumed, through `</value>`.
    fn value(&mut self) -> Result<Value> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            debug!("values nested deeper than {}", MAX_DEPTH);
            return Err(Error::Fault(fault::DECODE));
        }
        let res = self.value_body();
        self.depth -= 1;
        res
    }

    fn value_body(&mut self) -> Result<Value> {
        let tag = match self.next_token()? {
            Token::End(Tag::Value) => return Ok(Value::String(String::new())),
            Token::Start(tag) => tag,
            // untyped content is a string
            Token::Text(text) => match self.next_token()? {
                Token::End(Tag::Value) => return Ok(Value::String(text)),
                Token::Start(tag) if text.trim().is_empty() => tag,
                token => return Err(unexpected(&token, Token::End(Tag::Value))),
            },
            token => return Err(unexpected(&token, "value")),
        };
        let value = self.typed(tag)?;
        self.expect_end(Tag::Value)?;
        Ok(value)
    }

    fn scalar<T, E, F>(&mut self, tag: Tag, kind: &str, parse: F) -> Result<Value>
    where
        E: fmt::Display,
        F: FnOnce(&str) -> std::result::Result<T, E>,
        T: Into<Value>,
    {
        let text = self.text(tag)?;
        match parse(&text) {
            Ok(v) => Ok(v.into()),
            Err(_) if self.in_fault => Ok(Value::String(text)),
            Err(e) => Ok(self.defer(invalid(kind, &text, e))),
        }
    }

    fn typed(&mut self, tag: Tag) -> Result<Value> {
        match tag {
            Tag::Int => self.scalar(Tag::Int, "int", |t| t.trim().parse::<i64>()),
            Tag::Double => self.scalar(Tag::Double, "double", |t| t.trim().parse::<f64>()),
            Tag::Boolean => self.scalar(Tag::Boolean, "boolean", |t| {
                parse_bool(t.trim()).ok_or("expected 0 or 1")
            }),
            Tag::String => Ok(Value::String(self.text(Tag::String)?)),
            Tag::DateTime => self.scalar(Tag::DateTime, "dateTime.iso8601", DateTime::parse),
            Tag::Base64 => {
                let text = self.text(Tag::Base64)?;
                let packed: String = text.chars().filter(|c| !c.is_whitespace()).collect();
                match STANDARD.decode(packed) {
                    Ok(data) => Ok(Value::Base64(data)),
                    Err(e) => Ok(self.defer(invalid("base64", &text, e))),
                }
            }
            Tag::Nil => {
                self.expect_end(Tag::Nil)?;
                Ok(Value::Nil)
            }
            Tag::Struct => {
                let mut members = Vec::new();
                loop {
                    match self.next_tag()? {
                        Token::End(Tag::Struct) => return Ok(Value::Struct(members)),
                        Token::Start(Tag::Member) => {
                            self.expect_start(Tag::Name)?;
                            let name = self.text(Tag::Name)?;
                            self.expect_start(Tag::Value)?;
                            let value = self.value()?;
                            self.expect_end(Tag::Member)?;
                            members.push((name, value));
                        }
                        token => return Err(unexpected(&token, Tag::Member)),
                    }
                }
            }
            Tag::Array => {
                match self.next_tag()? {
                    Token::Start(Tag::Data) => {}
                    Token::End(Tag::Array) => return Ok(Value::Array(Vec::new())),
                    token => return Err(unexpected(&token, Tag::Data)),
                }
                let mut values = Vec::new();
                loop {
                    match self.next_tag()? {
                        Token::End(Tag::Data) => break,
                        Token::Start(Tag::Value) => values.push(self.value()?),
                        token => return Err(unexpected(&token, Tag::Value)),
                    }
                }
                self.expect_end(Tag::Array)?;
                Ok(Value::Array(values))
            }
            tag => Err(unexpected(&Token::Start(tag), "value type")),
        }
    }
}
