// Copyright 2014-2015 Galen Clark Haynes
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

// Rust XML-RPC library

//! Server side codec, sitting between an HTTP stack and method handlers.
//!
//! ```text
//! new_request ─┬─> MethodKnown ── read_request ─┬─> ArgsReady
//!              │                                └─> ArgFailed
//!              └─> DecodeFailed
//!
//! any state ── write_response ──> (consumed)
//! ```
//!
//! Failures are kept in the request rather than aborting it: whatever happened,
//! `write_response` still puts a well-formed reply (possibly a `<fault>`) on
//! the wire.

use std::collections::HashMap;
use std::error::Error as StdError;
use std::io::Read;

use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::{Request, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::CodecConfig;
use crate::error::{Error, Result};
use crate::xmlrpc::fault::{self, Fault};
use crate::xmlrpc::pool::BufferPool;
use crate::xmlrpc::{decoding, parser, protocol};

pub const CONTENT_TYPE_XML: &str = "text/xml; charset=utf-8";

/// Creates [`CodecRequest`]s; shared by every request once set up.
#[derive(Debug, Default)]
pub struct Codec {
    aliases: HashMap<String, String>,
    config: CodecConfig,
    pool: BufferPool,
}

impl Codec {
    pub fn new() -> Codec {
        Codec::with_config(CodecConfig::default())
    }

    pub fn with_config(config: CodecConfig) -> Codec {
        Codec {
            aliases: HashMap::new(),
            pool: BufferPool::from_config(&config),
            config: config,
        }
    }

    /// Calls to `alias` are reported as calls to `method`.
    pub fn register_alias(&mut self, alias: &str, method: &str) {
        self.aliases.insert(alias.to_string(), method.to_string());
    }

    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    /// Reads the whole body and resolves the method name.
    pub fn new_request<B: Read>(&self, request: Request<B>) -> CodecRequest<'_> {
        let charset = request
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(parser::charset_from_content_type)
            .map(str::to_string);
        let body = request.into_body();

        match self.read_call(body, charset.as_deref()) {
            Ok((text, method)) => CodecRequest {
                codec: self,
                body: text,
                method: method,
                state: State::MethodKnown,
            },
            Err(err) => {
                let fault = err.into_fault();
                debug!("cannot read method call: {}", fault);
                CodecRequest {
                    codec: self,
                    body: String::new(),
                    method: String::new(),
                    state: State::DecodeFailed(fault),
                }
            }
        }
    }

    fn read_call<B: Read>(&self, body: B, charset: Option<&str>) -> Result<(String, String)> {
        let raw = self.read_body(body)?;
        trace!("request body: {}", String::from_utf8_lossy(&raw));
        let text = parser::transcode(&raw, charset)?.into_owned();
        let name = parser::parse_method_name(&text)?;
        let method = match self.aliases.get(&name) {
            Some(method) => {
                debug!("method alias {} -> {}", name, method);
                method.clone()
            }
            None => name,
        };
        debug!("method call {}", method);
        Ok((text, method))
    }

    fn read_body<B: Read>(&self, mut body: B) -> Result<Vec<u8>> {
        let mut raw = Vec::new();
        let read = match self.config.max_body_size {
            Some(max) => body.take(max.saturating_add(1)).read_to_end(&mut raw),
            None => body.read_to_end(&mut raw),
        };
        read.map_err(|e| Error::Fault(fault::SYSTEM_ERROR.with_detail(e)))?;
        if let Some(max) = self.config.max_body_size {
            if raw.len() as u64 > max {
                return Err(Error::Fault(
                    fault::SYSTEM_ERROR.with_detail(format!("request body exceeds {} bytes", max)),
                ));
            }
        }
        Ok(raw)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum State {
    MethodKnown,
    DecodeFailed(Fault),
    ArgsReady,
    ArgFailed(Fault),
}

/// One inbound call.
#[derive(Debug)]
pub struct CodecRequest<'a> {
    codec: &'a Codec,
    body: String,
    method: String,
    state: State,
}

impl<'a> CodecRequest<'a> {
    /// The method name after alias resolution.
    pub fn method(&self) -> Result<&str> {
        match self.state {
            State::DecodeFailed(ref fault) => Err(Error::Fault(fault.clone())),
            _ => Ok(&self.method),
        }
    }

    /// Decodes the params positionally into `T`.
    ///
    /// On failure the fault is also kept, and later sent by `write_response`.
    pub fn read_request<T: DeserializeOwned>(&mut self) -> Result<T> {
        if let State::DecodeFailed(ref fault) = self.state {
            return Err(Error::Fault(fault.clone()));
        }
        match decoding::decode_text(&self.body) {
            Ok(args) => {
                self.state = State::ArgsReady;
                Ok(args)
            }
            Err(err) => {
                let fault = err.into_fault();
                debug!("{}: cannot decode arguments: {}", self.method, fault);
                self.state = State::ArgFailed(fault.clone());
                Err(Error::Fault(fault))
            }
        }
    }

    /// The fault kept from reading the call or its arguments, if any.
    pub fn decode_error(&self) -> Option<&Fault> {
        match self.state {
            State::DecodeFailed(ref fault) | State::ArgFailed(ref fault) => Some(fault),
            _ => None,
        }
    }

    /// Writes the reply to `response`.
    ///
    /// A kept decode fault wins over `method_err`, which wins over `reply`.
    /// Handler errors that are not faults are sent as application errors.
    pub fn write_response<T: ?Sized + Serialize>(
        self,
        response: &mut Response<Vec<u8>>,
        reply: &T,
        method_err: Option<&(dyn StdError + 'static)>,
    ) -> Result<()> {
        let fault = match self.state {
            State::DecodeFailed(ref fault) | State::ArgFailed(ref fault) => Some(fault.clone()),
            _ => method_err.map(handler_fault),
        };

        let mut buf = self.codec.pool.get();
        match fault {
            Some(fault) => {
                debug!("{}: replying with fault {}", self.method, fault);
                fault::write_fault(&mut *buf, &fault)?;
            }
            None => {
                if let Err(err) = protocol::encode_method_response_into(&mut *buf, reply) {
                    let fault = err.into_fault();
                    error!("{}: cannot encode reply: {}", self.method, fault);
                    buf.clear();
                    fault::write_fault(&mut *buf, &fault)?;
                }
            }
        }
        trace!("response body: {}", String::from_utf8_lossy(&buf));

        response
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static(CONTENT_TYPE_XML));
        response.body_mut().extend_from_slice(&buf);
        Ok(())
    }
}

fn handler_fault(err: &(dyn StdError + 'static)) -> Fault {
    if let Some(fault) = err.downcast_ref::<Fault>() {
        return fault.clone();
    }
    if let Some(&Error::Fault(ref fault)) = err.downcast_ref::<Error>() {
        return fault.clone();
    }
    fault::APPLICATION_ERROR.with_detail(err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use std::io;

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn post<'b>(body: &'b [u8], content_type: &str) -> Request<&'b [u8]> {
        Request::builder()
            .method("POST")
            .uri("http://localhost:8080/")
            .header(CONTENT_TYPE, content_type)
            .body(body)
            .unwrap()
    }

    fn body_of(response: &Response<Vec<u8>>) -> &str {
        std::str::from_utf8(response.body()).unwrap()
    }

    #[derive(Serialize, Deserialize, Debug)]
    #[serde(rename_all = "PascalCase")]
    struct MultiplyArgs {
        a: i32,
        b: i32,
    }

    #[derive(Serialize)]
    struct MultiplyReply {
        result: i32,
    }

    fn call(codec: &Codec, method: &str, args: &impl Serialize) -> Response<Vec<u8>> {
        let body = protocol::encode_method_call(method, args).unwrap();
        let mut request = codec.new_request(post(&body, "text/xml"));
        let mut response = Response::new(Vec::new());
        match request.read_request::<MultiplyArgs>() {
            Ok(args) => {
                let reply = MultiplyReply { result: args.a * args.b };
                request.write_response(&mut response, &reply, None).unwrap();
            }
            Err(_) => request.write_response(&mut response, &(), None).unwrap(),
        }
        response
    }

    #[test]
    fn test_multiply() {
        init();
        let codec = Codec::new();
        let response = call(&codec, "Arith.Multiply", &MultiplyArgs { a: 4, b: 2 });
        assert_eq!(
            "<methodResponse><params><param><value><int>8</int></value></param></params></methodResponse>",
            body_of(&response)
        );
        assert_eq!(CONTENT_TYPE_XML, response.headers()[CONTENT_TYPE]);
    }

    #[test]
    fn test_method_and_alias() {
        init();
        let mut codec = Codec::new();
        codec.register_alias("mul", "Arith.Multiply");

        let body = protocol::encode_method_call("mul", &MultiplyArgs { a: 1, b: 1 }).unwrap();
        let request = codec.new_request(post(&body, "text/xml"));
        assert_eq!("Arith.Multiply", request.method().unwrap());
        assert_eq!(None, request.decode_error());

        let body = protocol::encode_method_call("Other.Method", &()).unwrap();
        let request = codec.new_request(post(&body, "text/xml"));
        assert_eq!("Other.Method", request.method().unwrap());
    }

    #[test]
    fn test_malformed_body() {
        init();
        let codec = Codec::new();
        let mut request = codec.new_request(post(b"<methodCall><methodName>x</methodName>", "text/xml"));
        match request.method() {
            Err(Error::Fault(f)) => assert_eq!(-32700, f.code),
            other => panic!("unexpected {:?}", other),
        }
        assert!(request.read_request::<MultiplyArgs>().is_err());
        assert_eq!(Some(-32700), request.decode_error().map(|f| f.code));

        let mut response = Response::new(Vec::new());
        request
            .write_response(&mut response, &MultiplyReply { result: 1 }, None)
            .unwrap();
        assert_eq!(
            "<methodResponse><fault><value><struct>\
             <member><name>faultCode</name><value><int>-32700</int></value></member>\
             <member><name>faultString</name><value><string>Parsing error: not well formed</string></value></member>\
             </struct></value></fault></methodResponse>",
            body_of(&response)
        );
    }

    #[test]
    fn test_wrong_arguments_number() {
        init();
        #[derive(Serialize)]
        struct BadArgs {
            a: i32,
            b: i32,
            c: i32,
        }
        let codec = Codec::new();
        let response = call(&codec, "Arith.Multiply", &BadArgs { a: 4, b: 2, c: 4 });
        let err = decoding::decode::<MultiplyReplyIn>(response.body()).unwrap_err();
        match err {
            Error::Fault(f) => assert_eq!(fault::WRONG_ARGUMENTS_NUMBER, f),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[derive(Deserialize, Debug)]
    #[allow(dead_code)]
    struct MultiplyReplyIn {
        result: i32,
    }

    #[test]
    fn test_reply_type_mismatch_on_client() {
        init();
        #[derive(Deserialize, Debug)]
        #[allow(dead_code)]
        struct BadReply {
            result: String,
        }
        let codec = Codec::new();
        let response = call(&codec, "Arith.Multiply", &MultiplyArgs { a: 4, b: 2 });
        match decoding::decode::<BadReply>(response.body()) {
            Err(Error::Fault(f)) => {
                assert!(f.message.starts_with("Invalid Method Parameters: fields type mismatch"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_handler_errors() {
        init();
        let codec = Codec::new();
        let body = protocol::encode_method_call("Arith.Multiply", &MultiplyArgs { a: 4, b: 2 }).unwrap();

        let mut request = codec.new_request(post(&body, "text/xml"));
        let _: MultiplyArgs = request.read_request().unwrap();
        let mut response = Response::new(Vec::new());
        let err = io::Error::new(io::ErrorKind::Other, "database is down");
        request.write_response(&mut response, &(), Some(&err)).unwrap();
        match decoding::decode::<MultiplyReplyIn>(response.body()) {
            Err(Error::Fault(f)) => assert_eq!(Fault::new(-32500, "Application Error: database is down"), f),
            other => panic!("unexpected {:?}", other),
        }

        let request = codec.new_request(post(&body, "text/xml"));
        let mut response = Response::new(Vec::new());
        let err = Fault::new(4, "Too many parameters");
        request.write_response(&mut response, &(), Some(&err)).unwrap();
        match decoding::decode::<MultiplyReplyIn>(response.body()) {
            Err(Error::Fault(f)) => assert_eq!(err, f),
            other => panic!("unexpected {:?}", other),
        }

        let request = codec.new_request(post(&body, "text/xml"));
        let mut response = Response::new(Vec::new());
        let err = Error::Fault(fault::INTERNAL_ERROR);
        request.write_response(&mut response, &(), Some(&err)).unwrap();
        match decoding::decode::<MultiplyReplyIn>(response.body()) {
            Err(Error::Fault(f)) => assert_eq!(fault::INTERNAL_ERROR, f),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_unencodable_reply_becomes_fault() {
        init();
        let codec = Codec::new();
        let body = protocol::encode_method_call("m", &()).unwrap();
        let request = codec.new_request(post(&body, "text/xml"));
        let mut response = Response::new(Vec::new());
        request.write_response(&mut response, &(f64::NAN,), None).unwrap();
        match decoding::decode::<MultiplyReplyIn>(response.body()) {
            Err(Error::Fault(f)) => assert_eq!(-32500, f.code),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(CONTENT_TYPE_XML, response.headers()[CONTENT_TYPE]);
    }

    #[test]
    fn test_body_limit() {
        init();
        let codec = Codec::with_config(CodecConfig {
            max_body_size: Some(16),
            ..CodecConfig::default()
        });
        let body = protocol::encode_method_call("Arith.Multiply", &MultiplyArgs { a: 4, b: 2 }).unwrap();
        let request = codec.new_request(post(&body, "text/xml"));
        match request.method() {
            Err(Error::Fault(f)) => {
                assert_eq!(-32400, f.code);
                assert_eq!("System Error: request body exceeds 16 bytes", f.message);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_content_type_charset() {
        init();
        #[derive(Deserialize)]
        struct Greeting {
            name: String,
        }
        let mut body = b"<methodCall><methodName>Hello</methodName><params><param><value><string>".to_vec();
        body.extend_from_slice(b"Ren\xe9");
        body.extend_from_slice(b"</string></value></param></params></methodCall>");

        let codec = Codec::new();
        let mut request = codec.new_request(post(&body, "text/xml; charset=ISO-8859-1"));
        assert_eq!("Hello", request.method().unwrap());
        let greeting: Greeting = request.read_request().unwrap();
        assert_eq!("René", greeting.name);

        let request = codec.new_request(post(&body, "text/xml"));
        assert!(request.method().is_err());
    }
}
