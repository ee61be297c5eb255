// Copyright 2014-2015 Galen Clark Haynes
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

// Rust XML-RPC library

use std::io::{Read, Write};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::xmlrpc::fault;
use crate::xmlrpc::{decoding, encoding, pool};

/// Encodes `<methodCall>`, one `<param>` per field of `args`.
pub fn encode_method_call<T: ?Sized + Serialize>(method: &str, args: &T) -> Result<Vec<u8>> {
    let mut buf = pool::global().get();
    encode_method_call_into(&mut *buf, method, args)?;
    Ok(buf.to_vec())
}

pub fn encode_method_call_into<W: Write, T: ?Sized + Serialize>(mut writer: W, method: &str, args: &T) -> Result<()> {
    writer.write_all(b"<methodCall><methodName>")?;
    encoding::escape_str(&mut writer, method)?;
    writer.write_all(b"</methodName>")?;
    encoding::encode_params_into(&mut writer, args)?;
    writer.write_all(b"</methodCall>")?;
    Ok(())
}

/// Encodes `<methodResponse>`, one `<param>` per field of `reply`.
pub fn encode_method_response<T: ?Sized + Serialize>(reply: &T) -> Result<Vec<u8>> {
    let mut buf = pool::global().get();
    encode_method_response_into(&mut *buf, reply)?;
    Ok(buf.to_vec())
}

pub fn encode_method_response_into<W: Write, T: ?Sized + Serialize>(mut writer: W, reply: &T) -> Result<()> {
    writer.write_all(b"<methodResponse>")?;
    encoding::encode_params_into(&mut writer, reply)?;
    writer.write_all(b"</methodResponse>")?;
    Ok(())
}

/// The body a client posts to call `method`.
pub fn encode_client_request<T: ?Sized + Serialize>(method: &str, args: &T) -> Result<Vec<u8>> {
    encode_method_call(method, args)
}

/// Reads and decodes a server's reply. A `<fault>` reply comes back as
/// `Error::Fault`.
pub fn decode_client_response<R: Read, T: DeserializeOwned>(mut reader: R) -> Result<T> {
    let mut body = Vec::new();
    reader
        .read_to_end(&mut body)
        .map_err(|e| Error::Fault(fault::SYSTEM_ERROR.with_detail(e)))?;
    trace!("response body: {}", String::from_utf8_lossy(&body));
    decoding::decode(&body)
}

/// A method call assembled one argument at a time.
#[derive(Debug)]
pub struct Request {
    pub method: String,
    pub body: String,
}

/// A raw reply, decoded on demand.
#[derive(Debug)]
pub struct Response {
    pub body: String,
}

impl Request {
    pub fn new(method: &str) -> Result<Request> {
        let mut body = b"<?xml version=\"1.0\"?><methodCall><methodName>".to_vec();
        encoding::escape_str(&mut body, method)?;
        body.extend_from_slice(b"</methodName><params>");
        Ok(Request {
            method: method.to_string(),
            body: String::from_utf8_lossy(&body).into_owned(),
        })
    }

    pub fn argument<T: ?Sized + Serialize>(mut self, object: &T) -> Result<Request> {
        let value = encoding::encode(object)?;
        self.body.push_str("<param>");
        self.body.push_str(&String::from_utf8_lossy(&value));
        self.body.push_str("</param>");
        Ok(self)
    }

    pub fn finalize(mut self) -> Request {
        self.body.push_str("</params></methodCall>");
        self
    }
}

impl Response {
    pub fn new(body: &str) -> Response {
        Response { body: body.to_string() }
    }

    /// Decodes the params positionally into `T`.
    pub fn result<T: DeserializeOwned>(&self) -> Result<T> {
        decoding::decode(self.body.as_bytes())
    }
}
