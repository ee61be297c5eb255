// Copyright 2014-2015 Galen Clark Haynes
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

// Rust XML-RPC library

#![deny(non_camel_case_types)]
#![allow(missing_docs)]

//! XML-RPC library: value marshalling and the server request/response codec.
//!
//! # What is XML-RPC?
//!
//! A remote procedure call protocol: a `<methodCall>` names a method and
//! carries positional `<param>`s, the reply is a `<methodResponse>` with
//! either `<params>` or a single `<fault>`.
//!
//! Basic documentation found on Wikipedia
//! http://en.wikipedia.org/wiki/XML-RPC
//!
//! Full specification of the XML-RPC protocol is found here:
//! http://xmlrpc.scripting.com/spec.html
//!
//! Additional errata and hints can be found here:
//! http://effbot.org/zone/xmlrpc-errata.htm
//!
//! # Host values
//!
//! Anything implementing `serde::Serialize` encodes and anything implementing
//! `serde::Deserialize` decodes. Use [`DateTime`] for `<dateTime.iso8601>`,
//! [`Base64`] for `<base64>` and [`Value`] when the shape is only known at
//! run time.
//!
//! ```
//! use serde::{Deserialize, Serialize};
//! use xmlrpc_codec::xmlrpc::{decode, encode_method_call};
//!
//! #[derive(Serialize, Deserialize, Debug, PartialEq)]
//! struct Multiply {
//!     a: i32,
//!     b: i32,
//! }
//!
//! let body = encode_method_call("Arith.Multiply", &Multiply { a: 4, b: 2 }).unwrap();
//! let args: Multiply = decode(&body).unwrap();
//! assert_eq!(Multiply { a: 4, b: 2 }, args);
//! ```

pub mod decoding;
pub mod encoding;
pub mod fault;
pub mod parser;
pub mod pool;
pub mod protocol;
pub mod server;
pub mod value;

pub use self::decoding::{decode, decode_response_struct, decode_with_charset, from_value};
pub use self::encoding::{encode, encode_into, to_value, Encoder};
pub use self::fault::Fault;
pub use self::parser::Envelope;
pub use self::protocol::{
    decode_client_response, encode_client_request, encode_method_call, encode_method_response, Request, Response,
};
pub use self::server::{Codec, CodecRequest};
pub use self::value::{Base64, DateTime, Value};
