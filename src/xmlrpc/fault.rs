// Copyright 2014-2015 Galen Clark Haynes
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

// Rust XML-RPC library

//! Protocol faults.
//!
//! XML-RPC itself does not assign any fault codes. The codes below follow the
//! convention published at
//! http://xmlrpc-epi.sourceforge.net/specs/rfc.fault_codes.php, which most
//! implementations agree on.

use std::borrow::Cow;
use std::error::Error as StdError;
use std::fmt;
use std::io::{self, Write};

use serde::ser::{Serialize, SerializeStruct, Serializer};

use crate::xmlrpc::encoding;
use crate::xmlrpc::value::Value;

pub const INVALID_PARAMS: Fault = Fault::from_static(-32602, "Invalid Method Parameters");
pub const WRONG_ARGUMENTS_NUMBER: Fault = Fault::from_static(-32602, "Wrong Arguments Number");
pub const INTERNAL_ERROR: Fault = Fault::from_static(-32603, "Internal Server Error");
pub const APPLICATION_ERROR: Fault = Fault::from_static(-32500, "Application Error");
pub const SYSTEM_ERROR: Fault = Fault::from_static(-32400, "System Error");
pub const DECODE: Fault = Fault::from_static(-32700, "Parsing error: not well formed");

const FAULT_CODE: &str = "faultCode";
const FAULT_STRING: &str = "faultString";

/// An XML-RPC fault: the only error shape ever placed on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fault {
    pub code: i32,
    pub message: Cow<'static, str>,
}

impl Fault {
    pub fn new<M: Into<Cow<'static, str>>>(code: i32, message: M) -> Fault {
        Fault {
            code: code,
            message: message.into(),
        }
    }

    const fn from_static(code: i32, message: &'static str) -> Fault {
        Fault {
            code: code,
            message: Cow::Borrowed(message),
        }
    }

    /// Same code, with `": detail"` appended to the message.
    pub fn with_detail<D: fmt::Display>(&self, detail: D) -> Fault {
        Fault {
            code: self.code,
            message: Cow::Owned(format!("{}: {}", self.message, detail)),
        }
    }

    /// Reads a fault out of the `<value>` of a `<fault>` element.
    ///
    /// Members are looked up by name. A `faultCode` that is not an integer
    /// reads as 0, and a `faultString` sent as bare text is taken verbatim.
    pub fn from_value(value: &Value) -> Fault {
        let code = match value.find(FAULT_CODE) {
            Some(&Value::Int(code)) => num::cast(code).unwrap_or(0),
            Some(&Value::String(ref raw)) => raw.trim().parse().unwrap_or(0),
            _ => 0,
        };
        let message = match value.find(FAULT_STRING) {
            Some(&Value::String(ref s)) => s.clone(),
            _ => String::new(),
        };
        Fault::new(code, message)
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl StdError for Fault {}

impl Serialize for Fault {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("Fault", 2)?;
        s.serialize_field(FAULT_CODE, &self.code)?;
        s.serialize_field(FAULT_STRING, &self.message)?;
        s.end()
    }
}

/// Writes a complete `<methodResponse><fault>` document.
///
/// Should the fault value itself fail to encode, a `<nil/>` value is sent in
/// its place so the peer still receives a well-formed fault response.
pub fn write_fault<W: Write>(writer: &mut W, fault: &Fault) -> io::Result<()> {
    writer.write_all(b"<methodResponse><fault>")?;
    let mut value = Vec::new();
    match encoding::encode_into(&mut value, fault) {
        Ok(()) => writer.write_all(&value)?,
        Err(err) => {
            error!("cannot encode fault {}: {}", fault, err);
            writer.write_all(b"<value><nil/></value>")?;
        }
    }
    writer.write_all(b"</fault></methodResponse>")
}

/// Shortcut for `write_fault` into a fresh buffer.
pub fn fault_to_xml(fault: &Fault) -> Vec<u8> {
    let mut out = Vec::new();
    if let Err(err) = write_fault(&mut out, fault) {
        error!("cannot write fault {}: {}", fault, err);
    }
    out
}
