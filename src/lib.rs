//! XML-RPC codec: typed values to and from the XML-RPC wire format, plus the
//! per-request state a server needs to turn bodies into calls and results or
//! errors into replies.

#[macro_use]
extern crate log;

pub mod config;
pub mod error;
pub mod xmlrpc;

pub use crate::config::CodecConfig;
pub use crate::error::{Error, Result};
pub use crate::xmlrpc::{Codec, CodecRequest, Fault, Value};
