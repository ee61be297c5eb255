use std::error::Error as StdError;
use std::fmt;
use std::io;

use serde::{de, ser};

use crate::xmlrpc::fault::{self, Fault};

pub type Result<T> = ::std::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
    /// A protocol fault: either received from the peer or raised while decoding.
    Fault(Fault),
    /// The host value has no XML-RPC representation.
    UnsupportedType(String),
    Io(io::Error),
}

impl Error {
    /// The fault to put on the wire for this error.
    pub fn into_fault(self) -> Fault {
        match self {
            Error::Fault(fault) => fault,
            Error::UnsupportedType(ref msg) => fault::APPLICATION_ERROR.with_detail(msg),
            Error::Io(ref err) => fault::SYSTEM_ERROR.with_detail(err),
        }
    }

    pub fn as_fault(&self) -> Option<&Fault> {
        match *self {
            Error::Fault(ref fault) => Some(fault),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::Fault(ref fault) => fault.fmt(f),
            Error::UnsupportedType(ref msg) => write!(f, "unsupported type: {}", msg),
            Error::Io(ref err) => err.fmt(f),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match *self {
            Error::Fault(ref fault) => Some(fault),
            Error::UnsupportedType(_) => None,
            Error::Io(ref err) => Some(err),
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::Io(err)
    }
}

impl From<Fault> for Error {
    fn from(fault: Fault) -> Error {
        Error::Fault(fault)
    }
}

impl ser::Error for Error {
    fn custom<T: fmt::Display>(msg: T) -> Error {
        Error::UnsupportedType(msg.to_string())
    }
}

// Every failure while projecting wire values onto host values is reported to
// the peer as invalid parameters.
impl de::Error for Error {
    fn custom<T: fmt::Display>(msg: T) -> Error {
        Error::Fault(fault::INVALID_PARAMS.with_detail(msg))
    }
}
