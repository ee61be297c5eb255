// Copyright 2014-2015 Galen Clark Haynes
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

// Rust XML-RPC library

//! Value to wire encoding.
//!
//! Any `serde::Serialize` type encodes; the serde data model stands in for the
//! runtime kind of the value:
//!
//! - integers: `<int>`
//! - floats: `<double>`, fixed notation
//! - strings and chars: `<string>`, escaped
//! - bools: `<boolean>1</boolean>` / `<boolean>0</boolean>`
//! - [`DateTime`](../value/struct.DateTime.html): `<dateTime.iso8601>`
//! - bytes ([`Base64`](../value/struct.Base64.html)): `<base64>`
//! - structs: `<struct>`, members in declaration order (`#[serde(rename)]` sets the wire name)
//! - maps: `<struct>`, members sorted by key
//! - sequences and tuples: `<array><data>`
//! - `None` and `()`: `<nil/>`
//! - unit enum variants: `<string>` of the variant name
//! - newtype enum variants: a one-member `<struct>` named after the variant

use std::fmt;
use std::io::{self, Write};

use base64::engine::general_purpose::STANDARD;
use base64::write::EncoderWriter;
use serde::ser::{self, Impossible, Serialize};

use crate::error::{Error, Result};
use crate::xmlrpc::pool;
use crate::xmlrpc::value::{Value, DATETIME_TOKEN, RAW_VALUE_TOKEN};

/// Shortcut function to encode a `T` into a `<value>` element.
pub fn encode<T: ?Sized + Serialize>(value: &T) -> Result<Vec<u8>> {
    let mut buf = pool::global().get();
    encode_into(&mut *buf, value)?;
    Ok(buf.to_vec())
}

/// Encodes a `T` straight into `writer`.
pub fn encode_into<W: Write, T: ?Sized + Serialize>(writer: W, value: &T) -> Result<()> {
    let mut encoder = Encoder::new(writer);
    value.serialize(&mut encoder)
}

/// Escapes `&`, `"`, `<` and `>`.
pub fn escape_str<W: Write>(writer: &mut W, v: &str) -> io::Result<()> {
    let bytes = v.as_bytes();
    let mut start = 0;
    for (i, b) in bytes.iter().enumerate() {
        let entity: &[u8] = match *b {
            b'&' => b"&amp;",
            b'"' => b"&quot;",
            b'<' => b"&lt;",
            b'>' => b"&gt;",
            _ => continue,
        };
        writer.write_all(&bytes[start..i])?;
        writer.write_all(entity)?;
        start = i + 1;
    }
    writer.write_all(&bytes[start..])
}

fn write_string<W: Write>(writer: &mut W, v: &str) -> io::Result<()> {
    writer.write_all(b"<value><string>")?;
    escape_str(writer, v)?;
    writer.write_all(b"</string></value>")
}

fn write_base64<W: Write>(writer: &mut W, data: &[u8]) -> io::Result<()> {
    writer.write_all(b"<value><base64>")?;
    {
        let mut b64 = EncoderWriter::new(&mut *writer, &STANDARD);
        b64.write_all(data)?;
        b64.finish()?;
    }
    writer.write_all(b"</base64></value>")
}

fn write_member_name<W: Write>(writer: &mut W, name: &str) -> io::Result<()> {
    writer.write_all(b"<member><name>")?;
    escape_str(writer, name)?;
    writer.write_all(b"</name>")
}

/// Emits a `Value` tree, keeping struct members in their stored order.
pub fn write_value<W: Write>(writer: &mut W, value: &Value) -> io::Result<()> {
    match *value {
        Value::Int(v) => write!(writer, "<value><int>{}</int></value>", v),
        Value::Double(v) if !v.is_finite() => Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("non-finite double {}", v),
        )),
        Value::Double(v) => write!(writer, "<value><double>{}</double></value>", v),
        Value::String(ref v) => write_string(writer, v),
        Value::Boolean(v) => write!(writer, "<value><boolean>{}</boolean></value>", v as u8),
        Value::DateTime(ref v) => {
            let text = v.format().map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            write!(writer, "<value><dateTime.iso8601>{}</dateTime.iso8601></value>", text)
        }
        Value::Base64(ref v) => write_base64(writer, v),
        Value::Struct(ref members) => {
            writer.write_all(b"<value><struct>")?;
            for &(ref name, ref v) in members {
                write_member_name(writer, name)?;
                write_value(writer, v)?;
                writer.write_all(b"</member>")?;
            }
            writer.write_all(b"</struct></value>")
        }
        Value::Array(ref values) => {
            writer.write_all(b"<value><array><data>")?;
            for v in values {
                write_value(writer, v)?;
            }
            writer.write_all(b"</data></array></value>")
        }
        Value::Nil => writer.write_all(b"<value><nil/></value>"),
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Pending {
    DateTime,
    Raw,
}

/// A structure for implementing serialization to XML-RPC.
pub struct Encoder<W> {
    writer: W,
    pending: Option<Pending>,
}

impl<W: Write> Encoder<W> {
    /// Creates a new XML-RPC encoder whose output will be written to the writer
    /// specified.
    pub fn new(writer: W) -> Encoder<W> {
        Encoder {
            writer: writer,
            pending: None,
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn emit_int<N: fmt::Display>(&mut self, v: N) -> Result<()> {
        write!(self.writer, "<value><int>{}</int></value>", v)?;
        Ok(())
    }

    fn emit_double<N: fmt::Display>(&mut self, v: N, finite: bool) -> Result<()> {
        if !finite {
            return Err(Error::UnsupportedType(format!("non-finite double {}", v)));
        }
        write!(self.writer, "<value><double>{}</double></value>", v)?;
        Ok(())
    }

    fn emit_nil(&mut self) -> Result<()> {
        self.writer.write_all(b"<value><nil/></value>")?;
        Ok(())
    }
}

impl<'a, W: Write> ser::Serializer for &'a mut Encoder<W> {
    type Ok = ();
    type Error = Error;

    type SerializeSeq = SeqEncoder<'a, W>;
    type SerializeTuple = SeqEncoder<'a, W>;
    type SerializeTupleStruct = SeqEncoder<'a, W>;
    type SerializeTupleVariant = Impossible<(), Error>;
    type SerializeMap = MapEncoder<'a, W>;
    type SerializeStruct = StructEncoder<'a, W>;
    type SerializeStructVariant = Impossible<(), Error>;

    fn serialize_bool(self, v: bool) -> Result<()> {
        write!(self.writer, "<value><boolean>{}</boolean></value>", v as u8)?;
        Ok(())
    }

    fn serialize_i8(self, v: i8) -> Result<()> {
        self.emit_int(i64::from(v))
    }

    fn serialize_i16(self, v: i16) -> Result<()> {
        self.emit_int(i64::from(v))
    }

    fn serialize_i32(self, v: i32) -> Result<()> {
        self.emit_int(i64::from(v))
    }

    fn serialize_i64(self, v: i64) -> Result<()> {
        self.emit_int(v)
    }

    fn serialize_u8(self, v: u8) -> Result<()> {
        self.emit_int(u64::from(v))
    }

    fn serialize_u16(self, v: u16) -> Result<()> {
        self.emit_int(u64::from(v))
    }

    fn serialize_u32(self, v: u32) -> Result<()> {
        self.emit_int(u64::from(v))
    }

    fn serialize_u64(self, v: u64) -> Result<()> {
        if v > i64::MAX as u64 {
            return Err(Error::UnsupportedType(format!("{} overflows <int>", v)));
        }
        self.emit_int(v)
    }

    fn serialize_f32(self, v: f32) -> Result<()> {
        self.emit_double(v, v.is_finite())
    }

    fn serialize_f64(self, v: f64) -> Result<()> {
        self.emit_double(v, v.is_finite())
    }

    fn serialize_char(self, v: char) -> Result<()> {
        let mut buf = [0; 4];
        self.serialize_str(v.encode_utf8(&mut buf))
    }

    fn serialize_str(self, v: &str) -> Result<()> {
        match self.pending.take() {
            Some(Pending::DateTime) => {
                write!(self.writer, "<value><dateTime.iso8601>{}</dateTime.iso8601></value>", v)?
            }
            Some(Pending::Raw) => self.writer.write_all(v.as_bytes())?,
            None => write_string(&mut self.writer, v)?,
        }
        Ok(())
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<()> {
        write_base64(&mut self.writer, v)?;
        Ok(())
    }

    fn serialize_none(self) -> Result<()> {
        self.emit_nil()
    }

    fn serialize_some<T: ?Sized + Serialize>(self, value: &T) -> Result<()> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<()> {
        self.emit_nil()
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<()> {
        self.emit_nil()
    }

    // enums are encoded as strings or one-member structs
    // Bunny => <string>Bunny</string>
    // Kangaroo(34) => <struct><member><name>Kangaroo</name><value><int>34</int></value></member></struct>
    fn serialize_unit_variant(self, _name: &'static str, _idx: u32, variant: &'static str) -> Result<()> {
        self.serialize_str(variant)
    }

    fn serialize_newtype_struct<T: ?Sized + Serialize>(self, name: &'static str, value: &T) -> Result<()> {
        self.pending = match name {
            DATETIME_TOKEN => Some(Pending::DateTime),
            RAW_VALUE_TOKEN => Some(Pending::Raw),
            _ => None,
        };
        let res = value.serialize(&mut *self);
        self.pending = None;
        res
    }

    fn serialize_newtype_variant<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        _idx: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<()> {
        self.writer.write_all(b"<value><struct>")?;
        write_member_name(&mut self.writer, variant)?;
        value.serialize(&mut *self)?;
        self.writer.write_all(b"</member></struct></value>")?;
        Ok(())
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<SeqEncoder<'a, W>> {
        SeqEncoder::open(self, "")
    }

    fn serialize_tuple(self, len: usize) -> Result<SeqEncoder<'a, W>> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_struct(self, _name: &'static str, len: usize) -> Result<SeqEncoder<'a, W>> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_variant(
        self,
        name: &'static str,
        _idx: u32,
        variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleVariant> {
        Err(Error::UnsupportedType(format!("tuple variant {}::{}", name, variant)))
    }

    fn serialize_map(self, len: Option<usize>) -> Result<MapEncoder<'a, W>> {
        Ok(MapEncoder::open(self, len, ""))
    }

    fn serialize_struct(self, _name: &'static str, _len: usize) -> Result<StructEncoder<'a, W>> {
        StructEncoder::open(self, "")
    }

    fn serialize_struct_variant(
        self,
        name: &'static str,
        _idx: u32,
        variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStructVariant> {
        Err(Error::UnsupportedType(format!("struct variant {}::{}", name, variant)))
    }
}

/// `<array><data>`; `close` is written after the array (used for `</param>`).
pub struct SeqEncoder<'a, W: 'a> {
    encoder: &'a mut Encoder<W>,
    close: &'static str,
}

impl<'a, W: Write> SeqEncoder<'a, W> {
    fn open(encoder: &'a mut Encoder<W>, close: &'static str) -> Result<SeqEncoder<'a, W>> {
        encoder.writer.write_all(b"<value><array><data>")?;
        Ok(SeqEncoder {
            encoder: encoder,
            close: close,
        })
    }

    fn element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<()> {
        value.serialize(&mut *self.encoder)
    }

    fn finish(self) -> Result<()> {
        self.encoder.writer.write_all(b"</data></array></value>")?;
        self.encoder.writer.write_all(self.close.as_bytes())?;
        Ok(())
    }
}

impl<'a, W: Write> ser::SerializeSeq for SeqEncoder<'a, W> {
    type Ok = ();
    type Error = Error;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<()> {
        self.element(value)
    }

    fn end(self) -> Result<()> {
        self.finish()
    }
}

impl<'a, W: Write> ser::SerializeTuple for SeqEncoder<'a, W> {
    type Ok = ();
    type Error = Error;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<()> {
        self.element(value)
    }

    fn end(self) -> Result<()> {
        self.finish()
    }
}

impl<'a, W: Write> ser::SerializeTupleStruct for SeqEncoder<'a, W> {
    type Ok = ();
    type Error = Error;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<()> {
        self.element(value)
    }

    fn end(self) -> Result<()> {
        self.finish()
    }
}

/// `<struct>` with one member per field, in declaration order.
pub struct StructEncoder<'a, W: 'a> {
    encoder: &'a mut Encoder<W>,
    close: &'static str,
}

impl<'a, W: Write> StructEncoder<'a, W> {
    fn open(encoder: &'a mut Encoder<W>, close: &'static str) -> Result<StructEncoder<'a, W>> {
        encoder.writer.write_all(b"<value><struct>")?;
        Ok(StructEncoder {
            encoder: encoder,
            close: close,
        })
    }
}

impl<'a, W: Write> ser::SerializeStruct for StructEncoder<'a, W> {
    type Ok = ();
    type Error = Error;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, key: &'static str, value: &T) -> Result<()> {
        write_member_name(&mut self.encoder.writer, key)?;
        value.serialize(&mut *self.encoder)?;
        self.encoder.writer.write_all(b"</member>")?;
        Ok(())
    }

    fn end(self) -> Result<()> {
        self.encoder.writer.write_all(b"</struct></value>")?;
        self.encoder.writer.write_all(self.close.as_bytes())?;
        Ok(())
    }
}

/// `<struct>` built from map entries.
///
/// Entries are rendered aside and written sorted by key once the map ends, so
/// the output does not depend on the map's iteration order.
pub struct MapEncoder<'a, W: 'a> {
    encoder: &'a mut Encoder<W>,
    entries: Vec<(String, Vec<u8>)>,
    key: Option<String>,
    close: &'static str,
}

impl<'a, W: Write> MapEncoder<'a, W> {
    fn open(encoder: &'a mut Encoder<W>, len: Option<usize>, close: &'static str) -> MapEncoder<'a, W> {
        MapEncoder {
            encoder: encoder,
            entries: Vec::with_capacity(len.unwrap_or(0)),
            key: None,
            close: close,
        }
    }
}

impl<'a, W: Write> ser::SerializeMap for MapEncoder<'a, W> {
    type Ok = ();
    type Error = Error;

    fn serialize_key<T: ?Sized + Serialize>(&mut self, key: &T) -> Result<()> {
        self.key = Some(key.serialize(MapKeyEncoder)?);
        Ok(())
    }

    fn serialize_value<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<()> {
        let key = match self.key.take() {
            Some(key) => key,
            None => return Err(Error::UnsupportedType("map value without a key".to_string())),
        };
        let mut rendered = Vec::new();
        encode_into(&mut rendered, value)?;
        self.entries.push((key, rendered));
        Ok(())
    }

    fn end(mut self) -> Result<()> {
        self.entries.sort_by(|a, b| a.0.cmp(&b.0));
        let writer = &mut self.encoder.writer;
        writer.write_all(b"<value><struct>")?;
        for &(ref name, ref value) in &self.entries {
            write_member_name(writer, name)?;
            writer.write_all(value)?;
            writer.write_all(b"</member>")?;
        }
        writer.write_all(b"</struct></value>")?;
        writer.write_all(self.close.as_bytes())?;
        Ok(())
    }
}

/// Member names come from string-like keys only.
struct MapKeyEncoder;

impl MapKeyEncoder {
    fn unsupported(kind: &str) -> Error {
        Error::UnsupportedType(format!("{} as struct member name", kind))
    }
}

impl ser::Serializer for MapKeyEncoder {
    type Ok = String;
    type Error = Error;

    type SerializeSeq = Impossible<String, Error>;
    type SerializeTuple = Impossible<String, Error>;
    type SerializeTupleStruct = Impossible<String, Error>;
    type SerializeTupleVariant = Impossible<String, Error>;
    type SerializeMap = Impossible<String, Error>;
    type SerializeStruct = Impossible<String, Error>;
    type SerializeStructVariant = Impossible<String, Error>;

    fn serialize_str(self, v: &str) -> Result<String> {
        Ok(v.to_string())
    }

    fn serialize_char(self, v: char) -> Result<String> {
        Ok(v.to_string())
    }

    fn serialize_i8(self, v: i8) -> Result<String> {
        Ok(v.to_string())
    }

    fn serialize_i16(self, v: i16) -> Result<String> {
        Ok(v.to_string())
    }

    fn serialize_i32(self, v: i32) -> Result<String> {
        Ok(v.to_string())
    }

    fn serialize_i64(self, v: i64) -> Result<String> {
        Ok(v.to_string())
    }

    fn serialize_u8(self, v: u8) -> Result<String> {
        Ok(v.to_string())
    }

    fn serialize_u16(self, v: u16) -> Result<String> {
        Ok(v.to_string())
    }

    fn serialize_u32(self, v: u32) -> Result<String> {
        Ok(v.to_string())
    }

    fn serialize_u64(self, v: u64) -> Result<String> {
        Ok(v.to_string())
    }

    fn serialize_unit_variant(self, _name: &'static str, _idx: u32, variant: &'static str) -> Result<String> {
        Ok(variant.to_string())
    }

    fn serialize_newtype_struct<T: ?Sized + Serialize>(self, _name: &'static str, value: &T) -> Result<String> {
        value.serialize(self)
    }

    fn serialize_bool(self, _v: bool) -> Result<String> {
        Err(MapKeyEncoder::unsupported("bool"))
    }

    fn serialize_f32(self, _v: f32) -> Result<String> {
        Err(MapKeyEncoder::unsupported("f32"))
    }

    fn serialize_f64(self, _v: f64) -> Result<String> {
        Err(MapKeyEncoder::unsupported("f64"))
    }

    fn serialize_bytes(self, _v: &[u8]) -> Result<String> {
        Err(MapKeyEncoder::unsupported("bytes"))
    }

    fn serialize_none(self) -> Result<String> {
        Err(MapKeyEncoder::unsupported("none"))
    }

    fn serialize_some<T: ?Sized + Serialize>(self, _value: &T) -> Result<String> {
        Err(MapKeyEncoder::unsupported("option"))
    }

    fn serialize_unit(self) -> Result<String> {
        Err(MapKeyEncoder::unsupported("unit"))
    }

    fn serialize_unit_struct(self, name: &'static str) -> Result<String> {
        Err(MapKeyEncoder::unsupported(name))
    }

    fn serialize_newtype_variant<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        _idx: u32,
        variant: &'static str,
        _value: &T,
    ) -> Result<String> {
        Err(MapKeyEncoder::unsupported(variant))
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<Self::SerializeSeq> {
        Err(MapKeyEncoder::unsupported("sequence"))
    }

    fn serialize_tuple(self, _len: usize) -> Result<Self::SerializeTuple> {
        Err(MapKeyEncoder::unsupported("tuple"))
    }

    fn serialize_tuple_struct(self, name: &'static str, _len: usize) -> Result<Self::SerializeTupleStruct> {
        Err(MapKeyEncoder::unsupported(name))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _idx: u32,
        variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleVariant> {
        Err(MapKeyEncoder::unsupported(variant))
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<Self::SerializeMap> {
        Err(MapKeyEncoder::unsupported("map"))
    }

    fn serialize_struct(self, name: &'static str, _len: usize) -> Result<Self::SerializeStruct> {
        Err(MapKeyEncoder::unsupported(name))
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _idx: u32,
        variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStructVariant> {
        Err(MapKeyEncoder::unsupported(variant))
    }
}

/// Writes one `<param>` per top-level field.
///
/// Structs and tuples spread across params by position, `()` yields no
/// params, and any other value (maps included) is a single param.
pub struct ParamsEncoder<'a, W: 'a> {
    encoder: &'a mut Encoder<W>,
}

impl<'a, W: Write> ParamsEncoder<'a, W> {
    pub fn new(encoder: &'a mut Encoder<W>) -> ParamsEncoder<'a, W> {
        ParamsEncoder { encoder: encoder }
    }

    fn open(&mut self) -> Result<()> {
        self.encoder.writer.write_all(b"<param>")?;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.encoder.writer.write_all(b"</param>")?;
        Ok(())
    }

    fn single<T: ?Sized + Serialize>(mut self, value: &T) -> Result<()> {
        self.open()?;
        value.serialize(&mut *self.encoder)?;
        self.close()
    }
}

macro_rules! single_param {
    ($($name:ident($ty:ty)),+) => {
        $(fn $name(self, v: $ty) -> Result<()> {
            self.single(&v)
        })+
    }
}

impl<'a, W: Write> ser::Serializer for ParamsEncoder<'a, W> {
    type Ok = ();
    type Error = Error;

    type SerializeSeq = SeqEncoder<'a, W>;
    type SerializeTuple = ParamList<'a, W>;
    type SerializeTupleStruct = ParamList<'a, W>;
    type SerializeTupleVariant = Impossible<(), Error>;
    type SerializeMap = MapEncoder<'a, W>;
    type SerializeStruct = ParamList<'a, W>;
    type SerializeStructVariant = Impossible<(), Error>;

    single_param! {
        serialize_bool(bool),
        serialize_i8(i8), serialize_i16(i16), serialize_i32(i32), serialize_i64(i64),
        serialize_u8(u8), serialize_u16(u16), serialize_u32(u32), serialize_u64(u64),
        serialize_f32(f32), serialize_f64(f64),
        serialize_char(char), serialize_str(&str)
    }

    fn serialize_bytes(mut self, v: &[u8]) -> Result<()> {
        self.open()?;
        write_base64(&mut self.encoder.writer, v)?;
        self.close()
    }

    fn serialize_none(self) -> Result<()> {
        self.single(&())
    }

    fn serialize_some<T: ?Sized + Serialize>(self, value: &T) -> Result<()> {
        self.single(value)
    }

    fn serialize_unit(self) -> Result<()> {
        Ok(())
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<()> {
        Ok(())
    }

    fn serialize_unit_variant(self, _name: &'static str, _idx: u32, variant: &'static str) -> Result<()> {
        self.single(variant)
    }

    fn serialize_newtype_struct<T: ?Sized + Serialize>(mut self, name: &'static str, value: &T) -> Result<()> {
        self.open()?;
        ser::Serializer::serialize_newtype_struct(&mut *self.encoder, name, value)?;
        self.close()
    }

    fn serialize_newtype_variant<T: ?Sized + Serialize>(
        mut self,
        name: &'static str,
        idx: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<()> {
        self.open()?;
        ser::Serializer::serialize_newtype_variant(&mut *self.encoder, name, idx, variant, value)?;
        self.close()
    }

    fn serialize_seq(mut self, _len: Option<usize>) -> Result<SeqEncoder<'a, W>> {
        self.open()?;
        SeqEncoder::open(self.encoder, "</param>")
    }

    fn serialize_tuple(self, _len: usize) -> Result<ParamList<'a, W>> {
        Ok(ParamList { encoder: self.encoder })
    }

    fn serialize_tuple_struct(self, _name: &'static str, _len: usize) -> Result<ParamList<'a, W>> {
        Ok(ParamList { encoder: self.encoder })
    }

    fn serialize_tuple_variant(
        self,
        name: &'static str,
        _idx: u32,
        variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleVariant> {
        Err(Error::UnsupportedType(format!("tuple variant {}::{}", name, variant)))
    }

    fn serialize_map(mut self, len: Option<usize>) -> Result<MapEncoder<'a, W>> {
        self.open()?;
        Ok(MapEncoder::open(self.encoder, len, "</param>"))
    }

    fn serialize_struct(self, _name: &'static str, _len: usize) -> Result<ParamList<'a, W>> {
        Ok(ParamList { encoder: self.encoder })
    }

    fn serialize_struct_variant(
        self,
        name: &'static str,
        _idx: u32,
        variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStructVariant> {
        Err(Error::UnsupportedType(format!("struct variant {}::{}", name, variant)))
    }
}

/// Fields or tuple elements written as consecutive `<param>`s.
pub struct ParamList<'a, W: 'a> {
    encoder: &'a mut Encoder<W>,
}

impl<'a, W: Write> ParamList<'a, W> {
    fn param<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<()> {
        self.encoder.writer.write_all(b"<param>")?;
        value.serialize(&mut *self.encoder)?;
        self.encoder.writer.write_all(b"</param>")?;
        Ok(())
    }
}

impl<'a, W: Write> ser::SerializeStruct for ParamList<'a, W> {
    type Ok = ();
    type Error = Error;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, _key: &'static str, value: &T) -> Result<()> {
        self.param(value)
    }

    fn end(self) -> Result<()> {
        Ok(())
    }
}

impl<'a, W: Write> ser::SerializeTuple for ParamList<'a, W> {
    type Ok = ();
    type Error = Error;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<()> {
        self.param(value)
    }

    fn end(self) -> Result<()> {
        Ok(())
    }
}

impl<'a, W: Write> ser::SerializeTupleStruct for ParamList<'a, W> {
    type Ok = ();
    type Error = Error;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<()> {
        self.param(value)
    }

    fn end(self) -> Result<()> {
        Ok(())
    }
}

/// Writes `<params>…</params>` for `args`.
pub fn encode_params_into<W: Write, T: ?Sized + Serialize>(writer: W, args: &T) -> Result<()> {
    let mut encoder = Encoder::new(writer);
    encoder.writer.write_all(b"<params>")?;
    args.serialize(ParamsEncoder::new(&mut encoder))?;
    encoder.writer.write_all(b"</params>")?;
    Ok(())
}

/// Builds a `Value` tree out of any serializable value.
pub fn to_value<T: ?Sized + Serialize>(value: &T) -> Result<Value> {
    let xml = encode(value)?;
    crate::xmlrpc::parser::parse_value(&xml)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xmlrpc::value::{Base64, DateTime};
    use serde::Serialize;
    use std::collections::{BTreeMap, HashMap};
    use time::macros::datetime;

    fn encode_str<T: ?Sized + Serialize>(value: &T) -> String {
        String::from_utf8(encode(value).unwrap()).unwrap()
    }

    #[derive(Serialize)]
    struct SubStruct {
        #[serde(rename = "Foo")]
        foo: i32,
        #[serde(rename = "Bar")]
        bar: String,
        #[serde(rename = "Data")]
        data: Vec<i32>,
    }

    #[test]
    fn test_scalars() {
        assert_eq!("<value><int>-42</int></value>", encode_str(&-42i32));
        assert_eq!("<value><int>7</int></value>", encode_str(&7u8));
        assert_eq!("<value><double>3.145926</double></value>", encode_str(&3.145926f64));
        assert_eq!("<value><double>4.2</double></value>", encode_str(&4.2f64));
        assert_eq!("<value><double>0.1</double></value>", encode_str(&0.1f32));
        assert_eq!("<value><boolean>1</boolean></value>", encode_str(&true));
        assert_eq!("<value><boolean>0</boolean></value>", encode_str(&false));
        assert_eq!("<value><string>x</string></value>", encode_str(&'x'));
    }

    #[test]
    fn test_double_is_fixed_notation() {
        assert_eq!("<value><double>10000000000000000000000</double></value>", encode_str(&1e22f64));
        assert_eq!("<value><double>0.000001</double></value>", encode_str(&0.000001f64));
    }

    #[test]
    fn test_u64_overflow_is_unsupported() {
        assert_eq!("<value><int>9223372036854775807</int></value>", encode_str(&(i64::MAX as u64)));
        match encode(&u64::MAX) {
            Err(Error::UnsupportedType(_)) => {}
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_non_finite_double_is_unsupported() {
        match encode(&f64::NAN) {
            Err(Error::UnsupportedType(_)) => {}
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_non_finite_value_double_is_unsupported() {
        match encode(&Value::Double(f64::NAN)) {
            Err(Error::UnsupportedType(_)) => {}
            other => panic!("unexpected {:?}", other),
        }
        let tree = Value::Array(vec![Value::Int(1), Value::Double(f64::INFINITY)]);
        match encode(&tree) {
            Err(Error::UnsupportedType(_)) => {}
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!("<value><double>1.5</double></value>", encode_str(&Value::Double(1.5)));
    }

    #[test]
    fn test_string_escaping() {
        assert_eq!(
            "<value><string> &amp; &quot; &lt; &gt; </string></value>",
            encode_str(" & \" < > ")
        );
        assert_eq!("<value><string>&amp;lt;</string></value>", encode_str("&lt;"));
    }

    #[test]
    fn test_nil() {
        assert_eq!("<value><nil/></value>", encode_str(&None::<i32>));
        assert_eq!("<value><nil/></value>", encode_str(&()));
        assert_eq!("<value><int>5</int></value>", encode_str(&Some(5)));
    }

    #[test]
    fn test_struct_in_declaration_order() {
        let sub = SubStruct {
            foo: 42,
            bar: "I'm Bar".to_string(),
            data: vec![1, 2, 3],
        };
        let expected = "<value><struct><member><name>Foo</name><value><int>42</int></value></member>\
                        <member><name>Bar</name><value><string>I'm Bar</string></value></member>\
                        <member><name>Data</name><value><array><data><value><int>1</int></value>\
                        <value><int>2</int></value><value><int>3</int></value></data></array></value>\
                        </member></struct></value>";
        assert_eq!(expected, encode_str(&sub));
    }

    #[test]
    fn test_datetime_and_base64() {
        let dt = DateTime(datetime!(2012-07-17 14:08:55));
        assert_eq!(
            "<value><dateTime.iso8601>20120717T14:08:55</dateTime.iso8601></value>",
            encode_str(&dt)
        );
        assert_eq!(
            "<value><base64>eW91IGNhbid0IHJlYWQgdGhpcyE=</base64></value>",
            encode_str(&Base64(b"you can't read this!".to_vec()))
        );
    }

    #[test]
    fn test_large_base64_streams() {
        let data: Vec<u8> = (0..100_000u32).map(|i| (i % 251) as u8).collect();
        let xml = encode_str(&Base64(data.clone()));
        let b64 = &xml["<value><base64>".len()..xml.len() - "</base64></value>".len()];
        use base64::Engine;
        assert_eq!(data, STANDARD.decode(b64).unwrap());
    }

    #[test]
    fn test_map_keys_sorted() {
        let mut map = HashMap::new();
        map.insert("zeta", 1);
        map.insert("alpha", 2);
        map.insert("mid", 3);
        let expected = "<value><struct><member><name>alpha</name><value><int>2</int></value></member>\
                        <member><name>mid</name><value><int>3</int></value></member>\
                        <member><name>zeta</name><value><int>1</int></value></member></struct></value>";
        assert_eq!(expected, encode_str(&map));
    }

    #[test]
    fn test_map_with_non_string_key_is_unsupported() {
        let mut map = BTreeMap::new();
        map.insert(vec![1], 1);
        match encode(&map) {
            Err(Error::UnsupportedType(_)) => {}
            other => panic!("unexpected {:?}", other),
        }
    }

    #[derive(Serialize)]
    enum Animal {
        Bunny,
        Kangaroo(i32),
        Wombat(i32, i32),
    }

    #[test]
    fn test_enums() {
        assert_eq!("<value><string>Bunny</string></value>", encode_str(&Animal::Bunny));
        assert_eq!(
            "<value><struct><member><name>Kangaroo</name><value><int>34</int></value></member></struct></value>",
            encode_str(&Animal::Kangaroo(34))
        );
        match encode(&Animal::Wombat(1, 2)) {
            Err(Error::UnsupportedType(msg)) => assert_eq!("tuple variant Animal::Wombat", msg),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_value_keeps_member_order() {
        let value = Value::Struct(vec![
            ("b".to_string(), Value::Int(1)),
            ("a".to_string(), Value::Array(vec![Value::Nil, Value::Boolean(true)])),
        ]);
        let expected = "<value><struct><member><name>b</name><value><int>1</int></value></member>\
                        <member><name>a</name><value><array><data><value><nil/></value>\
                        <value><boolean>1</boolean></value></data></array></value></member></struct></value>";
        assert_eq!(expected, encode_str(&value));

        #[derive(Serialize)]
        struct Holder {
            v: Value,
        }
        let nested = encode_str(&Holder { v: value });
        assert!(nested.contains("<member><name>v</name><value><struct><member><name>b</name>"));
    }

    #[test]
    fn test_params_one_per_field() {
        #[derive(Serialize)]
        struct Args {
            a: i32,
            b: i32,
        }
        let mut out = Vec::new();
        encode_params_into(&mut out, &Args { a: 4, b: 2 }).unwrap();
        assert_eq!(
            "<params><param><value><int>4</int></value></param><param><value><int>2</int></value></param></params>",
            String::from_utf8(out).unwrap()
        );
    }

    #[test]
    fn test_params_map_is_single_param() {
        let mut map = BTreeMap::new();
        map.insert("a", 1);
        map.insert("b", 2);
        let mut out = Vec::new();
        encode_params_into(&mut out, &map).unwrap();
        let xml = String::from_utf8(out).unwrap();
        assert_eq!(1, xml.matches("<param>").count());
        assert!(xml.starts_with("<params><param><value><struct>"));
    }

    #[test]
    fn test_params_tuple_and_unit() {
        let mut out = Vec::new();
        encode_params_into(&mut out, &("x", true)).unwrap();
        assert_eq!(
            "<params><param><value><string>x</string></value></param><param><value><boolean>1</boolean></value></param></params>",
            String::from_utf8(out).unwrap()
        );

        let mut out = Vec::new();
        encode_params_into(&mut out, &()).unwrap();
        assert_eq!("<params></params>", String::from_utf8(out).unwrap());
    }

    #[test]
    fn test_params_sequence_is_single_array_param() {
        let mut out = Vec::new();
        encode_params_into(&mut out, &vec![1, 2]).unwrap();
        assert_eq!(
            "<params><param><value><array><data><value><int>1</int></value><value><int>2</int></value></data></array></value></param></params>",
            String::from_utf8(out).unwrap()
        );
    }
}
