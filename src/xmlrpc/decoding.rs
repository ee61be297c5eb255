// Copyright 2014-2015 Galen Clark Haynes
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

// Rust XML-RPC library

//! Projection of parsed values onto host types.
//!
//! Top-level params map onto the destination by position: a struct with N
//! fields takes exactly N params, field `i` from param `i`. Below the top
//! level, `<struct>` members are matched by name. A member named `fooBar` is
//! looked up as `FooBar` first, then as `fooBar`; unknown members are ignored
//! and `<nil/>` leaves the field at its zero value (`0`, `""`, empty, `None`).

use std::iter;

use serde::de::value::{MapDeserializer, SeqDeserializer, StringDeserializer};
use serde::de::{self, DeserializeOwned, DeserializeSeed, EnumAccess, IntoDeserializer, VariantAccess, Visitor};

use crate::error::{Error, Result};
use crate::xmlrpc::fault::{self, Fault};
use crate::xmlrpc::parser::{self, Envelope};
use crate::xmlrpc::value::{Value, DATETIME_FIELD, DATETIME_TOKEN};

/// Decodes a method call or response, honouring the prolog's charset.
pub fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T> {
    decode_with_charset(body, None)
}

/// Like [`decode`], with a charset (from a `Content-Type` header) overriding the prolog.
pub fn decode_with_charset<T: DeserializeOwned>(body: &[u8], charset: Option<&str>) -> Result<T> {
    from_envelope(parser::parse(body, charset)?)
}

/// Decodes an already transcoded document.
pub fn decode_text<T: DeserializeOwned>(text: &str) -> Result<T> {
    from_envelope(parser::parse_text(text)?)
}

/// Returns the envelope's fault as an error, otherwise projects its params.
pub fn from_envelope<T: DeserializeOwned>(envelope: Envelope) -> Result<T> {
    if let Some(ref value) = envelope.fault {
        return Err(Error::Fault(Fault::from_value(value)));
    }
    T::deserialize(ParamsDeserializer::new(envelope.params))
}

/// Projects a single value.
pub fn from_value<T: DeserializeOwned>(value: Value) -> Result<T> {
    T::deserialize(ValueDeserializer::new(value))
}

/// Decodes a response whose only param is a struct, keeping members in wire order.
pub fn decode_response_struct(body: &[u8], charset: Option<&str>) -> Result<Vec<(String, Value)>> {
    let envelope = parser::parse(body, charset)?;
    if let Some(ref value) = envelope.fault {
        return Err(Error::Fault(Fault::from_value(value)));
    }
    let mut params = envelope.params;
    if params.len() != 1 {
        return Err(Error::Fault(fault::WRONG_ARGUMENTS_NUMBER));
    }
    match params.pop() {
        Some(Value::Struct(members)) => Ok(members),
        Some(other) => Err(mismatch(&other, "struct")),
        None => Err(Error::Fault(fault::WRONG_ARGUMENTS_NUMBER)),
    }
}

fn mismatch(value: &Value, expected: &str) -> Error {
    let detail = match *value {
        Value::Struct(_) => format!("structure fields mismatch: {} != struct", expected),
        ref other => format!("fields type mismatch: {} != {}", other.kind(), expected),
    };
    Error::Fault(fault::INVALID_PARAMS.with_detail(detail))
}

fn wrong_arguments(expected: usize, got: usize) -> Error {
    debug!("expected {} params, got {}", expected, got);
    Error::Fault(fault::WRONG_ARGUMENTS_NUMBER)
}

fn uppercase_first(name: &str) -> Option<String> {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() && !c.is_uppercase() => Some(c.to_uppercase().chain(chars).collect()),
        _ => None,
    }
}

/// Resolves member names against `fields`, keeping only the last of any
/// duplicates.
fn project_members(members: Vec<(String, Value)>, fields: &[&str]) -> Vec<(String, Value)> {
    let mut out: Vec<(String, Value)> = Vec::with_capacity(members.len());
    for (name, value) in members {
        let name = match uppercase_first(&name) {
            Some(upper) if fields.contains(&upper.as_str()) => upper,
            _ => name,
        };
        if let Some(pos) = out.iter().position(|m| m.0 == name) {
            out.remove(pos);
        }
        out.push((name, value));
    }
    out
}

fn visit_members<'de, V: Visitor<'de>>(members: Vec<(String, Value)>, visitor: V) -> Result<V::Value> {
    let mut map = MapDeserializer::<_, Error>::new(members.into_iter());
    let value = visitor.visit_map(&mut map)?;
    map.end()?;
    Ok(value)
}

fn visit_values<'de, I, V>(values: I, visitor: V) -> Result<V::Value>
where
    I: Iterator,
    I::Item: IntoDeserializer<'de, Error>,
    V: Visitor<'de>,
{
    let mut seq = SeqDeserializer::<_, Error>::new(values);
    let value = visitor.visit_seq(&mut seq)?;
    seq.end()?;
    Ok(value)
}

fn visit_datetime<'de, V: Visitor<'de>>(dt: crate::xmlrpc::value::DateTime, visitor: V) -> Result<V::Value> {
    let text = dt
        .format()
        .map_err(|e| Error::Fault(fault::INVALID_PARAMS.with_detail(e)))?;
    let mut map = MapDeserializer::<_, Error>::new(iter::once((DATETIME_FIELD, text)));
    let value = visitor.visit_map(&mut map)?;
    map.end()?;
    Ok(value)
}

/// Deserializes the `<param>` list of an envelope.
pub struct ParamsDeserializer {
    params: Vec<Value>,
}

impl ParamsDeserializer {
    pub fn new(params: Vec<Value>) -> ParamsDeserializer {
        ParamsDeserializer { params: params }
    }

    fn single(mut self) -> Result<ValueDeserializer> {
        if self.params.len() == 1 {
            if let Some(value) = self.params.pop() {
                return Ok(ValueDeserializer::new(value));
            }
        }
        Err(wrong_arguments(1, self.params.len()))
    }

    fn exactly(&self, len: usize) -> Result<()> {
        if self.params.len() == len {
            Ok(())
        } else {
            Err(wrong_arguments(len, self.params.len()))
        }
    }
}

macro_rules! forward_to_single {
    ($($method:ident)*) => {
        $(fn $method<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
            de::Deserializer::$method(self.single()?, visitor)
        })*
    }
}

impl<'de> de::Deserializer<'de> for ParamsDeserializer {
    type Error = Error;

    forward_to_single! {
        deserialize_bool deserialize_i8 deserialize_i16 deserialize_i32 deserialize_i64
        deserialize_u8 deserialize_u16 deserialize_u32 deserialize_u64
        deserialize_f32 deserialize_f64 deserialize_char deserialize_str deserialize_string
        deserialize_bytes deserialize_byte_buf deserialize_option
        deserialize_seq deserialize_map deserialize_identifier
    }

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        visit_values(self.params.into_iter(), visitor)
    }

    fn deserialize_unit<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        self.exactly(0)?;
        visitor.visit_unit()
    }

    fn deserialize_unit_struct<V: Visitor<'de>>(self, _name: &'static str, visitor: V) -> Result<V::Value> {
        self.deserialize_unit(visitor)
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(self, _name: &'static str, visitor: V) -> Result<V::Value> {
        visitor.visit_newtype_struct(self.single()?)
    }

    fn deserialize_tuple<V: Visitor<'de>>(self, len: usize, visitor: V) -> Result<V::Value> {
        self.exactly(len)?;
        visit_values(self.params.into_iter(), visitor)
    }

    fn deserialize_tuple_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        len: usize,
        visitor: V,
    ) -> Result<V::Value> {
        self.deserialize_tuple(len, visitor)
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        name: &'static str,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value> {
        if name == DATETIME_TOKEN {
            return self.single()?.deserialize_struct(name, fields, visitor);
        }
        self.exactly(fields.len())?;
        let args = fields.iter().cloned().zip(self.params);
        let mut map = MapDeserializer::<_, Error>::new(args);
        let value = visitor.visit_map(&mut map)?;
        map.end()?;
        Ok(value)
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        name: &'static str,
        variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value> {
        self.single()?.deserialize_enum(name, variants, visitor)
    }

    fn deserialize_ignored_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        visitor.visit_unit()
    }
}

/// Deserializes one [`Value`] tree.
pub struct ValueDeserializer {
    value: Value,
}

impl ValueDeserializer {
    pub fn new(value: Value) -> ValueDeserializer {
        ValueDeserializer { value: value }
    }
}

impl<'de> IntoDeserializer<'de, Error> for Value {
    type Deserializer = ValueDeserializer;

    fn into_deserializer(self) -> ValueDeserializer {
        ValueDeserializer::new(self)
    }
}

macro_rules! deserialize_int {
    ($($method:ident => $visit:ident($ty:ty)),*) => {
        $(fn $method<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
            match self.value {
                Value::Nil => visitor.$visit(0),
                Value::Int(v) => match num::cast::<i64, $ty>(v) {
                    Some(n) => visitor.$visit(n),
                    None => Err(Error::Fault(fault::INVALID_PARAMS.with_detail(
                        format!("{} out of range for {}", v, stringify!($ty))
                    ))),
                },
                other => Err(mismatch(&other, stringify!($ty))),
            }
        })*
    }
}

impl<'de> de::Deserializer<'de> for ValueDeserializer {
    type Error = Error;

    deserialize_int! {
        deserialize_i8 => visit_i8(i8),
        deserialize_i16 => visit_i16(i16),
        deserialize_i32 => visit_i32(i32),
        deserialize_i64 => visit_i64(i64),
        deserialize_u8 => visit_u8(u8),
        deserialize_u16 => visit_u16(u16),
        deserialize_u32 => visit_u32(u32),
        deserialize_u64 => visit_u64(u64)
    }

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        match self.value {
            Value::Int(v) => visitor.visit_i64(v),
            Value::Double(v) => visitor.visit_f64(v),
            Value::String(v) => visitor.visit_string(v),
            Value::Boolean(v) => visitor.visit_bool(v),
            Value::DateTime(v) => visit_datetime(v, visitor),
            Value::Base64(v) => visitor.visit_byte_buf(v),
            Value::Struct(members) => visit_members(members, visitor),
            Value::Array(values) => visit_values(values.into_iter(), visitor),
            Value::Nil => visitor.visit_unit(),
        }
    }

    fn deserialize_bool<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        match self.value {
            Value::Boolean(v) => visitor.visit_bool(v),
            Value::Nil => visitor.visit_bool(false),
            other => Err(mismatch(&other, "bool")),
        }
    }

    fn deserialize_f32<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        match self.value {
            Value::Double(v) => visitor.visit_f32(v as f32),
            Value::Int(v) => visitor.visit_f32(v as f32),
            Value::Nil => visitor.visit_f32(0.0),
            other => Err(mismatch(&other, "f32")),
        }
    }

    fn deserialize_f64<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        match self.value {
            Value::Double(v) => visitor.visit_f64(v),
            Value::Int(v) => visitor.visit_f64(v as f64),
            Value::Nil => visitor.visit_f64(0.0),
            other => Err(mismatch(&other, "f64")),
        }
    }

    fn deserialize_char<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        if let Value::String(ref s) = self.value {
            let mut chars = s.chars();
            if let (Some(c), None) = (chars.next(), chars.next()) {
                return visitor.visit_char(c);
            }
        }
        Err(mismatch(&self.value, "char"))
    }

    fn deserialize_str<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        self.deserialize_string(visitor)
    }

    fn deserialize_string<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        match self.value {
            Value::String(v) => visitor.visit_string(v),
            Value::Nil => visitor.visit_string(String::new()),
            other => Err(mismatch(&other, "string")),
        }
    }

    fn deserialize_bytes<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        self.deserialize_byte_buf(visitor)
    }

    fn deserialize_byte_buf<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        match self.value {
            Value::Base64(v) => visitor.visit_byte_buf(v),
            Value::Nil => visitor.visit_byte_buf(Vec::new()),
            other => Err(mismatch(&other, "base64")),
        }
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        match self.value {
            Value::Nil => visitor.visit_none(),
            _ => visitor.visit_some(self),
        }
    }

    fn deserialize_unit<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        match self.value {
            Value::Nil => visitor.visit_unit(),
            other => Err(mismatch(&other, "nil")),
        }
    }

    fn deserialize_unit_struct<V: Visitor<'de>>(self, _name: &'static str, visitor: V) -> Result<V::Value> {
        self.deserialize_unit(visitor)
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(self, _name: &'static str, visitor: V) -> Result<V::Value> {
        visitor.visit_newtype_struct(self)
    }

    // <base64> also fills a Vec<u8>
    fn deserialize_seq<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        match self.value {
            Value::Array(values) => visit_values(values.into_iter(), visitor),
            Value::Base64(data) => visit_values(data.into_iter(), visitor),
            Value::Nil => visit_values(iter::empty::<Value>(), visitor),
            other => Err(mismatch(&other, "array")),
        }
    }

    fn deserialize_tuple<V: Visitor<'de>>(self, len: usize, visitor: V) -> Result<V::Value> {
        match self.value {
            Value::Nil => visit_values(iter::repeat(Value::Nil).take(len), visitor),
            _ => self.deserialize_seq(visitor),
        }
    }

    fn deserialize_tuple_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        len: usize,
        visitor: V,
    ) -> Result<V::Value> {
        self.deserialize_tuple(len, visitor)
    }

    fn deserialize_map<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        match self.value {
            Value::Struct(members) => visit_members(members, visitor),
            Value::Nil => visit_members(Vec::new(), visitor),
            other => Err(mismatch(&other, "map")),
        }
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        name: &'static str,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value> {
        match self.value {
            Value::DateTime(v) if name == DATETIME_TOKEN => visit_datetime(v, visitor),
            Value::String(v) if name == DATETIME_TOKEN => visitor.visit_string(v),
            other if name == DATETIME_TOKEN => Err(mismatch(&other, "dateTime.iso8601")),
            Value::Struct(members) => visit_members(project_members(members, fields), visitor),
            // every field at its own zero value
            Value::Nil => visit_members(fields.iter().map(|f| (f.to_string(), Value::Nil)).collect(), visitor),
            other => Err(mismatch(&other, name)),
        }
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value> {
        match self.value {
            Value::String(variant) => {
                let de: StringDeserializer<Error> = variant.into_deserializer();
                visitor.visit_enum(de)
            }
            Value::Struct(mut members) if members.len() == 1 => match members.pop() {
                Some((variant, value)) => visitor.visit_enum(EnumDeserializer {
                    variant: variant,
                    value: value,
                }),
                None => Err(mismatch(&Value::Struct(Vec::new()), name)),
            },
            other => Err(mismatch(&other, name)),
        }
    }

    fn deserialize_identifier<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        self.deserialize_any(visitor)
    }

    fn deserialize_ignored_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        visitor.visit_unit()
    }
}

/// A one-member `<struct>` read as `Variant(value)`.
struct EnumDeserializer {
    variant: String,
    value: Value,
}

impl<'de> EnumAccess<'de> for EnumDeserializer {
    type Error = Error;
    type Variant = ValueDeserializer;

    fn variant_seed<S: DeserializeSeed<'de>>(self, seed: S) -> Result<(S::Value, ValueDeserializer)> {
        let de: StringDeserializer<Error> = self.variant.into_deserializer();
        let variant = seed.deserialize(de)?;
        Ok((variant, ValueDeserializer::new(self.value)))
    }
}

impl<'de> VariantAccess<'de> for ValueDeserializer {
    type Error = Error;

    fn unit_variant(self) -> Result<()> {
        match self.value {
            Value::Nil => Ok(()),
            other => Err(mismatch(&other, "unit variant")),
        }
    }

    fn newtype_variant_seed<S: DeserializeSeed<'de>>(self, seed: S) -> Result<S::Value> {
        seed.deserialize(self)
    }

    fn tuple_variant<V: Visitor<'de>>(self, _len: usize, visitor: V) -> Result<V::Value> {
        de::Deserializer::deserialize_seq(self, visitor)
    }

    fn struct_variant<V: Visitor<'de>>(self, fields: &'static [&'static str], visitor: V) -> Result<V::Value> {
        de::Deserializer::deserialize_struct(self, "", fields, visitor)
    }
}
