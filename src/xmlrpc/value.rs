// Copyright 2014-2015 Galen Clark Haynes
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

// Rust XML-RPC library

use std::fmt;

use serde::de::{self, Deserialize, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::ser::{Serialize, Serializer};
use time::macros::format_description;
use time::PrimitiveDateTime;

use crate::xmlrpc::encoding;

// Newtype names the XML-RPC serializer and deserializer recognise. Any other
// serde format just sees a string (or a one-entry map for dates).
pub(crate) const DATETIME_TOKEN: &str = "$xmlrpc::private::DateTime";
pub(crate) const DATETIME_FIELD: &str = "$xmlrpc::private::datetime";
pub(crate) const RAW_VALUE_TOKEN: &str = "$xmlrpc::private::RawValue";

/// Represents one XML-RPC `<value>`.
#[derive(Clone, PartialEq, Debug)]
pub enum Value {
    Int(i64),
    Double(f64),
    String(String),
    Boolean(bool),
    DateTime(DateTime),
    Base64(Vec<u8>),
    /// Members in document order. Names are not required to be unique.
    Struct(Vec<(String, Value)>),
    Array(Vec<Value>),
    Nil,
}

impl Value {
    /// The wire type name, as used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match *self {
            Value::Int(_) => "int",
            Value::Double(_) => "double",
            Value::String(_) => "string",
            Value::Boolean(_) => "boolean",
            Value::DateTime(_) => "dateTime.iso8601",
            Value::Base64(_) => "base64",
            Value::Struct(_) => "struct",
            Value::Array(_) => "array",
            Value::Nil => "nil",
        }
    }

    /// If the value is a Struct, returns the member with the provided name.
    /// When a name repeats, the last member wins.
    pub fn find<'a>(&'a self, key: &str) -> Option<&'a Value> {
        match *self {
            Value::Struct(ref members) => members.iter().rev().find(|m| m.0 == key).map(|m| &m.1),
            _ => None,
        }
    }

    /// Attempts to get a nested Struct member for each key in `keys`.
    pub fn find_path<'a>(&'a self, keys: &[&str]) -> Option<&'a Value> {
        let mut target = self;
        for key in keys {
            target = target.find(key)?;
        }
        Some(target)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Value::Int(n) => Some(n),
            _ => None,
        }
    }

    /// Integers widen to f64.
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::Int(n) => num::cast(n),
            Value::Double(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match *self {
            Value::String(ref s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            Value::Boolean(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<&DateTime> {
        match *self {
            Value::DateTime(ref dt) => Some(dt),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match *self {
            Value::Base64(ref data) => Some(data),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match *self {
            Value::Array(ref values) => Some(values),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&[(String, Value)]> {
        match *self {
            Value::Struct(ref members) => Some(members),
            _ => None,
        }
    }

    pub fn is_nil(&self) -> bool {
        match *self {
            Value::Nil => true,
            _ => false,
        }
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Value {
        Value::Int(v.into())
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Value {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Value {
        Value::Double(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Value {
        Value::Boolean(v)
    }
}

impl<'a> From<&'a str> for Value {
    fn from(v: &str) -> Value {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Value {
        Value::String(v)
    }
}

impl From<DateTime> for Value {
    fn from(v: DateTime) -> Value {
        Value::DateTime(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Value {
        Value::Array(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Value {
        v.map_or(Value::Nil, Into::into)
    }
}

// The tree is rendered once and handed over verbatim, so struct members keep
// their stored order.
impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut xml = Vec::new();
        encoding::write_value(&mut xml, self).map_err(<S::Error as serde::ser::Error>::custom)?;
        let xml = String::from_utf8(xml).map_err(<S::Error as serde::ser::Error>::custom)?;
        serializer.serialize_newtype_struct(RAW_VALUE_TOKEN, &xml)
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Value, D::Error> {
        deserializer.deserialize_any(ValueVisitor)
    }
}

struct ValueVisitor;

impl<'de> Visitor<'de> for ValueVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("an XML-RPC value")
    }

    fn visit_bool<E>(self, v: bool) -> Result<Value, E> {
        Ok(Value::Boolean(v))
    }

    fn visit_i64<E>(self, v: i64) -> Result<Value, E> {
        Ok(Value::Int(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Value, E> {
        num::cast(v)
            .map(Value::Int)
            .ok_or_else(|| E::custom(format!("integer {} out of range", v)))
    }

    fn visit_f64<E>(self, v: f64) -> Result<Value, E> {
        Ok(Value::Double(v))
    }

    fn visit_str<E>(self, v: &str) -> Result<Value, E> {
        Ok(Value::String(v.to_string()))
    }

    fn visit_string<E>(self, v: String) -> Result<Value, E> {
        Ok(Value::String(v))
    }

    fn visit_bytes<E>(self, v: &[u8]) -> Result<Value, E> {
        Ok(Value::Base64(v.to_vec()))
    }

    fn visit_byte_buf<E>(self, v: Vec<u8>) -> Result<Value, E> {
        Ok(Value::Base64(v))
    }

    fn visit_unit<E>(self) -> Result<Value, E> {
        Ok(Value::Nil)
    }

    fn visit_none<E>(self) -> Result<Value, E> {
        Ok(Value::Nil)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Value, D::Error> {
        deserializer.deserialize_any(ValueVisitor)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Value, A::Error> {
        let mut values = Vec::new();
        while let Some(value) = seq.next_element()? {
            values.push(value);
        }
        Ok(Value::Array(values))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Value, A::Error> {
        let mut members = Vec::new();
        while let Some(key) = map.next_key::<String>()? {
            if key == DATETIME_FIELD {
                let text: String = map.next_value()?;
                return DateTime::parse(&text).map(Value::DateTime).map_err(de::Error::custom);
            }
            members.push((key, map.next_value()?));
        }
        Ok(Value::Struct(members))
    }
}

/// A wall-clock date and time as carried by `<dateTime.iso8601>`.
///
/// The wire format has no timezone, so the value is whatever local time the
/// peer meant; no offset is ever attached or assumed.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct DateTime(pub PrimitiveDateTime);

impl DateTime {
    pub fn new(dt: PrimitiveDateTime) -> DateTime {
        DateTime(dt)
    }

    /// Parses the fixed `YYYYMMDDTHH:MM:SS` pattern.
    pub fn parse(s: &str) -> Result<DateTime, time::error::Parse> {
        let format = format_description!("[year][month][day]T[hour]:[minute]:[second]");
        PrimitiveDateTime::parse(s.trim(), &format).map(DateTime)
    }

    /// Formats as `YYYYMMDDTHH:MM:SS`.
    pub fn format(&self) -> Result<String, time::error::Format> {
        let format = format_description!("[year][month][day]T[hour]:[minute]:[second]");
        self.0.format(&format)
    }

    pub fn into_inner(self) -> PrimitiveDateTime {
        self.0
    }
}

impl From<PrimitiveDateTime> for DateTime {
    fn from(dt: PrimitiveDateTime) -> DateTime {
        DateTime(dt)
    }
}

impl fmt::Display for DateTime {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.format() {
            Ok(s) => f.write_str(&s),
            Err(_) => write!(f, "{}", self.0),
        }
    }
}

impl Serialize for DateTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let text = self.format().map_err(<S::Error as serde::ser::Error>::custom)?;
        serializer.serialize_newtype_struct(DATETIME_TOKEN, &text)
    }
}

impl<'de> Deserialize<'de> for DateTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<DateTime, D::Error> {
        deserializer.deserialize_struct(DATETIME_TOKEN, &[DATETIME_FIELD], DateTimeVisitor)
    }
}

struct DateTimeVisitor;

impl<'de> Visitor<'de> for DateTimeVisitor {
    type Value = DateTime;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a dateTime.iso8601 value")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<DateTime, E> {
        DateTime::parse(v).map_err(E::custom)
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<DateTime, A::Error> {
        match map.next_key::<String>()? {
            Some(ref key) if key == DATETIME_FIELD => {
                let text: String = map.next_value()?;
                DateTime::parse(&text).map_err(de::Error::custom)
            }
            _ => Err(de::Error::custom("expected a dateTime.iso8601 value")),
        }
    }
}

/// Bytes carried as `<base64>`.
///
/// A plain `Vec<u8>` decodes from `<base64>` as well, but serde encodes it as
/// an array of integers; wrap it to send base64.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Default)]
pub struct Base64(pub Vec<u8>);

impl From<Vec<u8>> for Base64 {
    fn from(data: Vec<u8>) -> Base64 {
        Base64(data)
    }
}

impl Serialize for Base64 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bytes(&self.0)
    }
}

impl<'de> Deserialize<'de> for Base64 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Base64, D::Error> {
        deserializer.deserialize_byte_buf(Base64Visitor)
    }
}

struct Base64Visitor;

impl<'de> Visitor<'de> for Base64Visitor {
    type Value = Base64;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("base64 data")
    }

    fn visit_bytes<E>(self, v: &[u8]) -> Result<Base64, E> {
        Ok(Base64(v.to_vec()))
    }

    fn visit_byte_buf<E>(self, v: Vec<u8>) -> Result<Base64, E> {
        Ok(Base64(v))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Base64, A::Error> {
        let mut data = Vec::new();
        while let Some(byte) = seq.next_element()? {
            data.push(byte);
        }
        Ok(Base64(data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn person() -> Value {
        Value::Struct(vec![
            ("Name".to_string(), Value::from("Johnny")),
            ("Age".to_string(), Value::from(33)),
            ("Address".to_string(), Value::Struct(vec![
                ("Number".to_string(), Value::from(221)),
                ("Street".to_string(), Value::from("Baker str.")),
            ])),
            ("Age".to_string(), Value::from(34)),
        ])
    }

    #[test]
    fn test_find_last_member_wins() {
        assert_eq!(Some(34), person().find("Age").and_then(Value::as_i64));
        assert_eq!(None, person().find("Surname"));
        assert_eq!(None, Value::from(1).find("Age"));
    }

    #[test]
    fn test_find_path() {
        let p = person();
        assert_eq!(Some("Baker str."), p.find_path(&["Address", "Street"]).and_then(Value::as_str));
        assert_eq!(None, p.find_path(&["Address", "Country"]));
    }

    #[test]
    fn test_accessors() {
        assert_eq!(Some(2.0), Value::from(2).as_f64());
        assert_eq!(None, Value::from("2").as_f64());
        assert_eq!(Some(true), Value::from(true).as_bool());
        assert!(Value::from(None::<i32>).is_nil());
        assert_eq!("dateTime.iso8601", Value::DateTime(DateTime(datetime!(2012-07-17 14:08:55))).kind());
    }

    #[test]
    fn test_datetime_format_and_parse() {
        let dt = DateTime(datetime!(2012-07-17 14:08:55));
        assert_eq!("20120717T14:08:55", dt.format().unwrap());
        assert_eq!(dt, DateTime::parse("20120717T14:08:55").unwrap());
        assert_eq!(dt, DateTime::parse(" 20120717T14:08:55\n").unwrap());
    }

    #[test]
    fn test_datetime_rejects_other_layouts() {
        assert!(DateTime::parse("2012-07-17T14:08:55").is_err());
        assert!(DateTime::parse("20120717T14:08:55Z").is_err());
        assert!(DateTime::parse("20121317T14:08:55").is_err());
    }
}
