//! A strict JSON value model with write-once members and lockable containers.
//!
//! Values are a tagged variant rather than a trait hierarchy; containers own
//! their children, so a failed parse drops everything it built. Objects keep
//! members in insertion order for deterministic re-serialization.

use crate::error::{Error, ErrorKind, Result};
use std::fmt::Write as _;
use zeroize::Zeroize;

mod parser;

/// Bounds enforced while parsing untrusted JSON text.
#[derive(Clone, Copy, Debug)]
pub struct Limits {
    /// Maximum total source length in bytes.
    pub json_string_size: usize,
    /// Maximum nested container depth.
    pub recursion_depth: u32,
    /// Maximum characters in one numeral.
    pub numeral_length: usize,
    /// Maximum bytes in one string value.
    pub string_size: usize,
    /// Maximum elements per array.
    pub array_elem_count: usize,
    /// Maximum members per object.
    pub object_mbr_count: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            json_string_size: 4 * 1024 * 1024,
            recursion_depth: 32,
            numeral_length: 256,
            string_size: 64 * 1024,
            array_elem_count: 4096,
            object_mbr_count: 256,
        }
    }
}

/// A JSON value.
///
/// Numbers that fit a signed 64-bit integer are stored as [`Json::Integer`];
/// any other numeral keeps its textual form so round-trips never lose
/// precision.
#[derive(Clone, Debug, PartialEq)]
pub enum Json {
    Null,
    Bool(bool),
    Integer(i64),
    Number(String),
    String(String),
    Array(Array),
    Object(Object),
}

impl Json {
    /// Parse an arbitrary JSON document; the top-level value must be an
    /// object or an array.
    pub fn parse(text: &str) -> Result<Json> {
        Self::parse_with_limits(&Limits::default(), text)
    }

    /// Parse with explicit [`Limits`].
    pub fn parse_with_limits(limits: &Limits, text: &str) -> Result<Json> {
        parser::parse_value(limits, text)
    }

    /// The name of this value's type, as used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Json::Null => "null",
            Json::Bool(_) => "bool",
            Json::Integer(_) => "integer",
            Json::Number(_) => "number",
            Json::String(_) => "string",
            Json::Array(_) => "array",
            Json::Object(_) => "object",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Json::Null)
    }

    pub fn to_bool(&self) -> Result<bool> {
        match self {
            Json::Bool(value) => Ok(*value),
            other => Err(mismatch("bool", other)),
        }
    }

    pub fn to_integer(&self) -> Result<i64> {
        match self {
            Json::Integer(value) => Ok(*value),
            other => Err(mismatch("integer", other)),
        }
    }

    /// The textual numeral for an integer or decimal value.
    pub fn to_number(&self) -> Result<String> {
        match self {
            Json::Integer(value) => Ok(value.to_string()),
            Json::Number(text) => Ok(text.clone()),
            other => Err(mismatch("number", other)),
        }
    }

    pub fn as_string(&self) -> Result<&str> {
        match self {
            Json::String(value) => Ok(value),
            other => Err(mismatch("string", other)),
        }
    }

    pub fn as_array(&self) -> Result<&Array> {
        match self {
            Json::Array(value) => Ok(value),
            other => Err(mismatch("array", other)),
        }
    }

    pub fn as_array_mut(&mut self) -> Result<&mut Array> {
        match self {
            Json::Array(value) => Ok(value),
            other => Err(mismatch("array", other)),
        }
    }

    pub fn as_object(&self) -> Result<&Object> {
        match self {
            Json::Object(value) => Ok(value),
            other => Err(mismatch("object", other)),
        }
    }

    pub fn as_object_mut(&mut self) -> Result<&mut Object> {
        match self {
            Json::Object(value) => Ok(value),
            other => Err(mismatch("object", other)),
        }
    }

    /// Lock the container held by this value, if any, including every
    /// container nested inside it.
    pub fn lock_deep(&mut self) {
        match self {
            Json::Array(array) => array.lock_deep(),
            Json::Object(object) => object.lock_deep(),
            _ => {}
        }
    }

    /// Overwrite string and numeral backing storage in place.
    pub fn invalidate(&mut self) {
        match self {
            Json::Number(text) | Json::String(text) => text.zeroize(),
            Json::Array(array) => array.invalidate(),
            Json::Object(object) => object.invalidate(),
            _ => {}
        }
    }

    /// Serialize to compact RFC 8259 text.
    pub fn to_json(&self) -> String {
        let mut out = String::new();
        self.write_json(&mut out);
        out
    }

    fn write_json(&self, out: &mut String) {
        match self {
            Json::Null => out.push_str("null"),
            Json::Bool(true) => out.push_str("true"),
            Json::Bool(false) => out.push_str("false"),
            Json::Integer(value) => {
                let _ = write!(out, "{value}");
            }
            Json::Number(text) => out.push_str(text),
            Json::String(value) => write_escaped(out, value),
            Json::Array(array) => array.write_json(out),
            Json::Object(object) => object.write_json(out),
        }
    }
}

fn mismatch(wanted: &'static str, found: &Json) -> Error {
    Error::new(ErrorKind::TypeMismatch { wanted, found: found.type_name() })
}

fn write_escaped(out: &mut String, value: &str) {
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\u{08}' => out.push_str("\\b"),
            '\u{0c}' => out.push_str("\\f"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

/// An ordered sequence of values with a monotonic lock flag.
#[derive(Clone, Debug, Default)]
pub struct Array {
    elems: Vec<Json>,
    locked: bool,
}

impl Array {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.elems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elems.is_empty()
    }

    pub fn get(&self, index: usize) -> Result<&Json> {
        self.elems.get(index).ok_or_else(|| Error::new(ErrorKind::IndexOutOfRange(index)))
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Json> {
        self.elems.iter()
    }

    pub fn append(&mut self, value: Json) -> Result<()> {
        self.check_unlocked()?;
        self.elems.push(value);
        Ok(())
    }

    /// Lock against further mutation. Idempotent and never cleared.
    pub fn lock(&mut self) {
        self.locked = true;
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub(crate) fn lock_deep(&mut self) {
        self.locked = true;
        for elem in &mut self.elems {
            elem.lock_deep();
        }
    }

    pub fn invalidate(&mut self) {
        for elem in &mut self.elems {
            elem.invalidate();
        }
    }

    fn check_unlocked(&self) -> Result<()> {
        if self.locked {
            return Err(Error::new(ErrorKind::Locked));
        }
        Ok(())
    }

    fn write_json(&self, out: &mut String) {
        out.push('[');
        for (index, elem) in self.elems.iter().enumerate() {
            if index > 0 {
                out.push(',');
            }
            elem.write_json(out);
        }
        out.push(']');
    }
}

impl PartialEq for Array {
    fn eq(&self, other: &Self) -> bool {
        self.elems == other.elems
    }
}

#[derive(Clone, Debug)]
struct Member {
    name: String,
    is_final: bool,
    value: Json,
}

/// An ordered mapping of member name to value.
///
/// Members marked final cannot be replaced; a locked object rejects all
/// mutation. Both properties are monotonic.
#[derive(Clone, Debug, Default)]
pub struct Object {
    members: Vec<Member>,
    locked: bool,
}

impl Object {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON object from text.
    pub fn parse(text: &str) -> Result<Object> {
        Self::parse_with_limits(&Limits::default(), text)
    }

    /// Parse with explicit [`Limits`].
    pub fn parse_with_limits(limits: &Limits, text: &str) -> Result<Object> {
        parser::parse_object(limits, text)
    }

    /// Parse raw bytes, first validating them as well-formed UTF-8.
    pub fn parse_slice(limits: &Limits, bytes: &[u8]) -> Result<Object> {
        let text = std::str::from_utf8(bytes).map_err(|_| Error::malformed_json("malformed UTF-8"))?;
        Self::parse_with_limits(limits, text)
    }

    pub fn count(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn exists(&self, name: &str) -> bool {
        self.members.iter().any(|m| m.name == name)
    }

    /// Member names in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.members.iter().map(|m| m.name.as_str())
    }

    pub fn get(&self, name: &str) -> Result<&Json> {
        self.try_get(name).ok_or_else(|| Error::new(ErrorKind::UnknownMember(name.into())))
    }

    pub fn try_get(&self, name: &str) -> Option<&Json> {
        self.members.iter().find(|m| m.name == name).map(|m| &m.value)
    }

    /// Mutable access to a member's value.
    ///
    /// Finality guards replacement of the member, not interior mutation, so
    /// only the lock flag is checked here.
    pub fn get_mut(&mut self, name: &str) -> Result<&mut Json> {
        self.check_unlocked()?;
        self.members
            .iter_mut()
            .find(|m| m.name == name)
            .map(|m| &mut m.value)
            .ok_or_else(|| Error::new(ErrorKind::UnknownMember(name.into())))
    }

    pub fn is_final(&self, name: &str) -> bool {
        self.members.iter().any(|m| m.name == name && m.is_final)
    }

    /// Insert or overwrite a member. Overwriting a final member fails.
    pub fn set(&mut self, name: impl Into<String>, value: Json) -> Result<()> {
        self.insert(name.into(), value, false)
    }

    /// Insert a write-once member. A later `set` or `set_final` on the same
    /// name fails with `FinalMember`.
    pub fn set_final(&mut self, name: impl Into<String>, value: Json) -> Result<()> {
        self.insert(name.into(), value, true)
    }

    fn insert(&mut self, name: String, value: Json, is_final: bool) -> Result<()> {
        self.check_unlocked()?;
        match self.members.iter_mut().find(|m| m.name == name) {
            Some(member) => {
                if member.is_final {
                    return Err(Error::new(ErrorKind::FinalMember(name)));
                }
                member.value = value;
                member.is_final = is_final;
            }
            None => self.members.push(Member { name, is_final, value }),
        }
        Ok(())
    }

    /// Mark an existing member final without touching its value.
    ///
    /// Bypasses the lock flag: sealing is a tightening operation used after
    /// a decoded claims object has been locked.
    pub(crate) fn seal_member(&mut self, name: &str) {
        if let Some(member) = self.members.iter_mut().find(|m| m.name == name) {
            member.is_final = true;
        }
    }

    /// Lock against further mutation. Idempotent and never cleared.
    pub fn lock(&mut self) {
        self.locked = true;
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub(crate) fn lock_deep(&mut self) {
        self.locked = true;
        for member in &mut self.members {
            member.value.lock_deep();
        }
    }

    pub fn invalidate(&mut self) {
        for member in &mut self.members {
            member.value.invalidate();
        }
    }

    fn check_unlocked(&self) -> Result<()> {
        if self.locked {
            return Err(Error::new(ErrorKind::Locked));
        }
        Ok(())
    }

    /// Serialize to compact RFC 8259 text, members in insertion order.
    pub fn to_json(&self) -> String {
        let mut out = String::new();
        self.write_json(&mut out);
        out
    }

    fn write_json(&self, out: &mut String) {
        out.push('{');
        for (index, member) in self.members.iter().enumerate() {
            if index > 0 {
                out.push(',');
            }
            write_escaped(out, &member.name);
            out.push(':');
            member.value.write_json(out);
        }
        out.push('}');
    }
}

impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        self.members.len() == other.members.len()
            && self
                .members
                .iter()
                .zip(&other.members)
                .all(|(a, b)| a.name == b.name && a.value == b.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_object() -> Object {
        let mut obj = Object::new();
        obj.set("name", Json::String("bob".into())).unwrap();
        obj.set("age", Json::Integer(42)).unwrap();
        obj
    }

    #[test]
    fn members_keep_insertion_order() {
        let obj = sample_object();
        let names: Vec<_> = obj.names().collect();
        assert_eq!(names, ["name", "age"]);
        assert_eq!(obj.to_json(), r#"{"name":"bob","age":42}"#);
    }

    #[test]
    fn final_member_cannot_be_replaced() {
        let mut obj = Object::new();
        obj.set_final("iss", Json::String("alice".into())).unwrap();
        let err = obj.set("iss", Json::String("mallory".into())).expect_err("overwrite succeeded");
        assert_eq!(err.kind(), &ErrorKind::FinalMember("iss".into()));
        let err = obj.set_final("iss", Json::Null).expect_err("overwrite succeeded");
        assert_eq!(err.kind(), &ErrorKind::FinalMember("iss".into()));
        assert_eq!(obj.get("iss").unwrap().as_string().unwrap(), "alice");
    }

    #[test]
    fn non_final_member_can_be_replaced() {
        let mut obj = sample_object();
        obj.set("age", Json::Integer(43)).unwrap();
        assert_eq!(obj.get("age").unwrap().to_integer().unwrap(), 43);
    }

    #[test]
    fn locked_object_rejects_all_mutation() {
        let mut obj = sample_object();
        obj.lock();
        obj.lock(); // idempotent
        assert!(obj.is_locked());
        let err = obj.set("other", Json::Null).expect_err("set succeeded");
        assert_eq!(err.kind(), &ErrorKind::Locked);
        let err = obj.get_mut("name").expect_err("get_mut succeeded");
        assert_eq!(err.kind(), &ErrorKind::Locked);
        // reads still work
        assert_eq!(obj.get("name").unwrap().as_string().unwrap(), "bob");
    }

    #[test]
    fn lock_deep_reaches_nested_containers() {
        let mut inner = Array::new();
        inner.append(Json::Integer(1)).unwrap();
        let mut obj = Object::new();
        obj.set("list", Json::Array(inner)).unwrap();
        obj.lock_deep();
        let locked = obj.try_get("list").unwrap().as_array().unwrap();
        assert!(locked.is_locked());
    }

    #[test]
    fn shallow_lock_leaves_children_mutable() {
        let mut obj = Object::new();
        obj.set("list", Json::Array(Array::new())).unwrap();
        match obj.members.iter_mut().find(|m| m.name == "list") {
            Some(member) => member.value.as_array_mut().unwrap().lock(),
            None => unreachable!(),
        }
        assert!(!obj.is_locked());
    }

    #[test]
    fn missing_member_and_index() {
        let obj = sample_object();
        let err = obj.get("nope").expect_err("get succeeded");
        assert_eq!(err.kind(), &ErrorKind::UnknownMember("nope".into()));

        let array = Array::new();
        let err = array.get(0).expect_err("get succeeded");
        assert_eq!(err.kind(), &ErrorKind::IndexOutOfRange(0));
    }

    #[test]
    fn conversions_are_typed() {
        assert!(Json::Bool(true).to_bool().unwrap());
        assert_eq!(Json::Integer(7).to_integer().unwrap(), 7);
        assert_eq!(Json::Integer(7).to_number().unwrap(), "7");
        assert_eq!(Json::Number("3.14".into()).to_number().unwrap(), "3.14");
        let err = Json::Null.to_integer().expect_err("conversion succeeded");
        assert_eq!(err.kind(), &ErrorKind::TypeMismatch { wanted: "integer", found: "null" });
        let err = Json::String("hi".into()).to_bool().expect_err("conversion succeeded");
        assert_eq!(err.kind(), &ErrorKind::TypeMismatch { wanted: "bool", found: "string" });
    }

    #[test]
    fn string_escaping_round_trips() {
        let value = Json::String("a\"b\\c\n\t\u{1}é".into());
        let text = value.to_json();
        assert_eq!(text, "\"a\\\"b\\\\c\\n\\t\\u0001é\"");
    }

    #[test]
    fn invalidate_overwrites_storage() {
        let mut obj = Object::new();
        obj.set("secret", Json::String("hunter2".into())).unwrap();
        obj.set("pin", Json::Number("1234.5".into())).unwrap();
        obj.invalidate();
        assert_eq!(obj.get("secret").unwrap().as_string().unwrap(), "");
        assert_eq!(obj.get("pin").unwrap().to_number().unwrap(), "");
    }
}
