// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Generic JSON value produced by the lenient reader.
//!
//! Objects keep insertion order, which JBeam relies on: the order of keys in a
//! part and of rows in a table is semantic.

use std::cmp::Ordering;
use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Insertion-ordered JSON object.
pub type JObject = IndexMap<String, JValue>;

/// A JSON value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Array(Vec<JValue>),
    Object(JObject),
}

impl JValue {
    /// Get as string slice
    #[inline]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            JValue::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Get as float (integers widen)
    #[inline]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            JValue::Float(f) => Some(*f),
            JValue::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Get as integer
    #[inline]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            JValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    #[inline]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            JValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[inline]
    pub fn as_array(&self) -> Option<&[JValue]> {
        match self {
            JValue::Array(items) => Some(items),
            _ => None,
        }
    }

    #[inline]
    pub fn as_object(&self) -> Option<&JObject> {
        match self {
            JValue::Object(map) => Some(map),
            _ => None,
        }
    }

    #[inline]
    pub fn is_number(&self) -> bool {
        matches!(self, JValue::Int(_) | JValue::Float(_))
    }

    /// Short name of the variant, for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            JValue::Null => "null",
            JValue::Bool(_) => "bool",
            JValue::Int(_) => "int",
            JValue::Float(_) => "float",
            JValue::Str(_) => "string",
            JValue::Array(_) => "array",
            JValue::Object(_) => "object",
        }
    }

    /// Renders a node/element identifier. Numeric ids are accepted and stringified.
    pub fn to_id(&self) -> Option<String> {
        match self {
            JValue::Str(s) if !s.is_empty() => Some(s.clone()),
            JValue::Int(i) => Some(i.to_string()),
            _ => None,
        }
    }

    /// Equality that ignores representation differences JBeam tooling
    /// introduces on a write/read cycle: numeric strings vs numbers, the
    /// strings `"true"`/`"false"` vs booleans, integral floats vs integers,
    /// and the empty list vs the empty string.
    pub fn loosely_eq(&self, other: &JValue) -> bool {
        if self == other {
            return true;
        }
        match (self.loose_number(), other.loose_number()) {
            (Some(a), Some(b)) => return a == b,
            (Some(_), None) | (None, Some(_)) => return false,
            (None, None) => {}
        }
        match (self.loose_bool(), other.loose_bool()) {
            (Some(a), Some(b)) => return a == b,
            (Some(_), None) | (None, Some(_)) => return false,
            (None, None) => {}
        }
        match (self, other) {
            (JValue::Array(a), JValue::Str(s)) | (JValue::Str(s), JValue::Array(a)) => {
                a.is_empty() && s.is_empty()
            }
            (JValue::Array(a), JValue::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.loosely_eq(y))
            }
            (JValue::Object(a), JValue::Object(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .all(|(k, v)| b.get(k).is_some_and(|w| v.loosely_eq(w)))
            }
            _ => false,
        }
    }

    fn loose_number(&self) -> Option<f64> {
        match self {
            JValue::Int(i) => Some(*i as f64),
            JValue::Float(f) => Some(*f),
            JValue::Str(s) => parse_numeric_str(s).and_then(|v| v.as_f64()),
            _ => None,
        }
    }

    fn loose_bool(&self) -> Option<bool> {
        match self {
            JValue::Bool(b) => Some(*b),
            JValue::Str(s) if s == "true" => Some(true),
            JValue::Str(s) if s == "false" => Some(false),
            _ => None,
        }
    }

    fn type_rank(&self) -> u8 {
        match self {
            JValue::Null => 0,
            JValue::Bool(_) => 1,
            JValue::Int(_) | JValue::Float(_) => 2,
            JValue::Str(_) => 3,
            JValue::Array(_) => 4,
            JValue::Object(_) => 5,
        }
    }

    /// Total order over values, used to sort elements deterministically.
    ///
    /// Values of different kinds order by kind; numbers compare numerically
    /// regardless of int/float representation.
    pub fn total_cmp(&self, other: &JValue) -> Ordering {
        match (self, other) {
            (JValue::Bool(a), JValue::Bool(b)) => a.cmp(b),
            (JValue::Int(a), JValue::Int(b)) => a.cmp(b),
            (a, b) if a.is_number() && b.is_number() => {
                let x = a.as_f64().unwrap_or_default();
                let y = b.as_f64().unwrap_or_default();
                x.total_cmp(&y)
            }
            (JValue::Str(a), JValue::Str(b)) => a.cmp(b),
            (JValue::Array(a), JValue::Array(b)) => {
                for (x, y) in a.iter().zip(b) {
                    let ord = x.total_cmp(y);
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                a.len().cmp(&b.len())
            }
            (JValue::Object(a), JValue::Object(b)) => {
                for ((ka, va), (kb, vb)) in a.iter().zip(b) {
                    let ord = ka.cmp(kb).then_with(|| va.total_cmp(vb));
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                a.len().cmp(&b.len())
            }
            _ => self.type_rank().cmp(&other.type_rank()),
        }
    }

    /// Compact JSON rendering with `": "` / `", "` separators.
    pub fn to_json_string(&self) -> String {
        let mut out = String::new();
        write_value(&mut out, self);
        out
    }
}

/// Parses a string holding a plain integer or float literal.
///
/// Returns `None` for anything else, including `FLT_MAX`, `inf` and `nan`.
pub fn parse_numeric_str(s: &str) -> Option<JValue> {
    let t = s.trim();
    if t.is_empty() {
        return None;
    }
    let body = t.strip_prefix('-').unwrap_or(t);
    let well_formed = body
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-'))
        && body.starts_with(|c: char| c.is_ascii_digit() || c == '.')
        && body.chars().any(|c| c.is_ascii_digit());
    if !well_formed {
        return None;
    }
    if let Ok(i) = t.parse::<i64>() {
        return Some(JValue::Int(i));
    }
    fast_float::parse::<f64, _>(t)
        .ok()
        .filter(|f| f.is_finite())
        .map(JValue::Float)
}

pub(crate) fn write_value(out: &mut String, value: &JValue) {
    match value {
        JValue::Null => out.push_str("null"),
        JValue::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        JValue::Int(i) => out.push_str(&i.to_string()),
        JValue::Float(f) => out.push_str(&format_float(*f)),
        JValue::Str(s) => write_string(out, s),
        JValue::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_value(out, item);
            }
            out.push(']');
        }
        JValue::Object(map) => {
            out.push('{');
            for (i, (k, v)) in map.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_string(out, k);
                out.push_str(": ");
                write_value(out, v);
            }
            out.push('}');
        }
    }
}

/// Float rendering that always reads back as a float.
pub fn format_float(f: f64) -> String {
    if !f.is_finite() {
        return "null".to_string();
    }
    let s = format!("{f:?}");
    if s.contains(['.', 'e', 'E']) {
        s
    } else {
        format!("{s}.0")
    }
}

/// Writes a JSON string literal with escapes.
pub fn write_string(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{08}' => out.push_str("\\b"),
            '\u{0c}' => out.push_str("\\f"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
}

impl fmt::Display for JValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_json_string())
    }
}

impl From<&str> for JValue {
    fn from(s: &str) -> Self {
        JValue::Str(s.to_string())
    }
}

impl From<String> for JValue {
    fn from(s: String) -> Self {
        JValue::Str(s)
    }
}

impl From<i64> for JValue {
    fn from(i: i64) -> Self {
        JValue::Int(i)
    }
}

impl From<i32> for JValue {
    fn from(i: i32) -> Self {
        JValue::Int(i64::from(i))
    }
}

impl From<u32> for JValue {
    fn from(i: u32) -> Self {
        JValue::Int(i64::from(i))
    }
}

impl From<f64> for JValue {
    fn from(f: f64) -> Self {
        JValue::Float(f)
    }
}

impl From<bool> for JValue {
    fn from(b: bool) -> Self {
        JValue::Bool(b)
    }
}

impl From<Vec<JValue>> for JValue {
    fn from(items: Vec<JValue>) -> Self {
        JValue::Array(items)
    }
}

impl From<JObject> for JValue {
    fn from(map: JObject) -> Self {
        JValue::Object(map)
    }
}

impl From<&JValue> for serde_json::Value {
    fn from(value: &JValue) -> Self {
        match value {
            JValue::Null => serde_json::Value::Null,
            JValue::Bool(b) => serde_json::Value::Bool(*b),
            JValue::Int(i) => serde_json::Value::from(*i),
            JValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            JValue::Str(s) => serde_json::Value::String(s.clone()),
            JValue::Array(items) => {
                serde_json::Value::Array(items.iter().map(serde_json::Value::from).collect())
            }
            JValue::Object(map) => serde_json::Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), serde_json::Value::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<serde_json::Value> for JValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => JValue::Null,
            serde_json::Value::Bool(b) => JValue::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => JValue::Int(i),
                None => JValue::Float(n.as_f64().unwrap_or_default()),
            },
            serde_json::Value::String(s) => JValue::Str(s),
            serde_json::Value::Array(items) => {
                JValue::Array(items.into_iter().map(JValue::from).collect())
            }
            serde_json::Value::Object(map) => {
                JValue::Object(map.into_iter().map(|(k, v)| (k, JValue::from(v))).collect())
            }
        }
    }
}

/// Builds a [`JObject`] from `key => value` pairs.
///
/// ```
/// use jbeam_lite_core::{jobject, JValue};
///
/// let obj = jobject! { "nodeWeight" => 25, "group" => "body" };
/// assert_eq!(obj["nodeWeight"], JValue::Int(25));
/// ```
#[macro_export]
macro_rules! jobject {
    () => { $crate::JObject::new() };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut map = $crate::JObject::new();
        $( map.insert(($key).to_string(), $crate::JValue::from($value)); )+
        map
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accessors() {
        assert_eq!(JValue::Int(3).as_f64(), Some(3.0));
        assert_eq!(JValue::Float(2.5).as_i64(), None);
        assert_eq!(JValue::from("n1").as_str(), Some("n1"));
        assert_eq!(JValue::Int(7).to_id(), Some("7".to_string()));
        assert_eq!(JValue::from("").to_id(), None);
    }

    #[test]
    fn compact_rendering() {
        let mut obj = JObject::new();
        obj.insert("a".into(), JValue::Float(1.0));
        obj.insert("b".into(), JValue::Array(vec![JValue::from("x\"y"), JValue::Null]));
        assert_eq!(
            JValue::Object(obj).to_json_string(),
            r#"{"a": 1.0, "b": ["x\"y", null]}"#
        );
    }

    #[test]
    fn float_rendering_keeps_kind() {
        assert_eq!(format_float(2.0), "2.0");
        assert_eq!(format_float(-0.25), "-0.25");
        assert_eq!(format_float(0.125), "0.125");
    }

    #[test]
    fn numeric_strings() {
        assert_eq!(parse_numeric_str("1000"), Some(JValue::Int(1000)));
        assert_eq!(parse_numeric_str("-0.5"), Some(JValue::Float(-0.5)));
        assert_eq!(parse_numeric_str("FLT_MAX"), None);
        assert_eq!(parse_numeric_str("inf"), None);
        assert_eq!(parse_numeric_str("|NM_METAL"), None);
        assert_eq!(parse_numeric_str(""), None);
    }

    #[test]
    fn loose_equality() {
        assert!(JValue::from("10").loosely_eq(&JValue::Int(10)));
        assert!(JValue::Float(1.0).loosely_eq(&JValue::Int(1)));
        assert!(JValue::from("true").loosely_eq(&JValue::Bool(true)));
        assert!(JValue::Array(vec![]).loosely_eq(&JValue::from("")));
        assert!(!JValue::from("false").loosely_eq(&JValue::Bool(true)));
        assert!(!JValue::from("body").loosely_eq(&JValue::Int(0)));
    }

    #[test]
    fn total_order_mixes_numbers() {
        assert_eq!(JValue::Int(1).total_cmp(&JValue::Float(1.5)), Ordering::Less);
        assert_eq!(JValue::Float(2.0).total_cmp(&JValue::Int(2)), Ordering::Equal);
        assert_eq!(JValue::Null.total_cmp(&JValue::from("a")), Ordering::Less);
        assert_eq!(
            JValue::from("a").total_cmp(&JValue::Array(vec![])),
            Ordering::Less
        );
    }

    #[test]
    fn serde_json_roundtrip_keeps_order() {
        let obj = crate::jobject! { "z" => 1, "a" => 2.5, "m" => "s" };
        let json = serde_json::Value::from(&JValue::Object(obj.clone()));
        let back = JValue::from(json);
        assert_eq!(back, JValue::Object(obj));
    }

    #[test]
    fn serde_untagged() {
        let v: JValue = serde_json::from_str(r#"{"n": 1, "f": 1.5, "l": [true, null]}"#).unwrap();
        let obj = v.as_object().unwrap();
        assert_eq!(obj["n"], JValue::Int(1));
        assert_eq!(obj["f"], JValue::Float(1.5));
        assert_eq!(
            obj["l"],
            JValue::Array(vec![JValue::Bool(true), JValue::Null])
        );
    }
}
