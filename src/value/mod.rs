pub mod serializer;

use crate::Result;
use crate::value::serializer::ValueSerializer;
use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde::ser::{SerializeMap, SerializeSeq};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// A dynamically typed template context value.
///
/// Contexts handed to the engine are owned by the caller; the renderer only
/// ever borrows them, so a context can be rendered any number of times.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    I64(i64),
    F64(f64),
    Str(String),

    /// Point in time, rendered as RFC 3339 unless formatted by `formatDate`
    DateTime(DateTime<Utc>),

    /// Ordered list of values (e.g. arrays, tuples)
    List(Vec<Value>),

    /// Key-value map (e.g. structs, JSON objects), kept in key order so that
    /// rendering a map is deterministic
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Converts any `Serialize` type into a `Value`.
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> Result<Value> {
        value.serialize(ValueSerializer)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// `Null`, `false`, zero, NaN, the empty string and empty collections are falsy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::I64(n) => *n != 0,
            Value::F64(n) => *n != 0.0 && !n.is_nan(),
            Value::Str(s) => !s.is_empty(),
            Value::DateTime(_) => true,
            Value::List(l) => !l.is_empty(),
            Value::Map(m) => !m.is_empty(),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::I64(n) => Some(*n as f64),
            Value::F64(n) => Some(*n),
            Value::Str(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Looks up a direct child by key; lists accept numeric keys.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Map(m) => m.get(key),
            Value::List(l) => key.parse::<usize>().ok().and_then(|i| l.get(i)),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::I64(_) | Value::F64(_) => "number",
            Value::Str(_) => "string",
            Value::DateTime(_) => "datetime",
            Value::List(_) => "list",
            Value::Map(_) => "map",
        }
    }

    /// Builds a number value, collapsing integral floats into `I64`.
    pub fn number(n: f64) -> Value {
        if n.fract() == 0.0 && n.is_finite() && n.abs() < i64::MAX as f64 {
            Value::I64(n as i64)
        } else {
            Value::F64(n)
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{}", b),
            Value::I64(n) => write!(f, "{}", n),
            Value::F64(n) => write!(f, "{}", n),
            Value::Str(s) => f.write_str(s),
            Value::DateTime(dt) => f.write_str(&dt.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            Value::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{}", item)?;
                }
                Ok(())
            }
            Value::Map(_) => {
                let json = serde_json::to_string(self).map_err(|_| fmt::Error)?;
                f.write_str(&json)
            }
        }
    }
}

impl Serialize for Value {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::I64(n) => serializer.serialize_i64(*n),
            Value::F64(n) => serializer.serialize_f64(*n),
            Value::Str(s) => serializer.serialize_str(s),
            Value::DateTime(dt) => {
                serializer.serialize_str(&dt.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            }
            Value::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Map(m) => {
                let mut map = serializer.serialize_map(Some(m.len()))?;
                for (k, v) in m {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::I64(i),
                None => Value::F64(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::Str(s),
            serde_json::Value::Array(items) => Value::List(items.into_iter().map(Value::from).collect()),
            serde_json::Value::Object(m) => {
                Value::Map(m.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

/// Anything that can be used as a template context.
pub trait ToValue {
    fn to_value(&self) -> Value;
}

macro_rules! impl_to_value_primitive {
    ($rust_type:ty, $variant:ident) => {
        impl ToValue for $rust_type {
            fn to_value(&self) -> Value {
                Value::$variant(self.clone().into())
            }
        }
    };
}

impl_to_value_primitive!(bool, Bool);
impl_to_value_primitive!(String, Str);
impl_to_value_primitive!(i8, I64);
impl_to_value_primitive!(i16, I64);
impl_to_value_primitive!(i32, I64);
impl_to_value_primitive!(i64, I64);
impl_to_value_primitive!(u8, I64);
impl_to_value_primitive!(u16, I64);
impl_to_value_primitive!(u32, I64);
impl_to_value_primitive!(f32, F64);
impl_to_value_primitive!(f64, F64);
impl_to_value_primitive!(DateTime<Utc>, DateTime);

impl ToValue for u64 {
    fn to_value(&self) -> Value {
        match i64::try_from(*self) {
            Ok(n) => Value::I64(n),
            Err(_) => Value::F64(*self as f64),
        }
    }
}

impl ToValue for usize {
    fn to_value(&self) -> Value {
        (*self as u64).to_value()
    }
}

impl ToValue for char {
    fn to_value(&self) -> Value {
        Value::Str(self.to_string())
    }
}

impl ToValue for str {
    fn to_value(&self) -> Value {
        Value::Str(self.to_string())
    }
}

impl ToValue for NaiveDateTime {
    fn to_value(&self) -> Value {
        Value::DateTime(self.and_utc())
    }
}

impl ToValue for NaiveDate {
    fn to_value(&self) -> Value {
        match self.and_hms_opt(0, 0, 0) {
            Some(dt) => Value::DateTime(dt.and_utc()),
            None => Value::Null,
        }
    }
}

impl ToValue for Value {
    fn to_value(&self) -> Value {
        self.clone()
    }
}

impl ToValue for serde_json::Value {
    fn to_value(&self) -> Value {
        Value::from(self.clone())
    }
}

impl ToValue for () {
    fn to_value(&self) -> Value {
        Value::Null
    }
}

impl<T> ToValue for &T
where
    T: ToValue + ?Sized,
{
    fn to_value(&self) -> Value {
        (**self).to_value()
    }
}

impl<T: ToValue> ToValue for Option<T> {
    fn to_value(&self) -> Value {
        match self {
            Some(v) => v.to_value(),
            None => Value::Null,
        }
    }
}

impl<T: ToValue> ToValue for Vec<T> {
    fn to_value(&self) -> Value {
        Value::List(self.iter().map(|v| v.to_value()).collect())
    }
}

impl<T: ToValue> ToValue for [T] {
    fn to_value(&self) -> Value {
        Value::List(self.iter().map(|v| v.to_value()).collect())
    }
}

impl<T: ToValue> ToValue for HashMap<String, T> {
    fn to_value(&self) -> Value {
        Value::Map(self.iter().map(|(k, v)| (k.clone(), v.to_value())).collect())
    }
}

impl<T: ToValue> ToValue for BTreeMap<String, T> {
    fn to_value(&self) -> Value {
        Value::Map(self.iter().map(|(k, v)| (k.clone(), v.to_value())).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_truthiness() {
        assert!(!Value::Null.is_truthy());
        assert!(!Value::Bool(false).is_truthy());
        assert!(!Value::I64(0).is_truthy());
        assert!(!Value::F64(f64::NAN).is_truthy());
        assert!(!Value::Str(String::new()).is_truthy());
        assert!(!Value::List(vec![]).is_truthy());
        assert!(Value::Str("0".to_string()).is_truthy());
        assert!(Value::List(vec![Value::Null]).is_truthy());
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::Null.to_string(), "");
        assert_eq!(Value::F64(3.0).to_string(), "3");
        assert_eq!(Value::F64(2.5).to_string(), "2.5");
        let list = Value::from(json!([1, "a", true]));
        assert_eq!(list.to_string(), "1,a,true");
        let map = Value::from(json!({"k": [1, 2]}));
        assert_eq!(map.to_string(), r#"{"k":[1,2]}"#);
    }

    #[test]
    fn test_from_json() {
        let v = Value::from(json!({"a": {"b": 1.5}, "n": null}));
        assert_eq!(v.get("a").and_then(|a| a.get("b")), Some(&Value::F64(1.5)));
        assert_eq!(v.get("n"), Some(&Value::Null));
    }

    #[test]
    fn test_list_index_lookup() {
        let v = Value::from(json!(["x", "y"]));
        assert_eq!(v.get("1"), Some(&Value::Str("y".to_string())));
        assert_eq!(v.get("7"), None);
    }

    #[test]
    fn test_number_collapses_integral_floats() {
        assert_eq!(Value::number(4.0), Value::I64(4));
        assert_eq!(Value::number(0.5), Value::F64(0.5));
    }

    #[test]
    fn test_map_display_is_key_ordered() {
        let mut m = HashMap::new();
        for (i, k) in ["d", "a", "c", "b"].iter().enumerate() {
            m.insert(k.to_string(), i as i64);
        }
        assert_eq!(m.to_value().to_string(), r#"{"a":1,"b":3,"c":2,"d":0}"#);
    }
}
