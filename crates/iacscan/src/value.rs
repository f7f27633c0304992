//! value representation
//!
//! A resolved attribute is one of the following data types
//! - boolean (true/false)
//! - integer (signed, i64)
//! - decimal (f64)
//! - string (utf-8)
//! - array ("list" of values)
//! - object (order-preserving "map"/"dictionary", where the key is of type string)
//! - unknown (could not be determined statically)
//!
//! Additionally:
//! - there is no `null`. A literal `null` is lowered to [Value::Unknown].
//! - every `integer` is also a `decimal`
//! - strings convert to booleans (`"true"`/`"false"`) and numbers (`"42"`) where a boolean or number is
//!   expected. Booleans never convert to numbers.
//!
//! Shape mismatches never error: indexing a string, reading a missing key or an out-of-bounds index all yield
//! [Value::Unknown].
use indexmap::IndexMap;
use serde::{
    ser::{SerializeMap, SerializeSeq},
    Serializer,
};

/// All possible value types
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    Boolean(bool),
    Integer(i64),
    Decimal(f64),
    String(String),
    Array(Vec<Value>),
    Object(IndexMap<String, Value>),
    #[default]
    Unknown,
}

impl Value {
    pub fn is_unknown(&self) -> bool {
        matches!(self, Value::Unknown)
    }

    /// Short name of the value type, used in log output and warnings
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Boolean(_) => "bool",
            Value::Integer(_) => "integer",
            Value::Decimal(_) => "decimal",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Unknown => "unknown",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Boolean view of this value, converting `"true"` and `"false"`
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            Value::String(s) => match s.as_str() {
                "true" => Some(true),
                "false" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    /// Numeric view of this value, converting numeric strings
    pub fn as_number(&self) -> Option<Number> {
        match self {
            Value::Integer(int) => Some(Number::Integer(*int)),
            Value::Decimal(dec) => Some(Number::Decimal(*dec)),
            Value::String(s) => {
                let s = s.trim();
                if let Ok(int) = s.parse::<i64>() {
                    return Some(Number::Integer(int));
                }
                s.parse::<f64>()
                    .ok()
                    .filter(|dec| dec.is_finite())
                    .map(Number::Decimal)
            }
            _ => None,
        }
    }

    /// Bounds-checked list indexing or key lookup
    ///
    /// Lists accept any whole number (or numeric string) as index. Objects accept strings and numbers, numbers are
    /// looked up by their string representation.
    pub fn index(&self, key: &Value) -> Value {
        match self {
            Value::Array(array) => {
                let Some(position) = key.as_number().and_then(Number::as_index) else {
                    return Value::Unknown;
                };
                array.get(position).cloned().unwrap_or_default()
            }
            Value::Object(object) => {
                let Some(key) = key.to_template_string() else {
                    return Value::Unknown;
                };
                object.get(&key).cloned().unwrap_or_default()
            }
            _ => Value::Unknown,
        }
    }

    /// Attribute access, `value.name`
    pub fn get_attr(&self, name: &str) -> Value {
        match self {
            Value::Object(object) => object.get(name).cloned().unwrap_or_default(),
            _ => Value::Unknown,
        }
    }

    /// String form used for interpolation and object keys
    ///
    /// Only primitive values have a string form.
    pub fn to_template_string(&self) -> Option<String> {
        match self {
            Value::Boolean(b) => Some(b.to_string()),
            Value::Integer(int) => Some(int.to_string()),
            Value::Decimal(dec) => Some(dec.to_string()),
            Value::String(s) => Some(s.clone()),
            _ => None,
        }
    }

    /// Equality as used by `==` and `!=`
    ///
    /// Numbers compare by value across integer/decimal. Returns `None` when either side is unknown.
    pub fn loose_eq(&self, other: &Value) -> Option<bool> {
        match (self, other) {
            (Value::Unknown, _) | (_, Value::Unknown) => None,
            (Value::Integer(_) | Value::Decimal(_), Value::Integer(_) | Value::Decimal(_)) => {
                let lhs = self.as_number()?;
                let rhs = other.as_number()?;
                Some(lhs.as_f64() == rhs.as_f64())
            }
            (Value::Array(lhs), Value::Array(rhs)) => {
                if lhs.len() != rhs.len() {
                    return Some(false);
                }
                for (l, r) in lhs.iter().zip(rhs) {
                    if !l.loose_eq(r)? {
                        return Some(false);
                    }
                }
                Some(true)
            }
            (Value::Object(lhs), Value::Object(rhs)) => {
                if lhs.len() != rhs.len() {
                    return Some(false);
                }
                for (key, l) in lhs {
                    let Some(r) = rhs.get(key) else {
                        return Some(false);
                    };
                    if !l.loose_eq(r)? {
                        return Some(false);
                    }
                }
                Some(true)
            }
            _ => Some(self == other),
        }
    }
}

/// Numeric view of a [Value]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Integer(i64),
    Decimal(f64),
}

impl Number {
    pub fn as_f64(self) -> f64 {
        match self {
            Number::Integer(int) => int as f64,
            Number::Decimal(dec) => dec,
        }
    }

    /// A non-negative whole number usable as list index
    pub fn as_index(self) -> Option<usize> {
        match self {
            Number::Integer(int) => usize::try_from(int).ok(),
            Number::Decimal(dec) if dec >= 0.0 && dec.fract() == 0.0 => Some(dec as usize),
            Number::Decimal(_) => None,
        }
    }
}

impl From<Number> for Value {
    fn from(value: Number) -> Self {
        match value {
            Number::Integer(int) => Value::Integer(int),
            Number::Decimal(dec) => Value::Decimal(dec),
        }
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Decimal(value)
    }
}

impl From<hcl::Number> for Value {
    fn from(value: hcl::Number) -> Self {
        if let Some(int) = value.as_i64() {
            return Value::Integer(int);
        }

        // out of range integers are not representable
        value.as_f64().map(Value::Decimal).unwrap_or_default()
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(value: Vec<T>) -> Self {
        Value::Array(value.into_iter().map(Into::into).collect())
    }
}

impl<K: ToString, V: Into<Value>> From<IndexMap<K, V>> for Value {
    fn from(value: IndexMap<K, V>) -> Self {
        Value::Object(
            value
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.into()))
                .collect(),
        )
    }
}

impl serde::ser::Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Value::Boolean(value) => serializer.serialize_bool(*value),
            Value::Integer(value) => serializer.serialize_i64(*value),
            Value::Decimal(value) => serializer.serialize_f64(*value),
            Value::String(value) => serializer.serialize_str(value),
            Value::Array(value) => {
                let mut ser = serializer.serialize_seq(Some(value.len()))?;
                for element in value {
                    ser.serialize_element(element)?;
                }
                ser.end()
            }
            Value::Object(value) => {
                let mut ser = serializer.serialize_map(Some(value.len()))?;
                for (element_key, element_value) in value {
                    ser.serialize_entry(element_key, element_value)?;
                }
                ser.end()
            }
            Value::Unknown => serializer.serialize_none(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn rules() -> Value {
        let mut rule = IndexMap::new();
        rule.insert("to_port", Value::from("80"));
        rule.insert("type", Value::from("egress"));
        Value::from(vec![Value::from(rule)])
    }

    #[test]
    fn index_list_then_key() {
        let value = rules().index(&Value::Integer(0)).index(&"to_port".into());
        assert_eq!(value, Value::from("80"));
    }

    #[test]
    fn out_of_bounds_is_unknown() {
        assert_eq!(rules().index(&Value::Integer(1)), Value::Unknown);
        assert_eq!(rules().index(&Value::Integer(-1)), Value::Unknown);
        assert_eq!(
            rules().index(&Value::Integer(0)).get_attr("missing"),
            Value::Unknown
        );
    }

    #[test]
    fn shape_mismatch_is_unknown() {
        assert_eq!(Value::from("text").index(&Value::Integer(0)), Value::Unknown);
        assert_eq!(rules().index(&"to_port".into()), Value::Unknown);
        assert_eq!(Value::Unknown.index(&Value::Integer(0)), Value::Unknown);
    }

    #[test]
    fn string_conversions() {
        assert_eq!(Value::from("true").as_bool(), Some(true));
        assert_eq!(Value::from("yes").as_bool(), None);
        assert_eq!(Value::from(" 3 ").as_number(), Some(Number::Integer(3)));
        assert_eq!(Value::from("2.5").as_number(), Some(Number::Decimal(2.5)));
        assert_eq!(Value::Boolean(true).as_number(), None);
    }

    #[test]
    fn loose_equality() {
        assert_eq!(Value::Integer(1).loose_eq(&Value::Decimal(1.0)), Some(true));
        assert_eq!(Value::from("1").loose_eq(&Value::Integer(1)), Some(false));
        assert_eq!(Value::Unknown.loose_eq(&Value::Integer(1)), None);
    }

    #[test]
    fn serializes_unknown_as_null() {
        let json = serde_json::to_string(&Value::from(vec![Value::Unknown, Value::Integer(2)]))
            .expect("serializable");
        assert_eq!(json, "[null,2]");
    }
}
