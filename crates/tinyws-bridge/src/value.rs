//! Value codec: host-side values <-> the channel's JSON representation.
//!
//! Numbers get one explicit rule. The remote side has a single number
//! type, so a decoded number whose value is integral and within the
//! exactly-representable range (|n| <= 2^53 - 1) becomes [`Value::Int`];
//! every other number becomes [`Value::Float`]. A `Float(2.0)` therefore
//! comes back as `Int(2)` after a trip through the channel.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Number;
use tinyws_common::{BridgeError, Result};

/// Key of the single-entry object that stands in for a remote function.
pub const FUNCTION_TAG: &str = "$tinyws_fn";

/// Largest integer the remote number type represents exactly.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// A decoded value. `null` and `undefined` both collapse to `Absent`.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Absent,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Sequence(Vec<Value>),
    Map(BTreeMap<String, Value>),
    Callable(RemoteFunction),
}

/// Reference to a function that lives on the remote side.
///
/// Calling it is a correlated evaluation; see `Remote::call_function`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RemoteFunction {
    handle: String,
}

impl RemoteFunction {
    pub fn new(handle: impl Into<String>) -> Self {
        Self {
            handle: handle.into(),
        }
    }

    pub fn handle(&self) -> &str {
        &self.handle
    }
}

impl Value {
    /// Decode channel text (JSON) into a value.
    pub fn decode(raw: &str) -> Result<Value> {
        let json: serde_json::Value = serde_json::from_str(raw)
            .map_err(|e| BridgeError::UnsupportedValue(format!("malformed payload: {e}")))?;
        Ok(Value::from_json(json))
    }

    /// Encode a value as channel text (JSON).
    pub fn encode(&self) -> Result<String> {
        let json = self.to_json()?;
        serde_json::to_string(&json).map_err(|e| BridgeError::UnsupportedValue(e.to_string()))
    }

    pub fn from_json(json: serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Absent,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => from_number(&n),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Sequence(items.into_iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(map) => {
                if map.len() == 1 {
                    if let Some(serde_json::Value::String(handle)) = map.get(FUNCTION_TAG) {
                        return Value::Callable(RemoteFunction::new(handle.clone()));
                    }
                }
                Value::Map(
                    map.into_iter()
                        .map(|(k, v)| (k, Value::from_json(v)))
                        .collect(),
                )
            }
        }
    }

    pub fn to_json(&self) -> Result<serde_json::Value> {
        Ok(match self {
            Value::Absent => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::Number((*i).into()),
            Value::Float(f) => serde_json::Value::Number(Number::from_f64(*f).ok_or_else(|| {
                BridgeError::UnsupportedValue(format!("non-finite number {f}"))
            })?),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Sequence(items) => serde_json::Value::Array(
                items
                    .iter()
                    .map(Value::to_json)
                    .collect::<Result<Vec<_>>>()?,
            ),
            Value::Map(map) => {
                let mut out = serde_json::Map::with_capacity(map.len());
                for (k, v) in map {
                    out.insert(k.clone(), v.to_json()?);
                }
                serde_json::Value::Object(out)
            }
            Value::Callable(f) => serde_json::json!({ FUNCTION_TAG: f.handle }),
        })
    }

    /// Convert any serializable host value.
    pub fn from_serializable<T: Serialize + ?Sized>(value: &T) -> Result<Value> {
        serde_json::to_value(value)
            .map(Value::from_json)
            .map_err(|e| BridgeError::UnsupportedValue(e.to_string()))
    }

    /// Convert into a typed host value.
    pub fn deserialize_into<T: DeserializeOwned>(self) -> Result<T> {
        let json = self.to_json()?;
        serde_json::from_value(json).map_err(|e| BridgeError::InvalidArguments(e.to_string()))
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Value::Absent)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric view of either number variant.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[Value]> {
        match self {
            Value::Sequence(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_callable(&self) -> Option<&RemoteFunction> {
        match self {
            Value::Callable(f) => Some(f),
            _ => None,
        }
    }

    /// Short variant name, used in argument errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Absent => "absent",
            Value::Bool(_) => "boolean",
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Sequence(_) => "sequence",
            Value::Map(_) => "map",
            Value::Callable(_) => "function",
        }
    }
}

fn from_number(n: &Number) -> Value {
    if let Some(i) = n.as_i64() {
        if (i.unsigned_abs() as f64) <= MAX_SAFE_INTEGER {
            return Value::Int(i);
        }
    }
    match n.as_f64() {
        Some(f) => from_f64(f),
        None => Value::Absent,
    }
}

fn from_f64(f: f64) -> Value {
    if f.is_finite() && f.fract() == 0.0 && f.abs() <= MAX_SAFE_INTEGER {
        Value::Int(f as i64)
    } else {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i.into())
    }
}

impl From<u32> for Value {
    fn from(i: u32) -> Self {
        Value::Int(i.into())
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Sequence(items)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Absent, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn round_trip(v: &Value) -> Value {
        Value::decode(&v.encode().unwrap()).unwrap()
    }

    #[test]
    fn null_and_undefined_collapse_to_absent() {
        assert_eq!(Value::decode("null").unwrap(), Value::Absent);
        assert_eq!(Value::from_json(json!(null)), Value::Absent);
        assert_eq!(Value::Absent.encode().unwrap(), "null");
    }

    #[test]
    fn scalars_round_trip() {
        for v in [
            Value::Bool(true),
            Value::Bool(false),
            Value::Int(0),
            Value::Int(-42),
            Value::Int(1 << 40),
            Value::Float(0.5),
            Value::Float(-3.25),
            Value::String("héllo \"world\"".into()),
            Value::String(String::new()),
        ] {
            assert_eq!(round_trip(&v), v);
        }
    }

    #[test]
    fn sequences_round_trip() {
        let v = Value::Sequence(vec![
            Value::Int(1),
            Value::Float(2.5),
            Value::String("x".into()),
            Value::Sequence(vec![Value::Bool(true)]),
        ]);
        assert_eq!(round_trip(&v), v);
    }

    #[test]
    fn integral_numbers_decode_as_int() {
        assert_eq!(Value::decode("2").unwrap(), Value::Int(2));
        assert_eq!(Value::decode("2.0").unwrap(), Value::Int(2));
        assert_eq!(Value::decode("-7.0").unwrap(), Value::Int(-7));
        assert_eq!(Value::decode("1.5").unwrap(), Value::Float(1.5));
    }

    #[test]
    fn integral_float_comes_back_as_int() {
        assert_eq!(round_trip(&Value::Float(2.0)), Value::Int(2));
    }

    #[test]
    fn numbers_beyond_safe_range_stay_float() {
        assert_eq!(Value::decode("1e300").unwrap(), Value::Float(1e300));
        let big = Value::decode("18446744073709551615").unwrap();
        assert!(matches!(big, Value::Float(_)));
        assert_eq!(
            Value::decode("9007199254740991").unwrap(),
            Value::Int(9_007_199_254_740_991)
        );
        assert!(matches!(
            Value::decode("9007199254740993").unwrap(),
            Value::Float(_)
        ));
    }

    #[test]
    fn non_finite_float_is_unsupported() {
        let err = Value::Float(f64::NAN).encode().unwrap_err();
        assert!(matches!(err, BridgeError::UnsupportedValue(_)));

        let nested = Value::Sequence(vec![Value::Int(1), Value::Float(f64::INFINITY)]);
        assert!(matches!(
            nested.encode(),
            Err(BridgeError::UnsupportedValue(_))
        ));
    }

    #[test]
    fn malformed_text_is_unsupported() {
        assert!(matches!(
            Value::decode("{not json"),
            Err(BridgeError::UnsupportedValue(_))
        ));
    }

    #[test]
    fn function_tag_decodes_to_callable() {
        let v = Value::from_json(json!({ "$tinyws_fn": "fn3" }));
        assert_eq!(v, Value::Callable(RemoteFunction::new("fn3")));
        assert_eq!(v.to_json().unwrap(), json!({ "$tinyws_fn": "fn3" }));
    }

    #[test]
    fn function_tag_with_extra_keys_is_a_map() {
        let v = Value::from_json(json!({ "$tinyws_fn": "fn3", "other": 1 }));
        assert!(matches!(v, Value::Map(_)));
    }

    #[test]
    fn objects_decode_to_maps() {
        let v = Value::from_json(json!({ "total": 16, "percent": 41.5 }));
        let Value::Map(map) = v else {
            panic!("expected map");
        };
        assert_eq!(map["total"], Value::Int(16));
        assert_eq!(map["percent"], Value::Float(41.5));
    }

    #[test]
    fn serde_bridging() {
        #[derive(serde::Serialize, serde::Deserialize, PartialEq, Debug)]
        struct Point {
            x: i64,
            y: f64,
        }

        let v = Value::from_serializable(&Point { x: 1, y: 0.5 }).unwrap();
        let back: Point = v.deserialize_into().unwrap();
        assert_eq!(back, Point { x: 1, y: 0.5 });

        let err = Value::String("nope".into()).deserialize_into::<Point>();
        assert!(matches!(err, Err(BridgeError::InvalidArguments(_))));
    }

    #[test]
    fn accessors() {
        assert_eq!(Value::Int(3).as_f64(), Some(3.0));
        assert_eq!(Value::Float(3.5).as_i64(), None);
        assert_eq!(Value::from("a").as_str(), Some("a"));
        assert_eq!(Value::from(None::<bool>), Value::Absent);
        assert_eq!(Value::Bool(true).kind(), "boolean");
    }
}
