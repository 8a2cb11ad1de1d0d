use indexmap::IndexMap;
use serde::de::{self, Deserialize, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::Serialize;
use std::convert::TryFrom;
use std::fmt;

/// Mapping type used for both configuration input and rendered documents.
/// Insertion order is preserved so that rendered output is reproducible.
pub type Mapping = IndexMap<String, Value>;

/// Tree of scalars, lists and mappings.
///
/// Used for the configuration handed to a template as well as for every
/// document a template renders. Scalar mapping keys are read as strings,
/// so `{80: http}` deserializes to a mapping with the key `"80"`.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<Value>),
    Map(Mapping),
}

/// Coarse type of a `Value`, used in type expectations and diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Null,
    Bool,
    Number,
    String,
    List,
    Map,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Kind::Null => "null",
            Kind::Bool => "bool",
            Kind::Number => "number",
            Kind::String => "string",
            Kind::List => "list",
            Kind::Map => "map",
        };
        f.write_str(name)
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Null
    }
}

impl Value {
    pub fn kind(&self) -> Kind {
        match self {
            Value::Null => Kind::Null,
            Value::Bool(_) => Kind::Bool,
            Value::Int(_) | Value::Float(_) => Kind::Number,
            Value::String(_) => Kind::String,
            Value::List(_) => Kind::List,
            Value::Map(_) => Kind::Map,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Truthiness as used by conditional sections: null, `false`, zero and
    /// empty strings, lists or mappings are all considered false.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::String(s) => !s.is_empty(),
            Value::List(l) => !l.is_empty(),
            Value::Map(m) => !m.is_empty(),
        }
    }

    pub fn as_map(&self) -> Option<&Mapping> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Look up a key of a mapping; any other variant yields `None`
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_map().and_then(|m| m.get(key))
    }

    /// Merge `other` into `self`, recursing into mappings present on both sides.
    /// Every other combination is resolved in favour of `other`, except that a
    /// null in `other` never erases an existing value.
    pub fn merge(&mut self, other: Value) {
        match (self, other) {
            (_, Value::Null) => {}
            (Value::Map(base), Value::Map(overlay)) => {
                for (key, value) in overlay {
                    match base.get_mut(&key) {
                        Some(existing) => existing.merge(value),
                        None => {
                            base.insert(key, value);
                        }
                    }
                }
            }
            (base, overlay) => *base = overlay,
        }
    }
}

/// Equality that ignores the integer vs. float representation of numbers,
/// so `10` equals `10.0`. Mapping equality ignores key order.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => {
                int_equals_float(*a, *b)
            }
            (Value::String(a), Value::String(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            _ => false,
        }
    }
}

/// Only integral floats inside the i64 range can equal an integer.
/// `i64::MAX as f64` rounds up to 2^63, hence the exclusive upper bound.
fn int_equals_float(i: i64, f: f64) -> bool {
    f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 && f as i64 == i
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(ValueVisitor)
    }
}

struct ValueVisitor;

impl<'de> Visitor<'de> for ValueVisitor {
    type Value = Value;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a scalar, a list or a mapping")
    }

    fn visit_unit<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_none<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_some<D>(self, deserializer: D) -> Result<Value, D::Error>
    where
        D: Deserializer<'de>,
    {
        Value::deserialize(deserializer)
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Value, E> {
        Ok(Value::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Value, E> {
        Ok(Value::Int(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Value, E> {
        Ok(i64::try_from(v).map_or(Value::Float(v as f64), Value::Int))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Value, E> {
        Ok(Value::Float(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Value, E> {
        Ok(Value::String(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<Value, E> {
        Ok(Value::String(v))
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<Value, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let mut list = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(item) = seq.next_element()? {
            list.push(item);
        }
        Ok(Value::List(list))
    }

    fn visit_map<A>(self, mut map: A) -> Result<Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut mapping = Mapping::with_capacity(map.size_hint().unwrap_or(0));
        while let Some((MapKey(key), value)) = map.next_entry()? {
            mapping.insert(key, value);
        }
        Ok(Value::Map(mapping))
    }
}

/// Mapping key; numbers and booleans are turned into their string form
struct MapKey(String);

impl<'de> Deserialize<'de> for MapKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(MapKeyVisitor)
    }
}

struct MapKeyVisitor;

impl<'de> Visitor<'de> for MapKeyVisitor {
    type Value = MapKey;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a string, number or boolean mapping key")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<MapKey, E> {
        Ok(MapKey(v.to_string()))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<MapKey, E> {
        Ok(MapKey(v.to_string()))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<MapKey, E> {
        Ok(MapKey(v.to_string()))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<MapKey, E> {
        Ok(MapKey(v.to_string()))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<MapKey, E> {
        Ok(MapKey(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<MapKey, E> {
        Ok(MapKey(v))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(s) => f.write_str(&s),
            Err(_) => write!(f, "{:?}", self),
        }
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

impl From<Mapping> for Value {
    fn from(m: Mapping) -> Self {
        Value::Map(m)
    }
}

impl From<Vec<Value>> for Value {
    fn from(l: Vec<Value>) -> Self {
        Value::List(l)
    }
}

#[cfg(test)]
pub(crate) fn yaml(input: &str) -> Value {
    serde_yaml::from_str(input).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn integers_equal_floats_with_the_same_value() {
        assert_eq!(Value::Int(10), Value::Float(10.0));
        assert_eq!(Value::Float(10.0), Value::Int(10));
        assert_ne!(Value::Int(10), Value::Float(10.5));
    }

    #[test]
    fn large_integers_do_not_equal_rounded_floats() {
        let above = 9_007_199_254_740_993_i64;
        assert_ne!(Value::Int(above), Value::Float(9_007_199_254_740_992.0));
        assert_eq!(
            Value::Int(9_007_199_254_740_992),
            Value::Float(9_007_199_254_740_992.0)
        );
        assert_ne!(Value::Int(i64::MAX), Value::Float(i64::MAX as f64));
        assert_ne!(Value::Int(0), Value::Float(f64::NAN));
    }

    #[test]
    fn numbers_never_equal_strings() {
        assert_ne!(Value::Int(10), Value::from("10"));
    }

    #[test]
    fn map_equality_ignores_key_order() {
        assert_eq!(yaml("{a: 1, b: 2}"), yaml("{b: 2, a: 1.0}"));
    }

    #[test]
    fn yaml_keeps_insertion_order() {
        let value = yaml("{zeta: 1, alpha: 2, mid: 3}");
        let keys: Vec<&String> = value.as_map().unwrap().keys().collect();
        assert_eq!(keys, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn yaml_scalars_map_to_variants() {
        let value = yaml("{i: 10, f: 10.5, s: text, b: true, n: ~}");
        assert_eq!(value.get("i").unwrap().kind(), Kind::Number);
        assert!(matches!(value.get("i"), Some(Value::Int(10))));
        assert!(matches!(value.get("f"), Some(Value::Float(_))));
        assert_eq!(value.get("s").unwrap().as_str(), Some("text"));
        assert_eq!(value.get("b"), Some(&Value::Bool(true)));
        assert!(value.get("n").unwrap().is_null());
    }

    #[test]
    fn scalar_keys_are_read_as_strings() {
        let value = yaml("{ports: {80: http, 443: https}, flags: {true: on-flag}, ratios: {0.5: half}}");

        let ports: Vec<&String> = value.get("ports").unwrap().as_map().unwrap().keys().collect();
        assert_eq!(ports, vec!["80", "443"]);
        assert_eq!(
            value.get("ports").unwrap().get("80"),
            Some(&Value::from("http"))
        );
        assert!(value.get("flags").unwrap().get("true").is_some());
        assert!(value.get("ratios").unwrap().get("0.5").is_some());
    }

    #[test]
    fn list_keys_are_rejected() {
        let err = serde_yaml::from_str::<Value>("? [a, b]\n: c\n").unwrap_err();
        assert!(
            err.to_string().contains("mapping key"),
            "unexpected error: {}",
            err
        );
    }

    #[test]
    fn json_and_toml_read_into_the_same_tree() {
        let from_json: Value = serde_json::from_str(r#"{"a": [1, 2.5, null], "b": {"c": true}}"#).unwrap();
        let from_toml: Value = toml::from_str("a = [1, 2]\n[b]\nc = true\n").unwrap();

        assert_eq!(from_json, yaml("{a: [1, 2.5, ~], b: {c: true}}"));
        assert_eq!(from_toml, yaml("{a: [1, 2], b: {c: true}}"));
    }

    #[test]
    fn truthiness() {
        for falsy in &["~", "false", "0", "0.0", "''", "[]", "{}"] {
            assert!(!yaml(falsy).is_truthy(), "{} should be falsy", falsy);
        }
        for truthy in &["true", "1", "x", "[1]", "{a: 1}"] {
            assert!(yaml(truthy).is_truthy(), "{} should be truthy", truthy);
        }
    }

    #[test]
    fn merge_recurses_into_maps() {
        let mut base = yaml("{a: {x: 1, y: 2}, list: [1, 2], keep: kept}");
        base.merge(yaml("{a: {y: 3, z: 4}, list: [9], keep: ~}"));

        assert_eq!(
            base,
            yaml("{a: {x: 1, y: 3, z: 4}, list: [9], keep: kept}")
        );
    }

    #[test]
    fn merge_into_null_takes_overlay() {
        let mut base = Value::Null;
        base.merge(yaml("{a: 1}"));
        assert_eq!(base, yaml("{a: 1}"));
    }

    #[test]
    fn display_is_compact_json() {
        assert_eq!(yaml("{a: [1, 2.5, x]}").to_string(), r#"{"a":[1,2.5,"x"]}"#);
    }
}
