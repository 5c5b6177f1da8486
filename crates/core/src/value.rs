use std::collections::BTreeMap;
use std::fmt;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ValueType {
    Bool,
    Number,
    String,
    Ref,
    Url,
    LatLng,
    LatLngHeight,
    Camera,
    Typography,
    Coordinates,
    Polygon,
    Rect,
    Spacing,
    Array,
    Timeline,
}

impl ValueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Number => "number",
            Self::String => "string",
            Self::Ref => "ref",
            Self::Url => "url",
            Self::LatLng => "latlng",
            Self::LatLngHeight => "latlngheight",
            Self::Camera => "camera",
            Self::Typography => "typography",
            Self::Coordinates => "coordinates",
            Self::Polygon => "polygon",
            Self::Rect => "rect",
            Self::Spacing => "spacing",
            Self::Array => "array",
            Self::Timeline => "timeline",
        }
    }

    /// Maps a wire type name to its internal type. Accepts both the upper-case
    /// API enum (`LATLNG_HEIGHT`) and the internal name (`latlngheight`).
    pub fn from_wire(name: &str) -> Option<Self> {
        let normalized: String = name
            .chars()
            .filter(|c| *c != '_')
            .flat_map(char::to_lowercase)
            .collect();
        let ty = match normalized.as_str() {
            "bool" => Self::Bool,
            "number" => Self::Number,
            "string" => Self::String,
            "ref" => Self::Ref,
            "url" => Self::Url,
            "latlng" => Self::LatLng,
            "latlngheight" => Self::LatLngHeight,
            "camera" => Self::Camera,
            "typography" => Self::Typography,
            "coordinates" => Self::Coordinates,
            "polygon" => Self::Polygon,
            "rect" => Self::Rect,
            "spacing" => Self::Spacing,
            "array" => Self::Array,
            "timeline" => Self::Timeline,
            _ => return None,
        };
        Some(ty)
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ValueType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ValueType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Self::from_wire(&name)
            .ok_or_else(|| de::Error::custom(format!("unknown value type: {name}")))
    }
}

/// A property value. Composite values (camera poses, typography, lat/lng...)
/// keep their wire shape as an ordered map.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    List(Vec<Value>),
    Composite(BTreeMap<String, Value>),
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a.total_cmp(b).is_eq(),
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::List(a), Self::List(b)) => a == b,
            (Self::Composite(a), Self::Composite(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

/// Integral floats are written as integers so `10` survives a JSON round trip
/// as `10` rather than `10.0`.
fn integral(n: f64) -> Option<i64> {
    if n.fract() == 0.0 && n.is_finite() && n.abs() < 9.0e15 {
        Some(n as i64)
    } else {
        None
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Number(n) => match integral(*n) {
                Some(i) => serializer.serialize_i64(i),
                None => serializer.serialize_f64(*n),
            },
            Self::Text(s) => serializer.serialize_str(s),
            Self::List(items) => serializer.collect_seq(items),
            Self::Composite(fields) => serializer.collect_map(fields),
        }
    }
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_composite(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Composite(fields) => Some(fields),
            _ => None,
        }
    }

    /// Key lookup on a composite value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_composite().and_then(|fields| fields.get(key))
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => match integral(*n) {
                Some(i) => serde_json::Value::from(i),
                None => serde_json::Number::from_f64(*n)
                    .map(serde_json::Value::Number)
                    .unwrap_or(serde_json::Value::Null),
            },
            Value::Text(s) => serde_json::Value::String(s.clone()),
            Value::List(items) => serde_json::Value::Array(items.iter().map(Value::to_json).collect()),
            Value::Composite(fields) => serde_json::Value::Object(
                fields.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => n.as_f64().map(Value::Number).unwrap_or(Value::Null),
            serde_json::Value::String(s) => Value::Text(s),
            serde_json::Value::Array(items) => Value::List(items.into_iter().map(Value::from).collect()),
            serde_json::Value::Object(fields) => {
                Value::Composite(fields.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

/// A value that made it through coercion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Coerced {
    pub value_type: ValueType,
    pub value: Value,
    /// Always true when produced; lets callers tell "absent" from "present but falsy".
    pub ok: bool,
}

/// Converts a wire value tagged with a wire type name into a typed value.
/// Returns `None` for absent/null values and for unmapped wire types.
pub fn coerce(value: Option<&Value>, wire_type: &str) -> Option<Coerced> {
    let value_type = ValueType::from_wire(wire_type)?;
    coerce_as(value, value_type)
}

/// Same as [`coerce`] with an already-mapped type (schema defaults).
pub fn coerce_as(value: Option<&Value>, value_type: ValueType) -> Option<Coerced> {
    let value = value.filter(|v| !v.is_null())?;
    Some(Coerced {
        value_type,
        value: normalize(value.clone()),
        ok: true,
    })
}

fn normalize(value: Value) -> Value {
    match value {
        Value::Composite(mut fields) => {
            // Older cameras and positions only carry `altitude`.
            if let Some(altitude) = fields.get("altitude").cloned() {
                fields.insert("height".to_string(), altitude);
            }
            // The API enum is upper-case; renderers expect lower-case.
            if let Some(Value::Text(align)) = fields.get_mut("textAlign") {
                *align = align.to_lowercase();
            }
            Value::Composite(fields)
        }
        other => other,
    }
}
