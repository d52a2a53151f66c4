//! Terraform State Management
//!
//! Dynamic values as Terraform hands them over, their msgpack/JSON
//! encodings, and [`ResourceData`], the typed view a resource callback works on.

use std::collections::HashMap;

use anyhow::{anyhow, bail, Result};
use rmpv::Value as MsgpackValue;
use serde::{Deserialize, Serialize};

use crate::schema::Schema;

/// msgpack extension type Terraform uses for a value not known until apply
const MSGPACK_UNKNOWN_EXT: i8 = 0;

/// JSON stand-in for an unknown value: `{"$unknown": true}`
pub const JSON_UNKNOWN_KEY: &str = "$unknown";

/// Dynamic value that can be encoded/decoded from Terraform state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "JsonRepr", into = "JsonRepr")]
pub enum DynamicValue {
    Null,
    /// Not known until apply
    Unknown,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    List(Vec<DynamicValue>),
    Map(HashMap<String, DynamicValue>),
}

/// Plain JSON shape of a [`DynamicValue`]
#[derive(Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum JsonRepr {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    List(Vec<DynamicValue>),
    Map(HashMap<String, DynamicValue>),
}

impl From<JsonRepr> for DynamicValue {
    fn from(repr: JsonRepr) -> Self {
        match repr {
            JsonRepr::Null => DynamicValue::Null,
            JsonRepr::Bool(b) => DynamicValue::Bool(b),
            JsonRepr::Number(n) => DynamicValue::Number(n),
            JsonRepr::String(s) => DynamicValue::String(s),
            JsonRepr::List(items) => DynamicValue::List(items),
            JsonRepr::Map(map)
                if map.len() == 1
                    && map.get(JSON_UNKNOWN_KEY) == Some(&DynamicValue::Bool(true)) =>
            {
                DynamicValue::Unknown
            }
            JsonRepr::Map(map) => DynamicValue::Map(map),
        }
    }
}

impl From<DynamicValue> for JsonRepr {
    fn from(value: DynamicValue) -> Self {
        match value {
            DynamicValue::Null => JsonRepr::Null,
            DynamicValue::Unknown => JsonRepr::Map(HashMap::from([(
                JSON_UNKNOWN_KEY.to_string(),
                DynamicValue::Bool(true),
            )])),
            DynamicValue::Bool(b) => JsonRepr::Bool(b),
            DynamicValue::Number(n) => JsonRepr::Number(n),
            DynamicValue::String(s) => JsonRepr::String(s),
            DynamicValue::List(items) => JsonRepr::List(items),
            DynamicValue::Map(map) => JsonRepr::Map(map),
        }
    }
}

impl DynamicValue {
    pub fn is_null(&self) -> bool {
        matches!(self, DynamicValue::Null)
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, DynamicValue::Unknown)
    }

    pub fn as_string(&self) -> Option<&str> {
        match self {
            DynamicValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            DynamicValue::Number(n) => n.as_i64(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            DynamicValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&HashMap<String, DynamicValue>> {
        match self {
            DynamicValue::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&DynamicValue> {
        self.as_map()?.get(key)
    }

    /// Attribute value that is set and known; null, unknown and absent are all `None`
    pub fn get_known(&self, key: &str) -> Option<&DynamicValue> {
        self.get(key).filter(|v| !v.is_null() && !v.is_unknown())
    }
}

impl Default for DynamicValue {
    fn default() -> Self {
        DynamicValue::Null
    }
}

impl From<String> for DynamicValue {
    fn from(s: String) -> Self {
        DynamicValue::String(s)
    }
}

impl From<&str> for DynamicValue {
    fn from(s: &str) -> Self {
        DynamicValue::String(s.to_string())
    }
}

impl From<i64> for DynamicValue {
    fn from(n: i64) -> Self {
        DynamicValue::Number(serde_json::Number::from(n))
    }
}

impl From<i32> for DynamicValue {
    fn from(n: i32) -> Self {
        DynamicValue::from(i64::from(n))
    }
}

impl From<bool> for DynamicValue {
    fn from(b: bool) -> Self {
        DynamicValue::Bool(b)
    }
}

/// Decode a Terraform DynamicValue from msgpack bytes
pub fn decode_msgpack(data: &[u8]) -> Result<DynamicValue> {
    if data.is_empty() {
        return Ok(DynamicValue::Null);
    }
    let mut reader = data;
    let value = rmpv::decode::read_value(&mut reader)?;
    from_msgpack(value)
}

/// Encode a value to msgpack bytes
pub fn encode_msgpack(value: &DynamicValue) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    rmpv::encode::write_value(&mut buf, &to_msgpack(value))?;
    Ok(buf)
}

fn from_msgpack(value: MsgpackValue) -> Result<DynamicValue> {
    Ok(match value {
        MsgpackValue::Nil => DynamicValue::Null,
        MsgpackValue::Ext(MSGPACK_UNKNOWN_EXT, _) => DynamicValue::Unknown,
        MsgpackValue::Boolean(b) => DynamicValue::Bool(b),
        MsgpackValue::Integer(i) => match (i.as_i64(), i.as_u64()) {
            (Some(n), _) => DynamicValue::from(n),
            (None, Some(n)) => DynamicValue::Number(serde_json::Number::from(n)),
            (None, None) => bail!("msgpack integer out of range"),
        },
        MsgpackValue::F32(f) => float_value(f64::from(f))?,
        MsgpackValue::F64(f) => float_value(f)?,
        MsgpackValue::String(s) => DynamicValue::String(
            s.into_str()
                .ok_or_else(|| anyhow!("msgpack string is not valid UTF-8"))?,
        ),
        MsgpackValue::Array(items) => DynamicValue::List(
            items
                .into_iter()
                .map(from_msgpack)
                .collect::<Result<Vec<_>>>()?,
        ),
        MsgpackValue::Map(entries) => {
            let mut map = HashMap::with_capacity(entries.len());
            for (key, value) in entries {
                let key = match key {
                    MsgpackValue::String(s) => s
                        .into_str()
                        .ok_or_else(|| anyhow!("msgpack map key is not valid UTF-8"))?,
                    other => bail!("msgpack map key must be a string, got {}", other),
                };
                map.insert(key, from_msgpack(value)?);
            }
            DynamicValue::Map(map)
        }
        other @ (MsgpackValue::Binary(_) | MsgpackValue::Ext(..)) => {
            bail!("unsupported msgpack value {}", other)
        }
    })
}

fn float_value(f: f64) -> Result<DynamicValue> {
    serde_json::Number::from_f64(f)
        .map(DynamicValue::Number)
        .ok_or_else(|| anyhow!("msgpack number {} is not finite", f))
}

fn to_msgpack(value: &DynamicValue) -> MsgpackValue {
    match value {
        DynamicValue::Null => MsgpackValue::Nil,
        DynamicValue::Unknown => MsgpackValue::Ext(MSGPACK_UNKNOWN_EXT, vec![0]),
        DynamicValue::Bool(b) => MsgpackValue::Boolean(*b),
        DynamicValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                MsgpackValue::from(i)
            } else if let Some(u) = n.as_u64() {
                MsgpackValue::from(u)
            } else {
                MsgpackValue::F64(n.as_f64().unwrap_or_default())
            }
        }
        DynamicValue::String(s) => MsgpackValue::from(s.as_str()),
        DynamicValue::List(items) => MsgpackValue::Array(items.iter().map(to_msgpack).collect()),
        DynamicValue::Map(map) => MsgpackValue::Map(
            map.iter()
                .map(|(k, v)| (MsgpackValue::from(k.as_str()), to_msgpack(v)))
                .collect(),
        ),
    }
}

/// Create a DynamicValue map with the given attributes
pub fn make_state(attrs: Vec<(&str, DynamicValue)>) -> DynamicValue {
    let mut map = HashMap::new();
    for (key, value) in attrs {
        map.insert(key.to_string(), value);
    }
    DynamicValue::Map(map)
}

/// Name of the identifier attribute every resource carries
pub const ID_ATTR: &str = "id";

/// Schema-typed values of one resource instance plus its identifier.
///
/// Getters fall back to the zero value of the attribute's type, so an unset
/// optional string reads as `""`. An empty identifier means "no such object".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceData {
    id: String,
    values: HashMap<String, DynamicValue>,
}

impl ResourceData {
    /// Build resource data from a state or planned value, filling schema defaults
    pub fn from_state(schema: &Schema, state: &DynamicValue) -> Self {
        let mut values = HashMap::new();

        for (name, attr) in &schema.attributes {
            if name == ID_ATTR {
                continue;
            }
            match state.get_known(name) {
                Some(value) => {
                    values.insert(name.clone(), value.clone());
                }
                None => {
                    if let Some(default) = &attr.default {
                        values.insert(name.clone(), default.clone());
                    }
                }
            }
        }

        let id = state
            .get(ID_ATTR)
            .and_then(|v| v.as_string())
            .unwrap_or("")
            .to_string();

        Self { id, values }
    }

    /// Resource data that only knows its identifier, as on import
    pub fn with_id(schema: &Schema, id: impl Into<String>) -> Self {
        let mut data = Self::from_state(schema, &DynamicValue::Null);
        data.id = id.into();
        data
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = id.into();
    }

    pub fn get(&self, key: &str) -> Option<&DynamicValue> {
        self.values.get(key)
    }

    pub fn get_string(&self, key: &str) -> String {
        self.values
            .get(key)
            .and_then(|v| v.as_string())
            .unwrap_or("")
            .to_string()
    }

    pub fn get_int(&self, key: &str) -> i64 {
        self.values.get(key).and_then(|v| v.as_i64()).unwrap_or(0)
    }

    pub fn get_bool(&self, key: &str) -> bool {
        self.values
            .get(key)
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    pub fn set(&mut self, key: &str, value: impl Into<DynamicValue>) {
        self.values.insert(key.to_string(), value.into());
    }

    /// Render as a state object. A cleared identifier renders as null state.
    pub fn to_state(&self, schema: &Schema) -> DynamicValue {
        if self.id.is_empty() {
            return DynamicValue::Null;
        }

        let mut map = HashMap::new();
        for name in schema.attributes.keys() {
            let value = if name == ID_ATTR {
                DynamicValue::from(self.id.as_str())
            } else {
                // Unset optional attributes stay null rather than a zero value
                self.values.get(name).cloned().unwrap_or_default()
            };
            map.insert(name.clone(), value);
        }
        DynamicValue::Map(map)
    }
}
