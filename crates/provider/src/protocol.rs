//! Plugin protocol messages
//!
//! One JSON object per line in each direction. Requests are tagged by
//! `method`; every response carries the same tag plus a diagnostics list.
//! Dynamic values follow the Terraform `DynamicValue` message: either a
//! `json` value or base64-encoded `msgpack` bytes.

use std::collections::BTreeMap;

use anyhow::Result;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::schema::Schema;
use crate::state::{decode_msgpack, encode_msgpack, DynamicValue as LocalDynamicValue};

/// Handshake line printed on stdout before the first request is read
pub const HANDSHAKE: &str = "1|6|stdio|json";

/// Encoded dynamic value as carried on the wire
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DynamicValue {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msgpack: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json: Option<serde_json::Value>,
}

/// How a dynamic value was encoded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    #[default]
    Json,
    Msgpack,
}

impl DynamicValue {
    pub fn encoding(&self) -> Encoding {
        if self.msgpack.is_some() {
            Encoding::Msgpack
        } else {
            Encoding::Json
        }
    }

    pub fn decode(&self) -> Result<LocalDynamicValue> {
        if let Some(encoded) = &self.msgpack {
            let bytes = BASE64.decode(encoded)?;
            return decode_msgpack(&bytes);
        }
        match &self.json {
            Some(json) => Ok(serde_json::from_value(json.clone())?),
            None => Ok(LocalDynamicValue::Null),
        }
    }

    pub fn encode(value: &LocalDynamicValue, encoding: Encoding) -> Result<Self> {
        match encoding {
            Encoding::Msgpack => Ok(Self {
                msgpack: Some(BASE64.encode(encode_msgpack(value)?)),
                json: None,
            }),
            Encoding::Json => Ok(Self {
                msgpack: None,
                json: Some(serde_json::to_value(value)?),
            }),
        }
    }
}

/// Decode an optional wire value, treating absence as null
pub fn decode_optional(value: Option<&DynamicValue>) -> Result<LocalDynamicValue> {
    value.map_or(Ok(LocalDynamicValue::Null), DynamicValue::decode)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub summary: String,
    #[serde(default)]
    pub detail: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
}

impl Diagnostic {
    pub fn error(summary: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            summary: summary.into(),
            detail: detail.into(),
            attribute: None,
        }
    }

    pub fn with_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attribute = Some(attribute.into());
        self
    }
}

/// Requests, tagged by method name
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum Request {
    GetProviderSchema,
    ConfigureProvider {
        #[serde(default)]
        config: Option<DynamicValue>,
    },
    ValidateResourceConfig {
        type_name: String,
        #[serde(default)]
        config: Option<DynamicValue>,
    },
    PlanResourceChange {
        type_name: String,
        #[serde(default)]
        prior_state: Option<DynamicValue>,
        #[serde(default)]
        proposed_new_state: Option<DynamicValue>,
    },
    ApplyResourceChange {
        type_name: String,
        #[serde(default)]
        prior_state: Option<DynamicValue>,
        #[serde(default)]
        planned_state: Option<DynamicValue>,
    },
    ReadResource {
        type_name: String,
        #[serde(default)]
        current_state: Option<DynamicValue>,
    },
    ImportResourceState {
        type_name: String,
        id: String,
    },
    StopProvider,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct GetProviderSchemaResponse {
    pub provider: Schema,
    pub resource_schemas: BTreeMap<String, Schema>,
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DiagnosticsResponse {
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PlanResourceChangeResponse {
    pub planned_state: Option<DynamicValue>,
    pub requires_replace: Vec<String>,
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct NewStateResponse {
    pub new_state: Option<DynamicValue>,
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportedResource {
    pub type_name: String,
    pub state: DynamicValue,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportResourceStateResponse {
    pub imported_resources: Vec<ImportedResource>,
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct StopProviderResponse {
    pub error: String,
}

/// Responses, tagged with the method they answer
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum Response {
    GetProviderSchema(GetProviderSchemaResponse),
    ConfigureProvider(DiagnosticsResponse),
    ValidateResourceConfig(DiagnosticsResponse),
    PlanResourceChange(PlanResourceChangeResponse),
    ApplyResourceChange(NewStateResponse),
    ReadResource(NewStateResponse),
    ImportResourceState(ImportResourceStateResponse),
    StopProvider(StopProviderResponse),
    /// Answer to a line that could not be parsed as a request
    Error(DiagnosticsResponse),
}

impl Response {
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            Response::GetProviderSchema(r) => &r.diagnostics,
            Response::ConfigureProvider(r)
            | Response::ValidateResourceConfig(r)
            | Response::Error(r) => &r.diagnostics,
            Response::PlanResourceChange(r) => &r.diagnostics,
            Response::ApplyResourceChange(r) | Response::ReadResource(r) => &r.diagnostics,
            Response::ImportResourceState(r) => &r.diagnostics,
            Response::StopProvider(_) => &[],
        }
    }
}
