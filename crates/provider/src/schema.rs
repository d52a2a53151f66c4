//! Schema - Attribute declarations for the provider and its resources
//!
//! A schema names each attribute with its type, whether it is required,
//! optional or computed, its default, and whether a change to it forces the
//! resource to be replaced. Validation, default filling and replacement
//! detection are all driven from this declaration.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::state::{DynamicValue, ID_ATTR};

/// Attribute type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeType {
    String,
    Number,
    Bool,
}

impl AttributeType {
    fn matches(self, value: &DynamicValue) -> bool {
        match (self, value) {
            (_, DynamicValue::Null | DynamicValue::Unknown) => true,
            (AttributeType::String, DynamicValue::String(_)) => true,
            (AttributeType::Number, DynamicValue::Number(n)) => n.is_i64(),
            (AttributeType::Bool, DynamicValue::Bool(_)) => true,
            _ => false,
        }
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AttributeType::String => "string",
            AttributeType::Number => "number",
            AttributeType::Bool => "bool",
        };
        f.write_str(name)
    }
}

/// A single attribute declaration
#[derive(Debug, Clone, Serialize)]
pub struct Attribute {
    #[serde(rename = "type")]
    pub attr_type: AttributeType,
    pub description: String,
    pub required: bool,
    pub optional: bool,
    pub computed: bool,
    pub sensitive: bool,
    pub force_new: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<DynamicValue>,
}

impl Attribute {
    fn new(attr_type: AttributeType) -> Self {
        Self {
            attr_type,
            description: String::new(),
            required: false,
            optional: false,
            computed: false,
            sensitive: false,
            force_new: false,
            default: None,
        }
    }

    fn required(attr_type: AttributeType) -> Self {
        Self {
            required: true,
            ..Self::new(attr_type)
        }
    }

    fn optional(attr_type: AttributeType) -> Self {
        Self {
            optional: true,
            ..Self::new(attr_type)
        }
    }

    pub fn required_string() -> Self {
        Self::required(AttributeType::String)
    }

    pub fn required_int() -> Self {
        Self::required(AttributeType::Number)
    }

    pub fn optional_string() -> Self {
        Self::optional(AttributeType::String)
    }

    pub fn optional_int() -> Self {
        Self::optional(AttributeType::Number)
    }

    pub fn optional_bool() -> Self {
        Self::optional(AttributeType::Bool)
    }

    pub fn computed_string() -> Self {
        Self {
            computed: true,
            ..Self::new(AttributeType::String)
        }
    }

    pub fn with_default(mut self, default: impl Into<DynamicValue>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn force_new(mut self) -> Self {
        self.force_new = true;
        self
    }

    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    fn normalize(&self, value: Option<&DynamicValue>) -> DynamicValue {
        match value {
            Some(DynamicValue::String(s)) if s.is_empty() => DynamicValue::Null,
            Some(v) => v.clone(),
            None => DynamicValue::Null,
        }
    }
}

/// Schema validation error
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaError {
    #[error("The argument \"{name}\" is required, but no definition was found.")]
    MissingRequired { name: String },

    #[error("An argument named \"{name}\" is not expected here.")]
    UnknownAttribute { name: String },

    #[error("Inappropriate value for attribute \"{name}\": {expected} required.")]
    TypeMismatch { name: String, expected: AttributeType },

    #[error("Value for attribute \"{name}\" is computed and cannot be set.")]
    ComputedOnly { name: String },

    #[error("Configuration must be an object.")]
    NotAnObject,
}

impl SchemaError {
    /// Attribute the error points at, if any
    pub fn attribute(&self) -> Option<&str> {
        match self {
            SchemaError::MissingRequired { name }
            | SchemaError::UnknownAttribute { name }
            | SchemaError::TypeMismatch { name, .. }
            | SchemaError::ComputedOnly { name } => Some(name),
            SchemaError::NotAnObject => None,
        }
    }
}

/// Attribute schema for a provider or resource type
#[derive(Debug, Clone, Default, Serialize)]
pub struct Schema {
    pub version: i64,
    pub attributes: BTreeMap<String, Attribute>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_attribute(mut self, name: impl Into<String>, attribute: Attribute) -> Self {
        self.attributes.insert(name.into(), attribute);
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(name)
    }

    /// Check a configuration object against the declaration
    pub fn validate(&self, config: &DynamicValue) -> Vec<SchemaError> {
        let empty = HashMap::new();
        let values = match config {
            DynamicValue::Map(map) => map,
            DynamicValue::Null => &empty,
            _ => return vec![SchemaError::NotAnObject],
        };

        let mut errors = Vec::new();

        for (name, attr) in &self.attributes {
            let value = values.get(name).filter(|v| !v.is_null());
            match value {
                None if attr.required => errors.push(SchemaError::MissingRequired {
                    name: name.clone(),
                }),
                Some(_) if attr.computed && !attr.optional && !attr.required => {
                    errors.push(SchemaError::ComputedOnly { name: name.clone() })
                }
                Some(v) if !attr.attr_type.matches(v) => {
                    errors.push(SchemaError::TypeMismatch {
                        name: name.clone(),
                        expected: attr.attr_type,
                    })
                }
                _ => {}
            }
        }

        let mut unknown: Vec<_> = values
            .keys()
            .filter(|k| !self.attributes.contains_key(k.as_str()))
            .cloned()
            .collect();
        unknown.sort();
        errors.extend(
            unknown
                .into_iter()
                .map(|name| SchemaError::UnknownAttribute { name }),
        );

        errors
    }

    /// Fill unset optional attributes that declare a default
    pub fn apply_defaults(&self, value: &DynamicValue) -> DynamicValue {
        let mut map = value.as_map().cloned().unwrap_or_default();
        for (name, attr) in &self.attributes {
            let unset = map.get(name).map_or(true, |v| v.is_null());
            match &attr.default {
                Some(default) if unset => {
                    map.insert(name.clone(), default.clone());
                }
                _ if unset => {
                    map.insert(name.clone(), DynamicValue::Null);
                }
                _ => {}
            }
        }
        DynamicValue::Map(map)
    }

    /// ForceNew attributes whose value differs between prior and planned state.
    ///
    /// An empty string and null are the same value for a string attribute.
    pub fn requires_replace(&self, prior: &DynamicValue, planned: &DynamicValue) -> Vec<String> {
        self.attributes
            .iter()
            .filter(|(name, attr)| attr.force_new && name.as_str() != ID_ATTR)
            .filter(|(name, attr)| {
                let before = attr.normalize(prior.get(name));
                let after = attr.normalize(planned.get(name));
                before != after
            })
            .map(|(name, _)| name.clone())
            .collect()
    }
}

/// Schema of the provider configuration block
pub fn provider_schema() -> Schema {
    Schema::new()
        .with_attribute(
            "controller_ip",
            Attribute::optional_string()
                .with_description("Controller IP address. May also be set with AVIATRIX_CONTROLLER_IP."),
        )
        .with_attribute(
            "username",
            Attribute::optional_string()
                .with_description("Controller user name. May also be set with AVIATRIX_USERNAME."),
        )
        .with_attribute(
            "password",
            Attribute::optional_string()
                .sensitive()
                .with_description("Controller password. May also be set with AVIATRIX_PASSWORD."),
        )
        .with_attribute(
            "verify_ssl_certificate",
            Attribute::optional_bool()
                .with_default(false)
                .with_description("Verify the controller's TLS certificate."),
        )
}

/// Schema of `aviatrix_branch_router_transit_gateway_attachment`
pub fn branch_router_transit_gateway_attachment_schema() -> Schema {
    Schema::new()
        .with_attribute(ID_ATTR, Attribute::computed_string())
        .with_attribute(
            "branch_name",
            Attribute::required_string()
                .force_new()
                .with_description("Branch router name."),
        )
        .with_attribute(
            "transit_gateway_name",
            Attribute::required_string()
                .force_new()
                .with_description("Aviatrix Transit Gateway name."),
        )
        .with_attribute(
            "connection_name",
            Attribute::required_string()
                .force_new()
                .with_description("Connection name."),
        )
        .with_attribute(
            "transit_gateway_bgp_asn",
            Attribute::required_int()
                .force_new()
                .with_description("BGP AS Number for transit gateway."),
        )
        .with_attribute(
            "branch_router_bgp_asn",
            Attribute::required_int()
                .force_new()
                .with_description("BGP AS Number for branch router."),
        )
        .with_attribute(
            "phase1_authentication",
            Attribute::optional_string()
                .force_new()
                .with_default("SHA-256")
                .with_description("Phase 1 authentication algorithm."),
        )
        .with_attribute(
            "phase1_dh_groups",
            Attribute::optional_int()
                .force_new()
                .with_default(14)
                .with_description("Phase 1 Diffie-Hellman groups."),
        )
        .with_attribute(
            "phase1_encryption",
            Attribute::optional_string()
                .force_new()
                .with_default("AES-256-CBC")
                .with_description("Phase 1 encryption algorithm."),
        )
        .with_attribute(
            "phase2_authentication",
            Attribute::optional_string()
                .force_new()
                .with_default("HMAC-SHA-256")
                .with_description("Phase 2 authentication algorithm."),
        )
        .with_attribute(
            "phase2_dh_groups",
            Attribute::optional_int()
                .force_new()
                .with_default(14)
                .with_description("Phase 2 Diffie-Hellman groups."),
        )
        .with_attribute(
            "phase2_encryption",
            Attribute::optional_string()
                .force_new()
                .with_default("AES-256-CBC")
                .with_description("Phase 2 encryption algorithm."),
        )
        .with_attribute(
            "enable_global_accelerator",
            Attribute::optional_bool()
                .force_new()
                .with_default(false)
                .with_description("Enable AWS Global Accelerator."),
        )
        .with_attribute(
            "pre_shared_key",
            Attribute::optional_string()
                .force_new()
                .sensitive()
                .with_description("Pre-shared Key."),
        )
        .with_attribute(
            "local_tunnel_ip",
            Attribute::optional_string()
                .force_new()
                .with_description("Local tunnel IP."),
        )
        .with_attribute(
            "remote_tunnel_ip",
            Attribute::optional_string()
                .force_new()
                .with_description("Remote tunnel IP."),
        )
}
