//! Resource Implementations
//!
//! Implements the lifecycle callbacks for each resource type. Callbacks get
//! the controller client passed in explicitly and work on [`ResourceData`].

pub mod branch_router_transit_gateway_attachment;

use anyhow::Result;
use aviatrix_client::ControllerApi;
use thiserror::Error;

use crate::schema::Schema;
use crate::state::ResourceData;

/// Trait for resource operations
#[async_trait::async_trait]
pub trait Resource {
    /// Resource type name
    fn type_name() -> &'static str;

    /// Attribute schema of this resource type
    fn schema() -> Schema;

    /// Create a new resource and set its identifier
    async fn create(client: &dyn ControllerApi, data: &mut ResourceData) -> Result<()>;

    /// Refresh from the remote side. Clears the identifier if the object is gone.
    async fn read(client: &dyn ControllerApi, data: &mut ResourceData) -> Result<()>;

    /// Delete a resource
    async fn delete(client: &dyn ControllerApi, data: &mut ResourceData) -> Result<()>;

    /// Import an existing object by identifier
    async fn import(client: &dyn ControllerApi, id: &str) -> Result<ResourceData>;
}

/// Seed resource data with nothing but the identifier; the read fills in the rest
pub fn import_state_passthrough(schema: &Schema, id: &str) -> ResourceData {
    ResourceData::with_id(schema, id)
}

/// A wire-format value that does not parse as the attribute's type
#[derive(Debug, Error)]
#[error("could not convert {field} to {target}: {value:?}")]
pub struct ConversionError {
    pub field: &'static str,
    pub target: &'static str,
    pub value: String,
}

/// Parse a decimal integer sent as a string
pub fn parse_int(field: &'static str, value: &str) -> Result<i64, ConversionError> {
    value.parse::<i64>().map_err(|_| ConversionError {
        field,
        target: "int",
        value: value.to_string(),
    })
}

/// Parse a boolean sent as a string
pub fn parse_bool(field: &'static str, value: &str) -> Result<bool, ConversionError> {
    match value {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Ok(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Ok(false),
        _ => Err(ConversionError {
            field,
            target: "bool",
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_int() {
        assert_eq!(parse_int("asn", "65001").unwrap(), 65001);
        assert_eq!(parse_int("asn", "-1").unwrap(), -1);

        let err = parse_int("transit_gateway_bgp_asn", "65001a").unwrap_err();
        assert_eq!(err.field, "transit_gateway_bgp_asn");
        assert_eq!(err.value, "65001a");
        assert!(parse_int("asn", "").is_err());
        assert!(parse_int("asn", " 14").is_err());
    }

    #[test]
    fn test_parse_bool() {
        for v in ["1", "t", "T", "true", "TRUE", "True"] {
            assert!(parse_bool("flag", v).unwrap(), "{v}");
        }
        for v in ["0", "f", "F", "false", "FALSE", "False"] {
            assert!(!parse_bool("flag", v).unwrap(), "{v}");
        }
        for v in ["yes", "", "tRUE", "enabled"] {
            assert!(parse_bool("flag", v).is_err(), "{v}");
        }
    }

    #[test]
    fn test_conversion_error_message() {
        let err = parse_bool("enable_global_accelerator", "maybe").unwrap_err();
        assert_eq!(
            err.to_string(),
            "could not convert enable_global_accelerator to bool: \"maybe\""
        );
    }
}
