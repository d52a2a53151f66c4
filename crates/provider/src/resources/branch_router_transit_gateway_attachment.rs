//! Branch router to transit gateway attachment resource
//!
//! Every attribute forces replacement, so there is no update callback: the
//! lifecycle is create, read (also used by import) and delete.

use anyhow::{Context, Result};
use aviatrix_client::{BranchRouterTransitGatewayAttachment, ControllerApi};
use tracing::{debug, info};

use super::{import_state_passthrough, parse_bool, parse_int, Resource};
use crate::schema::{self, Schema};
use crate::state::ResourceData;

pub struct BranchRouterTransitGatewayAttachmentResource;

/// Build the controller request from schema-typed values
pub fn marshal_input(data: &ResourceData) -> BranchRouterTransitGatewayAttachment {
    BranchRouterTransitGatewayAttachment {
        branch_name: data.get_string("branch_name"),
        transit_gateway_name: data.get_string("transit_gateway_name"),
        connection_name: data.get_string("connection_name"),
        routing_protocol: "bgp".to_string(),
        transit_gateway_bgp_asn: data.get_int("transit_gateway_bgp_asn").to_string(),
        branch_router_bgp_asn: data.get_int("branch_router_bgp_asn").to_string(),
        phase1_authentication: data.get_string("phase1_authentication"),
        phase1_dh_groups: data.get_int("phase1_dh_groups").to_string(),
        phase1_encryption: data.get_string("phase1_encryption"),
        phase2_authentication: data.get_string("phase2_authentication"),
        phase2_dh_groups: data.get_int("phase2_dh_groups").to_string(),
        phase2_encryption: data.get_string("phase2_encryption"),
        enable_global_accelerator: data.get_bool("enable_global_accelerator").to_string(),
        pre_shared_key: data.get_string("pre_shared_key"),
        local_tunnel_ip: data.get_string("local_tunnel_ip"),
        remote_tunnel_ip: data.get_string("remote_tunnel_ip"),
    }
}

#[async_trait::async_trait]
impl Resource for BranchRouterTransitGatewayAttachmentResource {
    fn type_name() -> &'static str {
        "aviatrix_branch_router_transit_gateway_attachment"
    }

    fn schema() -> Schema {
        schema::branch_router_transit_gateway_attachment_schema()
    }

    async fn create(client: &dyn ControllerApi, data: &mut ResourceData) -> Result<()> {
        let attachment = marshal_input(data);

        client
            .create_branch_router_transit_gateway_attachment(&attachment)
            .await?;

        info!(
            connection = %attachment.connection_name,
            "Attached branch router {} to transit gateway {}",
            attachment.branch_name,
            attachment.transit_gateway_name
        );
        data.set_id(attachment.connection_name);
        Ok(())
    }

    async fn read(client: &dyn ControllerApi, data: &mut ResourceData) -> Result<()> {
        let mut connection_name = data.get_string("connection_name");
        let is_import = connection_name.is_empty();
        if is_import {
            connection_name = data.id().to_string();
            debug!(
                "Looks like an import, no branch_router_transit_gateway_attachment connection_name received. Import Id is {}",
                connection_name
            );
        }

        let attachment = match client
            .get_branch_router_transit_gateway_attachment(&connection_name)
            .await
        {
            Ok(attachment) => attachment,
            Err(e) if e.is_not_found() => {
                info!(connection = %connection_name, "Attachment is gone, removing from state");
                data.set_id("");
                return Ok(());
            }
            Err(e) => {
                return Err(e).with_context(|| {
                    format!(
                        "could not find branch_router_transit_gateway_attachment {}",
                        connection_name
                    )
                })
            }
        };

        let transit_gateway_bgp_asn =
            parse_int("transit_gateway_bgp_asn", &attachment.transit_gateway_bgp_asn)?;
        let branch_router_bgp_asn =
            parse_int("branch_router_bgp_asn", &attachment.branch_router_bgp_asn)?;
        let phase1_dh_groups = parse_int("phase1_dh_groups", &attachment.phase1_dh_groups)?;
        let phase2_dh_groups = parse_int("phase2_dh_groups", &attachment.phase2_dh_groups)?;
        let enable_global_accelerator = parse_bool(
            "enable_global_accelerator",
            &attachment.enable_global_accelerator,
        )?;

        data.set("branch_name", attachment.branch_name);
        data.set("transit_gateway_name", attachment.transit_gateway_name);
        data.set("connection_name", attachment.connection_name.as_str());
        data.set("transit_gateway_bgp_asn", transit_gateway_bgp_asn);
        data.set("branch_router_bgp_asn", branch_router_bgp_asn);
        data.set("phase1_authentication", attachment.phase1_authentication);
        data.set("phase1_dh_groups", phase1_dh_groups);
        data.set("phase1_encryption", attachment.phase1_encryption);
        data.set("phase2_authentication", attachment.phase2_authentication);
        data.set("phase2_dh_groups", phase2_dh_groups);
        data.set("phase2_encryption", attachment.phase2_encryption);
        data.set("enable_global_accelerator", enable_global_accelerator);

        // Only track tunnel IPs the configuration asked for. An empty remote
        // value on import stays unset, same as after create.
        for (field, remote) in [
            ("local_tunnel_ip", attachment.local_tunnel_ip),
            ("remote_tunnel_ip", attachment.remote_tunnel_ip),
        ] {
            let tracked = !data.get_string(field).is_empty();
            if tracked || (is_import && !remote.is_empty()) {
                data.set(field, remote);
            }
        }

        data.set_id(attachment.connection_name);
        Ok(())
    }

    async fn delete(client: &dyn ControllerApi, data: &mut ResourceData) -> Result<()> {
        let connection_name = data.get_string("connection_name");

        client
            .delete_branch_router_attachment(&connection_name)
            .await?;

        info!(connection = %connection_name, "Detached branch router");
        Ok(())
    }

    async fn import(client: &dyn ControllerApi, id: &str) -> Result<ResourceData> {
        let mut data = import_state_passthrough(&Self::schema(), id);
        Self::read(client, &mut data).await?;
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{make_state, DynamicValue};

    fn config() -> DynamicValue {
        make_state(vec![
            ("branch_name", "branch-1".into()),
            ("transit_gateway_name", "transit-1".into()),
            ("connection_name", "conn-1".into()),
            ("transit_gateway_bgp_asn", 65001.into()),
            ("branch_router_bgp_asn", 65002.into()),
            ("pre_shared_key", "s3cret".into()),
        ])
    }

    #[test]
    fn test_marshal_converts_numbers_and_fills_defaults() {
        let schema = BranchRouterTransitGatewayAttachmentResource::schema();
        let data = ResourceData::from_state(&schema, &config());

        let attachment = marshal_input(&data);
        assert_eq!(attachment.branch_name, "branch-1");
        assert_eq!(attachment.transit_gateway_name, "transit-1");
        assert_eq!(attachment.connection_name, "conn-1");
        assert_eq!(attachment.routing_protocol, "bgp");
        assert_eq!(attachment.transit_gateway_bgp_asn, "65001");
        assert_eq!(attachment.branch_router_bgp_asn, "65002");
        assert_eq!(attachment.phase1_authentication, "SHA-256");
        assert_eq!(attachment.phase1_dh_groups, "14");
        assert_eq!(attachment.phase1_encryption, "AES-256-CBC");
        assert_eq!(attachment.phase2_authentication, "HMAC-SHA-256");
        assert_eq!(attachment.phase2_dh_groups, "14");
        assert_eq!(attachment.phase2_encryption, "AES-256-CBC");
        assert_eq!(attachment.enable_global_accelerator, "false");
        assert_eq!(attachment.pre_shared_key, "s3cret");
        assert_eq!(attachment.local_tunnel_ip, "");
        assert_eq!(attachment.remote_tunnel_ip, "");
    }

    #[test]
    fn test_marshal_keeps_explicit_values() {
        let schema = BranchRouterTransitGatewayAttachmentResource::schema();
        let mut state = config();
        if let DynamicValue::Map(map) = &mut state {
            map.insert("phase1_dh_groups".to_string(), 19.into());
            map.insert("enable_global_accelerator".to_string(), true.into());
            map.insert("local_tunnel_ip".to_string(), "169.254.10.1/30".into());
        }
        let data = ResourceData::from_state(&schema, &state);

        let attachment = marshal_input(&data);
        assert_eq!(attachment.phase1_dh_groups, "19");
        assert_eq!(attachment.enable_global_accelerator, "true");
        assert_eq!(attachment.local_tunnel_ip, "169.254.10.1/30");
    }

    #[test]
    fn test_type_name() {
        assert_eq!(
            BranchRouterTransitGatewayAttachmentResource::type_name(),
            "aviatrix_branch_router_transit_gateway_attachment"
        );
    }
}
